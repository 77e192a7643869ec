mod common;

use std::fs;

use common::{
    scratch_dir,
    synthetic::{CtSlice, write_ct_slice},
};
use interactive_thumbnails::{
    config::RunConfig,
    enums::{NavigationMode, SortBy},
    error::ThumbnailError,
    pipeline,
    volume::Window,
    volume_loader::{VolumeLoader, VolumeLoaderError},
};
use ndarray::s;

const SERIES_A: &str = "1.2.826.0.1.3680043.9";
const SERIES_B: &str = "1.2.826.0.1.3680043.1";

/// Three slices of series A written out of position order, plus a stray
/// text file and a later-sorting series B.
fn write_two_series(dir: &std::path::Path) {
    let windowed = |instance, z, fill| CtSlice {
        window: Some(("40.7", "400.9")),
        ..CtSlice::new(SERIES_A, instance, z, fill)
    };
    write_ct_slice(&dir.join("a0.dcm"), &windowed(3, 4.0, 200));
    write_ct_slice(&dir.join("a1.dcm"), &windowed(1, 0.0, 0));
    write_ct_slice(&dir.join("a2.dcm"), &windowed(2, 2.0, 100));
    fs::write(dir.join("README"), "not a DICOM file\n").unwrap();
    for (i, z) in [10.0, 11.0].into_iter().enumerate() {
        let slice = CtSlice {
            rows: 4,
            columns: 4,
            ..CtSlice::new(SERIES_B, i as i32 + 1, z, 7)
        };
        write_ct_slice(&dir.join(format!("b{i}.dcm")), &slice);
    }
}

#[test]
fn first_series_by_path_is_loaded_in_position_order() {
    let dir = scratch_dir("dicom-series");
    write_two_series(&dir);

    let volume = VolumeLoader::load_from_directory(&dir, SortBy::ImagePositionPatient)
        .expect("series should load");

    assert_eq!(volume.dim(), (3, 2, 3));
    // Index 0 is the lowest slice and the origin is its position.
    assert_eq!(volume.origin, (0.0, 0.0, 0.0));
    let fills: Vec<f32> = (0..3).map(|z| volume.data[[z, 1, 2]]).collect();
    assert_eq!(fills, [0.0, 100.0, 200.0]);
    assert!(volume.data.slice(s![0, .., ..]).iter().all(|&v| v == 0.0));
    // Pixel Spacing (row 0.5, column 0.75); z step from consecutive positions.
    assert_eq!(volume.spacing, (0.75, 0.5, 2.0));
    assert_eq!(
        volume.window,
        Some(Window {
            center: 40.0,
            width: 400.0
        })
    );
}

#[test]
fn instance_number_order_matches_positions() {
    let dir = scratch_dir("dicom-instance");
    write_two_series(&dir);
    let volume = VolumeLoader::load_from_directory(&dir, SortBy::InstanceNumber).unwrap();
    assert_eq!(volume.data[[0, 0, 0]], 0.0);
    assert_eq!(volume.data[[2, 0, 0]], 200.0);
}

#[test]
fn zero_pixel_spacing_is_malformed() {
    let dir = scratch_dir("dicom-spacing");
    for (i, z) in [0.0, 1.0].into_iter().enumerate() {
        let slice = CtSlice {
            pixel_spacing: (0.0, 0.0),
            ..CtSlice::new(SERIES_A, i as i32 + 1, z, 50)
        };
        write_ct_slice(&dir.join(format!("s{i}.dcm")), &slice);
    }
    let err = VolumeLoader::load_from_directory(&dir, SortBy::default()).unwrap_err();
    assert!(matches!(err, VolumeLoaderError::Malformed(_)), "{err}");
}

#[test]
fn directory_without_dicom_has_no_series() {
    let dir = scratch_dir("dicom-none");
    fs::write(dir.join("README"), "nothing here\n").unwrap();
    let err = VolumeLoader::load_from_directory(&dir, SortBy::default()).unwrap_err();
    assert!(matches!(err, VolumeLoaderError::NoSeries(_)));
}

#[test]
fn dicom_directory_slice_run() {
    let dir = scratch_dir("dicom-run");
    let input = dir.join("series");
    fs::create_dir_all(&input).unwrap();
    write_two_series(&input);
    let out = dir.join("out");

    let config = RunConfig {
        width: Some(6),
        slices: 3,
        ..RunConfig::new(&input, &out)
    };
    let summary = pipeline::run(&config).expect("DICOM slice run should succeed");

    assert_eq!(summary.mode, NavigationMode::Slices);
    assert_eq!(summary.assets.len(), 3);
    let mean = |i: usize| {
        let img = image::open(out.join(format!("{i}.jpg"))).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (6, 4));
        img.pixels().map(|p| p.0[0] as f32).sum::<f32>() / (6.0 * 4.0)
    };
    // Brighter fills stay brighter through the window.
    assert!(mean(0) < mean(1) && mean(1) < mean(2), "{} {} {}", mean(0), mean(1), mean(2));
    assert!(out.join("index.json").is_file());
}

#[test]
fn unreadable_series_directory_is_an_input_error() {
    let dir = scratch_dir("dicom-empty-run");
    let input = dir.join("series");
    fs::create_dir_all(&input).unwrap();
    let err = pipeline::run(&RunConfig::new(&input, dir.join("out"))).unwrap_err();
    assert!(matches!(err, ThumbnailError::Input(_)), "{err}");
    assert!(!dir.join("out").join("index.json").exists());
}
