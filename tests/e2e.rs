mod common;

use std::fs;

use common::{
    scratch_dir,
    synthetic::{ball, depth_ramp, two_tube_scene, write_metaimage},
};
use image::RgbImage;
use interactive_thumbnails::{
    camera::Camera,
    config::RunConfig,
    enums::NavigationMode,
    error::{ThumbnailError, ThumbnailResult},
    pipeline::{self, generate_spherical},
    render::{Renderable, Renderer},
    sampling::AngularGrid,
    transfer_function::{TransferFunction, resolve},
    volume::VolumeImage,
};
use ndarray::Array3;
use serde_json::{Value, json};

fn read_manifest(dir: &std::path::Path) -> Value {
    let text = fs::read_to_string(dir.join("index.json")).expect("manifest should exist");
    serde_json::from_str(&text).expect("manifest should be JSON")
}

#[test]
fn ten_slices_of_a_ten_slice_volume() {
    let dir = scratch_dir("ten-slices");
    let input = dir.join("ramp.mha");
    write_metaimage(&input, (16, 8, 10), (1.0, 1.0, 2.5), &depth_ramp(16, 8, 10));
    let out = dir.join("out");

    let config = RunConfig {
        width: Some(32),
        ..RunConfig::new(&input, &out)
    };
    let summary = pipeline::run(&config).expect("slice run should succeed");

    assert_eq!(summary.mode, NavigationMode::Slices);
    assert_eq!(summary.assets.len(), 10);
    for i in 0..10 {
        let path = out.join(format!("{i}.jpg"));
        let img = image::open(&path).expect("slice should decode").to_luma8();
        // 16x8 plane scaled to width 32 keeps the 2:1 aspect.
        assert_eq!(img.dimensions(), (32, 16));
    }

    let manifest = read_manifest(&out);
    assert_eq!(manifest["arguments_order"], json!(["slice"]));
    assert_eq!(
        manifest["arguments"]["slice"]["values"],
        json!([0, 1, 2, 3, 4, 5, 6, 7, 8, 9])
    );
    assert_eq!(manifest["data"][0]["pattern"], "{slice}.jpg");
    assert_eq!(manifest["type"], json!(["tonic-query-data-model"]));
}

#[test]
fn slice_brightness_follows_the_global_range() {
    let dir = scratch_dir("brightness");
    let input = dir.join("ramp.mha");
    write_metaimage(&input, (8, 8, 4), (1.0, 1.0, 1.0), &depth_ramp(8, 8, 4));
    let out = dir.join("out");

    let config = RunConfig {
        width: Some(8),
        height: Some(8),
        slices: 4,
        ..RunConfig::new(&input, &out)
    };
    pipeline::run(&config).expect("slice run should succeed");

    let center = |i: usize| {
        image::open(out.join(format!("{i}.jpg")))
            .unwrap()
            .to_luma8()
            .get_pixel(4, 4)
            .0[0] as i32
    };
    assert!(center(0) < 10, "first slice {}", center(0));
    assert!(center(3) > 245, "last slice {}", center(3));
    assert!((center(1) - 85).abs() < 10 && (center(2) - 170).abs() < 10);
}

#[test]
fn failed_last_write_leaves_no_manifest() {
    let dir = scratch_dir("failed-write");
    let input = dir.join("ramp.mha");
    write_metaimage(&input, (8, 8, 10), (1.0, 1.0, 1.0), &depth_ramp(8, 8, 10));
    let out = dir.join("out");
    // A directory where the last slice should go makes that write fail.
    fs::create_dir_all(out.join("9.jpg")).unwrap();

    let config = RunConfig {
        width: Some(8),
        ..RunConfig::new(&input, &out)
    };
    let err = pipeline::run(&config).unwrap_err();

    assert!(matches!(err, ThumbnailError::Io { .. }), "{err}");
    assert!(out.join("0.jpg").is_file());
    assert!(!out.join("index.json").exists());
}

#[test]
fn invalid_parameters_fail_before_any_output() {
    let dir = scratch_dir("invalid");
    let out = dir.join("out");
    let config = RunConfig {
        preset: Some("CT-Nope".into()),
        mode: Some(NavigationMode::Spherical),
        ..RunConfig::new(dir.join("missing.mha"), &out)
    };
    assert!(matches!(
        pipeline::run(&config),
        Err(ThumbnailError::Validation(_))
    ));
    assert!(!out.exists());
}

#[test]
fn two_dimensional_metaimage_is_an_input_error() {
    let dir = scratch_dir("flat");
    let input = dir.join("flat.mha");
    fs::write(
        &input,
        "NDims = 2\nDimSize = 2 2\nElementType = MET_UCHAR\nElementDataFile = LOCAL\n\0\0\0\0",
    )
    .unwrap();
    let err = pipeline::run(&RunConfig::new(&input, dir.join("out"))).unwrap_err();
    assert!(matches!(err, ThumbnailError::Input(_)), "{err}");
    assert!(!dir.join("out").join("index.json").exists());
}

/// Records the camera it is asked to render with.
struct RecordingRenderer {
    cameras: Vec<Camera>,
}

impl Renderer for RecordingRenderer {
    fn size(&self) -> (u32, u32) {
        (8, 8)
    }

    fn render(
        &mut self,
        _renderable: &Renderable<'_>,
        camera: &Camera,
        _transfer_function: &TransferFunction,
    ) -> ThumbnailResult<RgbImage> {
        self.cameras.push(*camera);
        Ok(RgbImage::new(8, 8))
    }
}

#[test]
fn spherical_samples_are_rendered_phi_major() {
    let dir = scratch_dir("phi-major");
    let volume = VolumeImage::new(Array3::zeros((4, 4, 4)), (1.0, 1.0, 1.0));
    let renderable = Renderable::Volume(&volume);
    let grid = AngularGrid::new(3, 2).unwrap();
    let tf = resolve(None, renderable.scalar_range()).unwrap();
    let mut renderer = RecordingRenderer {
        cameras: Vec::new(),
    };

    let summary =
        generate_spherical(&renderable, &grid, &tf, &mut renderer, [0, 0, 0], 90, &dir).unwrap();

    let bounds = renderable.bounds();
    let expected: Vec<Camera> = grid
        .samples()
        .map(|s| Camera::orbit(&bounds, &s, 1.0))
        .collect();
    assert_eq!(renderer.cameras, expected);

    let names: Vec<String> = summary
        .assets
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        [
            "-90_0.jpg",
            "90_0.jpg",
            "-90_120.jpg",
            "90_120.jpg",
            "-90_240.jpg",
            "90_240.jpg"
        ]
    );
    let manifest = read_manifest(&dir);
    assert_eq!(manifest["arguments_order"], json!(["phi", "theta"]));
    assert_eq!(
        manifest["arguments"]["phi"]["values"],
        json!([0.0, 120.0, 240.0])
    );
    assert_eq!(manifest["data"][0]["pattern"], "{theta}_{phi}.jpg");
}

#[test]
fn volume_orbit_with_preset() {
    let dir = scratch_dir("volume-orbit");
    let input = dir.join("ball.mha");
    write_metaimage(&input, (12, 12, 12), (1.0, 1.0, 1.0), &ball(12));
    let out = dir.join("out");

    let config = RunConfig {
        mode: Some(NavigationMode::Spherical),
        width: Some(24),
        phi_samples: 2,
        theta_samples: 1,
        preset: Some("CT-Bones".into()),
        ..RunConfig::new(&input, &out)
    };
    let summary = pipeline::run(&config).expect("spherical run should succeed");

    assert_eq!(summary.assets.len(), 2);
    let img = image::open(out.join("0_180.jpg")).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (24, 24));
    assert_eq!(read_manifest(&out)["arguments"]["theta"]["values"], json!([0.0]));
}

#[test]
fn tube_scene_orbits_by_default() {
    let dir = scratch_dir("tubes");
    let input = dir.join("scene.json");
    fs::write(&input, serde_json::to_string(&two_tube_scene(2.0)).unwrap()).unwrap();
    let out = dir.join("out");

    let config = RunConfig {
        width: Some(32),
        height: Some(24),
        phi_samples: 4,
        theta_samples: 3,
        ..RunConfig::new(&input, &out)
    };
    let summary = pipeline::run(&config).expect("tube run should succeed");

    assert_eq!(summary.mode, NavigationMode::Spherical);
    assert_eq!(summary.assets.len(), 12);
    assert!(summary.assets.iter().all(|p| p.is_file()));
    let img = image::open(out.join("0_0.jpg")).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (32, 24));
    // The tubes are red by default; the view from the side must show them.
    assert!(img.pixels().any(|p| p.0[0] > 128 && p.0[1] < 96));
    assert_eq!(read_manifest(&out)["arguments"]["theta"]["values"], json!([-90.0, 0.0, 90.0]));
}

#[test]
fn tube_scene_cannot_be_sliced() {
    let dir = scratch_dir("tube-slices");
    let input = dir.join("scene.json");
    fs::write(&input, serde_json::to_string(&two_tube_scene(1.0)).unwrap()).unwrap();
    let config = RunConfig {
        mode: Some(NavigationMode::Slices),
        ..RunConfig::new(&input, dir.join("out"))
    };
    assert!(matches!(
        pipeline::run(&config),
        Err(ThumbnailError::Validation(_))
    ));
}

#[test]
fn slice_run_ignores_the_camera_grid() {
    let dir = scratch_dir("slices-no-grid");
    let input = dir.join("ramp.mha");
    write_metaimage(&input, (8, 8, 4), (1.0, 1.0, 1.0), &depth_ramp(8, 8, 4));
    let config = RunConfig {
        phi_samples: 0,
        slices: 2,
        ..RunConfig::new(&input, dir.join("out"))
    };
    let summary = pipeline::run(&config).expect("unused grid should not fail a slice run");
    assert_eq!(summary.assets.len(), 2);
}

#[test]
fn zero_spacing_metaimage_is_an_input_error() {
    let dir = scratch_dir("zero-spacing");
    let input = dir.join("flat.mha");
    write_metaimage(&input, (4, 4, 4), (0.0, 0.0, 0.0), &depth_ramp(4, 4, 4));
    let out = dir.join("out");
    let err = pipeline::run(&RunConfig::new(&input, &out)).unwrap_err();
    assert!(matches!(err, ThumbnailError::Input(_)), "{err}");
    assert!(!out.join("index.json").exists());
}
