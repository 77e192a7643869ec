use std::{fs, path::Path};

use dicom::{
    core::{DataElement, PrimitiveValue, VR},
    dictionary_std::{tags, uids},
    object::{FileMetaTableBuilder, InMemDicomObject},
};
use glam::Vec3;
use interactive_thumbnails::{
    tube::{SpatialObject, Transform},
    tube_record::TubePoint,
};

/// Writes a `MET_FLOAT` MetaImage with inline data.
///
/// `values` are laid out x fastest, then y, then z.
pub fn write_metaimage(
    path: &Path,
    (width, height, depth): (usize, usize, usize),
    spacing: (f32, f32, f32),
    values: &[f32],
) {
    assert_eq!(values.len(), width * height * depth, "voxel count mismatch");
    let header = format!(
        "ObjectType = Image\nNDims = 3\nDimSize = {width} {height} {depth}\n\
         ElementType = MET_FLOAT\nElementSpacing = {} {} {}\n\
         ElementByteOrderMSB = False\nElementDataFile = LOCAL\n",
        spacing.0, spacing.1, spacing.2
    );
    let mut bytes = header.into_bytes();
    bytes.extend(values.iter().flat_map(|v| v.to_le_bytes()));
    fs::write(path, bytes).expect("metaimage should be writable");
}

/// Volume whose intensity grows with the slice index: voxel value = 10 * z.
pub fn depth_ramp(width: usize, height: usize, depth: usize) -> Vec<f32> {
    (0..depth)
        .flat_map(|z| std::iter::repeat_n(10.0 * z as f32, width * height))
        .collect()
}

/// Solid ball of value 1000 in a zero background.
pub fn ball(size: usize) -> Vec<f32> {
    let c = (size as f32 - 1.0) / 2.0;
    let r2 = (size as f32 / 3.0).powi(2);
    let mut out = Vec::with_capacity(size * size * size);
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let d = Vec3::new(x as f32 - c, y as f32 - c, z as f32 - c);
                out.push(if d.length_squared() <= r2 { 1000.0 } else { 0.0 });
            }
        }
    }
    out
}

/// A straight tube along +X with `n` points of the given radius.
pub fn straight_tube(id: i64, n: usize, radius: f32, offset: Vec3) -> SpatialObject {
    let points = (0..n)
        .map(|i| {
            TubePoint {
                position: offset + Vec3::new(i as f32, 0.0, 0.0),
                radius,
                tangent: Vec3::X,
                normal1: Vec3::Y,
                normal2: Vec3::Z,
                ..TubePoint::default()
            }
            .to_record()
        })
        .collect();
    SpatialObject::Tube {
        id: Some(id),
        transform: Transform::default(),
        points,
    }
}

/// Group scaled by `scale` holding two parallel tubes.
pub fn two_tube_scene(scale: f32) -> SpatialObject {
    SpatialObject::Group {
        id: None,
        transform: Transform::scale(scale, scale, scale),
        children: vec![
            straight_tube(1, 6, 0.5, Vec3::ZERO),
            straight_tube(2, 6, 1.0, Vec3::new(0.0, 3.0, 0.0)),
        ],
    }
}

/// One constant-valued slice of a synthetic 16-bit CT series.
#[derive(Clone, Debug)]
pub struct CtSlice {
    pub series_uid: &'static str,
    pub instance: i32,
    /// Image Position (Patient) z.
    pub z: f32,
    pub fill: u16,
    pub rows: u16,
    pub columns: u16,
    /// Pixel Spacing as stored: (row, column).
    pub pixel_spacing: (f32, f32),
    /// Window Center / Window Width as DS strings.
    pub window: Option<(&'static str, &'static str)>,
}

impl CtSlice {
    pub fn new(series_uid: &'static str, instance: i32, z: f32, fill: u16) -> Self {
        Self {
            series_uid,
            instance,
            z,
            fill,
            rows: 2,
            columns: 3,
            pixel_spacing: (0.5, 0.75),
            window: None,
        }
    }
}

fn ds(values: &[f32]) -> PrimitiveValue {
    PrimitiveValue::Strs(values.iter().map(|v| v.to_string()).collect::<Vec<_>>().into())
}

/// Writes `slice` as an Explicit VR Little Endian DICOM file.
pub fn write_ct_slice(path: &Path, slice: &CtSlice) {
    let mut obj = InMemDicomObject::new_empty();
    let sop_instance = format!("{}.{}", slice.series_uid, slice.instance);
    obj.put(DataElement::new(tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE));
    obj.put(DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, sop_instance.as_str()));
    obj.put(DataElement::new(tags::MODALITY, VR::CS, "CT"));
    obj.put(DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, slice.series_uid));
    obj.put(DataElement::new(tags::SERIES_DATE, VR::DA, "20240101"));
    obj.put(DataElement::new(
        tags::INSTANCE_NUMBER,
        VR::IS,
        slice.instance.to_string(),
    ));
    obj.put(DataElement::new(
        tags::IMAGE_POSITION_PATIENT,
        VR::DS,
        ds(&[0.0, 0.0, slice.z]),
    ));
    obj.put(DataElement::new(
        tags::PIXEL_SPACING,
        VR::DS,
        ds(&[slice.pixel_spacing.0, slice.pixel_spacing.1]),
    ));
    if let Some((center, width)) = slice.window {
        obj.put(DataElement::new(tags::WINDOW_CENTER, VR::DS, center));
        obj.put(DataElement::new(tags::WINDOW_WIDTH, VR::DS, width));
    }
    obj.put(DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1u16)));
    obj.put(DataElement::new(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"));
    obj.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(slice.rows)));
    obj.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(slice.columns)));
    obj.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16u16)));
    obj.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(16u16)));
    obj.put(DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(15u16)));
    obj.put(DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0u16)));
    let pixels = vec![slice.fill; slice.rows as usize * slice.columns as usize];
    obj.put(DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::U16(pixels.into())));

    obj.with_meta(FileMetaTableBuilder::new().transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN))
        .expect("file meta should build")
        .write_to_file(path)
        .expect("DICOM slice should be writable");
}
