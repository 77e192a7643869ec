use crate::{
    enums::SortBy,
    metaimage,
    volume::{VolumeImage, Window},
};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("No DICOM series found in {}", .0.display())]
    NoSeries(PathBuf),

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Input must be a 3D image, {0} dimensions found")]
    NotVolumetric(usize),

    #[error("Unsupported input: {0}")]
    Unsupported(String),

    #[error("Malformed volume file: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

type DicomFile = FileDicomObject<InMemDicomObject>;

struct SliceRecord {
    order: Option<f32>,
    position: Option<[f32; 3]>,
    image: Array2<f32>,
}

/// Files sharing a series identity and series date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesKey {
    pub uid: String,
    pub date: String,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from any supported path: a DICOM series directory or a
    /// MetaImage (`.mha`/`.mhd`) file.
    pub fn load_from_path(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<VolumeImage, VolumeLoaderError> {
        let path = path.as_ref();
        if path.is_dir() {
            return Self::load_from_directory(path, sort_by);
        }
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase());
        match extension.as_deref() {
            Some("mha") | Some("mhd") => metaimage::read_metaimage(path),
            Some("dcm") => Self::load_from_file_paths(&[path], sort_by),
            _ => Err(VolumeLoaderError::Unsupported(format!(
                "cannot read a volume from {}",
                path.display()
            ))),
        }
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects of one series
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[DicomFile],
        sort_by: SortBy,
    ) -> Result<VolumeImage, VolumeLoaderError> {
        let mut records: Vec<_> = dicom_objects
            .par_iter()
            .filter_map(|dicom_object| Self::extract_slice_record(dicom_object, &sort_by))
            .collect();

        if records.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_records(&mut records, sort_by);
        Self::validate_dimensions(&records)?;

        let spacing = Self::get_spacing(dicom_objects, &records)?;
        let origin = records[0].position.map_or((0.0, 0.0, 0.0), |p| (p[0], p[1], p[2]));
        let window = dicom_objects.iter().find_map(Self::get_window);
        let volume_array = Self::build_volume_array(&records);
        debug!(dim = ?volume_array.dim(), ?spacing, ?window, "assembled DICOM volume");

        Ok(VolumeImage::new(volume_array, spacing)
            .with_origin(origin)
            .with_window(window))
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        sort_by: SortBy,
    ) -> Result<VolumeImage, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> = paths
            .par_iter()
            .map(|path| open_file(path.as_ref()))
            .collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load the first DICOM series found in a directory.
    ///
    /// Every regular file is probed; files that do not parse as DICOM are
    /// skipped. When the directory holds several series, the one whose file
    /// sorts first by path wins.
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<VolumeImage, VolumeLoaderError> {
        let path = path.as_ref();
        let mut paths: Vec<_> = fs::read_dir(path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let objects: Vec<_> = paths
            .par_iter()
            .filter_map(|file| match open_file(file) {
                Ok(object) => Some(object),
                Err(e) => {
                    debug!(file = %file.display(), error = %e, "skipping non-DICOM file");
                    None
                }
            })
            .collect();

        let mut series = Self::group_series(objects);
        if series.is_empty() {
            return Err(VolumeLoaderError::NoSeries(path.to_path_buf()));
        }
        if series.len() > 1 {
            warn!(
                count = series.len(),
                selected = %series[0].0.uid,
                "directory holds several series, using the first one"
            );
        }
        let (key, objects) = series.swap_remove(0);
        info!(series = %key.uid, date = %key.date, files = objects.len(), "loading DICOM series");

        Self::load_from_dicom_objects(&objects, sort_by)
    }

    /// Group objects by series identity, keeping discovery order.
    pub fn group_series(objects: Vec<DicomFile>) -> Vec<(SeriesKey, Vec<DicomFile>)> {
        let mut groups: Vec<(SeriesKey, Vec<DicomFile>)> = Vec::new();
        for object in objects {
            let key = SeriesKey {
                uid: Self::get_string(&object, tags::SERIES_INSTANCE_UID).unwrap_or_default(),
                date: Self::get_string(&object, tags::SERIES_DATE).unwrap_or_default(),
            };
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(object),
                None => groups.push((key, vec![object])),
            }
        }
        groups
    }

    fn get_string(dicom_object: &DicomFile, tag: dicom::core::Tag) -> Option<String> {
        let value = dicom_object.element(tag).ok()?.to_str().ok()?;
        Some(value.trim_end_matches('\0').trim().to_string())
    }

    fn extract_slice_record(dicom_object: &DicomFile, sort_by: &SortBy) -> Option<SliceRecord> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image = Self::decode_image(dicom_object)?;
        Some(SliceRecord {
            order,
            position: Self::get_position(dicom_object),
            image,
        })
    }

    fn get_sort_order(dicom_object: &DicomFile, sort_by: &SortBy) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    fn get_position(dicom_object: &DicomFile) -> Option<[f32; 3]> {
        let pos = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float32()
            .ok()?;
        (pos.len() == 3).then(|| [pos[0], pos[1], pos[2]])
    }

    /// Window center/width, truncated to integers; `None` when either tag is missing.
    fn get_window(dicom_object: &DicomFile) -> Option<Window> {
        let center = dicom_object
            .element(tags::WINDOW_CENTER)
            .ok()?
            .to_float32()
            .ok()?;
        let width = dicom_object
            .element(tags::WINDOW_WIDTH)
            .ok()?
            .to_float32()
            .ok()?;
        Some(Window {
            center: center.trunc(),
            width: width.trunc(),
        })
    }

    /// Modality values (rescale slope/intercept applied, no VOI LUT) of the first frame.
    fn decode_image(dicom_object: &DicomFile) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    /// Ascending order, so index 0 is the lowest position and `origin` is its corner.
    fn sort_records(records: &mut [SliceRecord], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            records.sort_by(|a, b| {
                a.order
                    .partial_cmp(&b.order)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
    }

    fn validate_dimensions(records: &[SliceRecord]) -> Result<(), VolumeLoaderError> {
        let first_dim = records[0].image.dim();
        if records.iter().any(|r| r.image.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(records: &[SliceRecord]) -> Array3<f32> {
        let (height, width) = records[0].image.dim();
        let depth = records.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, record) in records.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&record.image);
        }

        volume
    }

    /// (x, y, z) spacing. Pixel Spacing is stored as (row, column) and must be
    /// positive. The slice step comes from consecutive positions, then Slice
    /// Thickness; missing values default to 1.
    fn get_spacing(
        dicom_objects: &[DicomFile],
        records: &[SliceRecord],
    ) -> Result<(f32, f32, f32), VolumeLoaderError> {
        let in_plane = dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;
            (pixel_spacing.len() == 2).then(|| (pixel_spacing[1], pixel_spacing[0]))
        });
        let (x, y) = in_plane.unwrap_or_else(|| {
            warn!("missing Pixel Spacing, assuming 1.0");
            (1.0, 1.0)
        });
        if [x, y].iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(VolumeLoaderError::Malformed(format!(
                "Pixel Spacing must be positive, got ({y}, {x})"
            )));
        }

        let from_positions = match (records.first(), records.get(1)) {
            (Some(a), Some(b)) => match (a.position, b.position) {
                (Some(pa), Some(pb)) => Some((pb[2] - pa[2]).abs()).filter(|d| *d > 0.0),
                _ => None,
            },
            _ => None,
        };
        let z = from_positions
            .or_else(|| {
                dicom_objects.iter().find_map(|dicom_object| {
                    dicom_object
                        .element(tags::SLICE_THICKNESS)
                        .ok()?
                        .to_float32()
                        .ok()
                        .filter(|t| *t > 0.0)
                })
            })
            .unwrap_or(1.0);

        Ok((x, y, z))
    }
}
