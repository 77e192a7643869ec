//! Slice extraction: choose evenly spaced slices along one axis, low-pass and
//! resample each onto the requested raster, and quantize to 8 bits.

use std::f32::consts::PI;

use image::GrayImage;
use ndarray::ArrayView2;

use crate::{
    enums::Orientation,
    error::{ThumbnailError, ThumbnailResult},
    intensity,
    interpolator::Interpolator,
    volume::VolumeImage,
};

pub const DEFAULT_WIDTH: u32 = 512;
pub const DEFAULT_HEIGHT: u32 = 512;
pub const DEFAULT_NB_SLICES: usize = 10;

/// Resolve the output raster size for an input plane of `plane = (width, height)` pixels.
///
/// With neither side given the defaults apply; with one side given the other
/// keeps the input aspect ratio, rounded up.
pub fn resolve_output_size(
    plane: (usize, usize),
    width: Option<u32>,
    height: Option<u32>,
) -> ThumbnailResult<(u32, u32)> {
    let (plane_w, plane_h) = (plane.0 as f64, plane.1 as f64);
    let (width, height) = match (width, height) {
        (None, None) => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
        (Some(w), Some(h)) => (w, h),
        (None, Some(h)) => {
            if plane_h == 0.0 {
                return Err(ThumbnailError::validation("input plane has zero height"));
            }
            ((plane_w / plane_h * h as f64).ceil() as u32, h)
        }
        (Some(w), None) => {
            if plane_w == 0.0 {
                return Err(ThumbnailError::validation("input plane has zero width"));
            }
            (w, (plane_h / plane_w * w as f64).ceil() as u32)
        }
    };
    if width < 1 || height < 1 {
        return Err(ThumbnailError::validation(format!(
            "`height` and `width` must be greater than or equal to 1, got {width}x{height}"
        )));
    }
    Ok((width, height))
}

/// `slices` indices evenly spread over `[0, depth - 1]`, endpoints included.
///
/// Indices repeat when more slices than `depth` are requested.
pub fn slice_indices(depth: usize, slices: usize) -> ThumbnailResult<Vec<usize>> {
    if slices < 2 {
        return Err(ThumbnailError::validation(format!(
            "`slices` must be greater than or equal to 2, got {slices}"
        )));
    }
    if depth == 0 {
        return Err(ThumbnailError::input("volume has no slices"));
    }
    let last = (depth - 1) as f64;
    Ok((0..slices)
        .map(|i| (last * i as f64 / (slices - 1) as f64).round() as usize)
        .collect())
}

/// Low-pass and resample a 2D slice onto a `width` x `height` raster.
///
/// The output spacing is made isotropic using the larger axis spacing so the
/// whole slice fits. Smoothing uses sigma = 2 * spacing / pi per axis.
pub fn smooth_and_resample(
    slice: &ArrayView2<f32>,
    spacing: (f32, f32),
    width: u32,
    height: u32,
) -> ndarray::Array2<f32> {
    let (slice_height, slice_width) = slice.dim();
    let scale_x = slice_width as f32 / width as f32;
    let scale_y = slice_height as f32 / height as f32;
    let new_spacing = (scale_x * spacing.0).max(scale_y * spacing.1);

    let sigma = 2.0 * new_spacing / PI;
    let smoothed = Interpolator::gaussian_smooth(slice, (sigma / spacing.0, sigma / spacing.1));
    Interpolator::resample(
        &smoothed.view(),
        spacing,
        (width, height),
        (new_spacing, new_spacing),
    )
}

/// Extracts display-ready slices from a volume already mapped to [0, 255].
pub struct SliceExtractor<'a> {
    volume: &'a VolumeImage,
    orientation: Orientation,
    width: u32,
    height: u32,
}

impl<'a> SliceExtractor<'a> {
    pub fn new(volume: &'a VolumeImage, orientation: Orientation, width: u32, height: u32) -> Self {
        Self {
            volume,
            orientation,
            width,
            height,
        }
    }

    pub fn depth(&self) -> usize {
        self.volume.depth_along(&self.orientation)
    }

    pub fn extract(&self, index: usize) -> ThumbnailResult<GrayImage> {
        let slice = self
            .volume
            .get_slice_from_axis(index, &self.orientation)
            .ok_or_else(|| {
                ThumbnailError::input(format!(
                    "slice {index} is outside the volume (depth {})",
                    self.depth()
                ))
            })?;
        let spacing = self.volume.in_plane_spacing(&self.orientation);
        let resampled = smooth_and_resample(&slice, spacing, self.width, self.height);

        let pixel_data: Vec<u8> = resampled
            .iter()
            .map(|&v| v.round().clamp(intensity::OUTPUT_MIN, intensity::OUTPUT_MAX) as u8)
            .collect();
        GrayImage::from_raw(self.width, self.height, pixel_data)
            .ok_or_else(|| ThumbnailError::input("resampled slice does not match the raster size"))
    }
}
