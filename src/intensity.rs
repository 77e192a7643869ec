//! Whole-volume intensity mapping onto the 8-bit display range.
//!
//! The mapping is computed once per volume so that every extracted slice
//! keeps the same relative brightness.

use ndarray::Array3;
use tracing::{info, warn};

use crate::volume::{VolumeImage, Window};

pub const OUTPUT_MIN: f32 = 0.0;
pub const OUTPUT_MAX: f32 = 255.0;

/// Linear VOI window: values below the window map to 0, above to 255.
///
/// Uses the DICOM linear function, where the window spans
/// `center - 0.5 ± (width - 1) / 2`.
pub fn apply_window(data: &Array3<f32>, window: Window) -> Array3<f32> {
    let center = window.center - 0.5;
    let span = (window.width - 1.0).max(0.0);
    let lower = center - span / 2.0;
    let upper = center + span / 2.0;
    let range = OUTPUT_MAX - OUTPUT_MIN;

    let mut out = data.clone();
    out.par_mapv_inplace(|v| {
        if v <= lower {
            OUTPUT_MIN
        } else if v > upper {
            OUTPUT_MAX
        } else {
            (((v - center) / span + 0.5) * range + OUTPUT_MIN).clamp(OUTPUT_MIN, OUTPUT_MAX)
        }
    });
    out
}

/// Stretch the global (min, max) of `data` onto [0, 255]; a constant grid maps to 0.
pub fn rescale_to_range(data: &Array3<f32>, (min, max): (f32, f32)) -> Array3<f32> {
    let span = max - min;
    let mut out = data.clone();
    if span <= 0.0 || !span.is_finite() {
        out.fill(OUTPUT_MIN);
        return out;
    }
    let range = OUTPUT_MAX - OUTPUT_MIN;
    out.par_mapv_inplace(|v| ((v - min) / span * range + OUTPUT_MIN).clamp(OUTPUT_MIN, OUTPUT_MAX));
    out
}

/// Map a volume onto the display range, preferring its metadata window.
pub fn to_display_range(volume: &VolumeImage) -> VolumeImage {
    let data = match volume.window {
        Some(window) if window.width > 0.0 => {
            info!(
                center = window.center,
                width = window.width,
                "applying display window"
            );
            apply_window(&volume.data, window)
        }
        other => {
            if let Some(window) = other {
                warn!(width = window.width, "ignoring display window with non-positive width");
            } else {
                info!("no display window in metadata, rescaling by global min/max");
            }
            rescale_to_range(&volume.data, volume.intensity_range())
        }
    };
    VolumeImage {
        data,
        spacing: volume.spacing,
        origin: volume.origin,
        window: None,
    }
}
