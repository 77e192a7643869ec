//! Run configuration: one value describing a whole generation run.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    enums::{NavigationMode, Orientation, SortBy},
    error::{ThumbnailError, ThumbnailResult},
    sampling::AngularGrid,
    slicer::DEFAULT_NB_SLICES,
    transfer_function::{DEFAULT_PRESET, preset_names},
};

pub const DEFAULT_PHI_SAMPLES: usize = 8;
pub const DEFAULT_THETA_SAMPLES: usize = 1;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// DICOM series directory, MetaImage file, single DICOM file or tube scene JSON.
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// `None` slices volumes and orbits tube scenes.
    pub mode: Option<NavigationMode>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub slices: usize,
    pub orientation: Orientation,
    pub sort_by: SortBy,
    pub phi_samples: usize,
    pub theta_samples: usize,
    /// When set, replaces `phi_samples` and `theta_samples` with an even angular step.
    pub angle_step: Option<f64>,
    pub preset: Option<String>,
    pub background: [u8; 3],
    pub jpeg_quality: u8,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output_dir: PathBuf::from("."),
            mode: None,
            width: None,
            height: None,
            slices: DEFAULT_NB_SLICES,
            orientation: Orientation::default(),
            sort_by: SortBy::default(),
            phi_samples: DEFAULT_PHI_SAMPLES,
            theta_samples: DEFAULT_THETA_SAMPLES,
            angle_step: None,
            preset: None,
            background: [0, 0, 0],
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl RunConfig {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ThumbnailResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ThumbnailError::input(format!("cannot read config {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            ThumbnailError::validation(format!("invalid config {}: {e}", path.display()))
        })
    }

    /// The camera grid this configuration asks for.
    pub fn grid(&self) -> ThumbnailResult<AngularGrid> {
        match self.angle_step {
            Some(step) => AngularGrid::from_step(step),
            None => AngularGrid::new(self.phi_samples, self.theta_samples),
        }
    }

    /// Check every parameter that can be checked without touching the input.
    ///
    /// Slice count and camera grid are only checked here when `mode` is set;
    /// otherwise [`RunConfig::validate_mode`] checks them once the input kind
    /// has picked the mode.
    pub fn validate(&self) -> ThumbnailResult<()> {
        if self.input.as_os_str().is_empty() {
            return Err(ThumbnailError::validation("no input path given"));
        }
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if value == Some(0) {
                return Err(ThumbnailError::validation(format!(
                    "`{name}` must be greater than or equal to 1"
                )));
            }
        }
        if let Some(mode) = self.mode {
            self.validate_mode(mode)?;
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ThumbnailError::validation(format!(
                "JPEG quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if let Some(name) = self.preset.as_deref() {
            if name != DEFAULT_PRESET && !preset_names().any(|p| p == name) {
                return Err(ThumbnailError::validation(format!(
                    "unknown transfer function preset '{name}'"
                )));
            }
        }
        Ok(())
    }

    /// Check the parameters only `mode` uses.
    pub fn validate_mode(&self, mode: NavigationMode) -> ThumbnailResult<()> {
        match mode {
            NavigationMode::Slices if self.slices < 2 => Err(ThumbnailError::validation(format!(
                "`slices` must be greater than or equal to 2, got {}",
                self.slices
            ))),
            NavigationMode::Slices => Ok(()),
            NavigationMode::Spherical => self.grid().map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_reference_scripts() {
        let config = RunConfig::new("in", "out");
        assert_eq!(config.slices, 10);
        assert_eq!(config.width, None);
        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.grid().unwrap().len(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RunConfig = serde_json::from_str(
            r#"{"input": "scan", "mode": "spherical", "angle_step": 20, "preset": "CT-Bones"}"#,
        )
        .unwrap();
        assert_eq!(config.mode, Some(NavigationMode::Spherical));
        assert_eq!(config.slices, 10);
        let grid = config.grid().unwrap();
        assert_eq!((grid.phi().len(), grid.theta().len()), (18, 10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<RunConfig>(r#"{"slicez": 3}"#).is_err());
    }

    #[test]
    fn validation_catches_bad_parameters() {
        let base = RunConfig::new("in", "out");
        let cases = [
            RunConfig {
                width: Some(0),
                ..base.clone()
            },
            RunConfig {
                mode: Some(NavigationMode::Slices),
                slices: 1,
                ..base.clone()
            },
            RunConfig {
                mode: Some(NavigationMode::Spherical),
                phi_samples: 0,
                ..base.clone()
            },
            RunConfig {
                preset: Some("ct-bones".into()),
                ..base.clone()
            },
            RunConfig {
                jpeg_quality: 0,
                ..base.clone()
            },
            RunConfig::default(),
        ];
        for case in cases {
            assert!(
                matches!(case.validate(), Err(ThumbnailError::Validation(_))),
                "{case:?}"
            );
        }
    }

    #[test]
    fn spherical_runs_ignore_slice_count() {
        let config = RunConfig {
            mode: Some(NavigationMode::Spherical),
            slices: 0,
            ..RunConfig::new("in", "out")
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unset_mode_defers_mode_specific_checks() {
        let config = RunConfig {
            slices: 1,
            phi_samples: 0,
            ..RunConfig::new("in", "out")
        };
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.validate_mode(NavigationMode::Slices),
            Err(ThumbnailError::Validation(_))
        ));
        assert!(matches!(
            config.validate_mode(NavigationMode::Spherical),
            Err(ThumbnailError::Validation(_))
        ));
    }
}
