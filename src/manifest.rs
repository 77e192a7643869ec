//! The `index.json` sidecar describing a generated image set in the tonic
//! query data model, and the file naming shared with the pipeline.

use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ThumbnailError, ThumbnailResult},
    sampling::{AngularGrid, CameraSample},
};

pub const MANIFEST_FILE: &str = "index.json";
pub const MODEL_TYPE: &str = "tonic-query-data-model";
pub const SLICE_PATTERN: &str = "{slice}.jpg";
pub const SPHERICAL_PATTERN: &str = "{theta}_{phi}.jpg";
pub const IMAGE_MIME_TYPE: &str = "image/jpg";

/// Pixels of mouse drag per step along an axis.
const DRAG_STEP: u32 = 30;

/// One sampled value of a navigation axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    Index(usize),
    Angle(f64),
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Index(i) => write!(f, "{i}"),
            AxisValue::Angle(a) => write!(f, "{a}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drag {
    pub modifier: u32,
    pub coordinate: u32,
    pub step: u32,
    pub orientation: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseBinding {
    pub drag: Drag,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub mouse: MouseBinding,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub values: Vec<AxisValue>,
    pub ui: String,
    #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
    pub loop_mode: Option<String>,
    pub bind: Binding,
}

impl Argument {
    fn new(name: &str, values: Vec<AxisValue>, coordinate: u32, looping: bool) -> Self {
        Self {
            name: name.to_string(),
            values,
            ui: "slider".to_string(),
            loop_mode: looping.then(|| "modulo".to_string()),
            bind: Binding {
                mouse: MouseBinding {
                    drag: Drag {
                        modifier: 0,
                        coordinate,
                        step: DRAG_STEP,
                        orientation: 1,
                    },
                },
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "backgroundColor")]
    pub background_color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataDescriptor {
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub pattern: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub arguments_order: Vec<String>,
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    pub arguments: BTreeMap<String, Argument>,
    pub metadata: Metadata,
    pub data: Vec<DataDescriptor>,
}

impl Manifest {
    fn new(arguments: Vec<Argument>, pattern: &str, background: [u8; 3]) -> Self {
        let [r, g, b] = background;
        Self {
            arguments_order: arguments.iter().map(|a| a.name.clone()).collect(),
            kind: vec![MODEL_TYPE.to_string()],
            arguments: arguments.into_iter().map(|a| (a.name.clone(), a)).collect(),
            metadata: Metadata {
                background_color: format!("rgb({r}, {g}, {b})"),
            },
            data: vec![DataDescriptor {
                metadata: BTreeMap::new(),
                name: "image".to_string(),
                kind: "blob".to_string(),
                mime_type: IMAGE_MIME_TYPE.to_string(),
                pattern: pattern.to_string(),
            }],
        }
    }

    /// Slice navigation over `indices`, in generation order.
    pub fn slices(indices: &[usize], background: [u8; 3]) -> Self {
        let values = indices.iter().map(|&i| AxisValue::Index(i)).collect();
        Self::new(
            vec![Argument::new("slice", values, 0, true)],
            SLICE_PATTERN,
            background,
        )
    }

    /// Spherical navigation over the phi and theta axes of `grid`.
    pub fn spherical(grid: &AngularGrid, background: [u8; 3]) -> Self {
        let angles = |v: &[f64]| v.iter().map(|&a| AxisValue::Angle(a)).collect();
        Self::new(
            vec![
                Argument::new("phi", angles(grid.phi()), 0, true),
                Argument::new("theta", angles(grid.theta()), 1, false),
            ],
            SPHERICAL_PATTERN,
            background,
        )
    }

    /// Write as `index.json` in `out_dir`, through a temporary file renamed into place.
    pub fn write(&self, out_dir: &Path) -> ThumbnailResult<PathBuf> {
        let target = out_dir.join(MANIFEST_FILE);
        let tmp = out_dir.join(format!(".{MANIFEST_FILE}.tmp"));

        let file = File::create(&tmp).map_err(|e| ThumbnailError::io(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| ThumbnailError::io(&tmp, e.into()))?;
        writer.flush().map_err(|e| ThumbnailError::io(&tmp, e))?;
        drop(writer);

        fs::rename(&tmp, &target).map_err(|e| ThumbnailError::io(&target, e))?;
        Ok(target)
    }
}

/// Substitute every `{axis}` placeholder in `pattern`.
pub fn expand_pattern(pattern: &str, values: &[(&str, AxisValue)]) -> String {
    values.iter().fold(pattern.to_string(), |acc, (axis, value)| {
        acc.replace(&format!("{{{axis}}}"), &value.to_string())
    })
}

pub fn slice_file_name(index: usize) -> String {
    expand_pattern(SLICE_PATTERN, &[("slice", AxisValue::Index(index))])
}

pub fn spherical_file_name(sample: &CameraSample) -> String {
    expand_pattern(
        SPHERICAL_PATTERN,
        &[
            ("theta", AxisValue::Angle(sample.theta)),
            ("phi", AxisValue::Angle(sample.phi)),
        ],
    )
}
