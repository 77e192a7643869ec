//! Scalar → color/opacity mapping for volume rendering, and the preset catalog.
//!
//! Presets come in two layouts. Combined tables give one value axis with an
//! RGBA tuple per point. Split tables give RGB points and opacity points at
//! independent values. Both end up as two separate point lists so the value
//! axes are never mixed.

use crate::error::{ThumbnailError, ThumbnailResult};

pub const DEFAULT_PRESET: &str = "default";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorPoint {
    pub value: f64,
    pub rgb: [f64; 3],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OpacityPoint {
    pub value: f64,
    pub opacity: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shading {
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub specular_power: f64,
    pub enabled: bool,
}

impl Shading {
    pub const OFF: Self = Self {
        ambient: 0.0,
        diffuse: 1.0,
        specular: 0.0,
        specular_power: 1.0,
        enabled: false,
    };
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransferFunction {
    color: Vec<ColorPoint>,
    opacity: Vec<OpacityPoint>,
    pub shading: Shading,
}

impl TransferFunction {
    /// Build from independent color and opacity tables; points are sorted by value.
    pub fn new(
        mut color: Vec<ColorPoint>,
        mut opacity: Vec<OpacityPoint>,
        shading: Shading,
    ) -> ThumbnailResult<Self> {
        if color.is_empty() || opacity.is_empty() {
            return Err(ThumbnailError::validation(
                "transfer function needs at least one color and one opacity point",
            ));
        }
        if color.iter().any(|p| !p.value.is_finite())
            || opacity.iter().any(|p| !p.value.is_finite())
        {
            return Err(ThumbnailError::validation(
                "transfer function control points must be finite",
            ));
        }
        color.sort_by(|a, b| a.value.total_cmp(&b.value));
        opacity.sort_by(|a, b| a.value.total_cmp(&b.value));
        Ok(Self {
            color,
            opacity,
            shading,
        })
    }

    /// Build from `(value, r, g, b, a)` tuples sharing one value axis.
    pub fn from_rgba(points: &[[f64; 5]], shading: Shading) -> ThumbnailResult<Self> {
        let color = points
            .iter()
            .map(|p| ColorPoint {
                value: p[0],
                rgb: [p[1], p[2], p[3]],
            })
            .collect();
        let opacity = points
            .iter()
            .map(|p| OpacityPoint {
                value: p[0],
                opacity: p[4],
            })
            .collect();
        Self::new(color, opacity, shading)
    }

    /// Black and transparent at `min` to white and opaque at `max`.
    pub fn ramp(min: f64, max: f64) -> ThumbnailResult<Self> {
        Self::from_rgba(
            &[[min, 0.0, 0.0, 0.0, 0.0], [max, 1.0, 1.0, 1.0, 1.0]],
            Shading::OFF,
        )
    }

    pub fn color_points(&self) -> &[ColorPoint] {
        &self.color
    }

    pub fn opacity_points(&self) -> &[OpacityPoint] {
        &self.opacity
    }

    pub fn color_at(&self, value: f64) -> [f64; 3] {
        let i = self.color.partition_point(|p| p.value <= value);
        if i == 0 {
            return self.color[0].rgb;
        }
        if i == self.color.len() {
            return self.color[i - 1].rgb;
        }
        let (a, b) = (&self.color[i - 1], &self.color[i]);
        let t = lerp_factor(a.value, b.value, value);
        [
            a.rgb[0] + (b.rgb[0] - a.rgb[0]) * t,
            a.rgb[1] + (b.rgb[1] - a.rgb[1]) * t,
            a.rgb[2] + (b.rgb[2] - a.rgb[2]) * t,
        ]
    }

    pub fn opacity_at(&self, value: f64) -> f64 {
        let i = self.opacity.partition_point(|p| p.value <= value);
        if i == 0 {
            return self.opacity[0].opacity;
        }
        if i == self.opacity.len() {
            return self.opacity[i - 1].opacity;
        }
        let (a, b) = (&self.opacity[i - 1], &self.opacity[i]);
        a.opacity + (b.opacity - a.opacity) * lerp_factor(a.value, b.value, value)
    }

    /// Color and opacity at `value` as `[r, g, b, a]`.
    pub fn sample(&self, value: f64) -> [f64; 4] {
        let [r, g, b] = self.color_at(value);
        [r, g, b, self.opacity_at(value)]
    }
}

fn lerp_factor(a: f64, b: f64, v: f64) -> f64 {
    let span = b - a;
    if span <= 0.0 {
        1.0
    } else {
        ((v - a) / span).clamp(0.0, 1.0)
    }
}

enum Table {
    Rgba(&'static [[f64; 5]]),
    Split {
        rgb: &'static [[f64; 4]],
        opacity: &'static [[f64; 2]],
    },
}

struct Preset {
    name: &'static str,
    table: Table,
    shading: Shading,
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "CT-AAA",
        table: Table::Split {
            rgb: &[
                [-3024.0, 0.0, 0.0, 0.0],
                [143.556, 0.615686, 0.356863, 0.184314],
                [166.222, 0.882353, 0.603922, 0.290196],
                [214.389, 1.0, 1.0, 1.0],
                [419.736, 1.0, 0.937033, 0.954531],
                [3071.0, 0.827451, 0.658824, 1.0],
            ],
            opacity: &[
                [-3024.0, 0.0],
                [143.556, 0.0],
                [166.222, 0.686275],
                [214.389, 0.696078],
                [419.736, 0.833333],
                [3071.0, 0.803922],
            ],
        },
        shading: Shading {
            ambient: 0.1,
            diffuse: 0.9,
            specular: 0.2,
            specular_power: 10.0,
            enabled: true,
        },
    },
    Preset {
        name: "CT-Bones",
        table: Table::Split {
            rgb: &[
                [-1000.0, 0.3, 0.3, 1.0],
                [-488.0, 0.3, 1.0, 0.3],
                [463.28, 1.0, 0.0, 0.0],
                [659.15, 1.0, 0.912535, 0.0374849],
                [953.0, 1.0, 0.3, 0.3],
            ],
            opacity: &[
                [-1000.0, 0.0],
                [152.19, 0.0],
                [278.93, 0.190476],
                [952.0, 0.2],
            ],
        },
        shading: Shading {
            ambient: 0.2,
            diffuse: 1.0,
            specular: 0.0,
            specular_power: 1.0,
            enabled: true,
        },
    },
    Preset {
        name: "CT-Soft-Tissue",
        table: Table::Split {
            rgb: &[
                [-2048.0, 0.0, 0.0, 0.0],
                [-167.01, 0.0, 0.0, 0.0],
                [-160.0, 0.0556356, 0.0556356, 0.0556356],
                [240.0, 1.0, 1.0, 1.0],
                [3661.0, 1.0, 1.0, 1.0],
            ],
            opacity: &[
                [-2048.0, 0.0],
                [-167.01, 0.0],
                [-160.0, 1.0],
                [240.0, 1.0],
                [3661.0, 1.0],
            ],
        },
        shading: Shading {
            ambient: 0.2,
            diffuse: 1.0,
            specular: 0.0,
            specular_power: 1.0,
            enabled: false,
        },
    },
    Preset {
        name: "MR-Default",
        table: Table::Rgba(&[
            [0.0, 0.0, 0.0, 0.0, 0.0],
            [20.0, 0.168627, 0.0, 0.0, 0.0],
            [40.0, 0.403922, 0.145098, 0.0784314, 0.15],
            [120.0, 0.780392, 0.607843, 0.380392, 0.3],
            [220.0, 0.847059, 0.835294, 0.788235, 0.375],
            [1024.0, 1.0, 1.0, 1.0, 0.5],
        ]),
        shading: Shading {
            ambient: 0.2,
            diffuse: 1.0,
            specular: 0.0,
            specular_power: 1.0,
            enabled: true,
        },
    },
];

/// Names accepted by [`resolve`] besides `"default"`.
pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|p| p.name)
}

/// Look up a preset, or build the default ramp over `scalar_range` when `name`
/// is `None` or `"default"`.
pub fn resolve(name: Option<&str>, scalar_range: (f64, f64)) -> ThumbnailResult<TransferFunction> {
    let name = name.unwrap_or(DEFAULT_PRESET);
    if name == DEFAULT_PRESET {
        return TransferFunction::ramp(scalar_range.0, scalar_range.1);
    }
    let preset = PRESETS.iter().find(|p| p.name == name).ok_or_else(|| {
        ThumbnailError::validation(format!(
            "unknown transfer function preset '{name}' (expected one of: {DEFAULT_PRESET}, {})",
            preset_names().collect::<Vec<_>>().join(", ")
        ))
    })?;

    match preset.table {
        Table::Rgba(points) => TransferFunction::from_rgba(points, preset.shading),
        Table::Split { rgb, opacity } => TransferFunction::new(
            rgb.iter()
                .map(|p| ColorPoint {
                    value: p[0],
                    rgb: [p[1], p[2], p[3]],
                })
                .collect(),
            opacity
                .iter()
                .map(|p| OpacityPoint {
                    value: p[0],
                    opacity: p[1],
                })
                .collect(),
            preset.shading,
        ),
    }
}
