//! Parser for serialized tube points.
//!
//! A record holds one attribute per line, each introduced by a fixed label:
//!
//! ```text
//! Position: [12.5, 3, -4]
//! Radius: 1.25
//! Color: [1, 0, 0, 1]
//! Tangent: [0, 0, 1]
//! Normal1: [1, 0, 0]
//! Normal2: [0, 1, 0]
//! Medialness: 0
//! Ridgeness: 0
//! Alpha1: 0
//! Alpha2: 0
//! Alpha3: 0
//! Mark: 0
//! ```
//!
//! Labels are checked in order; anything else is a decode error.

use glam::Vec3;

use crate::error::{ThumbnailError, ThumbnailResult};

const FIELDS: [&str; 12] = [
    "Position:",
    "Radius:",
    "Color:",
    "Tangent:",
    "Normal1:",
    "Normal2:",
    "Medialness:",
    "Ridgeness:",
    "Alpha1:",
    "Alpha2:",
    "Alpha3:",
    "Mark:",
];

/// One centerline sample of a tube, in the tube's local frame until transformed.
#[derive(Clone, Debug, PartialEq)]
pub struct TubePoint {
    pub position: Vec3,
    pub radius: f32,
    pub color: [f32; 4],
    pub tangent: Vec3,
    pub normal1: Vec3,
    pub normal2: Vec3,
    pub medialness: f32,
    pub ridgeness: f32,
    pub alpha: [f32; 3],
    pub mark: bool,
}

impl Default for TubePoint {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            radius: 1.0,
            color: [1.0, 0.0, 0.0, 1.0],
            tangent: Vec3::ZERO,
            normal1: Vec3::ZERO,
            normal2: Vec3::ZERO,
            medialness: 0.0,
            ridgeness: 0.0,
            alpha: [0.0; 3],
            mark: false,
        }
    }
}

impl TubePoint {
    /// Serialize back into the record layout accepted by [`parse_point`].
    pub fn to_record(&self) -> String {
        let v = |v: Vec3| format!("[{}, {}, {}]", v.x, v.y, v.z);
        let c = self.color;
        format!(
            "Position: {}\nRadius: {}\nColor: [{}, {}, {}, {}]\nTangent: {}\nNormal1: {}\n\
             Normal2: {}\nMedialness: {}\nRidgeness: {}\n\
             Alpha1: {}\nAlpha2: {}\nAlpha3: {}\nMark: {}\n",
            v(self.position),
            self.radius,
            c[0],
            c[1],
            c[2],
            c[3],
            v(self.tangent),
            v(self.normal1),
            v(self.normal2),
            self.medialness,
            self.ridgeness,
            self.alpha[0],
            self.alpha[1],
            self.alpha[2],
            u8::from(self.mark),
        )
    }
}

/// Parse one point record.
pub fn parse_point(record: &str) -> ThumbnailResult<TubePoint> {
    let mut lines = record
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let mut values: [&str; FIELDS.len()] = [""; FIELDS.len()];
    for (slot, label) in values.iter_mut().zip(FIELDS) {
        let (n, line) = lines
            .next()
            .ok_or_else(|| ThumbnailError::decode(format!("record ends before '{label}'")))?;
        *slot = line
            .strip_prefix(label)
            .ok_or_else(|| {
                ThumbnailError::decode(format!("line {n}: expected '{label}', found '{line}'"))
            })?
            .trim();
    }
    if let Some((n, line)) = lines.next() {
        return Err(ThumbnailError::decode(format!(
            "line {n}: unexpected trailing content '{line}'"
        )));
    }

    let [
        position,
        radius,
        color,
        tangent,
        normal1,
        normal2,
        medialness,
        ridgeness,
        alpha1,
        alpha2,
        alpha3,
        mark,
    ] = values;

    Ok(TubePoint {
        position: vec3("Position", position)?,
        radius: scalar("Radius", radius)?,
        color: vector::<4>("Color", color)?,
        tangent: vec3("Tangent", tangent)?,
        normal1: vec3("Normal1", normal1)?,
        normal2: vec3("Normal2", normal2)?,
        medialness: scalar("Medialness", medialness)?,
        ridgeness: scalar("Ridgeness", ridgeness)?,
        alpha: [
            scalar("Alpha1", alpha1)?,
            scalar("Alpha2", alpha2)?,
            scalar("Alpha3", alpha3)?,
        ],
        mark: flag("Mark", mark)?,
    })
}

fn scalar(field: &str, text: &str) -> ThumbnailResult<f32> {
    text.parse::<f32>()
        .map_err(|_| ThumbnailError::decode(format!("{field}: invalid number '{text}'")))
}

fn vector<const N: usize>(field: &str, text: &str) -> ThumbnailResult<[f32; N]> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| {
            ThumbnailError::decode(format!("{field}: expected '[...]', found '{text}'"))
        })?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(ThumbnailError::decode(format!(
            "{field}: expected {N} components, found {}",
            parts.len()
        )));
    }
    let mut out = [0.0f32; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = scalar(field, part)?;
    }
    Ok(out)
}

fn vec3(field: &str, text: &str) -> ThumbnailResult<Vec3> {
    vector::<3>(field, text).map(Vec3::from)
}

fn flag(field: &str, text: &str) -> ThumbnailResult<bool> {
    match text {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        other => Err(ThumbnailError::decode(format!(
            "{field}: expected 0 or 1, found '{other}'"
        ))),
    }
}
