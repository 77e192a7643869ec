//! Tube scenes: a tree of groups and tubes, flattened into world-space
//! centerlines and swept into a triangle mesh.

use std::{f32::consts::TAU, fs, path::Path};

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{ThumbnailError, ThumbnailResult},
    tube_record::{TubePoint, parse_point},
};

/// Cross-section resolution of swept tubes.
pub const TUBE_SIDES: usize = 20;

/// Points closer than this are treated as coincident along a centerline.
const COINCIDENT_EPSILON: f32 = 1e-6;

/// Local-to-parent affine transform: `p' = matrix * p + offset`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Row-major 3x3 linear part.
    pub matrix: [[f32; 3]; 3],
    pub offset: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        offset: [0.0; 3],
    };

    pub fn scale(sx: f32, sy: f32, sz: f32) -> Self {
        Self {
            matrix: [[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, sz]],
            offset: [0.0; 3],
        }
    }

    fn linear(&self) -> Mat3 {
        Mat3::from_cols_array_2d(&self.matrix).transpose()
    }

    /// `self` applied after `child`.
    pub fn then(&self, child: &Transform) -> Transform {
        let linear = self.linear() * child.linear();
        let offset = self.linear() * Vec3::from(child.offset) + Vec3::from(self.offset);
        Transform {
            matrix: linear.transpose().to_cols_array_2d(),
            offset: offset.to_array(),
        }
    }

    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        self.linear() * p + Vec3::from(self.offset)
    }

    pub fn apply_vector(&self, v: Vec3) -> Vec3 {
        self.linear() * v
    }

    /// Mean of the diagonal scale factors, used to scale radii.
    pub fn mean_scale(&self) -> f32 {
        (self.matrix[0][0] + self.matrix[1][1] + self.matrix[2][2]) / 3.0
    }
}

/// Node of a tube scene document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SpatialObject {
    Group {
        #[serde(default)]
        id: Option<i64>,
        #[serde(default)]
        transform: Transform,
        #[serde(default)]
        children: Vec<SpatialObject>,
    },
    Tube {
        #[serde(default)]
        id: Option<i64>,
        #[serde(default)]
        transform: Transform,
        /// Serialized point records, see [`crate::tube_record`].
        points: Vec<String>,
    },
}

/// A tube reached by flattening, with its composed local-to-world transform.
#[derive(Clone, Debug)]
pub struct FlatTube<'a> {
    pub id: Option<i64>,
    pub transform: Transform,
    pub records: &'a [String],
}

/// A tube with parsed points in world coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Tube {
    pub id: Option<i64>,
    pub points: Vec<TubePoint>,
}

impl SpatialObject {
    pub fn from_json_str(text: &str) -> ThumbnailResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| ThumbnailError::input(format!("malformed tube scene: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> ThumbnailResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ThumbnailError::input(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Depth-first, pre-order list of every tube under this node.
    pub fn flatten(&self) -> Vec<FlatTube<'_>> {
        let mut tubes = Vec::new();
        let mut stack = vec![(self, Transform::IDENTITY)];
        while let Some((node, parent)) = stack.pop() {
            match node {
                SpatialObject::Group {
                    transform, children, ..
                } => {
                    let world = parent.then(transform);
                    stack.extend(children.iter().rev().map(|child| (child, world)));
                }
                SpatialObject::Tube {
                    id,
                    transform,
                    points,
                } => tubes.push(FlatTube {
                    id: *id,
                    transform: parent.then(transform),
                    records: points,
                }),
            }
        }
        tubes
    }
}

impl FlatTube<'_> {
    /// Parse every record and move it into world space.
    pub fn reconstruct(&self) -> ThumbnailResult<Tube> {
        let scale = self.transform.mean_scale();
        let points = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let local = parse_point(record).map_err(|e| {
                    ThumbnailError::decode(format!("tube {:?}, point {i}: {e}", self.id))
                })?;
                Ok(self.to_world(local, scale))
            })
            .collect::<ThumbnailResult<Vec<_>>>()?;
        Ok(Tube {
            id: self.id,
            points,
        })
    }

    fn to_world(&self, p: TubePoint, scale: f32) -> TubePoint {
        let direction = |v: Vec3| self.transform.apply_vector(v).normalize_or_zero();
        TubePoint {
            position: self.transform.apply_point(p.position),
            radius: p.radius * scale,
            tangent: direction(p.tangent),
            normal1: direction(p.normal1),
            normal2: direction(p.normal2),
            ..p
        }
    }
}

/// Flatten a scene and reconstruct every tube in world space.
pub fn reconstruct_scene(scene: &SpatialObject) -> ThumbnailResult<Vec<Tube>> {
    scene.flatten().iter().map(FlatTube::reconstruct).collect()
}

/// Maps a point radius onto the swept cross-section radius.
///
/// The thinnest point keeps the raw minimum radius; `factor = max / min`
/// sets how much the thickest point grows relative to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadiusScale {
    pub min: f32,
    pub max: f32,
    pub factor: f32,
}

impl RadiusScale {
    pub fn from_range(min: f32, max: f32) -> ThumbnailResult<Self> {
        if !(min.is_finite() && max.is_finite()) || min <= 0.0 {
            return Err(ThumbnailError::degenerate(format!(
                "tube radii must be positive, minimum is {min}"
            )));
        }
        Ok(Self {
            min,
            max,
            factor: max / min,
        })
    }

    pub fn apply(&self, radius: f32) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return self.min;
        }
        let t = ((radius.abs() - self.min) / span).clamp(0.0, 1.0);
        self.min * (1.0 + (self.factor - 1.0) * t)
    }
}

/// Swept tube surfaces for a set of centerlines.
#[derive(Clone, Debug, Default)]
pub struct TubeMesh {
    /// Centerline points that contributed geometry, in tube order.
    pub points: Vec<TubePoint>,
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl TubeMesh {
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    /// Radius range of the contributing points.
    pub fn radius_range(&self) -> (f32, f32) {
        self.points
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.radius), hi.max(p.radius))
            })
    }
}

/// Sweep every tube into one mesh with `sides` vertices per cross-section.
pub fn build_tube_mesh(tubes: &[Tube], sides: usize) -> ThumbnailResult<TubeMesh> {
    let polylines: Vec<Vec<&TubePoint>> = tubes
        .iter()
        .filter_map(|tube| {
            let line = dedup_polyline(&tube.points);
            if line.len() < 2 {
                warn!(
                    id = ?tube.id,
                    points = tube.points.len(),
                    "skipping tube with fewer than two distinct points"
                );
                None
            } else {
                Some(line)
            }
        })
        .collect();
    if polylines.is_empty() {
        return Err(ThumbnailError::input(
            "tube scene has no tube with at least two points",
        ));
    }

    let (min, max) = polylines
        .iter()
        .flatten()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.radius.abs()), hi.max(p.radius.abs()))
        });
    let scale = RadiusScale::from_range(min, max)?;
    let sides = sides.max(3);

    let mut mesh = TubeMesh::default();
    for line in &polylines {
        sweep(line, &scale, sides, &mut mesh);
    }
    debug!(
        tubes = polylines.len(),
        vertices = mesh.vertices.len(),
        triangles = mesh.triangles.len(),
        "built tube mesh"
    );
    Ok(mesh)
}

fn dedup_polyline(points: &[TubePoint]) -> Vec<&TubePoint> {
    let mut line: Vec<&TubePoint> = Vec::with_capacity(points.len());
    for p in points {
        match line.last() {
            Some(prev) if prev.position.distance(p.position) <= COINCIDENT_EPSILON => {}
            _ => line.push(p),
        }
    }
    line
}

fn tangents(line: &[&TubePoint]) -> Vec<Vec3> {
    let n = line.len();
    (0..n)
        .map(|i| {
            let ahead = line[(i + 1).min(n - 1)].position;
            let behind = line[i.saturating_sub(1)].position;
            (ahead - behind).normalize_or_zero()
        })
        .collect()
}

fn perpendicular(t: Vec3) -> Vec3 {
    let axis = if t.x.abs() <= t.y.abs() && t.x.abs() <= t.z.abs() {
        Vec3::X
    } else if t.y.abs() <= t.z.abs() {
        Vec3::Y
    } else {
        Vec3::Z
    };
    let n = t.cross(axis).normalize_or_zero();
    if n == Vec3::ZERO {
        Vec3::X
    } else {
        n
    }
}

fn sweep(line: &[&TubePoint], scale: &RadiusScale, sides: usize, mesh: &mut TubeMesh) {
    let tangents = tangents(line);
    let mut normal = perpendicular(tangents[0]);
    let first_ring = mesh.vertices.len() as u32;

    for (i, (point, &t)) in line.iter().zip(&tangents).enumerate() {
        // Parallel transport of the previous normal onto this tangent.
        let projected = normal - t * normal.dot(t);
        normal = if projected.length_squared() > 1e-12 {
            projected.normalize()
        } else {
            perpendicular(t)
        };
        let binormal = t.cross(normal).normalize_or_zero();
        let radius = scale.apply(point.radius);
        let color = [point.color[0], point.color[1], point.color[2]];

        for k in 0..sides {
            let angle = TAU * k as f32 / sides as f32;
            let dir = normal * angle.cos() + binormal * angle.sin();
            mesh.vertices.push(point.position + dir * radius);
            mesh.normals.push(dir);
            mesh.colors.push(color);
        }

        if i > 0 {
            let ring = first_ring + (i * sides) as u32;
            let prev = ring - sides as u32;
            for k in 0..sides as u32 {
                let next = (k + 1) % sides as u32;
                mesh.triangles.push([prev + k, ring + k, prev + next]);
                mesh.triangles.push([prev + next, ring + k, ring + next]);
            }
        }
        mesh.points.push((*point).clone());
    }
}
