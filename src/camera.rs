//! Orbit cameras for the spherical grid.
//!
//! Every sample gets a fresh camera fitted to the dataset bounds, so the
//! framing never depends on the previous sample.

use glam::{Mat4, Vec3};

use crate::sampling::CameraSample;

/// Vertical view angle in degrees.
pub const VIEW_ANGLE: f32 = 30.0;

/// Axis-aligned world bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the diagonal; 0.5 for degenerate bounds so framing stays finite.
    pub fn radius(&self) -> f32 {
        let r = (self.max - self.min).length() * 0.5;
        if r > 0.0 { r } else { 0.5 }
    }

    /// Ray/box intersection as (t_enter, t_exit), `None` on a miss.
    pub fn intersect(&self, origin: Vec3, dir: Vec3) -> Option<(f32, f32)> {
        let inv = dir.recip();
        let t0 = (self.min - origin) * inv;
        let t1 = (self.max - origin) * inv;
        let near = t0.min(t1);
        let far = t0.max(t1);
        // NaN lanes come from rays parallel to a slab they start inside of.
        let enter = [near.x, near.y, near.z]
            .into_iter()
            .filter(|v| !v.is_nan())
            .fold(0.0f32, f32::max);
        let exit = [far.x, far.y, far.z]
            .into_iter()
            .filter(|v| !v.is_nan())
            .fold(f32::INFINITY, f32::min);
        (exit >= enter).then_some((enter, exit))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub focal_point: Vec3,
    pub view_up: Vec3,
    /// Vertical view angle in degrees.
    pub view_angle: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Unit vector from the focal point towards the camera.
    pub fn direction(phi: f64, theta: f64) -> Vec3 {
        let (phi, theta) = (phi.to_radians(), theta.to_radians());
        Vec3::new(
            (-theta.cos() * phi.sin()) as f32,
            theta.sin() as f32,
            (theta.cos() * phi.cos()) as f32,
        )
    }

    /// View-up for an orientation: +Y orthogonalized against `direction`.
    /// At the poles this is the limit `(±sin φ, 0, ∓cos φ)`, which turns with phi.
    pub fn up(phi: f64, theta: f64) -> Vec3 {
        let (phi, theta) = (phi.to_radians(), theta.to_radians());
        Vec3::new(
            (theta.sin() * phi.sin()) as f32,
            theta.cos() as f32,
            (-theta.sin() * phi.cos()) as f32,
        )
    }

    /// Camera looking at the center of `bounds` from `sample`'s orientation,
    /// far enough away that the bounding sphere fits the view.
    pub fn orbit(bounds: &Bounds, sample: &CameraSample, aspect: f32) -> Self {
        let radius = bounds.radius();
        let half_vertical = (VIEW_ANGLE * 0.5).to_radians();
        let half_angle = if aspect < 1.0 {
            (half_vertical.tan() * aspect).atan()
        } else {
            half_vertical
        };
        let distance = radius / half_angle.sin();
        let focal_point = bounds.center();
        Self {
            position: focal_point + Self::direction(sample.phi, sample.theta) * distance,
            focal_point,
            view_up: Self::up(sample.phi, sample.theta),
            view_angle: VIEW_ANGLE,
            near: (distance - radius * 1.01).max(distance * 1e-3),
            far: distance + radius * 1.01,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.focal_point, self.view_up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.view_angle.to_radians(), aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Unit vector from the camera towards its focal point.
    pub fn forward(&self) -> Vec3 {
        (self.focal_point - self.position).normalize()
    }
}
