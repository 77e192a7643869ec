use crate::enums::Orientation;
use crate::interpolator::Interpolator;

use glam::Vec3;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;

/// Display window (level) read from image metadata.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub center: f32,
    pub width: f32,
}

#[derive(Clone, Debug, Default)]
pub struct VolumeImage {
    /// Scalars indexed as (depth, height, width), i.e. (z, y, x).
    pub data: Array3<f32>,
    /// Voxel size along (x, y, z).
    pub spacing: (f32, f32, f32),
    /// World position of voxel (0, 0, 0) as (x, y, z).
    pub origin: (f32, f32, f32),
    pub window: Option<Window>,
}

impl VolumeImage {
    pub fn new(data: Array3<f32>, spacing: (f32, f32, f32)) -> Self {
        Self {
            data,
            spacing,
            origin: (0.0, 0.0, 0.0),
            window: None,
        }
    }

    pub fn with_origin(mut self, origin: (f32, f32, f32)) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_window(mut self, window: Option<Window>) -> Self {
        self.window = window;
        self
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Global (min, max) of the scalars; (0, 0) for an empty grid.
    pub fn intensity_range(&self) -> (f32, f32) {
        if self.data.is_empty() {
            return (0.0, 0.0);
        }
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: &Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data().slice(s![index, .., ..]),
            Orientation::Coronal => self.data().slice(s![.., index, ..]),
            Orientation::Sagittal => self.data().slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    /// Number of slices along the axis normal to `orientation`.
    pub fn depth_along(&self, orientation: &Orientation) -> usize {
        let dim = self.data.dim();
        match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        }
    }

    /// Pixel size of a slice as (columns, rows).
    pub fn plane_size(&self, orientation: &Orientation) -> (usize, usize) {
        let (depth, height, width) = self.data.dim();
        match orientation {
            Orientation::Axial => (width, height),
            Orientation::Coronal => (width, depth),
            Orientation::Sagittal => (height, depth),
        }
    }

    /// Spacing of a slice's (column, row) axes.
    pub fn in_plane_spacing(&self, orientation: &Orientation) -> (f32, f32) {
        let (x, y, z) = self.spacing;
        match orientation {
            // Looking down Z-axis: X is width, Y is height
            Orientation::Axial => (x, y),
            // Looking down Y-axis: X is width, Z is height
            Orientation::Coronal => (x, z),
            // Looking down X-axis: Y is width, Z is height
            Orientation::Sagittal => (y, z),
        }
    }

    /// World-space (min, max) corners of the sampled grid.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let (depth, height, width) = self.dim();
        let origin = Vec3::from(self.origin);
        let extent = Vec3::new(
            width.saturating_sub(1) as f32 * self.spacing.0,
            height.saturating_sub(1) as f32 * self.spacing.1,
            depth.saturating_sub(1) as f32 * self.spacing.2,
        );
        let far = origin + extent;
        (origin.min(far), origin.max(far))
    }

    /// Continuous (x, y, z) voxel index of a world position.
    #[inline]
    pub fn world_to_index(&self, p: Vec3) -> Vec3 {
        (p - Vec3::from(self.origin)) / Vec3::from(self.spacing)
    }

    /// Trilinear sample at a continuous (x, y, z) index; `None` outside the grid.
    #[inline]
    pub fn sample(&self, index: Vec3) -> Option<f32> {
        Interpolator::trilinear_interpolate(&self.data.view(), index.z, index.y, index.x)
    }

    /// Central-difference gradient in world units at a continuous index.
    pub fn gradient(&self, index: Vec3) -> Vec3 {
        let at = |d: Vec3| self.sample(index + d).or_else(|| self.sample(index));
        let axis = |d: Vec3, spacing: f32| match (at(d), at(-d)) {
            (Some(a), Some(b)) => (a - b) / (2.0 * spacing),
            _ => 0.0,
        };
        Vec3::new(
            axis(Vec3::X, self.spacing.0),
            axis(Vec3::Y, self.spacing.1),
            axis(Vec3::Z, self.spacing.2),
        )
    }

    fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        index < self.depth_along(orientation)
    }
}
