use ndarray::{Array2, ArrayView2, ArrayView3, Zip};

/// Kernels wider than this are truncated, matching the usual 32-tap limit.
const MAX_KERNEL_RADIUS: usize = 16;

pub(crate) struct Interpolator;

impl Interpolator {
    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Trilinear sample at continuous index (z, y, x); `None` outside the grid.
    #[inline]
    pub(crate) fn trilinear_interpolate(
        volume: &ArrayView3<f32>,
        z: f32,
        y: f32,
        x: f32,
    ) -> Option<f32> {
        let (depth, height, width) = volume.dim();
        if depth == 0 || height == 0 || width == 0 {
            return None;
        }
        let inside = |v: f32, n: usize| v >= 0.0 && v <= (n - 1) as f32;
        if !(inside(z, depth) && inside(y, height) && inside(x, width)) {
            return None;
        }

        let z0 = z.floor() as usize;
        let z1 = (z0 + 1).min(depth - 1);
        let dz = z - z0 as f32;

        let lower = Self::bilinear_interpolate(&volume.index_axis(ndarray::Axis(0), z0), y, x);
        if z1 == z0 || dz == 0.0 {
            return Some(lower);
        }
        let upper = Self::bilinear_interpolate(&volume.index_axis(ndarray::Axis(0), z1), y, x);
        Some(lower.mul_add(1.0 - dz, upper * dz))
    }

    /// Normalized sampled Gaussian for a standard deviation in pixels.
    pub(crate) fn gaussian_kernel(sigma: f32) -> Vec<f32> {
        if !sigma.is_finite() || sigma < 1e-3 {
            return vec![1.0];
        }
        let radius = ((3.0 * sigma).ceil() as usize).clamp(1, MAX_KERNEL_RADIUS);
        let denom = 2.0 * sigma * sigma;
        let mut kernel: Vec<f32> = (0..=2 * radius)
            .map(|i| {
                let d = i as f32 - radius as f32;
                (-d * d / denom).exp()
            })
            .collect();
        let sum: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|w| *w /= sum);
        kernel
    }

    /// Separable Gaussian blur with clamped borders; sigma is (x, y) in pixels.
    pub(crate) fn gaussian_smooth(slice: &ArrayView2<f32>, sigma: (f32, f32)) -> Array2<f32> {
        let (height, width) = slice.dim();
        let kx = Self::gaussian_kernel(sigma.0);
        let ky = Self::gaussian_kernel(sigma.1);
        let rx = (kx.len() / 2) as isize;
        let ry = (ky.len() / 2) as isize;

        let mut horizontal = Array2::<f32>::zeros((height, width));
        Zip::indexed(&mut horizontal).par_for_each(|(y, x), out| {
            *out = kx
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let sx = (x as isize + k as isize - rx).clamp(0, width as isize - 1);
                    w * slice[[y, sx as usize]]
                })
                .sum();
        });

        let mut smoothed = Array2::<f32>::zeros((height, width));
        Zip::indexed(&mut smoothed).par_for_each(|(y, x), out| {
            *out = ky
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let sy = (y as isize + k as isize - ry).clamp(0, height as isize - 1);
                    w * horizontal[[sy as usize, x]]
                })
                .sum();
        });
        smoothed
    }

    /// Resample onto a `(width, height)` grid with the given output spacing.
    ///
    /// Both grids share their origin at pixel (0, 0). Output pixels that map
    /// outside the input are 0.
    pub(crate) fn resample(
        slice: &ArrayView2<f32>,
        input_spacing: (f32, f32),
        output_size: (u32, u32),
        output_spacing: (f32, f32),
    ) -> Array2<f32> {
        let (slice_height, slice_width) = slice.dim();
        let (width, height) = output_size;
        let mut out = Array2::<f32>::zeros((height as usize, width as usize));
        if slice_height == 0 || slice_width == 0 {
            return out;
        }

        let scale_x = output_spacing.0 / input_spacing.0;
        let scale_y = output_spacing.1 / input_spacing.1;
        let inside = |v: f32, n: usize| v >= -0.5 && v < n as f32 - 0.5;

        Zip::indexed(&mut out).par_for_each(|(y, x), value| {
            let src_x = x as f32 * scale_x;
            let src_y = y as f32 * scale_y;
            if !(inside(src_x, slice_width) && inside(src_y, slice_height)) {
                return;
            }
            // Clamp to valid range
            let src_x = src_x.max(0.0).min((slice_width - 1) as f32);
            let src_y = src_y.max(0.0).min((slice_height - 1) as f32);
            *value = Self::bilinear_interpolate(slice, src_y, src_x);
        });
        out
    }
}
