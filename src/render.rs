//! Render-to-image for one camera sample.
//!
//! [`Renderer`] is the seam the spherical pipeline drives; [`CpuRenderer`] is
//! the built-in software implementation (ray casting for volumes, z-buffered
//! rasterization for tube meshes).

use glam::{Mat4, Vec3, Vec4};
use image::RgbImage;
use rayon::prelude::*;

use crate::{
    camera::{Bounds, Camera},
    error::{ThumbnailError, ThumbnailResult},
    transfer_function::{Shading, TransferFunction},
    tube::TubeMesh,
    volume::VolumeImage,
};

/// Upper bound on samples along one ray.
const MAX_RAY_STEPS: usize = 2048;

/// Accumulated opacity at which a ray stops.
const OPACITY_CUTOFF: f32 = 0.99;

/// Lighting used for meshes when the transfer function has shading off.
const MESH_MATERIAL: Shading = Shading {
    ambient: 0.15,
    diffuse: 0.85,
    specular: 0.2,
    specular_power: 10.0,
    enabled: true,
};

/// What gets drawn through the camera loop.
#[derive(Clone, Copy, Debug)]
pub enum Renderable<'a> {
    Volume(&'a VolumeImage),
    Mesh(&'a TubeMesh),
}

impl Renderable<'_> {
    pub fn bounds(&self) -> Bounds {
        match self {
            Renderable::Volume(volume) => {
                let (lo, hi) = volume.bounds();
                Bounds::new(lo, hi)
            }
            Renderable::Mesh(mesh) => mesh
                .bounds()
                .map_or(Bounds::new(Vec3::ZERO, Vec3::ZERO), |(lo, hi)| {
                    Bounds::new(lo, hi)
                }),
        }
    }

    /// Range of the scalar the transfer function is defined over.
    pub fn scalar_range(&self) -> (f64, f64) {
        let (lo, hi) = match self {
            Renderable::Volume(volume) => volume.intensity_range(),
            Renderable::Mesh(mesh) => mesh.radius_range(),
        };
        (lo as f64, hi as f64)
    }
}

pub trait Renderer {
    /// Output raster size as (width, height).
    fn size(&self) -> (u32, u32);

    fn render(
        &mut self,
        renderable: &Renderable<'_>,
        camera: &Camera,
        transfer_function: &TransferFunction,
    ) -> ThumbnailResult<RgbImage>;
}

#[derive(Clone, Debug)]
pub struct CpuRenderer {
    width: u32,
    height: u32,
    background: [u8; 3],
}

impl CpuRenderer {
    pub fn new(width: u32, height: u32, background: [u8; 3]) -> ThumbnailResult<Self> {
        if width < 1 || height < 1 {
            return Err(ThumbnailError::validation(format!(
                "render size must be at least 1x1, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            background,
        })
    }

    fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    fn background(&self) -> Vec3 {
        Vec3::new(
            self.background[0] as f32,
            self.background[1] as f32,
            self.background[2] as f32,
        ) / 255.0
    }

    /// World-space ray through the center of pixel (x, y).
    fn pixel_ray(inverse: &Mat4, camera: &Camera, x: u32, y: u32, width: u32, height: u32) -> Vec3 {
        let ndc_x = 2.0 * (x as f32 + 0.5) / width as f32 - 1.0;
        let ndc_y = 1.0 - 2.0 * (y as f32 + 0.5) / height as f32;
        let far = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        (far - camera.position).normalize()
    }

    fn render_volume(
        &self,
        volume: &VolumeImage,
        camera: &Camera,
        tf: &TransferFunction,
    ) -> Vec<u8> {
        let (width, height) = (self.width, self.height);
        let inverse = camera.view_projection(self.aspect()).inverse();
        let (lo, hi) = volume.bounds();
        let bounds = Bounds::new(lo, hi);
        let (sx, sy, sz) = volume.spacing;
        let unit = sx.min(sy).min(sz).max(f32::EPSILON);
        let background = self.background();

        (0..height)
            .into_par_iter()
            .flat_map(|y| {
                (0..width)
                    .flat_map(|x| {
                        let dir = Self::pixel_ray(&inverse, camera, x, y, width, height);
                        let color = match bounds.intersect(camera.position, dir) {
                            Some((t0, t1)) => {
                                let (rgb, alpha) =
                                    Self::cast_ray(volume, tf, camera.position, dir, t0, t1, unit);
                                rgb + background * (1.0 - alpha)
                            }
                            None => background,
                        };
                        to_rgb8(color)
                    })
                    .collect::<Vec<u8>>()
            })
            .collect()
    }

    /// Front-to-back compositing along one ray; returns premultiplied color and opacity.
    fn cast_ray(
        volume: &VolumeImage,
        tf: &TransferFunction,
        origin: Vec3,
        dir: Vec3,
        t0: f32,
        t1: f32,
        unit: f32,
    ) -> (Vec3, f32) {
        let length = t1 - t0;
        let mut step = unit * 0.5;
        if length / step > MAX_RAY_STEPS as f32 {
            step = length / MAX_RAY_STEPS as f32;
        }
        let steps = (length / step).ceil() as usize;
        let shading = tf.shading;
        let light = -dir;

        let mut color = Vec3::ZERO;
        let mut alpha = 0.0f32;
        for i in 0..=steps {
            let t = (t0 + i as f32 * step).min(t1);
            let index = volume.world_to_index(origin + dir * t);
            let Some(value) = volume.sample(index) else {
                continue;
            };
            let [r, g, b, a] = tf.sample(value as f64);
            let a = 1.0 - (1.0 - (a as f32).clamp(0.0, 1.0)).powf(step / unit);
            if a <= 0.0 {
                continue;
            }
            let mut rgb = Vec3::new(r as f32, g as f32, b as f32);
            if shading.enabled {
                let gradient = volume.gradient(index);
                if gradient.length_squared() > 1e-12 {
                    rgb = shade(rgb, gradient.normalize(), light, &shading);
                }
            }
            color += rgb * a * (1.0 - alpha);
            alpha += a * (1.0 - alpha);
            if alpha >= OPACITY_CUTOFF {
                break;
            }
        }
        (color, alpha)
    }

    fn render_mesh(&self, mesh: &TubeMesh, camera: &Camera, tf: &TransferFunction) -> Vec<u8> {
        let (width, height) = (self.width, self.height);
        let view_projection = camera.view_projection(self.aspect());
        let light = -camera.forward();
        let material = if tf.shading.enabled {
            tf.shading
        } else {
            MESH_MATERIAL
        };

        let projected: Vec<Option<ScreenVertex>> = mesh
            .vertices
            .iter()
            .zip(&mesh.normals)
            .zip(&mesh.colors)
            .map(|((&v, &n), c)| {
                let clip = view_projection * Vec4::new(v.x, v.y, v.z, 1.0);
                if clip.w <= f32::EPSILON {
                    return None;
                }
                let ndc = clip.truncate() / clip.w;
                Some(ScreenVertex {
                    x: (ndc.x + 1.0) * 0.5 * width as f32,
                    y: (1.0 - ndc.y) * 0.5 * height as f32,
                    depth: ndc.z,
                    color: shade(Vec3::from(*c), n, light, &material),
                })
            })
            .collect();

        let triangles: Vec<ScreenTriangle> = mesh
            .triangles
            .iter()
            .filter_map(|t| {
                let a = projected[t[0] as usize]?;
                let b = projected[t[1] as usize]?;
                let c = projected[t[2] as usize]?;
                ScreenTriangle::new(a, b, c)
            })
            .collect();

        let background = self.background();
        (0..height)
            .into_par_iter()
            .flat_map(|y| {
                let py = y as f32 + 0.5;
                let mut depth = vec![f32::INFINITY; width as usize];
                let mut row = vec![background; width as usize];
                for tri in triangles.iter().filter(|t| t.min_y <= py && py <= t.max_y) {
                    let x_start = tri.min_x.floor().max(0.0) as u32;
                    let x_end = (tri.max_x.ceil() as u32).min(width);
                    for x in x_start..x_end {
                        if let Some((z, color)) = tri.shade_at(x as f32 + 0.5, py) {
                            let slot = x as usize;
                            if z < depth[slot] {
                                depth[slot] = z;
                                row[slot] = color;
                            }
                        }
                    }
                }
                row.into_iter().flat_map(to_rgb8).collect::<Vec<u8>>()
            })
            .collect()
    }
}

impl Renderer for CpuRenderer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(
        &mut self,
        renderable: &Renderable<'_>,
        camera: &Camera,
        transfer_function: &TransferFunction,
    ) -> ThumbnailResult<RgbImage> {
        let pixel_data = match renderable {
            Renderable::Volume(volume) => self.render_volume(volume, camera, transfer_function),
            Renderable::Mesh(mesh) => self.render_mesh(mesh, camera, transfer_function),
        };
        RgbImage::from_raw(self.width, self.height, pixel_data)
            .ok_or_else(|| ThumbnailError::input("rendered buffer does not match the raster size"))
    }
}

/// Two-sided Phong with a headlight (light and view share a direction).
fn shade(rgb: Vec3, normal: Vec3, light: Vec3, shading: &Shading) -> Vec3 {
    let cos = normal.dot(light).abs();
    let diffuse = shading.diffuse as f32 * cos;
    let specular = shading.specular as f32 * cos.powf(shading.specular_power as f32);
    let lit = rgb * (shading.ambient as f32 + diffuse) + Vec3::splat(specular);
    lit.clamp(Vec3::ZERO, Vec3::ONE)
}

fn to_rgb8(color: Vec3) -> [u8; 3] {
    let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    [c.x as u8, c.y as u8, c.z as u8]
}

#[derive(Clone, Copy, Debug)]
struct ScreenVertex {
    x: f32,
    y: f32,
    depth: f32,
    color: Vec3,
}

struct ScreenTriangle {
    v: [ScreenVertex; 3],
    inv_area: f32,
    min_x: f32,
    max_x: f32,
    min_y: f32,
    max_y: f32,
}

fn edge(a: &ScreenVertex, b: &ScreenVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

impl ScreenTriangle {
    fn new(a: ScreenVertex, b: ScreenVertex, c: ScreenVertex) -> Option<Self> {
        let area = edge(&a, &b, c.x, c.y);
        if area.abs() < 1e-9 {
            return None;
        }
        Some(Self {
            min_x: a.x.min(b.x).min(c.x),
            max_x: a.x.max(b.x).max(c.x),
            min_y: a.y.min(b.y).min(c.y),
            max_y: a.y.max(b.y).max(c.y),
            inv_area: 1.0 / area,
            v: [a, b, c],
        })
    }

    /// Interpolated (depth, color) at a pixel center inside the triangle.
    fn shade_at(&self, px: f32, py: f32) -> Option<(f32, Vec3)> {
        let [a, b, c] = &self.v;
        let w0 = edge(b, c, px, py) * self.inv_area;
        let w1 = edge(c, a, px, py) * self.inv_area;
        let w2 = edge(a, b, px, py) * self.inv_area;
        if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
            return None;
        }
        let depth = w0 * a.depth + w1 * b.depth + w2 * c.depth;
        if !(0.0..=1.0).contains(&depth) {
            return None;
        }
        Some((depth, a.color * w0 + b.color * w1 + c.color * w2))
    }
}
