//! End-to-end generation runs.
//!
//! A run loads one dataset, writes every image in sample order and writes the
//! manifest last. Any failure aborts the run before the manifest exists.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use image::{GenericImageView, PixelWithColorType, codecs::jpeg::JpegEncoder};
use tracing::{debug, info};
use web_time::Instant;

use crate::{
    camera::Camera,
    config::RunConfig,
    enums::NavigationMode,
    error::{ThumbnailError, ThumbnailResult},
    intensity,
    manifest::{self, Manifest},
    render::{CpuRenderer, Renderable, Renderer},
    sampling::AngularGrid,
    slicer::{self, SliceExtractor},
    transfer_function::{self, TransferFunction},
    tube::{SpatialObject, TUBE_SIDES, build_tube_mesh, reconstruct_scene},
    volume::VolumeImage,
    volume_loader::VolumeLoader,
};

/// Log a progress line every this many spherical samples.
const PROGRESS_EVERY: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// DICOM series directory, single DICOM file or MetaImage.
    Volume,
    /// JSON tube scene.
    TubeScene,
}

/// Classify an input path by what it is on disk.
pub fn detect_input(path: &Path) -> ThumbnailResult<InputKind> {
    if path.is_dir() {
        return Ok(InputKind::Volume);
    }
    if !path.is_file() {
        return Err(ThumbnailError::input(format!(
            "input {} does not exist",
            path.display()
        )));
    }
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mha") | Some("mhd") | Some("dcm") => Ok(InputKind::Volume),
        Some("json") => Ok(InputKind::TubeScene),
        _ => Err(ThumbnailError::input(format!(
            "unsupported input format: {}",
            path.display()
        ))),
    }
}

/// What a successful run left on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub mode: NavigationMode,
    /// Written images in generation order.
    pub assets: Vec<PathBuf>,
    pub manifest: PathBuf,
}

#[tracing::instrument(skip_all, fields(input = %config.input.display()))]
pub fn run(config: &RunConfig) -> ThumbnailResult<RunSummary> {
    config.validate()?;
    let start = Instant::now();
    let kind = detect_input(&config.input)?;
    let mode = config.mode.unwrap_or(match kind {
        InputKind::Volume => NavigationMode::Slices,
        InputKind::TubeScene => NavigationMode::Spherical,
    });
    if kind == InputKind::TubeScene && mode == NavigationMode::Slices {
        return Err(ThumbnailError::validation(
            "tube scenes can only be rendered in spherical mode",
        ));
    }
    config.validate_mode(mode)?;

    fs::create_dir_all(&config.output_dir)
        .map_err(|e| ThumbnailError::io(&config.output_dir, e))?;

    let summary = match kind {
        InputKind::Volume => {
            info!(path = %config.input.display(), "loading volume");
            let volume = VolumeLoader::load_from_path(&config.input, config.sort_by)?;
            info!(dim = ?volume.dim(), spacing = ?volume.spacing, "volume loaded");
            match mode {
                NavigationMode::Slices => generate_slices(&volume, config, &config.output_dir)?,
                NavigationMode::Spherical => {
                    render_spherical(Renderable::Volume(&volume), config)?
                }
            }
        }
        InputKind::TubeScene => {
            info!(path = %config.input.display(), "loading tube scene");
            let scene = SpatialObject::from_path(&config.input)?;
            let tubes = reconstruct_scene(&scene)?;
            let mesh = build_tube_mesh(&tubes, TUBE_SIDES)?;
            info!(
                tubes = tubes.len(),
                triangles = mesh.triangles.len(),
                "tube mesh ready"
            );
            render_spherical(Renderable::Mesh(&mesh), config)?
        }
    };

    info!(
        assets = summary.assets.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        manifest = %summary.manifest.display(),
        "run finished"
    );
    Ok(summary)
}

/// Write evenly spaced slices of `volume` and their manifest into `out_dir`.
#[tracing::instrument(skip_all, fields(slices = config.slices, orientation = ?config.orientation))]
pub fn generate_slices(
    volume: &VolumeImage,
    config: &RunConfig,
    out_dir: &Path,
) -> ThumbnailResult<RunSummary> {
    let (width, height) = slicer::resolve_output_size(
        volume.plane_size(&config.orientation),
        config.width,
        config.height,
    )?;
    let display = intensity::to_display_range(volume);
    let extractor = SliceExtractor::new(&display, config.orientation, width, height);
    let indices = slicer::slice_indices(extractor.depth(), config.slices)?;
    info!(width, height, depth = extractor.depth(), ?indices, "extracting slices");

    let mut assets = Vec::with_capacity(indices.len());
    for &index in &indices {
        let image = extractor.extract(index)?;
        let path = out_dir.join(manifest::slice_file_name(index));
        write_jpeg(&image, &path, config.jpeg_quality)?;
        debug!(index, path = %path.display(), "wrote slice");
        assets.push(path);
    }

    let manifest = Manifest::slices(&indices, config.background).write(out_dir)?;
    Ok(RunSummary {
        mode: NavigationMode::Slices,
        assets,
        manifest,
    })
}

/// Resolve the grid, transfer function and renderer for `renderable`, then orbit it.
fn render_spherical(renderable: Renderable<'_>, config: &RunConfig) -> ThumbnailResult<RunSummary> {
    let grid = config.grid()?;
    let tf = transfer_function::resolve(config.preset.as_deref(), renderable.scalar_range())?;
    info!(
        preset = config.preset.as_deref().unwrap_or(transfer_function::DEFAULT_PRESET),
        shading = tf.shading.enabled,
        "transfer function resolved"
    );
    // A unit plane makes a single given side produce a square raster.
    let (width, height) = slicer::resolve_output_size((1, 1), config.width, config.height)?;
    let mut renderer = CpuRenderer::new(width, height, config.background)?;
    generate_spherical(
        &renderable,
        &grid,
        &tf,
        &mut renderer,
        config.background,
        config.jpeg_quality,
        &config.output_dir,
    )
}

/// Render one image per camera sample, in grid order, then write the manifest.
#[tracing::instrument(skip_all, fields(samples = grid.len()))]
pub fn generate_spherical(
    renderable: &Renderable<'_>,
    grid: &AngularGrid,
    transfer_function: &TransferFunction,
    renderer: &mut dyn Renderer,
    background: [u8; 3],
    jpeg_quality: u8,
    out_dir: &Path,
) -> ThumbnailResult<RunSummary> {
    let bounds = renderable.bounds();
    let (width, height) = renderer.size();
    let aspect = width as f32 / height as f32;
    let total = grid.len();
    info!(width, height, total, "rendering camera samples");

    let mut assets = Vec::with_capacity(total);
    for sample in grid.samples() {
        let camera = Camera::orbit(&bounds, &sample, aspect);
        let image = renderer.render(renderable, &camera, transfer_function)?;
        let path = out_dir.join(manifest::spherical_file_name(&sample));
        write_jpeg(&image, &path, jpeg_quality)?;
        debug!(phi = sample.phi, theta = sample.theta, path = %path.display(), "wrote view");
        assets.push(path);

        let done = sample.index + 1;
        if done % PROGRESS_EVERY == 0 || done == total {
            info!(done, total, "rendered");
        }
    }

    let manifest = Manifest::spherical(grid, background).write(out_dir)?;
    Ok(RunSummary {
        mode: NavigationMode::Spherical,
        assets,
        manifest,
    })
}

fn write_jpeg<I>(image: &I, path: &Path, quality: u8) -> ThumbnailResult<()>
where
    I: GenericImageView,
    I::Pixel: PixelWithColorType,
{
    let file = File::create(path).map_err(|e| ThumbnailError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(image)
        .map_err(|e| ThumbnailError::image(path, e))?;
    writer.flush().map_err(|e| ThumbnailError::io(path, e))
}
