use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use interactive_thumbnails::{
    config::RunConfig,
    enums::{NavigationMode, Orientation, SortBy},
    pipeline,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "thumbnails",
    version,
    about = "Precompute image sets for interactive 3D previews"
)]
struct Cli {
    /// DICOM series directory, MetaImage (.mha/.mhd), DICOM file or tube scene JSON.
    input: PathBuf,

    /// Directory receiving the images and index.json.
    out_dir: PathBuf,

    /// JSON run configuration; flags given here override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Navigation mode; defaults to slices for volumes and spherical for tube scenes.
    #[arg(long, value_enum)]
    mode: Option<ModeChoice>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Number of slices to extract.
    #[arg(long)]
    slices: Option<usize>,

    #[arg(long, value_enum)]
    orientation: Option<OrientationChoice>,

    /// Slice ordering within a DICOM series.
    #[arg(long, value_enum)]
    sort_by: Option<SortChoice>,

    #[arg(long)]
    phi_samples: Option<usize>,

    #[arg(long)]
    theta_samples: Option<usize>,

    /// Even angular step in degrees; overrides the sample counts.
    #[arg(long)]
    angle_step: Option<f64>,

    /// Transfer function preset (default, CT-AAA, CT-Bones, CT-Soft-Tissue, MR-Default).
    #[arg(long)]
    preset: Option<String>,

    /// JPEG quality, 1 to 100.
    #[arg(long)]
    quality: Option<u8>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeChoice {
    Slices,
    Spherical,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrientationChoice {
    Axial,
    Coronal,
    Sagittal,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortChoice {
    Position,
    Table,
    Instance,
    None,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("load config '{}'", path.display()))?,
            None => RunConfig::default(),
        };
        config.input = self.input;
        config.output_dir = self.out_dir;
        if let Some(mode) = self.mode {
            config.mode = Some(match mode {
                ModeChoice::Slices => NavigationMode::Slices,
                ModeChoice::Spherical => NavigationMode::Spherical,
            });
        }
        if let Some(orientation) = self.orientation {
            config.orientation = match orientation {
                OrientationChoice::Axial => Orientation::Axial,
                OrientationChoice::Coronal => Orientation::Coronal,
                OrientationChoice::Sagittal => Orientation::Sagittal,
            };
        }
        if let Some(sort_by) = self.sort_by {
            config.sort_by = match sort_by {
                SortChoice::Position => SortBy::ImagePositionPatient,
                SortChoice::Table => SortBy::TablePosition,
                SortChoice::Instance => SortBy::InstanceNumber,
                SortChoice::None => SortBy::None,
            };
        }
        config.width = self.width.or(config.width);
        config.height = self.height.or(config.height);
        config.slices = self.slices.unwrap_or(config.slices);
        config.phi_samples = self.phi_samples.unwrap_or(config.phi_samples);
        config.theta_samples = self.theta_samples.unwrap_or(config.theta_samples);
        config.angle_step = self.angle_step.or(config.angle_step);
        config.preset = self.preset.or(config.preset);
        config.jpeg_quality = self.quality.unwrap_or(config.jpeg_quality);
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Cli::parse().into_config()?;
    let summary = pipeline::run(&config)
        .with_context(|| format!("generate thumbnails from '{}'", config.input.display()))?;
    println!(
        "wrote {} images and {}",
        summary.assets.len(),
        summary.manifest.display()
    );
    Ok(())
}
