//! # Interactive thumbnails
//!
//! Turns a 3D dataset into a set of precomputed 2D images plus an
//! `index.json` manifest, so a client can fake interactive viewing by
//! swapping cached images instead of rendering.
//!
//! Supported inputs:
//!  - DICOM series directories (files are read in parallel using rayon)
//!  - single DICOM files and MetaImage (`.mha`/`.mhd`) volumes
//!  - tube scenes: JSON trees of groups and tubes whose points are text records
//!
//! Two navigation modes are produced:
//!  - slices: evenly spaced cross-sections along the Axial, Coronal or
//!    Sagittal axis, windowed, low-passed and resampled to the output size
//!  - spherical: one rendering per camera orientation on a fixed phi/theta
//!    grid, through a transfer function preset
//!
//! Runs are strictly sequential and the manifest is written last, so an
//! output directory holding an `index.json` is always complete.
//!
//! # Examples
//!
//! ## Ten axial slices of a DICOM series
//!
//! ```no_run
//! # use interactive_thumbnails::{config::RunConfig, pipeline};
//! let config = RunConfig::new("dicom", "thumbnails");
//! let summary = pipeline::run(&config).expect("should have written slices");
//! assert_eq!(summary.assets.len(), 10);
//! ```
//!
//! ## Orbiting a volume with a preset
//!
//! ```no_run
//! # use interactive_thumbnails::{config::RunConfig, enums::NavigationMode, pipeline};
//! let config = RunConfig {
//!     mode: Some(NavigationMode::Spherical),
//!     angle_step: Some(20.0),
//!     preset: Some("CT-Bones".into()),
//!     ..RunConfig::new("scan.mha", "views")
//! };
//! pipeline::run(&config).expect("should have rendered views");
//! ```

pub mod camera;
pub mod config;
pub mod enums;
pub mod error;
pub mod intensity;
mod interpolator;
pub mod manifest;
mod metaimage;
pub mod pipeline;
pub mod render;
pub mod sampling;
pub mod slicer;
pub mod transfer_function;
pub mod tube;
pub mod tube_record;
pub mod volume;
pub mod volume_loader;
