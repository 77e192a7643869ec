use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::volume_loader::VolumeLoaderError;

pub type ThumbnailResult<T> = Result<T, ThumbnailError>;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("input error: {0}")]
    Input(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ThumbnailError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateGeometry(msg.into())
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap an encoder failure while writing `path`.
    pub(crate) fn image(path: impl AsRef<Path>, err: image::ImageError) -> Self {
        let source = match err {
            image::ImageError::IoError(e) => e,
            other => std::io::Error::other(other),
        };
        Self::io(path, source)
    }
}

impl From<VolumeLoaderError> for ThumbnailError {
    fn from(err: VolumeLoaderError) -> Self {
        Self::Input(err.to_string())
    }
}
