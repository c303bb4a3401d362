use std::path::PathBuf;

/// Fatal errors. Per-record problems never surface here; the router
/// skips those and counts them in [`RasterStats`](crate::core::RasterStats).
#[derive(thiserror::Error, Debug)]
pub enum MaskError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("image codec error at {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("buffer holds {actual} samples, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl MaskError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MaskError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        MaskError::Image {
            path: path.into(),
            source,
        }
    }
}

pub type MaskResult<T> = Result<T, MaskError>;
