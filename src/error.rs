use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Please select an image file (JPEG, PNG, etc.), got {0}")]
    NotAnImage(String),

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Please enter a valid target size between 10 and 500 KB (got {0})")]
    TargetOutOfRange(String),

    #[error("Unknown compression method: {0}")]
    UnknownStrategy(String),

    #[error("Unknown aspect ratio: {0}")]
    UnknownAspectRatio(String),

    #[error("Invalid crop box: {0}")]
    InvalidCrop(String),

    #[error("Encoding at quality {quality:.2} failed: {source}")]
    Encode {
        quality: f64,
        #[source]
        source: image::ImageError,
    },

    #[error("Encoder returned no data at quality {0:.2}")]
    EmptyEncode(f64),

    #[error("Compression cancelled")]
    Cancelled,

    #[error("No image loaded")]
    NoImage,

    #[error("Nothing to save, no compression has finished yet")]
    NoOutcome,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompressError {
    /// Rejections of user input, raised before any encode happens.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            CompressError::NotAnImage(_)
                | CompressError::NoImage
                | CompressError::Decode(_)
                | CompressError::TargetOutOfRange(_)
                | CompressError::UnknownStrategy(_)
                | CompressError::UnknownAspectRatio(_)
                | CompressError::InvalidCrop(_)
        )
    }

    pub fn is_encode_failure(&self) -> bool {
        matches!(
            self,
            CompressError::Encode { .. } | CompressError::EmptyEncode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;
