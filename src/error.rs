#[derive(Debug)]
pub enum WandError {
    /// RGBA byte length does not equal `width * height * 4`.
    DimensionMismatch { width: u32, height: u32, len: usize },
    EmptyRaster,
    InvalidParameter { name: &'static str, reason: String },
    UnknownEngine(String),
    WorkerDisconnected,
    Io(std::io::Error),
    Image(image::ImageError),
}

impl std::fmt::Display for WandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WandError::DimensionMismatch { width, height, len } => write!(
                f,
                "Dimension mismatch: {}x{} needs {} bytes, got {}",
                width,
                height,
                *width as usize * *height as usize * 4,
                len
            ),
            WandError::EmptyRaster => write!(f, "Raster has zero width or height"),
            WandError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            WandError::UnknownEngine(tag) => write!(f, "Unknown engine '{}'", tag),
            WandError::WorkerDisconnected => write!(f, "Segmentation worker disconnected"),
            WandError::Io(e) => write!(f, "I/O error: {}", e),
            WandError::Image(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for WandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WandError::Io(e) => Some(e),
            WandError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WandError {
    fn from(e: std::io::Error) -> Self {
        WandError::Io(e)
    }
}

impl From<image::ImageError> for WandError {
    fn from(e: image::ImageError) -> Self {
        WandError::Image(e)
    }
}

pub type WandResult<T> = Result<T, WandError>;
