use crate::config::UploadConfig;
use crate::signal::Signal;

/// MB to bytes scale used by the size ceiling.
pub const SIZE_SCALE: u64 = 1_048_576;

/// Why an upload failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    UnsupportedType(String),
    SizeExceeded { size_bytes: u64, max_bytes: u64 },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::UnsupportedType(ct) => {
                write!(f, "content type not allowed: {}", ct)
            }
            ValidationError::SizeExceeded {
                size_bytes,
                max_bytes,
            } => write!(
                f,
                "file size {} bytes exceeds the {} byte ceiling",
                size_bytes, max_bytes
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn signal(&self) -> Signal {
        match self {
            ValidationError::UnsupportedType(_) => Signal::UnsupportedType,
            ValidationError::SizeExceeded { .. } => Signal::SizeExceeded,
        }
    }
}

/// The configured size ceiling in bytes.
pub fn max_bytes(config: &UploadConfig) -> u64 {
    config.max_file_size_mb * SIZE_SCALE
}

/// Checks the declared content type against the allow-list, then the size
/// against the configured ceiling. Pure, no I/O.
pub fn validate(
    content_type: &str,
    size_bytes: u64,
    config: &UploadConfig,
) -> Result<(), ValidationError> {
    if !config
        .allowed_content_types
        .iter()
        .any(|allowed| allowed == content_type)
    {
        return Err(ValidationError::UnsupportedType(content_type.to_string()));
    }
    let max_bytes = max_bytes(config);
    if size_bytes > max_bytes {
        return Err(ValidationError::SizeExceeded {
            size_bytes,
            max_bytes,
        });
    }
    Ok(())
}
