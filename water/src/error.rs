use crate::codec::CodecError;

/// Result type for water surface operations
pub type WaterResult<T> = Result<T, WaterError>;

/// Errors surfaced to callers that build or persist water surfaces.
///
/// Everything else (missing terrain, slot exhaustion, stale tables) is
/// recovered locally and only logged.
#[derive(Debug, thiserror::Error)]
pub enum WaterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "Index page overflow: strip {strip} needs {distinct} distinct vertices but a page holds {ceiling}; reduce the mesh resolution"
    )]
    PageOverflow {
        strip: usize,
        distinct: usize,
        ceiling: u32,
    },

    #[error("Table codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WaterError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        WaterError::InvalidConfig(reason.into())
    }

    /// Configuration errors leave the surface inert; the rest are I/O level.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WaterError::InvalidConfig(_) | WaterError::PageOverflow { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_errors_surface_as_codec_errors() {
        let bad: bincode::Error = Box::new(bincode::ErrorKind::SizeLimit);
        let err = WaterError::from(CodecError::from(bad));
        assert!(matches!(err, WaterError::Codec(CodecError::Envelope(_))));
        assert!(!err.is_configuration());

        let corrupt = crate::codec::decode_tables(&[1, 2, 3, 4, 5], 10).unwrap_err();
        assert!(matches!(WaterError::from(corrupt), WaterError::Codec(_)));
    }
}
