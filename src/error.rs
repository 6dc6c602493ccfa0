use thiserror::Error;

/// Boxed cause carried by errors that wrap a foreign failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the inpainting pipeline.
///
/// Every stage propagates the first failure unchanged; the transport layer is
/// the only place these are caught and turned into responses.
#[derive(Debug, Error)]
pub enum InpaintError {
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid dimensions: {0}")]
    Dimension(String),

    #[error("inference failed: {source}")]
    Inference {
        #[source]
        source: BoxError,
    },

    #[error("failed to encode result: {source}")]
    Encode {
        #[source]
        source: image::ImageError,
    },
}

/// Stage category reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decode,
    Dimension,
    Inference,
    Encode,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::Dimension => "dimension",
            Stage::Inference => "inference",
            Stage::Encode => "encode",
        }
    }
}

impl InpaintError {
    pub fn inference(source: impl Into<BoxError>) -> Self {
        Self::Inference {
            source: source.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            InpaintError::Decode { .. } => Stage::Decode,
            InpaintError::Dimension(_) => Stage::Dimension,
            InpaintError::Inference { .. } => Stage::Inference,
            InpaintError::Encode { .. } => Stage::Encode,
        }
    }

    /// True when the failure was caused by the caller's input.
    pub fn is_client_fault(&self) -> bool {
        matches!(self.stage(), Stage::Decode | Stage::Dimension)
    }
}
