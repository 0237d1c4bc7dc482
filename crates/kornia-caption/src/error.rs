use std::time::Duration;

/// Errors raised while loading caption assets or generating captions.
#[derive(thiserror::Error, Debug)]
pub enum CaptionError {
    /// A caller-supplied decoding parameter is out of its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The language model failed or returned a malformed distribution.
    #[error("Model failure: {0}")]
    ModelFailure(String),

    /// The token id is outside of the vocabulary range.
    #[error("Unknown token id: {0}")]
    UnknownId(u32),

    /// The word is not part of the vocabulary.
    #[error("Unknown word: {0}")]
    UnknownWord(String),

    /// The vocabulary asset is not a valid id/word bijection.
    #[error("Invalid vocabulary: {0}")]
    InvalidVocabulary(String),

    /// The decode call exceeded the configured wall-clock bound.
    #[error("Caption generation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    CandleError(#[from] candle_core::Error),

    #[error(transparent)]
    ImageError(#[from] image::ImageError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerializationError(#[from] serde_json::Error),
}

impl CaptionError {
    /// Wraps an error raised by the model capability.
    pub(crate) fn model(err: impl std::fmt::Display) -> Self {
        Self::ModelFailure(err.to_string())
    }
}
