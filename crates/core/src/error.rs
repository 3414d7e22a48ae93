/// Result alias that carries the custom [`MatrixError`] type.
pub type Result<T> = std::result::Result<T, MatrixError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    /// Free-form failure raised by a subsystem that has no dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Caller supplied data the operation cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration JSON was malformed or had the wrong shape.
    #[error("configuration could not be parsed: {0}")]
    Json(#[from] serde_json::Error),
    /// The FFT rejected its buffers.
    #[error("spectrum transform failed: {0}")]
    Fft(#[from] realfft::FftError),
    /// Poster raster could not be encoded.
    #[error("png encoding failed: {0}")]
    Png(#[from] png::EncodingError),
    /// A poster export attempt failed as a whole.
    #[error("poster export failed: {0}")]
    Export(String),
}

impl MatrixError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn export<T: Into<String>>(msg: T) -> Self {
        Self::Export(msg.into())
    }
}

impl From<&str> for MatrixError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MatrixError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Reason a single visual layer was left out of the current frame.
///
/// Layer failures never propagate out of the frame loop: the engine records
/// the skip and moves on to the next layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayerSkip {
    /// A geometric or color parameter evaluated to NaN or infinity.
    #[error("non-finite parameter `{0}`")]
    NonFinite(&'static str),
    /// Zero-sized geometry or an empty input.
    #[error("degenerate geometry: {0}")]
    Degenerate(&'static str),
    /// The raster backend refused to build a primitive.
    #[error("rasterizer rejected {0}")]
    Unsupported(&'static str),
}

/// Returns `value` when it is finite, otherwise a [`LayerSkip::NonFinite`]
/// tagged with `name`.
pub fn finite(name: &'static str, value: f32) -> std::result::Result<f32, LayerSkip> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LayerSkip::NonFinite(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_guard_rejects_nan_and_infinity() {
        assert_eq!(finite("x", 2.5), Ok(2.5));
        assert_eq!(finite("x", f32::NAN), Err(LayerSkip::NonFinite("x")));
        assert_eq!(
            finite("radius", f32::INFINITY),
            Err(LayerSkip::NonFinite("radius"))
        );
    }

    #[test]
    fn messages_are_readable() {
        let err = MatrixError::export("disk full");
        assert_eq!(err.to_string(), "poster export failed: disk full");
        let err: MatrixError = "plain".into();
        assert_eq!(err.to_string(), "plain");
    }
}
