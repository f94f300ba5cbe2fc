//! Error types for detpost.

use thiserror::Error;

/// Result alias for detpost operations.
pub type DetPostResult<T> = std::result::Result<T, DetPostError>;

/// Errors that can occur when running detpost algorithms.
///
/// Numeric degeneracies (empty images, classes without predictions) are not
/// errors; these variants only cover caller bugs such as malformed
/// configuration or mismatched buffer shapes.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DetPostError {
    /// A configuration value is outside its valid range.
    #[error("invalid config: {param} = {value} ({reason})")]
    InvalidConfig {
        param: &'static str,
        value: f32,
        reason: &'static str,
    },
    /// Paired inputs disagree on a dimension or a buffer length.
    #[error("shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    /// A declared shape cannot be used.
    #[error("invalid dimensions for {context}: {reason}")]
    InvalidDimensions {
        context: &'static str,
        reason: &'static str,
    },
    /// An index is outside the valid range.
    #[error("index out of bounds for {context}: {index} >= {len}")]
    IndexOutOfBounds {
        index: usize,
        len: usize,
        context: &'static str,
    },
    /// The requested backend is not compiled in.
    #[error("backend `{backend}` requires the `{feature}` feature")]
    BackendUnavailable {
        backend: &'static str,
        feature: &'static str,
    },
}

/// Checks that `value` is a finite threshold in `[0, 1]`.
pub(crate) fn check_unit_interval(param: &'static str, value: f32) -> DetPostResult<()> {
    if !value.is_finite() {
        return Err(DetPostError::InvalidConfig {
            param,
            value,
            reason: "must be finite",
        });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(DetPostError::InvalidConfig {
            param,
            value,
            reason: "must lie in [0, 1]",
        });
    }
    Ok(())
}
