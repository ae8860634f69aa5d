//! Error types shared by the whole crate.

use thiserror::Error;

/// Result alias used by all fallible public operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Top level error returned by the renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Caller supplied settings that can never be rendered.
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    /// Kernel source was rejected by the device compiler.
    /// Not retried, the same source fails the same way.
    #[error("kernel compilation failed: {0}")]
    Compile(#[from] CompileError),
    /// Execution failure reported by the device.
    #[error("device failure: {0}")]
    Device(String),
}

/// Invalid settings, rejected when the settings are constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{what} range is empty (min {min} > max {max})")]
    EmptyRange {
        what: &'static str,
        min: f32,
        max: f32,
    },
    #[error("{what} gamma must be positive, got {gamma}")]
    NonPositiveGamma { what: &'static str, gamma: f32 },
    #[error("weight must not be negative, got {0}")]
    NegativeWeight(f32),
    #[error("{what} must be finite, got {value}")]
    NonFinite { what: &'static str, value: f32 },
    #[error("expected {expected} channels, got {got}")]
    ChannelCountMismatch { expected: usize, got: usize },
    #[error("channel {0} does not exist")]
    NoSuchChannel(usize),
    #[error("target size {width}x{height} is not renderable")]
    InvalidTargetSize { width: usize, height: usize },
    #[error("bounding box has a negative extent")]
    InvalidBoundingBox,
    #[error("timepoint {timepoint} out of range, volume has {available}")]
    NoSuchTimepoint { timepoint: usize, available: usize },
    #[error("transformation is not invertible")]
    SingularTransform,
    #[error("{0}")]
    Options(&'static str),
}

/// Kernel source did not compile.
///
/// Position is 1-based and points at the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct CompileError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }

    /// Locate `rest` (a suffix of `source`) and build an error pointing at it.
    pub fn at(source: &str, rest: &str, message: impl Into<String>) -> Self {
        let offset = source.len().saturating_sub(rest.len());
        let consumed = &source[..offset];
        let line = consumed.matches('\n').count() + 1;
        let column = match consumed.rfind('\n') {
            Some(nl) => consumed[nl + 1..].chars().count() + 1,
            None => consumed.chars().count() + 1,
        };
        Self::new(line, column, message)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compile_error_position() {
        let src = "kernel a\nchannels 1;\n  oops";
        let rest = &src[src.find("oops").unwrap()..];
        let err = CompileError::at(src, rest, "unexpected");

        assert_eq!(err.line, 3);
        assert_eq!(err.column, 3);
        assert_eq!(err.to_string(), "3:3: unexpected");
    }

    #[test]
    fn config_error_wraps() {
        let err: RenderError = ConfigError::NegativeWeight(-1.0).into();
        assert!(matches!(
            err,
            RenderError::Configuration(ConfigError::NegativeWeight(_))
        ));
    }
}
