//! Error taxonomy for a synthesis run.

/// The standard result type for fallible synthesis phases.
pub type SynthResult<T> = Result<T, SynthesisError>;

/// A fatal condition that aborts the whole synthesis invocation.
///
/// Phases never catch and downgrade these; the caller reports the
/// failing phase and reason and writes no architecture files.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// A malformed or infeasible channel composition.
    #[error("composition error: {0}")]
    Composition(String),

    /// The multiplexer layout could not be produced.
    #[error("layout error: {0}")]
    Layout(String),

    /// The circuit simulator returned a negative, missing or unparsable delay.
    #[error("measurement error: {0}")]
    Measurement(String),

    /// The resource graph or architecture description is inconsistent.
    #[error("export error: {0}")]
    Export(String),

    /// The run configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error while reading inputs or writing outputs.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl SynthesisError {
    /// Returns the name of the phase that raised this error.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Composition(_) => "composition",
            Self::Layout(_) => "layout",
            Self::Measurement(_) => "measurement",
            Self::Export(_) => "export",
            Self::Config(_) => "configuration",
            Self::Io(_) => "i/o",
        }
    }

    /// Returns the reason without the phase prefix.
    pub fn reason(&self) -> String {
        match self {
            Self::Composition(m)
            | Self::Layout(m)
            | Self::Measurement(m)
            | Self::Export(m)
            | Self::Config(m) => m.clone(),
            Self::Io(e) => e.to_string(),
        }
    }

    /// Creates a composition error.
    pub fn composition(message: impl Into<String>) -> Self {
        Self::Composition(message.into())
    }

    /// Creates a layout error.
    pub fn layout(message: impl Into<String>) -> Self {
        Self::Layout(message.into())
    }

    /// Creates a measurement error.
    pub fn measurement(message: impl Into<String>) -> Self {
        Self::Measurement(message.into())
    }

    /// Creates an export error.
    pub fn export(message: impl Into<String>) -> Self {
        Self::Export(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = SynthesisError::composition("unknown direction tag 'X'");
        assert_eq!(
            format!("{err}"),
            "composition error: unknown direction tag 'X'"
        );
    }

    #[test]
    fn phase_names() {
        assert_eq!(SynthesisError::layout("x").phase(), "layout");
        assert_eq!(SynthesisError::measurement("x").phase(), "measurement");
        assert_eq!(SynthesisError::export("x").phase(), "export");
        assert_eq!(SynthesisError::Config("x".into()).phase(), "configuration");
    }

    #[test]
    fn reason_drops_prefix() {
        assert_eq!(SynthesisError::export("no delay").reason(), "no delay");
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SynthesisError = io_err.into();
        assert_eq!(err.phase(), "i/o");
        assert!(format!("{err}").starts_with("i/o error:"));
    }

    #[test]
    fn err_path_propagates() {
        fn inner() -> SynthResult<u32> {
            Err(SynthesisError::layout("zero inputs"))
        }
        fn outer() -> SynthResult<u32> {
            let v = inner()?;
            Ok(v + 1)
        }
        assert!(matches!(outer(), Err(SynthesisError::Layout(_))));
    }
}
