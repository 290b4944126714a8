/// Error handling for the Markdown engine.
///
/// All fallible operations in the crate return [`Result`], and malformed
/// Markdown never produces an error by itself: unparseable constructs fall
/// back to literal text. Errors are reserved for genuine contract
/// violations (directives, plugins) and serialization failures.
use thiserror::Error;

/// Main error type for the engine.
#[derive(Debug, Error)]
pub enum MarklyError {
    /// Parsing errors (invalid or unexpected input in strict contexts).
    #[error("{}:{line}:{column}: {message}", source_file.as_deref().unwrap_or("<input>"))]
    Parse {
        message: String,
        line: usize,
        column: usize,
        source_file: Option<String>,
    },

    /// A directive's structural contract was violated.
    #[error("{}:{line}: directive '{directive}': {message}", source_file.as_deref().unwrap_or("<input>"))]
    DirectiveContract {
        directive: String,
        message: String,
        line: usize,
        source_file: Option<String>,
    },

    /// A plugin failed to register or process content.
    #[error("plugin '{plugin}': {message}")]
    Plugin { plugin: String, message: String },

    /// AST serialization/deserialization errors.
    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// Deserialized data did not describe a valid document.
    #[error("invalid serialized document: {message}")]
    InvalidDocument { message: String },
}

/// Convenience type alias for Results in the engine.
pub type Result<T> = std::result::Result<T, MarklyError>;

impl MarklyError {
    /// Creates a parse error with location information.
    pub fn parse(
        message: impl Into<String>,
        line: usize,
        column: usize,
        source_file: Option<&str>,
    ) -> Self {
        MarklyError::Parse {
            message: message.into(),
            line,
            column,
            source_file: source_file.map(str::to_owned),
        }
    }

    /// Creates a directive contract violation error.
    pub fn directive_contract(
        directive: impl Into<String>,
        message: impl Into<String>,
        line: usize,
    ) -> Self {
        MarklyError::DirectiveContract {
            directive: directive.into(),
            message: message.into(),
            line,
            source_file: None,
        }
    }

    /// Attaches a source file name to location-carrying errors.
    pub fn with_source_file(mut self, file: Option<&str>) -> Self {
        match &mut self {
            MarklyError::Parse { source_file, .. }
            | MarklyError::DirectiveContract { source_file, .. } => {
                if source_file.is_none() {
                    *source_file = file.map(str::to_owned);
                }
            }
            _ => {}
        }
        self
    }

    /// Creates a plugin error.
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        MarklyError::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Returns the 1-based source line associated with this error, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            MarklyError::Parse { line, .. } => Some(*line),
            MarklyError::DirectiveContract { line, .. } => Some(*line),
            _ => None,
        }
    }
}
