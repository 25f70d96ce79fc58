//! Error types for the hostabi passes

use thiserror::Error;

/// Errors raised by the IR containers, the pass runner, the passes and the interpreter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Configuration errors
    /// Only half of the tempRet0 getter/setter pair exists
    ///
    /// **Triggered by:** importing (or exporting) `getTempRet0` without `setTempRet0`, or
    /// the reverse. The getter cannot be trusted to observe the setter's writes.
    /// **Prevention:** provide both helpers or neither
    #[error("cannot handle partial tempRet0 {origin}: found {present} without {missing}")]
    PartialTempRet0 {
        /// Where the lone helper was found ("imports" or "exports")
        origin: &'static str,
        /// Name of the helper that was found
        present: String,
        /// Name of the helper that is missing
        missing: String,
    },

    /// A pass argument could not be interpreted
    ///
    /// **Triggered by:** `emscripten-sbrk-ptr=abc`
    #[error("Invalid argument {name}={value:?}: {reason}")]
    InvalidArgument {
        /// Argument name
        name: String,
        /// Raw argument value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Pass options file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    // Module container errors
    /// A second entity with an existing name was added
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName {
        /// Entity kind (function, type, global, export)
        kind: &'static str,
        /// The colliding name
        name: String,
    },

    /// Reference to a function the module does not contain
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Pass name not present in the registry
    #[error("Unknown pass: {0}")]
    UnknownPass(String),

    /// Worker pool could not be created
    #[error("Failed to create thread pool: {0}")]
    ThreadPool(String),

    // Interpreter errors
    /// Execution trapped
    #[error("Trap: {0}")]
    Trap(String),

    /// No host function was registered for an import
    #[error("Unresolved import: {module}.{base}")]
    UnresolvedImport {
        /// Import module name
        module: String,
        /// Import base name
        base: String,
    },
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Compilation must stop
    Fatal,
    /// The caller may fix its input and try again
    Recoverable,
    /// Informational
    Warning,
}

impl Error {
    /// Create a trap with a message
    pub fn trap(msg: impl Into<String>) -> Self {
        Error::Trap(msg.into())
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::PartialTempRet0 { .. } => ErrorSeverity::Fatal,
            Error::DuplicateName { .. } => ErrorSeverity::Fatal,
            Error::ThreadPool(_) => ErrorSeverity::Fatal,

            Error::InvalidArgument { .. } => ErrorSeverity::Recoverable,
            Error::Config(_) => ErrorSeverity::Recoverable,
            Error::UnknownPass(_) => ErrorSeverity::Recoverable,
            Error::UnresolvedImport { .. } => ErrorSeverity::Recoverable,

            Error::UnknownFunction(_) | Error::Trap(_) => ErrorSeverity::Warning,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type for hostabi operations
pub type Result<T> = std::result::Result<T, Error>;
