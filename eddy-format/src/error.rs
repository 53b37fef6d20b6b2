//! Error types for the serialization engine.

use core::fmt::{self, Display};

use eddy_core::ConfigError;

/// Result alias used throughout the engine.
pub type Result<T> = core::result::Result<T, Error>;

/// Error raised during serialization or deserialization.
///
/// Errors surfaced from inside a value graph carry the path to the failing
/// site (for example `$.Orders[2].Customer`); the path is attached once by
/// the outermost dispatch layer.
#[derive(Debug)]
pub struct Error {
    /// The specific kind of error.
    pub kind: ErrorKind,
    /// Path from the root to the failing value, when known.
    pub path: Option<String>,
}

impl Error {
    /// Create an error without path information.
    pub const fn new(kind: ErrorKind) -> Self {
        Error { kind, path: None }
    }

    /// Attach a path, keeping an already-attached one. Inner dispatch
    /// levels know the deeper path, so first write wins.
    pub fn with_path(mut self, path: String) -> Self {
        if self.path.is_none() {
            self.path = Some(path);
        }
        self
    }

    /// Stable short code for this error kind.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} (at {path})", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::new(ErrorKind::Config(err))
    }
}

/// Specific error kinds for serialization and deserialization.
#[derive(Debug)]
pub enum ErrorKind {
    /// A token of an unexpected kind was read.
    UnexpectedToken {
        /// The token that was found.
        got: &'static str,
        /// What was expected instead.
        expected: &'static str,
    },
    /// Input ended while a document was still open.
    UnexpectedEof {
        /// What was expected before end of input.
        expected: &'static str,
    },
    /// Malformed input at the token level.
    Syntax {
        /// Description of the malformation.
        message: String,
    },
    /// A value's runtime kind does not fit the declared type.
    TypeMismatch {
        /// The expected kind.
        expected: &'static str,
        /// The actual kind found.
        got: &'static str,
    },
    /// A discriminator id read off the wire matches no known type.
    UnknownDiscriminator {
        /// The unrecognized id.
        id: String,
    },
    /// The discriminator property carried a non-string value.
    InvalidDiscriminator {
        /// The kind of value actually found.
        got: &'static str,
    },
    /// Two interface branches claim the runtime type for different known
    /// types, and an instance of that type was actually serialized.
    ConflictingDiscriminator {
        /// The runtime type's name.
        runtime: String,
        /// First claiming known type.
        first: String,
        /// The disagreeing known type.
        second: String,
    },
    /// Nesting exceeded the configured depth limit.
    DepthLimitExceeded {
        /// The configured limit.
        limit: usize,
    },
    /// A converter returned with the cursor at the wrong depth.
    ConverterDepthMismatch {
        /// The type whose converter misbehaved.
        ty: String,
    },
    /// Reference metadata (`$id`/`$ref`/`$values`) was malformed or used
    /// where it cannot be honored.
    RefMetadata {
        /// Description of the problem.
        message: String,
    },
    /// A `$ref` names an id that has not been seen.
    UnknownReference {
        /// The dangling reference id.
        id: String,
    },
    /// One or more stream sources failed to dispose. Every failure is
    /// kept.
    Disposal(Vec<String>),
    /// Cancellation was requested and honored at a fetch boundary.
    Cancelled,
    /// A fully-buffered operation encountered a source that suspended.
    PendingSource,
    /// Configuration fault surfaced during an operation.
    Config(ConfigError),
    /// I/O error from the output sink.
    Io(String),
}

impl ErrorKind {
    /// Stable short code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedToken { .. } => "unexpected_token",
            ErrorKind::UnexpectedEof { .. } => "unexpected_eof",
            ErrorKind::Syntax { .. } => "syntax",
            ErrorKind::TypeMismatch { .. } => "type_mismatch",
            ErrorKind::UnknownDiscriminator { .. } => "unknown_discriminator",
            ErrorKind::InvalidDiscriminator { .. } => "invalid_discriminator",
            ErrorKind::ConflictingDiscriminator { .. } => "conflicting_discriminator",
            ErrorKind::DepthLimitExceeded { .. } => "depth_limit_exceeded",
            ErrorKind::ConverterDepthMismatch { .. } => "converter_depth_mismatch",
            ErrorKind::RefMetadata { .. } => "ref_metadata",
            ErrorKind::UnknownReference { .. } => "unknown_reference",
            ErrorKind::Disposal(_) => "disposal",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::PendingSource => "pending_source",
            ErrorKind::Config(_) => "config",
            ErrorKind::Io(_) => "io",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnexpectedToken { got, expected } => {
                write!(f, "unexpected {got}, expected {expected}")
            }
            ErrorKind::UnexpectedEof { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            ErrorKind::Syntax { message } => write!(f, "syntax error: {message}"),
            ErrorKind::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, got {got}")
            }
            ErrorKind::UnknownDiscriminator { id } => {
                write!(f, "unknown type discriminator `{id}`")
            }
            ErrorKind::InvalidDiscriminator { got } => {
                write!(f, "type discriminator must be a string, got {got}")
            }
            ErrorKind::ConflictingDiscriminator {
                runtime,
                first,
                second,
            } => {
                write!(
                    f,
                    "runtime type `{runtime}` is claimed by both `{first}` and `{second}`"
                )
            }
            ErrorKind::DepthLimitExceeded { limit } => {
                write!(f, "maximum nesting depth of {limit} exceeded")
            }
            ErrorKind::ConverterDepthMismatch { ty } => {
                write!(f, "converter for `{ty}` left the document unbalanced")
            }
            ErrorKind::RefMetadata { message } => {
                write!(f, "reference metadata error: {message}")
            }
            ErrorKind::UnknownReference { id } => {
                write!(f, "reference to unknown id `{id}`")
            }
            ErrorKind::Disposal(messages) => {
                write!(f, "stream disposal failed: {}", messages.join("; "))
            }
            ErrorKind::Cancelled => write!(f, "operation cancelled"),
            ErrorKind::PendingSource => {
                write!(
                    f,
                    "a stream source suspended during a fully-buffered operation"
                )
            }
            ErrorKind::Config(err) => write!(f, "{err}"),
            ErrorKind::Io(message) => write!(f, "i/o error: {message}"),
        }
    }
}
