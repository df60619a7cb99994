//! Error types.
//!
//! Internally we use `anyhow` (`Res`) and add context as errors bubble up. At the public boundary
//! (commands and the library API) errors are converted into `Error`, which carries an `ErrorType`
//! so that callers can tell a rate limit apart from a missing login or a bad input.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Result type used internally.
pub(crate) type Res<T> = anyhow::Result<T>;

/// Result type of the public API.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of failures.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// There is no signed-in session. Never retried.
    NotAuthenticated,
    /// The row store rejected a call because of rate limiting.
    RateLimited,
    /// The requested table (sheet tab) does not exist.
    TableMissing,
    /// Input was rejected, or an operation was called in the wrong state.
    Validation,
    /// Another operation on the same resource is already in flight.
    Conflict,
    /// The configuration or home directory is missing or invalid.
    Config,
    /// Any other failure reported by the row store.
    Sheet,
    /// Anything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

impl ErrorType {
    /// Searches the chain of `e` for a classified `Error` and returns its type.
    pub fn of(e: &anyhow::Error) -> Option<ErrorType> {
        e.chain()
            .find_map(|cause| cause.downcast_ref::<Error>())
            .map(|found| found.error_type())
    }

    /// Creates an `anyhow::Error` that carries this classification.
    pub(crate) fn err(self, message: impl Display) -> anyhow::Error {
        anyhow::Error::new(Error::new(self, anyhow::anyhow!("{message}")))
    }
}

/// The public error type.
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, inner: anyhow::Error) -> Self {
        Self { error_type, inner }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {:?}", self.error_type, self.inner)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        let error_type = ErrorType::of(&e).unwrap_or(ErrorType::Internal);
        Error::new(error_type, e)
    }
}

/// Converts an internal `Res` into a public `Result`.
pub(crate) trait IntoResult<T> {
    /// Uses the classification already present in the error chain, if any, otherwise
    /// `error_type`.
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T> IntoResult<T> for Res<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| {
            let found = ErrorType::of(&e).unwrap_or(error_type);
            Error::new(found, e)
        })
    }
}
