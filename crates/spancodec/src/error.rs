use thiserror::Error;

use crate::codec::Encoding;

/// Result type for internal codec operations (without decode context).
pub type Result<T> = std::result::Result<T, Error>;

/// Why a span payload was rejected.
///
/// The `Display` output of each variant is logged verbatim by collectors,
/// so the wording is kept stable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A length prefix points past the end of the input.
    #[error("Truncated: length {declared} > bytes available {available}")]
    Truncated { declared: u64, available: usize },

    /// The bytes cannot be interpreted as the expected structure at all.
    #[error("Malformed{}", .0.as_ref().map(|d| format!(": {d}")).unwrap_or_default())]
    Malformed(Option<String>),

    /// A value violates a format constraint (bad ID, missing field, etc).
    #[error("{0}")]
    InvalidFormat(String),
}

impl Error {
    pub(crate) fn truncated(declared: u64, available: usize) -> Self {
        Error::Truncated {
            declared,
            available,
        }
    }

    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Error::Malformed(Some(detail.into()))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidFormat(msg.into())
    }

    /// Attaches what was being read, and in which encoding.
    pub(crate) fn reading(self, target: &'static str, encoding: Encoding) -> DecodeError {
        DecodeError {
            target,
            encoding,
            source: self,
        }
    }
}

/// Error wrapper with decode context (target type + encoding).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source} reading {target} from {encoding}")]
pub struct DecodeError {
    /// What was being decoded, `Span` or `List<Span>`.
    pub target: &'static str,
    pub encoding: Encoding,
    #[source]
    pub source: Error,
}

impl DecodeError {
    pub fn kind(&self) -> &Error {
        &self.source
    }
}

/// A configured codec name that isn't recognized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown encoding {0:?}")]
pub struct UnknownEncoding(pub String);
