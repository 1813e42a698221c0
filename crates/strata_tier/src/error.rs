// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

use std::fmt;

/// The category of a cache [`Error`].
///
/// The category is what callers branch on: a [`Miss`](ErrorKind::Miss) means "not found",
/// every other kind is a failure of some component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The key is not present.
    Miss,
    /// A cache backend failed (connectivity, timeout, protocol).
    Backend,
    /// A value could not be encoded or decoded.
    Codec,
    /// The caller-supplied compute function failed.
    Compute,
    /// The shared compute for a key panicked.
    Panicked,
}

impl ErrorKind {
    /// Returns the kind as a static string, suitable for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Miss => "miss",
            Self::Backend => "backend failure",
            Self::Codec => "codec failure",
            Self::Compute => "compute failure",
            Self::Panicked => "compute panicked",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a cache operation.
///
/// Every error carries an [`ErrorKind`] and, except for misses, usually the underlying cause.
/// The cause is never hidden: it is reachable through [`std::error::Error::source()`] and
/// [`ohno::ErrorExt::find_source`].
///
/// Errors are cheap to clone so that one failure can be handed to every caller that was
/// waiting on the same computation.
///
/// # Examples
///
/// ```
/// use strata_tier::{Error, ErrorKind};
///
/// let miss = Error::miss();
/// assert!(miss.is_miss());
///
/// let failure = Error::backend("connection refused");
/// assert_eq!(failure.kind(), ErrorKind::Backend);
/// assert!(!failure.is_miss());
/// ```
#[ohno::error]
#[display("cache {kind}")]
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Creates the miss signal: the key is not present.
    #[must_use]
    pub fn miss() -> Self {
        Self::new(ErrorKind::Miss)
    }

    /// Creates a backend failure caused by `cause`.
    pub fn backend(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Backend, cause)
    }

    /// Creates an encode/decode failure caused by `cause`.
    pub fn codec(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Codec, cause)
    }

    /// Creates a compute failure caused by `cause`.
    ///
    /// Compute functions may return any [`Error`]; this constructor is a convenience for
    /// wrapping errors coming from the origin.
    pub fn compute(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Compute, cause)
    }

    /// Creates an error reporting that a shared computation panicked.
    pub fn panicked(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Panicked, cause)
    }

    /// Creates a backend failure from any message or error.
    ///
    /// This is the public API for creating cache errors from external crates.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::backend(cause)
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if this error is the miss signal.
    #[must_use]
    pub fn is_miss(&self) -> bool {
        self.kind == ErrorKind::Miss
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
