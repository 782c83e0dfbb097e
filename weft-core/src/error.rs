//! Error Types
//!
//! Every failure the core can surface lives here. Clamped writes have no
//! error type: constraint violations are applied silently (see
//! [`crate::engine::constraint`]) and never reach a caller.

use thiserror::Error;

/// A service (or a context collaborator) could not be resolved from any
/// enclosing scope.
///
/// This is a wiring mistake in the host application, not a runtime condition
/// to recover from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no service registered for `{name}` in this scope or any enclosing scope")]
pub struct ServiceNotFoundError {
    /// Name of the definition (or type) that was requested.
    pub name: String,
}

impl ServiceNotFoundError {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Failure reported by a data-fetch or mutation collaborator.
///
/// Engines catch these at their boundary and store the rendered message in
/// their `error` signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request never produced a response (network, transport, ...).
    #[error("request failed: {0}")]
    Request(String),

    /// The collaborator answered with a non-success status.
    #[error("server responded with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response could not be turned into items.
    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Bad input detected before any fetch is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`{field}` must not be empty")]
    EmptyIdentifier { field: &'static str },
}

/// Misuse of the reactive primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A computed evaluation attempted to write a signal.
    #[error("signal {signal} was written while a computed value was evaluating")]
    WriteInComputed { signal: u64 },
}

/// A page snapshot could not be encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("could not encode snapshot: {0}")]
    Encode(String),

    #[error("could not decode snapshot: {0}")]
    Decode(String),
}

/// Crate-wide error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    ServiceNotFound(#[from] ServiceNotFoundError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_messages_are_human_readable() {
        let err = FetchError::Status {
            status: 503,
            message: "catalog unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "server responded with status 503: catalog unavailable"
        );
        assert_eq!(FetchError::other("boom").to_string(), "boom");
    }

    #[test]
    fn errors_convert_into_crate_error() {
        let err: Error = ValidationError::EmptyIdentifier {
            field: "collection_id",
        }
        .into();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "`collection_id` must not be empty");

        let err: Error = ServiceNotFoundError::new("cart").into();
        assert!(err.to_string().contains("`cart`"));
    }
}
