//! Error types.
//!
//! Two families live here and they never mix:
//!
//! - [`Error`] is what handlers and middleware return. Handlers classify
//!   failures from their collaborators into one of its variants at the call
//!   site; the [`Errors`](crate::middleware::Errors) middleware only renders
//!   whatever variant it receives.
//! - [`ServerError`] surfaces infrastructure failures: binding a port,
//!   registering a conflicting route, reading configuration.

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

// ── Field errors ──────────────────────────────────────────────────────────────

/// One failing field of a request payload.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

/// Every failing field of a request payload, in the order they were checked.
///
/// Serializes as a plain JSON array of [`FieldError`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, field: impl Into<String>, error: impl Into<String>) {
        self.0.push(FieldError { field: field.into(), error: error.into() });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// `Ok(())` when nothing failed, otherwise [`Error::Validation`].
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() { Ok(()) } else { Err(Error::Validation(self)) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, fe) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", fe.field, fe.error)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a FieldErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<FieldError> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ── Request errors ────────────────────────────────────────────────────────────

/// The error a handler returns.
///
/// | Variant | Status | Client sees |
/// |---|---|---|
/// | `Validation` | 400 | `"data validation error"` plus every field |
/// | `NotFound` | 404 | the message |
/// | `InvalidId` | 400 | the message |
/// | `Request` | its own | the message |
/// | `Unexpected` | 500 | the generic reason phrase only |
/// | `Shutdown` | none | the server begins a graceful shutdown |
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("data validation error: {0}")]
    Validation(FieldErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidId(String),

    /// A trusted error whose message is safe to show the client.
    #[error("{message}")]
    Request { status: StatusCode, message: String },

    #[error("{0}")]
    Unexpected(String),

    /// The process can no longer serve requests.
    #[error("shutdown requested: {reason}")]
    Shutdown { reason: String },
}

impl Error {
    pub fn request(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Request { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::request(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId(message.into())
    }

    pub fn unexpected(err: impl fmt::Display) -> Self {
        Self::Unexpected(err.to_string())
    }

    pub fn shutdown(reason: impl Into<String>) -> Self {
        Self::Shutdown { reason: reason.into() }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown { .. })
    }

    /// The status this error renders with.
    ///
    /// A validation error without any field is a bug in the caller and is
    /// reported as a server error rather than an empty list.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(fields) if !fields.is_empty() => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidId(_) => StatusCode::BAD_REQUEST,
            Self::Request { status, .. } => *status,
            Self::Validation(_) | Self::Unexpected(_) | Self::Shutdown { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<FieldErrors> for Error {
    fn from(fields: FieldErrors) -> Self {
        Self::Validation(fields)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Unexpected(format!("json: {e}"))
    }
}

// ── Infrastructure errors ─────────────────────────────────────────────────────

/// The error type returned by taproom's fallible setup and serving operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid route `{path}`: {source}")]
    Route {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("config: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_with_fields_is_a_client_error() {
        let mut fields = FieldErrors::new();
        fields.push("name", "name is a required field");
        fields.push("abv", "abv is a required field");

        let err = Error::from(fields);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "data validation error: name: name is a required field; abv: abv is a required field"
        );
    }

    #[test]
    fn empty_validation_is_a_server_error() {
        assert_eq!(Error::Validation(FieldErrors::new()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(Error::not_found("beer not found").status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::invalid_id("bad id").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::request(StatusCode::CONFLICT, "dup").status(), StatusCode::CONFLICT);
        assert_eq!(Error::unexpected("db down").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(Error::shutdown("integrity").is_shutdown());
        assert!(!Error::unexpected("x").is_shutdown());
    }

    #[test]
    fn into_result() {
        assert!(FieldErrors::new().into_result().is_ok());

        let mut fields = FieldErrors::new();
        fields.push("size", "must be a number");
        assert!(matches!(fields.into_result(), Err(Error::Validation(f)) if f.len() == 1));
    }

    #[test]
    fn field_errors_serialize_as_array() {
        let mut fields = FieldErrors::new();
        fields.push("user_id", "user_id must be a valid UUID");
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"[{"field":"user_id","error":"user_id must be a valid UUID"}]"#);
    }
}
