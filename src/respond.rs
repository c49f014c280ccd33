//! JSON responses.

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, FieldErrors};
use crate::response::Response;

/// Writes `value` as a JSON body with `status` and records the status in the
/// request's [`RequestValues`](crate::RequestValues).
///
/// `204 No Content` and `304 Not Modified` never carry a body; `value` is
/// ignored for them. Pass `&()` when there is nothing to send.
pub fn respond<T>(ctx: &Context, value: &T, status: StatusCode) -> Result<Response, Error>
where
    T: Serialize + ?Sized,
{
    ctx.values().set_status_code(status);

    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return Ok(Response::status(status));
    }

    let body = serde_json::to_vec(value)?;
    Ok(Response::builder().status(status).json(body))
}

/// Wire shape of every error body.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), fields: None }
    }
}

/// Renders `err` the way a client should see it.
///
/// Only trusted errors show their message; anything unexpected is reduced to
/// the status' reason phrase.
pub(crate) fn error_response(ctx: &Context, err: &Error) -> Response {
    let status = err.status();
    let body = match err {
        Error::Validation(fields) if !fields.is_empty() => ErrorResponse {
            error: "data validation error".to_owned(),
            fields: Some(fields.clone()),
        },
        Error::NotFound(msg) | Error::InvalidId(msg) => ErrorResponse::new(msg.as_str()),
        Error::Request { message, .. } => ErrorResponse::new(message.as_str()),
        _ => ErrorResponse::new(reason(status)),
    };
    status_response(ctx, status, &body)
}

/// Error body for requests that never reached a handler.
pub(crate) fn status_response(ctx: &Context, status: StatusCode, body: &ErrorResponse) -> Response {
    ctx.values().set_status_code(status);
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    Response::builder().status(status).json(bytes)
}

pub(crate) fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown Error")
}
