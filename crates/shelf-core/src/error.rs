use std::{any::Any, error::Error as StdError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred. Please try again.";
const UNREACHABLE_MESSAGE: &str = "Could not reach the server. Check your connection and retry.";
const MALFORMED_MESSAGE: &str = "The server sent a response that could not be read.";
const SYSTEM_PROBLEM_MESSAGE: &str =
    "A system problem occurred. Please wait a moment and try again.";

/// Failure taxonomy shared by every feature action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport failure, or a response with a status outside the handled classes.
    Network,
    /// Authentication/authorization failure (401/403).
    Auth,
    /// Input rejected by the server (422).
    Validation,
    /// Server-side failure (5xx).
    ServerFault,
    /// Anything that did not come from the remote call surface.
    Unknown,
}

/// Classified failure handed to feature components.
///
/// Only built by [`classify_error`] and [`classify_value`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
#[non_exhaustive]
pub struct DomainError {
    /// Human-readable message, never empty.
    pub message: String,
    /// Taxonomy bucket.
    pub kind: ErrorKind,
    /// HTTP status when the failure carried one.
    pub status_code: Option<u16>,
    /// Debug rendering of the original failure.
    pub cause: Option<String>,
}

impl DomainError {
    fn new(kind: ErrorKind, message: impl Into<String>, status_code: Option<u16>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            UNEXPECTED_MESSAGE.to_owned()
        } else {
            message
        };
        Self {
            message,
            kind,
            status_code,
            cause: None,
        }
    }

    fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

/// HTTP failure as reported by the remote call surface.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("request failed with HTTP status {status}")]
pub struct HttpError {
    /// Response status code.
    pub status: u16,
    /// Decoded JSON body, when the server sent one.
    pub body: Option<Value>,
}

impl HttpError {
    /// Build an error carrying only a status.
    pub fn new(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Attach the decoded response body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Server-supplied `message` field, if present and non-blank.
    pub fn server_message(&self) -> Option<&str> {
        self.body
            .as_ref()?
            .get("message")?
            .as_str()
            .map(str::trim)
            .filter(|msg| !msg.is_empty())
    }

    /// First string found under the `errors` field.
    ///
    /// Accepts both `{"errors": {"field": ["msg"]}}` and `{"errors": ["msg"]}` shapes.
    pub fn first_validation_error(&self) -> Option<&str> {
        let errors = self.body.as_ref()?.get("errors")?;
        let candidates: Box<dyn Iterator<Item = &Value> + '_> = match errors {
            Value::Object(fields) => Box::new(fields.values()),
            Value::Array(items) => Box::new(items.iter()),
            _ => return None,
        };
        candidates
            .flat_map(|value| match value {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|msg| !msg.is_empty())
    }
}

/// Failures produced by the remote call surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    /// The server answered with an error status.
    #[error(transparent)]
    Http(#[from] HttpError),
    /// The request never produced a response.
    #[error("request did not complete: {0}")]
    Transport(String),
    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Shorthand for a status-only HTTP failure.
    pub fn status(status: u16) -> Self {
        Self::Http(HttpError::new(status))
    }
}

/// Map HTTP status codes to error kinds.
pub fn classify_http_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Auth,
        422 => ErrorKind::Validation,
        500.. => ErrorKind::ServerFault,
        _ => ErrorKind::Network,
    }
}

/// Default sentence shown for a status when the server sent no usable message.
pub fn default_status_message(status: u16) -> String {
    match status {
        400 => "The request could not be processed.".to_owned(),
        401 => "Please sign in to continue.".to_owned(),
        403 => "You do not have permission to do that.".to_owned(),
        404 => "The requested item could not be found.".to_owned(),
        408 => "The request timed out. Please try again.".to_owned(),
        409 => "The item was changed elsewhere. Reload and try again.".to_owned(),
        419 => "Your session has expired. Please sign in again.".to_owned(),
        422 => "Some of the entered values are invalid.".to_owned(),
        429 => "Too many requests. Please wait a moment.".to_owned(),
        500.. => SYSTEM_PROBLEM_MESSAGE.to_owned(),
        other => format!("The request failed (status {other})."),
    }
}

/// Classify any error value into a [`DomainError`].
///
/// Walks the `source()` chain looking for a [`RemoteError`] or [`HttpError`]; anything else is
/// `Unknown` and keeps its own message.
pub fn classify_error(err: &(dyn StdError + 'static)) -> DomainError {
    let mut current = Some(err);
    while let Some(candidate) = current {
        if let Some(remote) = candidate.downcast_ref::<RemoteError>() {
            return classify_remote(remote).with_cause(format!("{err:?}"));
        }
        if let Some(http) = candidate.downcast_ref::<HttpError>() {
            return classify_http(http).with_cause(format!("{err:?}"));
        }
        if let Some(domain) = candidate.downcast_ref::<DomainError>() {
            return domain.clone();
        }
        current = candidate.source();
    }

    DomainError::new(ErrorKind::Unknown, err.to_string(), None).with_cause(format!("{err:?}"))
}

/// Classify an arbitrary value, including values that are not errors at all
/// (for example a panic payload).
pub fn classify_value(value: &(dyn Any + Send)) -> DomainError {
    if let Some(domain) = value.downcast_ref::<DomainError>() {
        return domain.clone();
    }
    if let Some(remote) = value.downcast_ref::<RemoteError>() {
        return classify_error(remote);
    }
    if let Some(http) = value.downcast_ref::<HttpError>() {
        return classify_error(http);
    }
    if let Some(boxed) = value.downcast_ref::<Box<dyn StdError + Send + Sync>>() {
        return classify_error(&**boxed);
    }
    if let Some(text) = value.downcast_ref::<String>() {
        return DomainError::new(ErrorKind::Unknown, text.clone(), None).with_cause(text.clone());
    }
    if let Some(text) = value.downcast_ref::<&'static str>() {
        return DomainError::new(ErrorKind::Unknown, *text, None).with_cause(*text);
    }

    DomainError::new(ErrorKind::Unknown, UNEXPECTED_MESSAGE, None)
}

fn classify_remote(remote: &RemoteError) -> DomainError {
    match remote {
        RemoteError::Http(http) => classify_http(http),
        RemoteError::Transport(_) => DomainError::new(ErrorKind::Network, UNREACHABLE_MESSAGE, None),
        RemoteError::Decode(_) => DomainError::new(ErrorKind::Network, MALFORMED_MESSAGE, None),
    }
}

fn classify_http(http: &HttpError) -> DomainError {
    let message = http
        .server_message()
        .or_else(|| http.first_validation_error())
        .map(str::to_owned)
        .unwrap_or_else(|| default_status_message(http.status));
    DomainError::new(classify_http_status(http.status), message, Some(http.status))
}

/// How loudly a failure should be shown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    /// Non-blocking hint next to the triggering control.
    Warning,
    /// Error banner/toast.
    Error,
}

/// User-facing rendering of a [`DomainError`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Presentation {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

/// Map a classified error to what the user sees.
///
/// Server faults get a generic message; the server's own text never reaches the UI.
pub fn present_error(error: &DomainError) -> Presentation {
    let (title, message, severity) = match error.kind {
        ErrorKind::Auth => ("Sign-in required", error.message.clone(), Severity::Warning),
        ErrorKind::Validation => ("Check your input", error.message.clone(), Severity::Warning),
        ErrorKind::ServerFault => (
            "System problem",
            SYSTEM_PROBLEM_MESSAGE.to_owned(),
            Severity::Error,
        ),
        ErrorKind::Network => ("Connection problem", error.message.clone(), Severity::Error),
        ErrorKind::Unknown => ("Something went wrong", error.message.clone(), Severity::Error),
    };

    Presentation {
        title: title.to_owned(),
        message,
        severity,
    }
}
