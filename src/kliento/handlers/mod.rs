pub mod health;
pub use self::health::health;

pub mod signup;
pub use self::signup::signup;

pub mod signin;
pub use self::signin::signin;

pub mod profile;
pub use self::profile::profile;

pub mod update;
pub use self::update::update;

pub mod logout;
pub use self::logout::logout;

// common response envelope, error taxonomy and field validation
use axum::response::Json;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Uniform response shape: `{success, message, data?}`. Every account
/// handler answers 200 with this envelope; failures of any kind surface as
/// `success: false` plus a message.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn ok_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Failure classes behind the envelope. Business-rule violations are final;
/// `Store` and `Session` cover collaborator failures that may clear up on
/// retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    AccountNotValid,
    InvalidCredentials,
    NotFound,
    UpdateFailed,
    Store,
    Session,
}

/// Handler failure: a kind for callers that branch, a human-readable message
/// for the envelope.
#[derive(Debug)]
pub struct HandlerError {
    kind: ErrorKind,
    message: String,
}

impl HandlerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Collaborator failure: the message is forwarded verbatim.
    #[must_use]
    pub fn store(err: anyhow::Error) -> Self {
        Self::new(ErrorKind::Store, err.to_string())
    }

    /// Token-issuer failure: the message is forwarded verbatim.
    #[must_use]
    pub fn session(err: anyhow::Error) -> Self {
        Self::new(ErrorKind::Session, err.to_string())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Store | ErrorKind::Session)
    }
}

/// Fold a handler outcome into the wire envelope. Collaborator failures are
/// logged; business failures are the caller's answer and stay quiet.
pub(crate) fn respond<T>(result: Result<Envelope<T>, HandlerError>) -> Json<Envelope<T>> {
    match result {
        Ok(envelope) => Json(envelope),
        Err(err) => {
            if err.retryable() {
                error!("Handler failed: {}", err.message());
            }
            Json(Envelope::fail(err.message()))
        }
    }
}

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

pub fn valid_phone(phone: &str) -> bool {
    Regex::new(r"^\+?[0-9][0-9 ()-]{5,18}$").is_ok_and(|re| re.is_match(phone))
}

pub fn valid_password(password: &str) -> bool {
    password.len() >= 8
}

/// Trim an optional field; empty strings count as absent.
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_absent_data() {
        let envelope = Envelope::<String>::fail("nope");
        let json = serde_json::to_value(envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "message": "nope" })
        );
    }

    #[test]
    fn envelope_carries_data_on_success() {
        let envelope = Envelope::ok("success", "token".to_string());
        let json = serde_json::to_value(envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": true, "message": "success", "data": "token" })
        );
    }

    #[test]
    fn business_errors_are_not_retryable() {
        let err = HandlerError::new(ErrorKind::Conflict, "a@b.tld already exists");
        assert!(!err.retryable());
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.message(), "a@b.tld already exists");
    }

    #[test]
    fn collaborator_errors_are_retryable() {
        assert!(HandlerError::store(anyhow::anyhow!("pool timed out")).retryable());
        assert!(HandlerError::session(anyhow::anyhow!("bad key")).retryable());
    }

    #[test]
    fn respond_folds_errors_into_envelope() {
        let result: Result<Envelope<String>, HandlerError> =
            Err(HandlerError::new(ErrorKind::NotFound, "Invalid Account"));
        let Json(envelope) = respond(result);
        assert!(!envelope.success);
        assert_eq!(envelope.message, "Invalid Account");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn email_validation() {
        assert!(valid_email("user@example.com"));
        assert!(valid_email("a.b+c@sub.domain.tld"));
        assert!(!valid_email("user@localhost"));
        assert!(!valid_email("not an email"));
        assert!(!valid_email(""));
    }

    #[test]
    fn phone_validation() {
        assert!(valid_phone("+15551234567"));
        assert!(valid_phone("0171 234 5678"));
        assert!(!valid_phone("nope"));
        assert!(!valid_phone("+1"));
    }

    #[test]
    fn password_validation() {
        assert!(valid_password("long enough"));
        assert!(!valid_password("short"));
    }

    #[test]
    fn normalize_optional_drops_blank_fields() {
        assert_eq!(normalize_optional(None), None);
        assert_eq!(normalize_optional(Some("  ".to_string())), None);
        assert_eq!(
            normalize_optional(Some(" X ".to_string())),
            Some("X".to_string())
        );
    }
}
