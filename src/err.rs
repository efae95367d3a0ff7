#![allow(non_snake_case)]

use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

use crate::store::StoreError;

pub async fn handler404(path: Uri) -> Maybe<()> {
    Nothing(Error::NotFound {
        message: format!("Invalid path: {}", path),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Maybe<T> {
    Nothing(Failure),
    Fine(Success<T>),
}

pub fn Fine<V>(v: V) -> Maybe<V>
where
    V: Serialize,
{
    Maybe::Fine(Success::of(v))
}

pub fn Nothing<V>(err: Error) -> Maybe<V> {
    Maybe::Nothing(Failure::of(err))
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

/// Failure envelope. `retryable` tells the client whether sending the same
/// request again can succeed.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    success: bool,
    retryable: bool,
    #[serde(flatten)]
    error: Error,
}

impl Failure {
    pub fn of(error: Error) -> Self {
        Self {
            success: false,
            retryable: error.is_retryable(),
            error,
        }
    }
}

impl<T> IntoResponse for Maybe<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        match self {
            Maybe::Nothing(failure) => {
                (failure.error.status(), Json(failure)).into_response()
            }
            Maybe::Fine(success) => Json::into_response(Json(success)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    /// Scanned payload is not a well-formed session descriptor.
    Malformed { message: String },
    /// Scanned descriptor claims an expiry that already passed.
    Expired { message: String },
    /// The store has no live session code matching the request.
    CodeInvalidOrExpired { message: String },
    AlreadyMarked { message: String },
    SubjectNotFound { message: String },
    Unauthenticated { message: String },
    Forbidden { message: String },
    StoreUnavailable { message: String },
    InvalidPayload { message: String },
    UserAlreadyExists { message: String },
    UserDoesNotExist { message: String },
    AuthenticationFailure { message: String },
    NotFound { message: String },
    InternalError { kind: &'static str, message: String },
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        Nothing::<()>(self).into_response()
    }
}

impl Error {
    pub fn malformed<S: Into<String>>(detail: S) -> Error {
        Error::Malformed {
            message: format!("Invalid QR code format: {}", detail.into()),
        }
    }

    pub fn expired() -> Error {
        Error::Expired {
            message: "QR code has expired".to_string(),
        }
    }

    pub fn code_invalid_or_expired() -> Error {
        Error::CodeInvalidOrExpired {
            message: "This class code is no longer valid. Ask your instructor for a new one."
                .to_string(),
        }
    }

    pub fn already_marked() -> Error {
        Error::AlreadyMarked {
            message: "Attendance already marked for this class".to_string(),
        }
    }

    pub fn subject_not_found() -> Error {
        Error::SubjectNotFound {
            message: "Selected subject does not exist".to_string(),
        }
    }

    pub fn unauthenticated() -> Error {
        Error::Unauthenticated {
            message: "You are not signed in, or your session has expired".to_string(),
        }
    }

    pub fn forbidden<S: Into<String>>(action: S) -> Error {
        Error::Forbidden {
            message: format!("Your role may not {}", action.into()),
        }
    }

    pub fn store_unavailable() -> Error {
        Error::StoreUnavailable {
            message: "Attendance service is temporarily unavailable, please try again"
                .to_string(),
        }
    }

    pub fn invalid_payload<S: Into<String>>(message: S) -> Error {
        Error::InvalidPayload {
            message: message.into(),
        }
    }

    /// Only transport/storage faults are worth repeating as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable { .. })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Malformed { .. } | Error::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Error::Expired { .. } | Error::CodeInvalidOrExpired { .. } => StatusCode::GONE,
            Error::AlreadyMarked { .. } | Error::UserAlreadyExists { .. } => StatusCode::CONFLICT,
            Error::SubjectNotFound { .. }
            | Error::UserDoesNotExist { .. }
            | Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Unauthenticated { .. } | Error::AuthenticationFailure { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => {
                log::error!("Session store failure: {}", reason);
                Error::store_unavailable()
            }
            StoreError::Duplicate => Error::InternalError {
                kind: "DatabaseError",
                message: "Unexpected duplicate row".to_string(),
            },
            StoreError::Rejected(reason) => {
                log::error!("Session store rejected a write: {}", reason);
                Error::InternalError {
                    kind: "DatabaseError",
                    message: "Write rejected by the session store".to_string(),
                }
            }
        }
    }
}

impl From<uuid::Error> for Error {
    fn from(id: uuid::Error) -> Self {
        Self::InvalidPayload {
            message: format!("Invalid identifier: {}", id),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "HashError",
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_faults_are_retryable() {
        assert!(Error::store_unavailable().is_retryable());
        assert!(!Error::already_marked().is_retryable());
        assert!(!Error::code_invalid_or_expired().is_retryable());
        assert!(!Error::expired().is_retryable());
    }

    #[test]
    fn failure_carries_tag_and_retry_hint() {
        let json = serde_json::to_value(Failure::of(Error::already_marked())).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["retryable"], false);
        assert_eq!(json["error"], "AlreadyMarked");
        assert_eq!(json["message"], "Attendance already marked for this class");

        let json = serde_json::to_value(Failure::of(Error::store_unavailable())).unwrap();
        assert_eq!(json["error"], "StoreUnavailable");
        assert_eq!(json["retryable"], true);
    }

    #[test]
    fn duplicate_and_invalid_codes_map_to_distinct_statuses() {
        assert_eq!(Error::already_marked().status(), StatusCode::CONFLICT);
        assert_eq!(Error::code_invalid_or_expired().status(), StatusCode::GONE);
        assert_eq!(
            Error::store_unavailable().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn store_outage_becomes_store_unavailable() {
        let err: Error = StoreError::Unavailable("connection reset".to_string()).into();
        assert!(matches!(err, Error::StoreUnavailable { .. }));
    }

    #[test]
    fn rejected_write_is_not_retryable() {
        let err: Error = StoreError::Rejected("check constraint".to_string()).into();
        assert!(matches!(err, Error::InternalError { .. }));
        assert!(!err.is_retryable());
    }
}
