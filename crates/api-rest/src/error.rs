//! Error-to-status mapping for the REST API.
//!
//! Every handler returns [`ApiError`] on failure. Response bodies are short fixed messages; they
//! never include filesystem paths or the store location.

use api_shared::{basic_challenge, ErrorRes};
use attic_core::constants::AUTH_REALM;
use attic_files::FilesError;
use axum::extract::multipart::MultipartError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("no file part in the request")]
    MissingFile,
    #[error("malformed upload: {0}")]
    BadUpload(String),
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("cross-site request refused")]
    CrossSite,
    #[error("too many requests, retry in {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },
    #[error(transparent)]
    Files(#[from] FilesError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::MissingFile | Self::BadUpload(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::CrossSite => StatusCode::FORBIDDEN,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Files(e) => match e {
                FilesError::InvalidName(_) => StatusCode::BAD_REQUEST,
                FilesError::PathEscape(_) => StatusCode::FORBIDDEN,
                FilesError::NotFound(_) => StatusCode::NOT_FOUND,
                FilesError::TypeRejected { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                FilesError::QuotaExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
                FilesError::InvalidRootDirectory(_) | FilesError::StorageUnavailable(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated => "authentication required".into(),
            Self::MissingFile => "no file part in the request".into(),
            Self::BadUpload(_) => "malformed upload".into(),
            Self::PayloadTooLarge => "request body too large".into(),
            Self::CrossSite => "cross-site request refused".into(),
            Self::TooManyRequests { .. } => "too many requests".into(),
            Self::Files(e) => match e {
                FilesError::InvalidName(_) => "invalid file name".into(),
                FilesError::PathEscape(_) => "path not allowed".into(),
                FilesError::NotFound(_) => "file not found".into(),
                FilesError::TypeRejected {
                    extension,
                    media_type,
                } => match extension {
                    Some(ext) => format!("file type not allowed: .{} ({})", ext, media_type),
                    None => "file type not allowed: missing extension".into(),
                },
                FilesError::QuotaExceeded(message) => message.clone(),
                FilesError::InvalidRootDirectory(_) | FilesError::StorageUnavailable(_) => {
                    "storage unavailable".into()
                }
            },
            Self::Internal(_) => "internal error".into(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadUpload(e.body_text())
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::debug!("request rejected: {}", self);
        }

        let mut response = (status, Json(ErrorRes::new(self.public_message()))).into_response();
        match self {
            Self::Unauthenticated => {
                if let Ok(challenge) = HeaderValue::from_str(&basic_challenge(AUTH_REALM)) {
                    response
                        .headers_mut()
                        .insert(header::WWW_AUTHENTICATE, challenge);
                }
            }
            Self::TooManyRequests { retry_after_secs } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            }
            _ => {}
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_errors_map_to_statuses() {
        let cases = [
            (FilesError::InvalidName("x".into()), StatusCode::BAD_REQUEST),
            (FilesError::PathEscape("x".into()), StatusCode::FORBIDDEN),
            (FilesError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                FilesError::TypeRejected {
                    extension: Some("exe".into()),
                    media_type: "unchecked".into(),
                },
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                FilesError::QuotaExceeded("x".into()),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                FilesError::StorageUnavailable(std::io::Error::other("disk gone")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn test_unauthenticated_carries_challenge() {
        let response = ApiError::Unauthenticated.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"attic\""
        );
    }

    #[test]
    fn test_too_many_requests_carries_retry_after() {
        let response = ApiError::TooManyRequests {
            retry_after_secs: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_messages_do_not_leak_paths() {
        let error = ApiError::from(FilesError::StorageUnavailable(std::io::Error::other(
            "/srv/attic/uploads/secret.txt: permission denied",
        )));

        assert!(!error.public_message().contains("/srv"));
    }
}
