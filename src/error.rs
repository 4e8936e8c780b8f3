//! Error handler for passage.
//!
//! Every failure reaching the transport is a [`ServerError`]; its
//! [`ErrorKind`] decides what the caller sees.

use std::fmt;

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::lookup::LookupError;
use crate::message::PublishError;
use crate::provider::ProviderError;
use crate::store::StoreError;
use crate::token::TokenError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Caller-facing outcome of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidParameter,
    Unauthenticated,
    NotFound,
    UpstreamFailure,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::UpstreamFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UpstreamFailure => "upstream_failure",
            ErrorKind::Internal => "internal",
        }
    }

    fn title(self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => {
                "There were validation errors with your request."
            },
            ErrorKind::Unauthenticated => "Authentication failed.",
            ErrorKind::NotFound => "No active session matches this token.",
            ErrorKind::UpstreamFailure => "A dependent service failed.",
            ErrorKind::Internal => "Internal server error.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("no active refresh token for {identity}")]
    Revoked { identity: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl ServerError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Validation(_) | ServerError::Axum(_) => {
                ErrorKind::InvalidParameter
            },
            ServerError::Token(err) if err.is_verification() => {
                ErrorKind::Unauthenticated
            },
            ServerError::Token(_) => ErrorKind::Internal,
            ServerError::Revoked { .. } => ErrorKind::Unauthenticated,
            ServerError::Store(err) => match err {
                StoreError::NotFound => ErrorKind::NotFound,
                StoreError::Backend(_) => ErrorKind::UpstreamFailure,
            },
            ServerError::Provider(err) => match err {
                ProviderError::Exchange(_)
                | ProviderError::Profile(_)
                | ProviderError::Rejected(_) => ErrorKind::UpstreamFailure,
            },
            ServerError::Lookup(err) => match err {
                LookupError::NotFound(_) => ErrorKind::Unauthenticated,
                LookupError::Timeout | LookupError::Upstream(_) => {
                    ErrorKind::UpstreamFailure
                },
            },
            ServerError::Publish(err) => match err {
                PublishError::Encode(_) => ErrorKind::Internal,
                PublishError::Publish { .. } => ErrorKind::UpstreamFailure,
            },
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    pub fn r#type(mut self, kind: ErrorKind) -> Self {
        self.r#type = Some(kind.as_str().to_owned());
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/problem+json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: Some(ErrorKind::Internal.as_str().to_owned()),
            title: ErrorKind::Internal.title().to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let response = ResponseError::default()
            .r#type(kind)
            .title(kind.title())
            .status(kind.status());

        let response = match &self {
            ServerError::Validation(validation_errors) => response
                .details("request body has invalid fields")
                .errors(validation_errors),

            _ if kind == ErrorKind::Internal => {
                tracing::error!(err = %self, "server returned 500 status");
                response
            },

            _ if kind == ErrorKind::UpstreamFailure => {
                tracing::warn!(err = %self, "upstream failure");
                response.details(&self.to_string())
            },

            _ => response.details(&self.to_string()),
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/problem+json")
        .body(
            serde_json::json!({
                "type": ErrorKind::Internal.as_str(),
                "title": ErrorKind::Internal.title(),
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
