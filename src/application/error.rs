use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::infra::layouts::LayoutError;

use super::certificate::CertificateError;
use super::encode::EncodeError;
use super::engine::EngineError;
use super::render::RenderError;

/// Diagnostic detail attached to error responses for the logging middleware.
/// Only the public message reaches the caller.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<CertificateError> for HttpError {
    fn from(error: CertificateError) -> Self {
        const SOURCE: &str = "application::error::certificate_error_to_http";
        match &error {
            CertificateError::Credential(_) => HttpError::from_error(
                SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                "Credential document is malformed",
                &error,
            ),
            CertificateError::Encode(EncodeError::Capacity { .. }) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Credential payload too large to encode",
                &error,
            ),
            CertificateError::Encode(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode credential payload",
                &error,
            ),
            CertificateError::Render(RenderError::Layout(LayoutError::NotFound { .. })) => {
                HttpError::from_error(
                    SOURCE,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Certificate layout unavailable",
                    &error,
                )
            }
            CertificateError::Render(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to render certificate",
                &error,
            ),
            CertificateError::Engine(EngineError::Unavailable { .. }) => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Rendering engine unavailable",
                &error,
            ),
            CertificateError::Engine(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to produce certificate document",
                &error,
            ),
        }
    }
}

/// Top-level bootstrap failures surfaced from `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] crate::config::LoadError),
    #[error(transparent)]
    Infra(#[from] crate::infra::error::InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::CredentialError;

    #[test]
    fn credential_errors_map_to_unprocessable_entity() {
        let error = CertificateError::Credential(CredentialError::missing("data"));
        let http: HttpError = error.into();
        assert_eq!(http.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn engine_unavailable_maps_to_service_unavailable() {
        let error = CertificateError::Engine(EngineError::Unavailable {
            reason: "no chromium".to_string(),
        });
        let http: HttpError = error.into();
        assert_eq!(http.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn capacity_errors_stay_internal() {
        let error = CertificateError::Encode(EncodeError::Capacity { bytes: 10_000 });
        let http: HttpError = error.into();
        assert_eq!(http.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn report_collects_the_error_chain() {
        let error = CertificateError::Render(RenderError::Layout(LayoutError::NotFound {
            name: "diploma".to_string(),
        }));
        let report = ErrorReport::from_error(
            "test",
            StatusCode::INTERNAL_SERVER_ERROR,
            &error,
        );
        assert!(!report.messages.is_empty());
        assert!(report.messages[0].contains("diploma"));
    }
}
