use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;

use crate::application::{certificate::CertificateService, error::HttpError};

use super::middleware::{log_responses, set_request_context};

const SOURCE: &str = "infra::http::certificates";

#[derive(Clone)]
pub struct HttpState {
    pub certificates: Arc<CertificateService>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/certificates/render", post(render_certificate))
        .route("/certificates/pdf", post(certificate_pdf))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Operation A: return the rendered certificate markup.
async fn render_certificate(State(state): State<HttpState>, body: Bytes) -> Response {
    let document = match parse_envelope(&body) {
        Ok(document) => document,
        Err(err) => return err.into_response(),
    };

    match state.certificates.render_markup(&document).await {
        Ok(markup) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/html; charset=utf-8")],
            markup,
        )
            .into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Operation B: return the paginated PDF artifact.
async fn certificate_pdf(State(state): State<HttpState>, body: Bytes) -> Response {
    let document = match parse_envelope(&body) {
        Ok(document) => document,
        Err(err) => return err.into_response(),
    };

    match state.certificates.render_pdf(&document).await {
        Ok(artifact) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "application/pdf")],
            artifact,
        )
            .into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Parse the inbound credential envelope.
///
/// An empty body, invalid JSON, or an empty document are all client errors;
/// shape problems deeper than that surface from field extraction.
fn parse_envelope(body: &Bytes) -> Result<Value, HttpError> {
    if body.is_empty() {
        return Err(HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Bad request",
            "request body is empty",
        ));
    }

    let document: Value = serde_json::from_slice(body).map_err(|err| {
        HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Bad request",
            format!("request body is not valid JSON: {err}"),
        )
    })?;

    let is_empty = match &document {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    };
    if is_empty {
        return Err(HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Bad request",
            "request body is an empty document",
        ));
    }

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_bad_request() {
        let err = parse_envelope(&Bytes::new()).expect_err("empty body");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_json_is_bad_request() {
        let err = parse_envelope(&Bytes::from_static(b"{not json")).expect_err("invalid JSON");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn empty_object_is_bad_request() {
        let err = parse_envelope(&Bytes::from_static(b"{}")).expect_err("empty document");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn well_formed_document_parses() {
        let document =
            parse_envelope(&Bytes::from_static(b"{\"data\":{}}")).expect("valid document");
        assert!(document.is_object());
    }
}
