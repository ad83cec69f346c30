//! Router-level coverage of the certificate pipeline.
//!
//! Exercises everything short of the browser engine: envelope validation,
//! field extraction, payload encoding, layout caching and rendering. The
//! PDF operation is covered by `live_pdf.rs` against a real browser.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use pergamena::{
    application::{
        certificate::CertificateService,
        encode::{PayloadDelivery, PayloadEncoder},
        engine::PdfEngine,
        render::TemplateRenderer,
    },
    cache::{CacheConfig, LayoutStore},
    config::{Delimiters, EngineSettings},
    infra::{
        http::{HttpState, build_router},
        layouts::LayoutLibrary,
    },
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const DIPLOMA_LAYOUT: &str = "<h1><%university%></h1>\
<p class=\"name\"><%nameOfPerson%></p>\
<p class=\"date\"><%formatDate issuanceDate%></p>\
<p class=\"issuer\"><%issuer%></p>\
<img src=\"<%qrCode%>\">";

fn engine_settings() -> EngineSettings {
    EngineSettings {
        executable: None,
        headless: true,
        no_sandbox: true,
        extra_args: vec![],
        warm_on_startup: false,
        startup_timeout: Duration::from_secs(5),
        convert_timeout: Duration::from_secs(5),
    }
}

async fn router_with_layout(layout_name: &str) -> (Router, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    tokio::fs::write(dir.path().join("diploma.html"), DIPLOMA_LAYOUT)
        .await
        .expect("write layout");

    let store = Arc::new(LayoutStore::new(&CacheConfig::default()));
    let library = Arc::new(LayoutLibrary::new(dir.path()));
    let renderer = TemplateRenderer::new(
        store,
        library,
        Delimiters {
            open: "<%".to_string(),
            close: "%>".to_string(),
        },
    );
    let encoder = PayloadEncoder::new(2, PayloadDelivery::Inline);
    let engine = Arc::new(PdfEngine::new(engine_settings()));
    let certificates = Arc::new(CertificateService::new(
        encoder,
        renderer,
        engine,
        layout_name,
    ));

    (build_router(HttpState { certificates }), dir)
}

fn sample_envelope() -> Value {
    json!({
        "data": {
            "verifiableCredential": [{
                "type": ["VerifiableCredential", "Ada Lovelace"],
                "credentialSubject": {
                    "alumniOf": {
                        "name": { "@value": "University of Analytical Engines" }
                    }
                },
                "issuanceDate": "2023-01-05T00:00:00Z",
                "issuer": "did:web:registry.example"
            }]
        }
    })
}

fn post(path: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(CONTENT_TYPE, "application/json")
        .body(body.into())
        .expect("request")
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn render_returns_certificate_markup() {
    let (router, _dir) = router_with_layout("diploma").await;

    let response = router
        .oneshot(post(
            "/certificates/render",
            serde_json::to_string(&sample_envelope()).unwrap(),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));

    let markup = body_string(response).await;
    assert!(markup.contains("Ada Lovelace"));
    assert!(markup.contains("University of Analytical Engines"));
    assert!(markup.contains("05-Jan-2023"));
    assert!(markup.contains("data:image/png;base64,"));
}

#[tokio::test]
async fn rendering_twice_is_byte_identical() {
    let (router, _dir) = router_with_layout("diploma").await;
    let envelope = serde_json::to_string(&sample_envelope()).unwrap();

    let first = router
        .clone()
        .oneshot(post("/certificates/render", envelope.clone()))
        .await
        .expect("first response");
    let second = router
        .oneshot(post("/certificates/render", envelope))
        .await
        .expect("second response");

    assert_eq!(body_string(first).await, body_string(second).await);
}

#[tokio::test]
async fn empty_body_is_rejected() {
    let (router, _dir) = router_with_layout("diploma").await;

    let response = router
        .oneshot(post("/certificates/render", Body::empty()))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_document_is_rejected() {
    let (router, _dir) = router_with_layout("diploma").await;

    let response = router
        .oneshot(post("/certificates/pdf", "{}"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_envelope_is_unprocessable() {
    let mut envelope = sample_envelope();
    envelope["data"]["verifiableCredential"][0]
        .as_object_mut()
        .unwrap()
        .remove("issuer");

    let (router, _dir) = router_with_layout("diploma").await;
    let response = router
        .oneshot(post(
            "/certificates/render",
            serde_json::to_string(&envelope).unwrap(),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_layout_is_an_internal_failure() {
    let (router, _dir) = router_with_layout("ghost").await;

    let response = router
        .oneshot(post(
            "/certificates/render",
            serde_json::to_string(&sample_envelope()).unwrap(),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (router, _dir) = router_with_layout("diploma").await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/_health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
