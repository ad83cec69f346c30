//! Live end-to-end PDF conversion against a real Chromium install.
//!
//! - Requires a Chromium/Chrome binary discoverable by the engine (or the
//!   `PERGAMENA_TEST_CHROMIUM` environment variable pointing at one).
//! - Marked `#[ignore]` so it only runs manually: `cargo test -- --ignored`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pergamena::{
    application::{
        certificate::CertificateService,
        encode::{PayloadDelivery, PayloadEncoder},
        engine::PdfEngine,
        render::TemplateRenderer,
    },
    cache::{CacheConfig, LayoutStore},
    config::{Delimiters, EngineSettings},
    infra::layouts::LayoutLibrary,
};
use serde_json::json;

fn live_engine_settings() -> EngineSettings {
    EngineSettings {
        executable: std::env::var_os("PERGAMENA_TEST_CHROMIUM").map(PathBuf::from),
        headless: true,
        no_sandbox: true,
        extra_args: vec!["--disable-gpu".to_string()],
        warm_on_startup: false,
        startup_timeout: Duration::from_secs(30),
        convert_timeout: Duration::from_secs(30),
    }
}

async fn live_service() -> (CertificateService, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    tokio::fs::write(
        dir.path().join("diploma.html"),
        "<html><body><h1><%nameOfPerson%></h1><img src=\"<%qrCode%>\"></body></html>",
    )
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
    let engine = Arc::new(PdfEngine::new(live_engine_settings()));

    (
        CertificateService::new(encoder, renderer, engine, "diploma"),
        dir,
    )
}

fn sample_envelope() -> serde_json::Value {
    json!({
        "data": {
            "verifiableCredential": [{
                "type": ["VerifiableCredential", "Ada Lovelace"],
                "credentialSubject": {
                    "alumniOf": { "name": { "@value": "University of Analytical Engines" } }
                },
                "issuanceDate": "2023-01-05T00:00:00Z",
                "issuer": "did:web:registry.example"
            }]
        }
    })
}

/// The engine is not running when the first conversion arrives; it must be
/// started transparently and the artifact must carry the PDF file signature.
#[tokio::test]
#[ignore]
async fn converts_credential_to_pdf_with_lazy_engine_start() {
    let (service, _dir) = live_service().await;

    let artifact = service
        .render_pdf(&sample_envelope())
        .await
        .expect("conversion succeeds");

    assert!(artifact.len() > 0);
    assert_eq!(&artifact[..5], b"%PDF-");
}

/// The shared session survives across conversions: a second request reuses
/// the already-running engine.
#[tokio::test]
#[ignore]
async fn shared_engine_session_serves_consecutive_conversions() {
    let (service, _dir) = live_service().await;

    let first = service
        .render_pdf(&sample_envelope())
        .await
        .expect("first conversion");
    let second = service
        .render_pdf(&sample_envelope())
        .await
        .expect("second conversion");

    assert_eq!(&first[..5], b"%PDF-");
    assert_eq!(&second[..5], b"%PDF-");
}
