//! Certificate pipeline orchestration.
//!
//! extract fields → encode payload → merge into the configured layout →
//! (for the PDF operation) convert the markup through the shared engine.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::domain::credential::extract_fields;
use crate::domain::error::CredentialError;

use super::encode::{EncodeError, PayloadEncoder};
use super::engine::{EngineError, PdfEngine};
use super::render::{RenderError, TemplateRenderer};

const SOURCE: &str = "application::certificate";

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub struct CertificateService {
    encoder: PayloadEncoder,
    renderer: TemplateRenderer,
    engine: Arc<PdfEngine>,
    layout_name: String,
}

impl CertificateService {
    pub fn new(
        encoder: PayloadEncoder,
        renderer: TemplateRenderer,
        engine: Arc<PdfEngine>,
        layout_name: impl Into<String>,
    ) -> Self {
        Self {
            encoder,
            renderer,
            engine,
            layout_name: layout_name.into(),
        }
    }

    /// Render the certificate markup for a credential envelope.
    pub async fn render_markup(&self, document: &Value) -> Result<String, CertificateError> {
        let started_at = Instant::now();
        let fields = extract_fields(document)?;
        let encoded_payload = self.encoder.encode(document)?;
        let data = fields.into_template_data(encoded_payload);
        let markup = self.renderer.render(&self.layout_name, &data).await?;

        info!(
            target = SOURCE,
            op = "render_markup",
            layout = %self.layout_name,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            markup_bytes = markup.len(),
            "Rendered certificate markup"
        );
        Ok(markup)
    }

    /// Render the certificate and convert it into the paginated PDF artifact.
    pub async fn render_pdf(&self, document: &Value) -> Result<Bytes, CertificateError> {
        let markup = self.render_markup(document).await?;
        let artifact = self.engine.convert(&markup).await?;
        Ok(artifact)
    }
}
