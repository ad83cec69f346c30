//! Scannable payload encoding.
//!
//! The full credential document is serialized to JSON and rendered as a QR
//! symbol, delivered inline as a PNG data URL. The payload is embedded
//! exactly as serialized: no compression, transformation, or truncation. A
//! document that exceeds the symbology's capacity is a hard failure.

use std::io::Cursor;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::Luma;
use qrcode::QrCode;
use qrcode::types::QrError;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const SOURCE: &str = "application::encode";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize credential document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("credential payload of {bytes} bytes exceeds the encoding capacity")]
    Capacity { bytes: usize },
    #[error("failed to build payload symbol: {0}")]
    Symbol(QrError),
    #[error("failed to rasterize payload symbol: {0}")]
    Image(#[from] image::ImageError),
}

/// How the encoded payload reaches the rendered certificate.
///
/// Only inline delivery is implemented; the selector exists so alternative
/// modes (compressed payloads, verification URLs) can slot in without
/// touching the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadDelivery {
    /// Embed the full serialized document as a PNG data URL.
    Inline,
}

impl FromStr for PayloadDelivery {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inline" => Ok(Self::Inline),
            other => Err(format!("unknown payload delivery mode `{other}`")),
        }
    }
}

/// Encodes credential documents into scannable image payloads.
#[derive(Debug, Clone)]
pub struct PayloadEncoder {
    scale: u32,
    delivery: PayloadDelivery,
}

impl PayloadEncoder {
    pub fn new(scale: u32, delivery: PayloadDelivery) -> Self {
        Self { scale, delivery }
    }

    /// The exact byte content embedded in the scannable symbol: the JSON
    /// serialization of the document, unmodified.
    pub fn payload(&self, document: &Value) -> Result<String, EncodeError> {
        Ok(serde_json::to_string(document)?)
    }

    /// Encode a document into its configured delivery form.
    pub fn encode(&self, document: &Value) -> Result<String, EncodeError> {
        let payload = self.payload(document)?;
        match self.delivery {
            PayloadDelivery::Inline => self.inline_data_url(&payload),
        }
    }

    fn inline_data_url(&self, payload: &str) -> Result<String, EncodeError> {
        let code = QrCode::new(payload.as_bytes()).map_err(|err| match err {
            QrError::DataTooLong => EncodeError::Capacity {
                bytes: payload.len(),
            },
            other => EncodeError::Symbol(other),
        })?;

        let bitmap = code
            .render::<Luma<u8>>()
            .module_dimensions(self.scale, self.scale)
            .build();

        let mut png = Vec::new();
        image::DynamicImage::ImageLuma8(bitmap)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

        debug!(
            target = SOURCE,
            op = "encode",
            payload_bytes = payload.len(),
            png_bytes = png.len(),
            "Encoded credential payload"
        );

        Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
    }
}
