//! Credential documents and the display fields extracted from them.
//!
//! Inbound credential envelopes are loosely structured JSON; the only shape
//! this service depends on is the `data.verifiableCredential[0]` element.
//! Extraction is all-or-nothing: a missing or wrongly-shaped path fails with
//! a [`CredentialError`] naming the path, never a defaulted value.

use serde::Serialize;
use serde_json::Value;

use super::error::CredentialError;

/// Reserved field key under which the encoded payload is injected into the
/// template field set.
pub const QR_CODE_FIELD: &str = "qrCode";

/// Display-ready fields pulled from a credential document.
///
/// Serializes with the field names the certificate layouts reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateFields {
    pub name_of_person: String,
    pub university: String,
    pub issuance_date: String,
    pub issuer: String,
}

impl CertificateFields {
    /// Build the flat template field set, with the encoded payload attached
    /// under [`QR_CODE_FIELD`].
    pub fn into_template_data(self, encoded_payload: String) -> Value {
        let mut data = serde_json::Map::new();
        data.insert("nameOfPerson".to_string(), Value::String(self.name_of_person));
        data.insert("university".to_string(), Value::String(self.university));
        data.insert("issuanceDate".to_string(), Value::String(self.issuance_date));
        data.insert("issuer".to_string(), Value::String(self.issuer));
        data.insert(QR_CODE_FIELD.to_string(), Value::String(encoded_payload));
        Value::Object(data)
    }
}

/// Extract the display fields from a credential envelope.
///
/// Required paths, all under `data.verifiableCredential[0]`:
/// - `type[1]` — subject name
/// - `credentialSubject.alumniOf.name["@value"]` — institution
/// - `issuanceDate`
/// - `issuer`
pub fn extract_fields(document: &Value) -> Result<CertificateFields, CredentialError> {
    let credential = document
        .get("data")
        .ok_or_else(|| CredentialError::missing("data"))?
        .get("verifiableCredential")
        .ok_or_else(|| CredentialError::missing("data.verifiableCredential"))?
        .as_array()
        .ok_or_else(|| {
            CredentialError::wrong_shape("data.verifiableCredential", "an array")
        })?
        .first()
        .ok_or_else(|| CredentialError::missing("data.verifiableCredential[0]"))?;

    let name_of_person = credential
        .get("type")
        .ok_or_else(|| CredentialError::missing("data.verifiableCredential[0].type"))?
        .as_array()
        .ok_or_else(|| {
            CredentialError::wrong_shape("data.verifiableCredential[0].type", "an array")
        })?
        .get(1)
        .ok_or_else(|| CredentialError::missing("data.verifiableCredential[0].type[1]"))?;
    let name_of_person = require_string(name_of_person, "data.verifiableCredential[0].type[1]")?;

    let university = credential
        .get("credentialSubject")
        .and_then(|subject| subject.get("alumniOf"))
        .and_then(|alumni| alumni.get("name"))
        .and_then(|name| name.get("@value"))
        .ok_or_else(|| {
            CredentialError::missing(
                "data.verifiableCredential[0].credentialSubject.alumniOf.name[\"@value\"]",
            )
        })?;
    let university = require_string(
        university,
        "data.verifiableCredential[0].credentialSubject.alumniOf.name[\"@value\"]",
    )?;

    let issuance_date = credential
        .get("issuanceDate")
        .ok_or_else(|| CredentialError::missing("data.verifiableCredential[0].issuanceDate"))?;
    let issuance_date =
        require_string(issuance_date, "data.verifiableCredential[0].issuanceDate")?;

    let issuer = credential
        .get("issuer")
        .ok_or_else(|| CredentialError::missing("data.verifiableCredential[0].issuer"))?;
    let issuer = require_string(issuer, "data.verifiableCredential[0].issuer")?;

    Ok(CertificateFields {
        name_of_person,
        university,
        issuance_date,
        issuer,
    })
}

fn require_string(value: &Value, path: &'static str) -> Result<String, CredentialError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CredentialError::wrong_shape(path, "a string"))
}
