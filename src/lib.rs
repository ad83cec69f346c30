//! Pergamena: a certificate rendering service.
//!
//! Verifiable credential envelopes come in over HTTP; rendered certificate
//! markup or print-ready PDF artifacts go out. The pipeline extracts display
//! fields, encodes the full credential as a scannable payload, merges both
//! into a cached layout, and (for PDF) drives a shared headless browser
//! session.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
