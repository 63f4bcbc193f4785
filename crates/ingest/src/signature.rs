//! Webhook signature schemes.
//!
//! Two schemes are supported, both HMAC-SHA256 over the **raw** request body.
//! Re-serializing a parsed body changes whitespace and key order, so callers
//! must hand over the bytes exactly as received.
//!
//! - **Commerce** (plain HMAC): `base64(HMAC(secret, body))` in
//!   [`COMMERCE_SIGNATURE_HEADER`].
//! - **Payments** (timestamped): [`PAYMENTS_SIGNATURE_HEADER`] carries
//!   `t=<unix>,v1=<hex>[,v1=<hex>...]`; the signed payload is
//!   `"{t}.{body}"` and `t` must lie within the tolerance of now.
//!
//! All digest comparisons go through [`subtle::ConstantTimeEq`].
//!
//! ```rust
//! use chrono::Utc;
//! use ingest::signature::{sign_payments, verify_payments};
//! use std::time::Duration;
//!
//! let body = br#"{"id":"evt_1","type":"customer.created"}"#;
//! let now = Utc::now();
//! let header = sign_payments(body, b"whsec_test", now.timestamp()).unwrap();
//!
//! assert!(verify_payments(body, Some(&header), b"whsec_test", now, Duration::from_secs(300)).is_ok());
//! assert!(verify_payments(body, Some(&header), b"whsec_other", now, Duration::from_secs(300)).is_err());
//! ```
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::{Choice, ConstantTimeEq};

use crate::error::{EventError, SignatureError};

type HmacSha256 = Hmac<Sha256>;

pub const COMMERCE_SIGNATURE_HEADER: &str = "x-commerce-hmac-sha256";
pub const PAYMENTS_SIGNATURE_HEADER: &str = "payments-signature";

fn keyed(secret: &[u8]) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }
    HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::EmptySecret)
}

fn present<'a>(header: Option<&'a str>, name: &'static str) -> Result<&'a str, SignatureError> {
    header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(SignatureError::MissingHeader(name))
}

/// Computes the commerce signature for `body`.
pub fn sign_commerce(body: &[u8], secret: &[u8]) -> Result<String, SignatureError> {
    let mut mac = keyed(secret)?;
    mac.update(body);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verifies a commerce delivery against its base64 HMAC header.
pub fn verify_commerce(
    body: &[u8],
    header: Option<&str>,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let provided = present(header, COMMERCE_SIGNATURE_HEADER)?;
    let expected = sign_commerce(body, secret)?;

    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Parsed form of a timestamped signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedSignature {
    /// `t` exactly as sent; the signed payload uses these bytes.
    pub timestamp_raw: String,
    pub timestamp: i64,
    /// Every `v1` entry. Several appear while a secret is being rolled.
    pub signatures: Vec<String>,
}

/// Parses `t=<unix>,v1=<hex>,...`. Unknown schemes such as `v0` are ignored.
pub fn parse_payments_header(header: &str) -> Result<TimestampedSignature, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for element in header.split(',') {
        let element = element.trim();
        if element.is_empty() {
            continue;
        }
        let Some((key, value)) = element.split_once('=') else {
            return Err(SignatureError::MalformedHeader(format!(
                "element `{element}` is not key=value"
            )));
        };
        let value = value.trim();
        match key.trim() {
            "t" => {
                let parsed = value.parse::<i64>().map_err(|_| {
                    SignatureError::MalformedHeader(format!("timestamp `{value}` is not an integer"))
                })?;
                timestamp = Some((value.to_string(), parsed));
            }
            "v1" if !value.is_empty() => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let (timestamp_raw, timestamp) = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    Ok(TimestampedSignature {
        timestamp_raw,
        timestamp,
        signatures,
    })
}

fn payments_digest(
    body: &[u8],
    secret: &[u8],
    timestamp_raw: &str,
) -> Result<String, SignatureError> {
    let mut mac = keyed(secret)?;
    mac.update(timestamp_raw.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Builds a payments signature header for `body` signed at `timestamp`.
pub fn sign_payments(body: &[u8], secret: &[u8], timestamp: i64) -> Result<String, SignatureError> {
    let raw = timestamp.to_string();
    let digest = payments_digest(body, secret, &raw)?;
    Ok(format!("t={raw},v1={digest}"))
}

/// Verifies a payments delivery: digest first, then replay tolerance.
pub fn verify_payments(
    body: &[u8],
    header: Option<&str>,
    secret: &[u8],
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<(), SignatureError> {
    let header = present(header, PAYMENTS_SIGNATURE_HEADER)?;
    let parsed = parse_payments_header(header)?;
    let expected = payments_digest(body, secret, &parsed.timestamp_raw)?;

    let matched = parsed
        .signatures
        .iter()
        .fold(Choice::from(0), |acc, candidate| {
            acc | expected.as_bytes().ct_eq(candidate.as_bytes())
        });
    if !bool::from(matched) {
        return Err(SignatureError::Mismatch);
    }

    let skew_secs = now.timestamp().saturating_sub(parsed.timestamp).saturating_abs();
    let tolerance_secs = i64::try_from(tolerance.as_secs()).unwrap_or(i64::MAX);
    if skew_secs > tolerance_secs {
        return Err(SignatureError::TimestampOutsideTolerance { skew_secs });
    }

    Ok(())
}

/// Verifies a payments delivery and returns its parsed event.
pub fn construct_payments_event(
    body: &[u8],
    header: Option<&str>,
    secret: &[u8],
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<Value, EventError> {
    verify_payments(body, header, secret, now, tolerance)?;
    serde_json::from_slice(body).map_err(|e| EventError::InvalidJson(e.to_string()))
}
