//! Master-key request signing for the Cosmos DB REST API.
//!
//! The signed payload is
//! `verb\nresource_type\nresource_link\ndate\n\n` with everything except the
//! resource link lowercased, HMAC-SHA256'd with the base64-decoded account
//! key. The header value is the url-encoded
//! `type=master&ver=1.0&sig=<base64 signature>`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Errors from building an authorization header.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("account key is not valid base64: {0}")]
    InvalidKey(String),
}

/// RFC 1123 date as sent in `x-ms-date`.
pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Authorization header value for one request.
pub fn authorization(
    master_key: &str,
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> Result<String, SigningError> {
    let key = STANDARD
        .decode(master_key)
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;

    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );

    let mut mac =
        HmacSha256::new_from_slice(&key).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(payload.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    let token = format!("type=master&ver=1.0&sig={signature}");
    Ok(utf8_percent_encode(&token, NON_ALPHANUMERIC).to_string())
}
