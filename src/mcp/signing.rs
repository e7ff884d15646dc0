// Jaskier Shared Pattern -- mcp/signing
//! Request signing for machine-to-machine calls.
//!
//! Canonical request: `METHOD\nPATH\nhex(sha256(body))\nUNIX_TIMESTAMP`,
//! signed with HMAC-SHA256. The key id, timestamp and hex signature travel in
//! the `x-mcp-*` headers. The verifier rejects timestamps outside the
//! validity window in either direction.

use std::fmt;
use std::time::Duration;

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_KEY_ID: &str = "x-mcp-key-id";
pub const HEADER_TIMESTAMP: &str = "x-mcp-timestamp";
pub const HEADER_SIGNATURE: &str = "x-mcp-signature";

pub const DEFAULT_VALIDITY_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("missing header '{0}'")]
    MissingHeader(&'static str),

    #[error("unknown signing key '{0}'")]
    UnknownKey(String),

    #[error("malformed timestamp header")]
    MalformedTimestamp,

    #[error("timestamp outside validity window (skew {skew_secs}s)")]
    Expired { skew_secs: i64 },

    #[error("signature does not match request")]
    BadSignature,

    #[error("signing key rejected by HMAC")]
    InvalidKey,
}

/// Immutable signing key snapshot. Captured once at startup and shared.
#[derive(Clone)]
pub struct SigningCredentials {
    key_id: String,
    secret: Vec<u8>,
}

impl fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Header values produced by [`SigningCredentials::sign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    pub key_id: String,
    pub timestamp: i64,
    pub signature: String,
}

impl RequestSignature {
    pub fn header_pairs(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_KEY_ID, self.key_id.clone()),
            (HEADER_TIMESTAMP, self.timestamp.to_string()),
            (HEADER_SIGNATURE, self.signature.clone()),
        ]
    }

    /// Read the three signature headers. `Ok(None)` when none are present.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, SigningError> {
        let get = |name: &'static str| headers.get(name).and_then(|v| v.to_str().ok());

        let (key_id, ts, sig) = (get(HEADER_KEY_ID), get(HEADER_TIMESTAMP), get(HEADER_SIGNATURE));
        if key_id.is_none() && ts.is_none() && sig.is_none() {
            return Ok(None);
        }

        let key_id = key_id.ok_or(SigningError::MissingHeader(HEADER_KEY_ID))?;
        let ts = ts.ok_or(SigningError::MissingHeader(HEADER_TIMESTAMP))?;
        let sig = sig.ok_or(SigningError::MissingHeader(HEADER_SIGNATURE))?;
        let timestamp = ts.trim().parse::<i64>().map_err(|_| SigningError::MalformedTimestamp)?;

        Ok(Some(Self {
            key_id: key_id.to_string(),
            timestamp,
            signature: sig.trim().to_string(),
        }))
    }
}

pub fn canonical_request(method: &str, path: &str, body: &[u8], timestamp: i64) -> String {
    let body_digest = hex::encode(Sha256::digest(body));
    format!(
        "{}\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        path,
        body_digest,
        timestamp
    )
}

impl SigningCredentials {
    pub fn new(key_id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    fn mac(&self, canonical: &str) -> Result<HmacSha256, SigningError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| SigningError::InvalidKey)?;
        mac.update(canonical.as_bytes());
        Ok(mac)
    }

    pub fn sign(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: i64,
    ) -> Result<RequestSignature, SigningError> {
        let canonical = canonical_request(method, path, body, timestamp);
        let mac = self.mac(&canonical)?;
        Ok(RequestSignature {
            key_id: self.key_id.clone(),
            timestamp,
            signature: hex::encode(mac.finalize().into_bytes()),
        })
    }

    /// Check `sig` against the request. `now` is unix seconds.
    pub fn verify(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        sig: &RequestSignature,
        now: i64,
        window: Duration,
    ) -> Result<(), SigningError> {
        if sig.key_id != self.key_id {
            return Err(SigningError::UnknownKey(sig.key_id.clone()));
        }

        // The timestamp is caller-controlled; extreme values must not overflow.
        let skew = now.saturating_sub(sig.timestamp);
        if now.abs_diff(sig.timestamp) > window.as_secs() {
            return Err(SigningError::Expired { skew_secs: skew });
        }

        let provided = hex::decode(&sig.signature).map_err(|_| SigningError::BadSignature)?;
        let canonical = canonical_request(method, path, body, sig.timestamp);
        self.mac(&canonical)?
            .verify_slice(&provided)
            .map_err(|_| SigningError::BadSignature)
    }
}
