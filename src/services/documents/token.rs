//! Signed, time-limited document access tokens.
//!
//! `base64url(header).base64url(payload).base64url(hmac_sha256(header.payload))`,
//! keyed per document kind so a token only opens the kind it was issued for.

use super::DocumentKind;
use crate::models::OrderId;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const MAX_TOKEN_LEN: usize = 2048;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    typ: String,
    alg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub order_id: OrderId,
    pub email: String,
    /// Issue time, unix seconds.
    pub timestamp: i64,
    /// Expiry, unix seconds.
    pub expire: i64,
}

pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(kind: DocumentKind, secure_auth_key: &str, ttl_hours: i64) -> Self {
        Self {
            secret: format!("{}_secret_key_{}", kind.as_str(), secure_auth_key).into_bytes(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| TokenError::Malformed(e.to_string()))
    }

    pub fn issue(&self, order_id: OrderId, email: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let header = TokenHeader {
            typ: "JWT".to_string(),
            alg: "HS256".to_string(),
        };
        let claims = TokenClaims {
            order_id,
            email: email.to_string(),
            timestamp: now.timestamp(),
            expire: (now + self.ttl).timestamp(),
        };

        let header_part = encode_json(&header)?;
        let payload_part = encode_json(&claims)?;

        let mut mac = self.mac()?;
        mac.update(format!("{}.{}", header_part, payload_part).as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}.{}", header_part, payload_part, signature))
    }

    /// Checks shape, signature (constant time) and expiry, in that order.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Malformed("token exceeds max length".into()));
        }
        let parts: Vec<&str> = token.split('.').collect();
        let [header_part, payload_part, signature_part] = parts.as_slice() else {
            return Err(TokenError::Malformed("expected three parts".into()));
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature_part)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let mut mac = self.mac()?;
        mac.update(format!("{}.{}", header_part, payload_part).as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|e| TokenError::Malformed(e.to_string()))?;

        if claims.expire < now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let bytes = serde_json::to_vec(value).map_err(|e| TokenError::Malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
