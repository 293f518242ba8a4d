//! Bearer-token issuance and verification.
//!
//! Tokens are a self-rolled compact scheme rather than a JWT library: a
//! base64url JSON claims body plus an HMAC-SHA256 signature over it, the
//! same primitive the chat webhook already uses to verify inbound
//! signatures. A role claim (`admin`, `content_creator`, `reviewer`) rides
//! along so route handlers can enforce per-endpoint permission without a
//! second lookup.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Roles an admin-surface caller may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ContentCreator,
    Reviewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ContentCreator => "content_creator",
            Role::Reviewer => "reviewer",
        }
    }
}

/// Decoded bearer token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    /// Unix timestamp the token expires at.
    pub exp: i64,
}

impl Claims {
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed bearer token")]
    Malformed,
    #[error("bearer token signature invalid")]
    BadSignature,
    #[error("bearer token expired")]
    Expired,
}

/// Issue a signed token for `sub` with `role`, valid for `ttl_secs`.
pub fn issue(sub: &str, role: Role, ttl_secs: i64, signing_secret: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        role,
        exp: chrono::Utc::now().timestamp() + ttl_secs,
    };
    let payload = serde_json::to_vec(&claims).expect("Claims always serializes");
    let payload_b64 = BASE64_URL.encode(&payload);
    let signature = sign(payload_b64.as_bytes(), signing_secret);
    format!("{payload_b64}.{signature}")
}

/// Verify a bearer token's signature and expiry, returning its claims.
pub fn verify(token: &str, signing_secret: &str) -> Result<Claims, TokenError> {
    let (payload_b64, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;

    let expected = sign(payload_b64.as_bytes(), signing_secret);
    if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        return Err(TokenError::BadSignature);
    }

    let payload = BASE64_URL.decode(payload_b64).map_err(|_| TokenError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

    if claims.exp < chrono::Utc::now().timestamp() {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

fn sign(payload: &[u8], signing_secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    BASE64_URL.encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_the_right_secret() {
        let token = issue("u1", Role::Admin, 3600, "secret");
        let claims = verify(&token, "secret").unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue("u1", Role::Admin, 3600, "secret");
        let err = verify(&token, "other-secret").unwrap_err();
        assert!(matches!(err, TokenError::BadSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue("u1", Role::Reviewer, -10, "secret");
        let err = verify(&token, "secret").unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn role_check() {
        let claims = Claims { sub: "u1".to_string(), role: Role::ContentCreator, exp: i64::MAX };
        assert!(claims.has_role(&[Role::Admin, Role::ContentCreator]));
        assert!(!claims.has_role(&[Role::Admin]));
    }
}
