//! AEAD encryption for social-platform access tokens at rest.
//!
//! Tokens are encrypted with AES-256-GCM before being handed to
//! `store::threads_auth::upsert`, and decrypted only at the point a
//! request needs the plaintext bearer token. The key never touches the
//! store layer.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

use crate::error::SocialError;

const NONCE_LEN: usize = 12;

/// A symmetric key used to encrypt tokens at rest.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Build a cipher from a 32-byte key. Returns an error message if the
    /// key is the wrong length; callers derive the key from
    /// `SecretsConfig` at startup.
    pub fn new(key_bytes: &[u8]) -> Result<Self, String> {
        if key_bytes.len() != 32 {
            return Err(format!(
                "token encryption key must be 32 bytes, got {}",
                key_bytes.len()
            ));
        }
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Build a cipher from `SecretsConfig::encryption_key`, a base64-encoded
    /// 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, String> {
        let key_bytes = BASE64
            .decode(encoded)
            .map_err(|e| format!("encryption_key is not valid base64: {e}"))?;
        Self::new(&key_bytes)
    }

    /// Encrypt `plaintext`, returning a base64 string of `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, SocialError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| SocialError::Api {
                kind: crate::error::SocialErrorKind::Unknown,
                message: "failed to encrypt access token".to_string(),
            })?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Decrypt a string produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, encoded: &str) -> Result<String, SocialError> {
        let combined = BASE64.decode(encoded).map_err(|_| SocialError::Api {
            kind: crate::error::SocialErrorKind::Unknown,
            message: "stored access token is not valid base64".to_string(),
        })?;

        if combined.len() < NONCE_LEN {
            return Err(SocialError::Api {
                kind: crate::error::SocialErrorKind::Unknown,
                message: "stored access token is truncated".to_string(),
            });
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext =
            self.cipher
                .decrypt(nonce, ciphertext)
                .map_err(|_| SocialError::Api {
                    kind: crate::error::SocialErrorKind::Unknown,
                    message: "failed to decrypt access token".to_string(),
                })?;

        String::from_utf8(plaintext).map_err(|_| SocialError::Api {
            kind: crate::error::SocialErrorKind::Unknown,
            message: "decrypted access token is not valid utf-8".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> TokenCipher {
        TokenCipher::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn encrypt_then_decrypt_roundtrips() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt("super-secret-token").unwrap();
        assert_ne!(encrypted, "super-secret-token");
        let decrypted = cipher.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, "super-secret-token");
    }

    #[test]
    fn encrypt_is_nondeterministic() {
        let cipher = test_cipher();
        let a = cipher.encrypt("token").unwrap();
        let b = cipher.encrypt("token").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        assert!(TokenCipher::new(&[1u8; 16]).is_err());
    }

    #[test]
    fn from_base64_key_roundtrips() {
        let encoded = BASE64.encode([9u8; 32]);
        let cipher = TokenCipher::from_base64_key(&encoded).unwrap();
        let encrypted = cipher.encrypt("hello").unwrap();
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "hello");
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let cipher = test_cipher();
        let mut encrypted = cipher.encrypt("token").unwrap();
        encrypted.push('A');
        assert!(cipher.decrypt(&encrypted).is_err());
    }
}
