//! Bearer credential issuing and validation.
//!
//! Tokens are `base64url(payload).base64url(hmac)` where the payload is a
//! JSON document carrying subject id, role, and expiry. Validation checks the
//! HMAC-SHA256 signature and the expiry before any room is joined or any
//! handler runs. The login system itself is an external collaborator — this
//! authority only mints and verifies.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::types::Role;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// The identity decoded from a valid credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessClaims {
    pub subject: Uuid,
    pub role: Role,
    /// Unix timestamp after which the credential is rejected.
    pub expires_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    sub: Uuid,
    role: Role,
    exp: i64,
}

/// Signs and validates bearer credentials for both the REST and socket
/// boundaries.
#[derive(Clone)]
pub struct TokenAuthority {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority").finish()
    }
}

impl TokenAuthority {
    /// Create an authority with the given signing secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
        }
    }

    /// Create an authority from configuration. An empty configured secret
    /// yields a random one, so previously issued tokens die with the process.
    pub fn from_config(config: &AuthConfig) -> Self {
        if config.token_secret.is_empty() {
            let mut secret = vec![0u8; 32];
            rand::thread_rng().fill_bytes(&mut secret);
            tracing::warn!("no token secret configured; using a process-local random secret");
            Self { secret }
        } else {
            Self::new(config.token_secret.as_bytes())
        }
    }

    /// Issue a signed credential for `subject` with the given role and
    /// lifetime.
    pub fn issue(&self, subject: Uuid, role: Role, ttl: chrono::Duration) -> String {
        let payload = TokenPayload {
            sub: subject,
            role,
            exp: (Utc::now() + ttl).timestamp(),
        };
        let body = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&payload).expect("token payload serializes"));
        let sig = self.sign(body.as_bytes());
        format!("{body}.{sig}")
    }

    /// Validate signature and expiry, decoding the subject identity and role.
    pub fn validate(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let (body, sig) = token.split_once('.').ok_or(AuthError::Invalid)?;
        if self.sign(body.as_bytes()) != sig {
            return Err(AuthError::Invalid);
        }

        let bytes = URL_SAFE_NO_PAD.decode(body).map_err(|_| AuthError::Invalid)?;
        let payload: TokenPayload =
            serde_json::from_slice(&bytes).map_err(|_| AuthError::Invalid)?;

        if payload.exp <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(AccessClaims {
            subject: payload.sub,
            role: payload.role,
            expires_at: payload.exp,
        })
    }

    fn sign(&self, data: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(data);
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(b"test-signing-secret")
    }

    #[test]
    fn test_issue_validate_roundtrip() {
        let auth = authority();
        let subject = Uuid::new_v4();
        let token = auth.issue(subject, Role::Responder, chrono::Duration::hours(1));

        let claims = auth.validate(&token).unwrap();
        assert_eq!(claims.subject, subject);
        assert_eq!(claims.role, Role::Responder);
        assert!(claims.expires_at > Utc::now().timestamp());
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = authority();
        let token = auth.issue(
            Uuid::new_v4(),
            Role::Civilian,
            chrono::Duration::seconds(-5),
        );
        assert!(matches!(auth.validate(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let auth = authority();
        let token = auth.issue(Uuid::new_v4(), Role::Civilian, chrono::Duration::hours(1));

        // Swap the payload for a forged responder claim, keeping the old sig.
        let (_, sig) = token.split_once('.').unwrap();
        let forged = TokenPayload {
            sub: Uuid::new_v4(),
            role: Role::Responder,
            exp: (Utc::now() + chrono::Duration::hours(1)).timestamp(),
        };
        let forged_body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{forged_body}.{sig}");

        assert!(matches!(
            auth.validate(&forged_token),
            Err(AuthError::Invalid)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = authority().issue(Uuid::new_v4(), Role::Admin, chrono::Duration::hours(1));
        let other = TokenAuthority::new(b"different-secret");
        assert!(matches!(other.validate(&token), Err(AuthError::Invalid)));
    }

    #[test]
    fn test_garbage_tokens_rejected() {
        let auth = authority();
        for garbage in ["", "no-dot", "a.b", "!!!.###"] {
            assert!(auth.validate(garbage).is_err(), "accepted {garbage:?}");
        }
    }

    #[test]
    fn test_from_config_empty_secret_is_random() {
        let config = AuthConfig::default();
        let a = TokenAuthority::from_config(&config);
        let b = TokenAuthority::from_config(&config);

        // Tokens from one random-secret authority fail on another.
        let token = a.issue(Uuid::new_v4(), Role::Civilian, chrono::Duration::hours(1));
        assert!(b.validate(&token).is_err());
    }
}
