use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

/// JWT payload: the caller identity plus standard expiry/issued-at claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
    /// Random per-token id. Guarantees two tokens signed in the same second
    /// still differ, which rotation relies on.
    pub jti: Uuid,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        }
    }
}

/// Keys for the two signing domains. Access and refresh tokens are signed
/// with independent secrets, so a token from one domain never verifies in
/// the other.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            access_ttl: cfg.access_ttl,
            refresh_ttl: cfg.refresh_ttl,
        }
    }

    fn sign(&self, key: &EncodingKey, ttl: Duration, id: Uuid, email: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: id,
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, key)?;
        debug!(user_id = %id, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, id: Uuid, email: &str) -> anyhow::Result<String> {
        self.sign(&self.access_encoding, self.access_ttl, id, email)
    }

    pub fn sign_refresh(&self, id: Uuid, email: &str) -> anyhow::Result<String> {
        self.sign(&self.refresh_encoding, self.refresh_ttl, id, email)
    }

    fn verify(&self, key: &DecodingKey, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, key, &Validation::default())?;
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(&self.access_decoding, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(&self.refresh_decoding, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "test-access-secret-test-access-secret".into(),
            refresh_secret: "test-refresh-secret-test-refresh-secret".into(),
            access_ttl: Duration::from_secs(300),
            refresh_ttl: Duration::from_secs(3600),
        })
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys();
        let id = Uuid::new_v4();
        let token = keys.sign_access(id, "alice@example.com").expect("sign access");
        let claims = keys.verify_access(&token).expect("verify access");
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "alice@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn sign_and_verify_refresh_token() {
        let keys = make_keys();
        let id = Uuid::new_v4();
        let token = keys.sign_refresh(id, "alice@example.com").expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.sub, id);
    }

    #[test]
    fn no_cross_domain_acceptance() {
        let keys = make_keys();
        let id = Uuid::new_v4();
        let access = keys.sign_access(id, "a@b.c").expect("sign access");
        let refresh = keys.sign_refresh(id, "a@b.c").expect("sign refresh");
        assert_eq!(keys.verify_refresh(&access), Err(TokenError::Invalid));
        assert_eq!(keys.verify_access(&refresh), Err(TokenError::Invalid));
    }

    #[tokio::test]
    async fn keys_derive_from_app_state() {
        let state = crate::state::AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_access(Uuid::new_v4(), "a@b.c").expect("sign");
        assert!(keys.verify_access(&token).is_ok());
    }

    #[test]
    fn consecutive_tokens_differ() {
        let keys = make_keys();
        let id = Uuid::new_v4();
        let a = keys.sign_access(id, "a@b.c").expect("sign");
        let b = keys.sign_access(id, "a@b.c").expect("sign");
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_is_invalid() {
        let keys = make_keys();
        assert_eq!(keys.verify_access("not-a-jwt"), Err(TokenError::Invalid));
    }

    #[test]
    fn expired_token_is_distinguished() {
        let keys = make_keys();
        // Craft a token whose expiry is well past the default validation leeway.
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "a@b.c".into(),
            iat: (now - 600) as usize,
            exp: (now - 300) as usize,
            jti: Uuid::new_v4(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-access-secret-test-access-secret"),
        )
        .expect("encode");
        assert_eq!(keys.verify_access(&token), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_is_invalid_not_expired() {
        let keys = make_keys();
        let other = JwtKeys::from_config(&JwtConfig {
            secret: "another-secret-another-secret-another".into(),
            refresh_secret: "another-refresh-another-refresh-anoth".into(),
            access_ttl: Duration::from_secs(300),
            refresh_ttl: Duration::from_secs(3600),
        });
        let token = other.sign_access(Uuid::new_v4(), "a@b.c").expect("sign");
        assert_eq!(keys.verify_access(&token), Err(TokenError::Invalid));
    }
}
