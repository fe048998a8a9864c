use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    auth::{
        dto::{PublicUser, TokenPair},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::UserStore,
    },
    error::ApiError,
};

/// Orchestrates registration, login and refresh-token rotation. Constructed
/// with its store and keys so tests can swap the persistence layer.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    /// Create a user. No tokens are issued here; the client logs in next.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<PublicUser, ApiError> {
        if self.store.find_by_email(email).await?.is_some() {
            warn!(email, "registration for existing email");
            return Err(ApiError::Conflict);
        }

        let hash = hash_password(password)?;
        let user = self.store.create(email, &hash, name).await?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user.into())
    }

    /// Unknown email and wrong password fail identically so callers cannot
    /// enumerate accounts.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(ApiError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "login with invalid password");
            return Err(ApiError::InvalidCredentials);
        }

        let access_token = self.keys.sign_access(user.id, &user.email)?;
        let refresh_token = self.keys.sign_refresh(user.id, &user.email)?;
        self.store.set_refresh_token(user.id, &refresh_token).await?;

        info!(user_id = %user.id, "user logged in");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Redeem a refresh token for a new pair. A token is single-use: the
    /// stored copy must match, and the overwrite is a compare-and-swap so two
    /// racing redemptions cannot both succeed.
    pub async fn refresh(&self, token: &str) -> Result<TokenPair, ApiError> {
        let claims = self
            .keys
            .verify_refresh(token)
            .map_err(|_| ApiError::InvalidToken)?;

        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        if user.refresh_token.as_deref() != Some(token) {
            warn!(user_id = %user.id, "refresh token reuse detected");
            return Err(ApiError::InvalidToken);
        }

        let access_token = self.keys.sign_access(user.id, &user.email)?;
        let refresh_token = self.keys.sign_refresh(user.id, &user.email)?;

        if !self
            .store
            .swap_refresh_token(user.id, token, &refresh_token)
            .await?
        {
            // Lost the race: someone else redeemed this token first.
            warn!(user_id = %user.id, "refresh rotation lost compare-and-swap");
            return Err(ApiError::InvalidToken);
        }

        info!(user_id = %user.id, "refresh token rotated");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::{auth::repo::User, config::JwtConfig};

    #[derive(Default)]
    struct MemoryStore {
        users: Mutex<HashMap<Uuid, User>>,
    }

    #[async_trait]
    impl UserStore for MemoryStore {
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn create(
            &self,
            email: &str,
            password_hash: &str,
            name: Option<&str>,
        ) -> anyhow::Result<User> {
            let user = User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                name: name.map(str::to_string),
                password_hash: password_hash.to_string(),
                refresh_token: None,
                created_at: OffsetDateTime::now_utc(),
            };
            self.users.lock().unwrap().insert(user.id, user.clone());
            Ok(user)
        }

        async fn set_refresh_token(&self, id: Uuid, token: &str) -> anyhow::Result<()> {
            if let Some(u) = self.users.lock().unwrap().get_mut(&id) {
                u.refresh_token = Some(token.to_string());
            }
            Ok(())
        }

        async fn swap_refresh_token(
            &self,
            id: Uuid,
            current: &str,
            next: &str,
        ) -> anyhow::Result<bool> {
            let mut users = self.users.lock().unwrap();
            match users.get_mut(&id) {
                Some(u) if u.refresh_token.as_deref() == Some(current) => {
                    u.refresh_token = Some(next.to_string());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    fn make_service() -> AuthService {
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "test-access-secret-test-access-secret".into(),
            refresh_secret: "test-refresh-secret-test-refresh-secret".into(),
            access_ttl: Duration::from_secs(300),
            refresh_ttl: Duration::from_secs(3600),
        });
        AuthService::new(Arc::new(MemoryStore::default()), keys)
    }

    #[tokio::test]
    async fn register_returns_profile_without_secrets() {
        let svc = make_service();
        let user = svc
            .register("alice@example.com", "pw123456", Some("Alice"))
            .await
            .expect("register");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.name.as_deref(), Some("Alice"));

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let svc = make_service();
        svc.register("alice@example.com", "pw123456", None)
            .await
            .expect("first register");
        let err = svc
            .register("alice@example.com", "other-pw", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict));
    }

    #[tokio::test]
    async fn login_returns_distinct_tokens() {
        let svc = make_service();
        svc.register("alice@example.com", "pw123456", None)
            .await
            .expect("register");
        let pair = svc.login("alice@example.com", "pw123456").await.expect("login");
        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let svc = make_service();
        svc.register("alice@example.com", "pw123456", None)
            .await
            .expect("register");

        let unknown = svc.login("nobody@example.com", "pw123456").await.unwrap_err();
        let wrong_pw = svc.login("alice@example.com", "wrong-pw").await.unwrap_err();
        assert!(matches!(unknown, ApiError::InvalidCredentials));
        assert!(matches!(wrong_pw, ApiError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong_pw.to_string());
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_reuse() {
        let svc = make_service();
        svc.register("alice@example.com", "pw123456", None)
            .await
            .expect("register");
        let pair = svc.login("alice@example.com", "pw123456").await.expect("login");

        let rotated = svc.refresh(&pair.refresh_token).await.expect("first refresh");
        assert_ne!(rotated.refresh_token, pair.refresh_token);
        assert_ne!(rotated.access_token, pair.access_token);

        // The redeemed token is dead even though it has not expired.
        let err = svc.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));

        // The new one still works.
        svc.refresh(&rotated.refresh_token).await.expect("second refresh");
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let svc = make_service();
        svc.register("alice@example.com", "pw123456", None)
            .await
            .expect("register");
        let pair = svc.login("alice@example.com", "pw123456").await.expect("login");
        let err = svc.refresh(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[tokio::test]
    async fn refresh_rejects_garbage() {
        let svc = make_service();
        let err = svc.refresh("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }
}
