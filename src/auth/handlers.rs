use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, RefreshRequest, RegisterRequest, TokenPair},
        extractor::AuthUser,
        jwt::JwtKeys,
        repo::{PgUserStore, UserStore},
        service::AuthService,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

const MIN_PASSWORD_LEN: usize = 6;

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if !is_valid_email(email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters long".into(),
        ));
    }
    Ok(())
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        Arc::new(PgUserStore::new(state.db.clone())),
        JwtKeys::from_ref(state),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    // Emails are stored and compared case-sensitively.
    payload.email = payload.email.trim().to_string();
    validate_credentials(&payload.email, &payload.password)?;

    let user = auth_service(&state)
        .register(&payload.email, &payload.password, payload.name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    payload.email = payload.email.trim().to_string();
    validate_credentials(&payload.email, &payload.password)?;

    let pair = auth_service(&state)
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(pair))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = auth_service(&state).refresh(&payload.token).await?;
    Ok(Json(pair))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = PgUserStore::new(state.db.clone())
        .find_by_id(caller.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
    }

    #[test]
    fn email_regex_rejects_malformed_addresses() {
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("alice @example.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn short_passwords_fail_validation() {
        let err = validate_credentials("alice@example.com", "pw123").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(validate_credentials("alice@example.com", "pw1234").is_ok());
    }
}
