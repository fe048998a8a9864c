use crate::state::AppState;
use axum::Router;

mod dto;
pub mod extractor;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod service;

pub use extractor::AuthUser;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
