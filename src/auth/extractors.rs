use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{
    auth::{repo_types::Account, services::current_account},
    error::AppError,
    state::AppState,
};

/// Resolves the `Authorization: Token <key>` header to the calling account.
pub struct AuthUser(pub Account);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Authentication(
                "Authentication credentials were not provided.",
            ))?;

        let token = token_from_header(header).ok_or_else(|| {
            warn!("malformed Authorization header");
            AppError::Authentication("Invalid token header.")
        })?;

        let account = current_account(state, token).await.map_err(|e| {
            if matches!(e, AppError::Authentication(_)) {
                warn!("unknown token");
            }
            e
        })?;
        Ok(AuthUser(account))
    }
}

/// Accepts `Token <key>` and, equivalently, `Bearer <key>`.
fn token_from_header(header: &str) -> Option<&str> {
    let (scheme, key) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some(key)
}
