//! Request extractors: JSON/query/path wrappers that reject with [`ApiError`],
//! and the session and role gates.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::error::ApiError;
use crate::auth::AuthError;
use crate::model::{Role, User};
use crate::state::AppState;

/// Alternative credential header accepted next to `Authorization: Bearer`.
pub const TOKEN_HEADER: &str = "authtoken";

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Token from `Authorization: Bearer <token>`, else from the `authtoken` header.
pub fn presented_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_whitespace().nth(1))
        .map(str::to_string);

    bearer
        .or_else(|| {
            headers
                .get(TOKEN_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

/// Any signed-in user. Employees, managers and super admins all pass.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = presented_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let user = state.sessions.authenticate(&token).await?;
        Ok(Self { user, token })
    }
}

async fn require_role(
    parts: &mut Parts,
    state: &AppState,
    required: Role,
    denied: &str,
) -> Result<User, ApiError> {
    let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
    if !user.role.satisfies(required) {
        return Err(ApiError::forbidden(denied));
    }
    Ok(user)
}

/// Manager or super admin.
#[derive(Debug, Clone)]
pub struct RequireManager(pub User);

#[async_trait]
impl FromRequestParts<AppState> for RequireManager {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Manager, "Only manager can access this route")
            .await
            .map(Self)
    }
}

#[derive(Debug, Clone)]
pub struct RequireSuperAdmin(pub User);

#[async_trait]
impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::SuperAdmin, "Access denied")
            .await
            .map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_wins_over_authtoken() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(presented_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn authtoken_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static(" xyz "));
        assert_eq!(presented_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_or_blank_token_is_none() {
        let mut headers = HeaderMap::new();
        assert!(presented_token(&headers).is_none());
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer"));
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("  "));
        assert!(presented_token(&headers).is_none());
    }
}
