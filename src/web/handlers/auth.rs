use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::model::UserProfile;
use crate::state::AppState;
use crate::web::error::ApiResult;
use crate::web::extract::{ApiJson, AuthUser};
use crate::web::response::{ApiMessage, ApiResponse};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let (token, user) = state
        .sessions
        .login(&request.username, &request.password)
        .await?;
    Ok(Json(LoginResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    AuthUser { token, .. }: AuthUser,
) -> Json<ApiMessage> {
    state.sessions.logout(&token).await;
    ApiMessage::ok("Logged out successfully")
}

pub async fn me(AuthUser { user, .. }: AuthUser) -> Json<ApiResponse<UserProfile>> {
    ApiResponse::ok(UserProfile::from(&user), "User fetched successfully")
}
