use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::model::{NewUser, Role, UserProfile};
use crate::state::AppState;
use crate::web::error::ApiResult;
use crate::web::extract::{ApiJson, RequireManager, RequireSuperAdmin};
use crate::web::response::ApiResponse;

pub async fn create(
    State(state): State<AppState>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    ApiJson(new_user): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<ApiResponse<UserProfile>>)> {
    let user = state.sessions.register(new_user).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(UserProfile::from(&user), "User created successfully"),
    ))
}

async fn profiles(state: &AppState, role: Option<Role>) -> ApiResult<Vec<UserProfile>> {
    let users = state.users.list(role).await?;
    Ok(users.iter().map(UserProfile::from).collect())
}

pub async fn list(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
) -> ApiResult<Json<ApiResponse<Vec<UserProfile>>>> {
    Ok(ApiResponse::ok(
        profiles(&state, None).await?,
        "Users fetched successfully",
    ))
}

pub async fn employees(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
) -> ApiResult<Json<ApiResponse<Vec<UserProfile>>>> {
    Ok(ApiResponse::ok(
        profiles(&state, Some(Role::Employee)).await?,
        "Employees fetched successfully",
    ))
}
