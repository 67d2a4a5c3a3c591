use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::model::{Event, EventDraft, EventId, EventPatch, User};
use crate::state::AppState;
use crate::web::error::{ApiError, ApiResult};
use crate::web::extract::{ApiJson, ApiPath, AuthUser, RequireManager};
use crate::web::response::ApiResponse;

const NOT_FOUND: &str = "Event not found";

/// Loads an event the caller owns, or any event for managers.
async fn owned_event(state: &AppState, user: &User, id: &EventId) -> ApiResult<Event> {
    let event = state
        .events
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    if event.owner == user.id || user.role.is_manager() {
        Ok(event)
    } else {
        Err(ApiError::forbidden("This event does not belong to you."))
    }
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiJson(draft): ApiJson<EventDraft>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Event>>)> {
    let event = draft.into_event(user.id, state.clock.now())?;
    let event = state.events.create(event).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(event, "Event created successfully"),
    ))
}

pub async fn list_all(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
) -> ApiResult<Json<ApiResponse<Vec<Event>>>> {
    let events = state.events.list(None).await?;
    Ok(ApiResponse::ok(events, "Events fetched successfully"))
}

pub async fn list_mine(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<Event>>>> {
    let events = state.events.list(Some(&user.id)).await?;
    Ok(ApiResponse::ok(events, "Events fetched successfully"))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiPath(id): ApiPath<EventId>,
    ApiJson(patch): ApiJson<EventPatch>,
) -> ApiResult<Json<ApiResponse<Event>>> {
    owned_event(&state, &user, &id).await?;
    let event = state
        .events
        .update(&id, patch, state.clock.now())
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::ok(event, "Event updated successfully"))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiPath(id): ApiPath<EventId>,
) -> ApiResult<Json<ApiResponse<Event>>> {
    owned_event(&state, &user, &id).await?;
    let event = state
        .events
        .delete(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::ok(event, "Event deleted successfully"))
}
