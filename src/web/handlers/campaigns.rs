use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use tracing::info;

use crate::model::{Campaign, CampaignDraft, CampaignId, CampaignPatch};
use crate::state::AppState;
use crate::web::error::{ApiError, ApiResult};
use crate::web::extract::{ApiJson, ApiPath, AuthUser, RequireManager};
use crate::web::response::ApiResponse;

const NOT_FOUND: &str = "Campaign not found";

pub async fn create(
    State(state): State<AppState>,
    RequireManager(manager): RequireManager,
    ApiJson(draft): ApiJson<CampaignDraft>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Campaign>>)> {
    let campaign = draft.into_campaign(state.clock.now())?;
    let campaign = state.campaigns.create(campaign).await?;
    info!(campaign_id = %campaign.id, created_by = %manager.id, "campaign created");
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(campaign, "Campaign created successfully"),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser { .. }: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<Campaign>>>> {
    let campaigns = state.campaigns.list().await?;
    Ok(ApiResponse::ok(campaigns, "Campaigns fetched successfully"))
}

pub async fn get(
    State(state): State<AppState>,
    AuthUser { .. }: AuthUser,
    ApiPath(id): ApiPath<CampaignId>,
) -> ApiResult<Json<ApiResponse<Campaign>>> {
    let campaign = state
        .campaigns
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::ok(campaign, "Campaign fetched successfully"))
}

pub async fn update(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
    ApiPath(id): ApiPath<CampaignId>,
    ApiJson(patch): ApiJson<CampaignPatch>,
) -> ApiResult<Json<ApiResponse<Campaign>>> {
    let campaign = state
        .campaigns
        .update(&id, patch, state.clock.now())
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::ok(campaign, "Campaign updated successfully"))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub message: &'static str,
}

pub async fn delete(
    State(state): State<AppState>,
    RequireManager(manager): RequireManager,
    ApiPath(id): ApiPath<CampaignId>,
) -> ApiResult<Json<Deleted>> {
    let removed = state
        .campaigns
        .delete(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    info!(campaign_id = %removed.id, deleted_by = %manager.id, "campaign deleted");
    Ok(Json(Deleted { message: "Deleted" }))
}
