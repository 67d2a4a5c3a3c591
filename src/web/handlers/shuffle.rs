use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::leads::PopulatedLead;
use crate::model::LeadId;
use crate::shuffle::{AssignRequest, BulkShuffleRequest, ShuffleFilter, ShuffleOutcome};
use crate::state::AppState;
use crate::web::error::ApiResult;
use crate::web::extract::{ApiJson, ApiPath, RequireManager};
use crate::web::response::ApiResponse;

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub success: bool,
    pub result: Vec<PopulatedLead>,
    pub total: usize,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub outcome: ShuffleOutcome,
}

pub async fn preview(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
    ApiJson(filter): ApiJson<ShuffleFilter>,
) -> ApiResult<Json<PreviewResponse>> {
    let preview = state.shuffle.preview(filter).await?;
    Ok(Json(PreviewResponse {
        success: true,
        result: preview.leads,
        total: preview.total,
        message: "Filtered leads shuffled (preview)",
    }))
}

pub async fn bulk(
    State(state): State<AppState>,
    RequireManager(manager): RequireManager,
    ApiJson(request): ApiJson<BulkShuffleRequest>,
) -> ApiResult<Json<BulkResponse>> {
    tracing::info!(requested_by = %manager.id, "bulk shuffle requested");
    let outcome = state.shuffle.commit(request).await?;
    Ok(Json(BulkResponse {
        success: true,
        message: "Shuffled & Reassigned Successfully",
        outcome,
    }))
}

pub async fn assign(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
    ApiPath(lead_id): ApiPath<LeadId>,
    ApiJson(request): ApiJson<AssignRequest>,
) -> ApiResult<Json<ApiResponse<PopulatedLead>>> {
    let lead = state.shuffle.assign(&lead_id, request).await?;
    Ok(ApiResponse::ok(lead, "Lead assigned successfully"))
}

pub async fn shuffled(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
) -> ApiResult<Json<ApiResponse<Vec<PopulatedLead>>>> {
    let leads = state.shuffle.shuffled_leads().await?;
    Ok(ApiResponse::ok(leads, "Leads shuffled successfully"))
}
