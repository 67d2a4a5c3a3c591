use std::str::FromStr;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::leads::{PopulatedLead, StatRow, StatsKind, populate, populate_one, tally};
use crate::model::time::{end_of_day, parse_calendar_date, start_of_day};
use crate::model::{
    Lead, LeadDraft, LeadId, LeadPatch, LeadSource, LeadStatus, Priority, User, UserId,
};
use crate::repository::{Assignment, LeadQuery};
use crate::state::AppState;
use crate::web::error::{ApiError, ApiResult};
use crate::web::extract::{ApiJson, ApiPath, ApiQuery, AuthUser, RequireManager, RequireSuperAdmin};
use crate::web::response::ApiResponse;

const NOT_FOUND: &str = "Lead not found";
const NOT_ALLOCATED: &str = "This lead is not allocated to you.";

/// Loads a lead the caller may change: managers reach every lead, employees
/// only the ones allocated to them.
async fn accessible_lead(state: &AppState, user: &User, lead_id: &LeadId) -> ApiResult<Lead> {
    let lead = state
        .leads
        .get(lead_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    if user.role.is_manager() || lead.is_allocated_to(&user.id) {
        Ok(lead)
    } else {
        Err(ApiError::forbidden(NOT_ALLOCATED))
    }
}

async fn listed(state: &AppState, query: &LeadQuery) -> ApiResult<Vec<PopulatedLead>> {
    let leads = state.leads.list(query).await?;
    Ok(populate(state.users.as_ref(), leads).await?)
}

fn every_lead() -> LeadQuery {
    LeadQuery {
        include_archived: true,
        ..LeadQuery::default()
    }
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiJson(draft): ApiJson<LeadDraft>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Vec<PopulatedLead>>>)> {
    let batch = draft.batch_size()?;
    let now = state.clock.now();

    let mut created = Vec::with_capacity(batch as usize);
    for _ in 0..batch {
        let lead = Lead::new(&draft, Some(user.id.clone()), now);
        created.push(state.leads.create(lead).await?);
    }
    info!(count = created.len(), created_by = %user.id, "leads created");

    let message = format!(
        "Lead(s) created successfully ({} lead(s) created)",
        created.len()
    );
    let created = populate(state.users.as_ref(), created).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(created, message)))
}

pub async fn get_single(
    State(state): State<AppState>,
    AuthUser { .. }: AuthUser,
    ApiPath(lead_id): ApiPath<LeadId>,
) -> ApiResult<Json<ApiResponse<PopulatedLead>>> {
    let lead = state
        .leads
        .get(&lead_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    let lead = populate_one(state.users.as_ref(), lead).await?;
    Ok(ApiResponse::ok(lead, "Lead fetched successfully"))
}

pub async fn get_by_phone(
    State(state): State<AppState>,
    AuthUser { .. }: AuthUser,
    ApiPath(phone): ApiPath<String>,
) -> ApiResult<Json<ApiResponse<Vec<PopulatedLead>>>> {
    let query = LeadQuery {
        client_phone: Some(phone.trim().to_string()),
        ..every_lead()
    };
    Ok(ApiResponse::ok(
        listed(&state, &query).await?,
        "Lead fetched successfully",
    ))
}

pub async fn get_employee(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<PopulatedLead>>>> {
    let query = LeadQuery {
        allocated_to: Some(user.id),
        ..LeadQuery::default()
    };
    Ok(ApiResponse::ok(
        listed(&state, &query).await?,
        "Leads fetched successfully",
    ))
}

pub async fn get_all(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
) -> ApiResult<Json<ApiResponse<Vec<PopulatedLead>>>> {
    Ok(ApiResponse::ok(
        listed(&state, &every_lead()).await?,
        "Leads fetched successfully",
    ))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub async fn stats(
    State(state): State<AppState>,
    AuthUser { .. }: AuthUser,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<StatRow>>>> {
    let kind = query
        .kind
        .as_deref()
        .and_then(|raw| StatsKind::from_str(raw).ok())
        .ok_or_else(|| ApiError::invalid("Invalid type"))?;
    let leads = state.leads.list(&every_lead()).await?;
    Ok(ApiResponse::ok(
        tally(kind, &leads),
        "Stats fetched successfully.",
    ))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    AuthUser { .. }: AuthUser,
    ApiQuery(search): ApiQuery<SearchQuery>,
) -> ApiResult<Json<ApiResponse<Vec<PopulatedLead>>>> {
    let needle = search.query.unwrap_or_default();
    let pattern = RegexBuilder::new(&regex::escape(needle.trim()))
        .case_insensitive(true)
        .build()
        .map_err(|err| ApiError::invalid(err.to_string()))?;
    let query = LeadQuery {
        text: Some(pattern),
        ..every_lead()
    };
    Ok(ApiResponse::ok(
        listed(&state, &query).await?,
        "Leads searched successfully",
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub source: Option<String>,
    pub city: Option<String>,
    pub starting_date: Option<String>,
    pub ending_date: Option<String>,
}

/// Splits a comma separated parameter and parses each entry.
fn tags<T>(raw: Option<&str>) -> ApiResult<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.into_iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| T::from_str(value).map_err(|err| ApiError::invalid(err.to_string())))
        .collect()
}

fn day_bound(raw: Option<&str>, field: &str) -> ApiResult<Option<chrono::NaiveDate>> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => parse_calendar_date(value)
            .map(Some)
            .ok_or_else(|| ApiError::invalid(format!("{field} '{value}' is not a valid date"))),
    }
}

impl FilterQuery {
    fn into_query(self) -> ApiResult<LeadQuery> {
        let statuses: Vec<LeadStatus> = tags(self.status.as_deref())?;
        let priorities: Vec<Priority> = tags(self.priority.as_deref())?;
        let sources: Vec<LeadSource> = tags(self.source.as_deref())?;
        let cities: Vec<String> = self
            .city
            .as_deref()
            .into_iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();
        let from = day_bound(self.starting_date.as_deref(), "startingDate")?;
        let to = day_bound(self.ending_date.as_deref(), "endingDate")?;

        Ok(LeadQuery {
            statuses,
            priorities,
            sources,
            cities,
            created_from: from.map(start_of_day),
            created_to: to.map(end_of_day),
            ..every_lead()
        })
    }
}

pub async fn filter(
    State(state): State<AppState>,
    AuthUser { .. }: AuthUser,
    ApiQuery(filter): ApiQuery<FilterQuery>,
) -> ApiResult<Json<ApiResponse<Vec<PopulatedLead>>>> {
    let query = filter.into_query()?;
    Ok(ApiResponse::ok(
        listed(&state, &query).await?,
        "Leads filtered successfully",
    ))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiPath(lead_id): ApiPath<LeadId>,
    ApiJson(patch): ApiJson<LeadPatch>,
) -> ApiResult<Json<ApiResponse<PopulatedLead>>> {
    if !patch.has_changes() {
        return Err(ApiError::invalid("at least one field must be provided"));
    }
    accessible_lead(&state, &user, &lead_id).await?;
    let lead = state
        .leads
        .update(&lead_id, patch, state.clock.now())
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    let lead = populate_one(state.users.as_ref(), lead).await?;
    Ok(ApiResponse::ok(lead, "Lead updated successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRequest {
    pub shift_to: Option<UserId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub share_with: Option<UserId>,
}

fn required_user(id: Option<UserId>, field: &str) -> ApiResult<UserId> {
    id.filter(|id| !id.as_str().trim().is_empty())
        .ok_or_else(|| ApiError::invalid(format!("{field} is required")))
}

async fn reallocate(
    state: &AppState,
    user: &User,
    lead_id: &LeadId,
    assignment: Assignment,
) -> ApiResult<PopulatedLead> {
    accessible_lead(state, user, lead_id).await?;
    let lead = state
        .leads
        .assign(lead_id, assignment, state.clock.now())
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(populate_one(state.users.as_ref(), lead).await?)
}

pub async fn shift(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiPath(lead_id): ApiPath<LeadId>,
    ApiJson(request): ApiJson<ShiftRequest>,
) -> ApiResult<Json<ApiResponse<PopulatedLead>>> {
    let shift_to = required_user(request.shift_to, "shiftTo")?;
    let lead = reallocate(&state, &user, &lead_id, Assignment::Primary(shift_to)).await?;
    Ok(ApiResponse::ok(lead, "Lead shifted successfully"))
}

pub async fn share(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiPath(lead_id): ApiPath<LeadId>,
    ApiJson(request): ApiJson<ShareRequest>,
) -> ApiResult<Json<ApiResponse<PopulatedLead>>> {
    let share_with = required_user(request.share_with, "shareWith")?;
    let lead = reallocate(&state, &user, &lead_id, Assignment::Shared(share_with)).await?;
    Ok(ApiResponse::ok(lead, "Lead shared successfully"))
}

pub async fn archive(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiPath(lead_id): ApiPath<LeadId>,
) -> ApiResult<Json<ApiResponse<Lead>>> {
    accessible_lead(&state, &user, &lead_id).await?;
    let lead = state
        .leads
        .archive(&lead_id, state.clock.now())
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::ok(lead, "Lead archived successfully"))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    ApiPath(lead_id): ApiPath<LeadId>,
) -> ApiResult<Json<ApiResponse<Lead>>> {
    let lead = state
        .leads
        .delete(&lead_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    info!(lead_id = %lead.id, deleted_by = %admin.id, "lead deleted");
    Ok(ApiResponse::ok(lead, "Lead deleted successfully"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCount {
    pub deleted_count: usize,
}

pub async fn delete_all(
    State(state): State<AppState>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
) -> ApiResult<Json<ApiResponse<DeletedCount>>> {
    let deleted_count = state.leads.delete_all().await?;
    info!(deleted_count, deleted_by = %admin.id, "lead collection cleared");
    Ok(ApiResponse::ok(
        DeletedCount { deleted_count },
        "Lead collection deleted successfully",
    ))
}
