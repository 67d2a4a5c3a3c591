//! Persistence seams used by the services and handlers.
//!
//! Each record kind gets a trait; [`StoreRepository`] implements all of them
//! over the embedded [`DocumentStore`](crate::storage::DocumentStore).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use crate::model::{
    Campaign, CampaignId, CampaignPatch, Event, EventId, EventPatch, Lead, LeadId, LeadPatch,
    LeadSource, LeadStatus, Priority, Role, User, UserId, ValidationError,
};
use crate::storage::StoreError;

mod store;

pub use store::StoreRepository;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// How a single employee is attached to a lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Replace the allocation with exactly this employee.
    Primary(UserId),
    /// Add this employee unless already allocated.
    Shared(UserId),
}

/// Criteria for selecting leads. Empty lists mean "no restriction".
#[derive(Debug, Clone, Default)]
pub struct LeadQuery {
    pub include_archived: bool,
    pub statuses: Vec<LeadStatus>,
    pub priorities: Vec<Priority>,
    pub sources: Vec<LeadSource>,
    /// Case-insensitive exact match.
    pub cities: Vec<String>,
    pub allocated_to: Option<UserId>,
    pub client_phone: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Matched against client name, phone, status, priority and city.
    pub text: Option<Regex>,
    pub limit: Option<usize>,
}

impl LeadQuery {
    pub fn matches(&self, lead: &Lead) -> bool {
        if lead.is_archived && !self.include_archived {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&lead.status) {
            return false;
        }
        if !self.priorities.is_empty()
            && !lead.priority.is_some_and(|p| self.priorities.contains(&p))
        {
            return false;
        }
        if !self.sources.is_empty() && !lead.source.is_some_and(|s| self.sources.contains(&s)) {
            return false;
        }
        if !self.cities.is_empty()
            && !lead.city.as_deref().is_some_and(|city| {
                self.cities
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(city))
            })
        {
            return false;
        }
        if let Some(user) = &self.allocated_to
            && !lead.is_allocated_to(user)
        {
            return false;
        }
        if let Some(phone) = &self.client_phone
            && lead.client_phone.as_deref() != Some(phone.as_str())
        {
            return false;
        }
        if self.created_from.is_some_and(|from| lead.created_at < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| lead.created_at > to) {
            return false;
        }
        if let Some(pattern) = &self.text {
            let hit = [
                lead.client_name.as_deref(),
                lead.client_phone.as_deref(),
                Some(lead.status.as_str()),
                lead.priority.map(Priority::as_str),
                lead.city.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| pattern.is_match(field));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn create(&self, lead: Lead) -> RepoResult<Lead>;
    async fn get(&self, id: &LeadId) -> RepoResult<Option<Lead>>;
    /// Matching leads ordered by creation time (then id), truncated to `query.limit`.
    async fn list(&self, query: &LeadQuery) -> RepoResult<Vec<Lead>>;
    async fn update(&self, id: &LeadId, patch: LeadPatch, now: DateTime<Utc>)
    -> RepoResult<Option<Lead>>;
    async fn assign(
        &self,
        id: &LeadId,
        assignment: Assignment,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Lead>>;
    async fn archive(&self, id: &LeadId, now: DateTime<Utc>) -> RepoResult<Option<Lead>>;
    async fn delete(&self, id: &LeadId) -> RepoResult<Option<Lead>>;
    async fn delete_all(&self) -> RepoResult<usize>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the username is taken.
    async fn create(&self, user: User) -> RepoResult<User>;
    async fn get(&self, id: &UserId) -> RepoResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Users ordered by ascending id, optionally restricted to one role.
    async fn list(&self, role: Option<Role>) -> RepoResult<Vec<User>>;
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn create(&self, campaign: Campaign) -> RepoResult<Campaign>;
    async fn get(&self, id: &CampaignId) -> RepoResult<Option<Campaign>>;
    async fn list(&self) -> RepoResult<Vec<Campaign>>;
    async fn update(
        &self,
        id: &CampaignId,
        patch: CampaignPatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Campaign>>;
    async fn delete(&self, id: &CampaignId) -> RepoResult<Option<Campaign>>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: Event) -> RepoResult<Event>;
    async fn get(&self, id: &EventId) -> RepoResult<Option<Event>>;
    /// Events ordered by start time, optionally restricted to one owner.
    async fn list(&self, owner: Option<&UserId>) -> RepoResult<Vec<Event>>;
    async fn update(
        &self,
        id: &EventId,
        patch: EventPatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Event>>;
    async fn delete(&self, id: &EventId) -> RepoResult<Option<Event>>;
}
