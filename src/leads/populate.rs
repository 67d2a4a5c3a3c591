use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Lead, LeadId, LeadSource, LeadStatus, Priority, Role, User, UserId};
use crate::repository::{RepoResult, UserRepository};

/// The slice of a user embedded in lead responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
        }
    }
}

/// A lead with `allocatedTo` resolved to user summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedLead {
    pub id: LeadId,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub city: Option<String>,
    pub priority: Option<Priority>,
    pub status: LeadStatus,
    pub source: Option<LeadSource>,
    pub description: Option<String>,
    pub allocated_to: Vec<UserSummary>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PopulatedLead {
    /// Ids with no matching user are dropped.
    pub fn resolve(lead: Lead, directory: &HashMap<UserId, UserSummary>) -> Self {
        let allocated_to = lead
            .allocated_to
            .iter()
            .filter_map(|id| directory.get(id).cloned())
            .collect();
        Self {
            id: lead.id,
            client_name: lead.client_name,
            client_phone: lead.client_phone,
            city: lead.city,
            priority: lead.priority,
            status: lead.status,
            source: lead.source,
            description: lead.description,
            allocated_to,
            is_archived: lead.is_archived,
            created_at: lead.created_at,
            updated_at: lead.updated_at,
        }
    }
}

async fn directory(users: &dyn UserRepository) -> RepoResult<HashMap<UserId, UserSummary>> {
    Ok(users
        .list(None)
        .await?
        .iter()
        .map(|user| (user.id.clone(), UserSummary::from(user)))
        .collect())
}

pub async fn populate(
    users: &dyn UserRepository,
    leads: Vec<Lead>,
) -> RepoResult<Vec<PopulatedLead>> {
    if leads.is_empty() {
        return Ok(Vec::new());
    }
    let directory = directory(users).await?;
    Ok(leads
        .into_iter()
        .map(|lead| PopulatedLead::resolve(lead, &directory))
        .collect())
}

pub async fn populate_one(users: &dyn UserRepository, lead: Lead) -> RepoResult<PopulatedLead> {
    let directory = directory(users).await?;
    Ok(PopulatedLead::resolve(lead, &directory))
}
