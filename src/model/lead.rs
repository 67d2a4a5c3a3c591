use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LeadId, UserId, ValidationError, trimmed};

tag_enum! {
    /// Lifecycle tag of a lead.
    LeadStatus {
        New => ("new", "New"),
        ClosedLost => ("closedLost", "Closed (Lost)"),
        ClosedWon => ("closedWon", "Closed (Won)"),
        MeetingDone => ("meetingDone", "Meeting (Done)"),
        MeetingAttempt => ("meetingAttempt", "Meeting (Attempt)"),
        FollowedUpCall => ("followedUpCall", "Followed Up (Call)"),
        FollowedUpEmail => ("followedUpEmail", "Followed Up (Email)"),
        ContactedClientCall => ("contactedClientCall", "Contacted Client (Call)"),
        ContactedClientCallAttempt => (
            "contactedClientCallAttempt",
            "Contacted Client (Call Attempt)"
        ),
        ContactedClientEmail => ("contactedClientEmail", "Contacted Client (Email)"),
        NotInterested => ("notInterested", "Not Interested"),
        NotAnswering => ("notAnswering", "Not Answering"),
    }
}

impl Default for LeadStatus {
    fn default() -> Self {
        Self::New
    }
}

tag_enum! {
    Priority {
        VeryHot => ("veryHot", "Very Hot"),
        Hot => ("hot", "Hot"),
        Moderate => ("moderate", "Moderate"),
        Cold => ("cold", "Cold"),
        VeryCold => ("veryCold", "Very Cold"),
    }
}

tag_enum! {
    /// Channel the prospect came in through.
    LeadSource {
        Instagram => ("instagram", "Instagram"),
        Facebook => ("facebook", "Facebook"),
        FacebookComment => ("facebookComment", "Facebook Comment"),
        FriendAndFamily => ("friendAndFamily", "Friend and Family"),
        DirectCall => ("directCall", "Direct Call"),
        Google => ("google", "Google"),
        Referral => ("referral", "Referral"),
    }
}

/// A sales prospect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub city: Option<String>,
    pub priority: Option<Priority>,
    pub status: LeadStatus,
    pub source: Option<LeadSource>,
    pub description: Option<String>,
    /// Employees currently responsible for the lead.
    pub allocated_to: Vec<UserId>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(draft: &LeadDraft, owner: Option<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            id: LeadId::generate(),
            client_name: trimmed(draft.client_name.clone()),
            client_phone: trimmed(draft.client_phone.clone()),
            city: trimmed(draft.city.clone()),
            priority: draft.priority,
            status: draft.status.unwrap_or_default(),
            source: draft.source,
            description: trimmed(draft.description.clone()),
            allocated_to: owner.into_iter().collect(),
            is_archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_allocated_to(&self, user: &UserId) -> bool {
        self.allocated_to.contains(user)
    }

    /// Replaces the allocation with a single employee.
    pub fn assign_primary(&mut self, employee: UserId, now: DateTime<Utc>) {
        self.allocated_to = vec![employee];
        self.updated_at = now;
    }

    /// Adds `employee` to the allocation unless already present. Returns whether it was added.
    pub fn share_with(&mut self, employee: UserId, now: DateTime<Utc>) -> bool {
        if self.is_allocated_to(&employee) {
            return false;
        }
        self.allocated_to.push(employee);
        self.updated_at = now;
        true
    }

    pub fn archive(&mut self, now: DateTime<Utc>) {
        self.is_archived = true;
        self.updated_at = now;
    }

    pub fn apply(&mut self, patch: LeadPatch, now: DateTime<Utc>) {
        if let Some(client_name) = patch.client_name {
            self.client_name = trimmed(Some(client_name));
        }
        if let Some(client_phone) = patch.client_phone {
            self.client_phone = trimmed(Some(client_phone));
        }
        if let Some(city) = patch.city {
            self.city = trimmed(Some(city));
        }
        if let Some(priority) = patch.priority {
            self.priority = Some(priority);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(source) = patch.source {
            self.source = Some(source);
        }
        if let Some(description) = patch.description {
            self.description = trimmed(Some(description));
        }
        self.updated_at = now;
    }
}

/// Payload for `POST /leads/create`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDraft {
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub city: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub description: Option<String>,
    /// Number of identical leads to create.
    pub count: Option<u32>,
}

impl LeadDraft {
    pub const MAX_BATCH: u32 = 100;

    pub fn batch_size(&self) -> Result<u32, ValidationError> {
        match self.count {
            None => Ok(1),
            Some(0) => Err(ValidationError::new("count must be at least 1")),
            Some(count) if count > Self::MAX_BATCH => Err(ValidationError::new(format!(
                "count must be at most {}",
                Self::MAX_BATCH
            ))),
            Some(count) => Ok(count),
        }
    }
}

/// Payload for `PUT /leads/update/:leadId`; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPatch {
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub city: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub description: Option<String>,
}

impl LeadPatch {
    pub fn has_changes(&self) -> bool {
        self.client_name.is_some()
            || self.client_phone.is_some()
            || self.city.is_some()
            || self.priority.is_some()
            || self.status.is_some()
            || self.source.is_some()
            || self.description.is_some()
    }
}
