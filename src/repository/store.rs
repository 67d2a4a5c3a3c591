use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    Assignment, CampaignRepository, EventRepository, LeadQuery, LeadRepository, RepoError,
    RepoResult, UserRepository,
};
use crate::model::{
    Campaign, CampaignId, CampaignPatch, Event, EventId, EventPatch, Lead, LeadId, LeadPatch, Role,
    User, UserId,
};
use crate::storage::{DocumentStore, StoreError};

/// Every repository trait implemented over one shared [`DocumentStore`].
#[derive(Clone)]
pub struct StoreRepository {
    store: Arc<DocumentStore>,
}

impl StoreRepository {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        Self::new(Arc::new(DocumentStore::in_memory()))
    }
}

#[async_trait]
impl LeadRepository for StoreRepository {
    async fn create(&self, lead: Lead) -> RepoResult<Lead> {
        Ok(self.store.insert(lead).await?)
    }

    async fn get(&self, id: &LeadId) -> RepoResult<Option<Lead>> {
        Ok(self.store.get(id.as_str()).await)
    }

    async fn list(&self, query: &LeadQuery) -> RepoResult<Vec<Lead>> {
        let mut leads = self.store.find(|lead: &Lead| query.matches(lead)).await;
        leads.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        if let Some(limit) = query.limit {
            leads.truncate(limit);
        }
        Ok(leads)
    }

    async fn update(
        &self,
        id: &LeadId,
        patch: LeadPatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Lead>> {
        self.store
            .modify(id.as_str(), |lead: &mut Lead| {
                lead.apply(patch, now);
                Ok::<_, RepoError>(())
            })
            .await
    }

    async fn assign(
        &self,
        id: &LeadId,
        assignment: Assignment,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Lead>> {
        self.store
            .modify(id.as_str(), |lead: &mut Lead| {
                match assignment {
                    Assignment::Primary(employee) => lead.assign_primary(employee, now),
                    Assignment::Shared(employee) => {
                        lead.share_with(employee, now);
                    }
                }
                Ok::<_, RepoError>(())
            })
            .await
    }

    async fn archive(&self, id: &LeadId, now: DateTime<Utc>) -> RepoResult<Option<Lead>> {
        self.store
            .modify(id.as_str(), |lead: &mut Lead| {
                lead.archive(now);
                Ok::<_, RepoError>(())
            })
            .await
    }

    async fn delete(&self, id: &LeadId) -> RepoResult<Option<Lead>> {
        Ok(self.store.remove(id.as_str()).await?)
    }

    async fn delete_all(&self) -> RepoResult<usize> {
        Ok(self.store.clear::<Lead>().await?)
    }
}

#[async_trait]
impl UserRepository for StoreRepository {
    async fn create(&self, user: User) -> RepoResult<User> {
        let username = user.username.clone();
        let created = self
            .store
            .insert_unless(user, |existing: &User| {
                existing
                    .username
                    .eq_ignore_ascii_case(&username)
                    .then(|| format!("username '{username}' is already taken"))
            })
            .await?;
        Ok(created)
    }

    async fn get(&self, id: &UserId) -> RepoResult<Option<User>> {
        Ok(self.store.get(id.as_str()).await)
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let found = self
            .store
            .find(|user: &User| user.username.eq_ignore_ascii_case(username))
            .await;
        Ok(found.into_iter().next())
    }

    async fn list(&self, role: Option<Role>) -> RepoResult<Vec<User>> {
        // Keys are ids, so the store already yields ascending id order.
        Ok(self
            .store
            .find(|user: &User| role.is_none_or(|role| user.role == role))
            .await)
    }
}

#[async_trait]
impl CampaignRepository for StoreRepository {
    async fn create(&self, campaign: Campaign) -> RepoResult<Campaign> {
        Ok(self.store.insert(campaign).await?)
    }

    async fn get(&self, id: &CampaignId) -> RepoResult<Option<Campaign>> {
        Ok(self.store.get(id.as_str()).await)
    }

    async fn list(&self) -> RepoResult<Vec<Campaign>> {
        let mut campaigns = self.store.find(|_: &Campaign| true).await;
        campaigns.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(campaigns)
    }

    async fn update(
        &self,
        id: &CampaignId,
        patch: CampaignPatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Campaign>> {
        self.store
            .modify(id.as_str(), |campaign: &mut Campaign| {
                campaign.apply(patch, now).map_err(RepoError::from)
            })
            .await
    }

    async fn delete(&self, id: &CampaignId) -> RepoResult<Option<Campaign>> {
        Ok(self.store.remove(id.as_str()).await?)
    }
}

#[async_trait]
impl EventRepository for StoreRepository {
    async fn create(&self, event: Event) -> RepoResult<Event> {
        Ok(self.store.insert(event).await?)
    }

    async fn get(&self, id: &EventId) -> RepoResult<Option<Event>> {
        Ok(self.store.get(id.as_str()).await)
    }

    async fn list(&self, owner: Option<&UserId>) -> RepoResult<Vec<Event>> {
        let mut events = self
            .store
            .find(|event: &Event| owner.is_none_or(|owner| &event.owner == owner))
            .await;
        events.sort_by(|left, right| {
            left.start
                .cmp(&right.start)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(events)
    }

    async fn update(
        &self,
        id: &EventId,
        patch: EventPatch,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Event>> {
        self.store
            .modify(id.as_str(), |event: &mut Event| {
                event.apply(patch, now).map_err(RepoError::from)
            })
            .await
    }

    async fn delete(&self, id: &EventId) -> RepoResult<Option<Event>> {
        Ok(self.store.remove(id.as_str()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LeadDraft, LeadStatus};
    use chrono::Duration;

    fn user(id: &str, username: &str, role: Role) -> User {
        User {
            id: UserId::from(id),
            username: username.to_string(),
            first_name: None,
            last_name: None,
            phone: None,
            role,
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn usernames_are_unique_case_insensitively() {
        let repo = StoreRepository::in_memory();
        UserRepository::create(&repo, user("u1", "Alice", Role::Employee))
            .await
            .unwrap();
        let err = UserRepository::create(&repo, user("u2", "alice", Role::Manager))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Store(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn employees_list_in_id_order() {
        let repo = StoreRepository::in_memory();
        for (id, name, role) in [
            ("c", "carol", Role::Employee),
            ("a", "amir", Role::Employee),
            ("b", "bilal", Role::Manager),
        ] {
            UserRepository::create(&repo, user(id, name, role))
                .await
                .unwrap();
        }
        let employees = UserRepository::list(&repo, Some(Role::Employee))
            .await
            .unwrap();
        let ids: Vec<_> = employees.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn lead_list_orders_by_creation_and_limits() {
        let repo = StoreRepository::in_memory();
        let base = Utc::now();
        for offset in [3, 1, 2] {
            let lead = Lead::new(
                &LeadDraft {
                    status: Some(LeadStatus::New),
                    ..LeadDraft::default()
                },
                None,
                base + Duration::minutes(offset),
            );
            LeadRepository::create(&repo, lead).await.unwrap();
        }

        let query = LeadQuery {
            limit: Some(2),
            ..LeadQuery::default()
        };
        let leads = LeadRepository::list(&repo, &query).await.unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].created_at, base + Duration::minutes(1));
        assert_eq!(leads[1].created_at, base + Duration::minutes(2));
    }

    #[tokio::test]
    async fn invalid_campaign_patch_surfaces_validation_error() {
        let repo = StoreRepository::in_memory();
        let campaign = crate::model::CampaignDraft {
            name: "Search".into(),
            ..Default::default()
        }
        .into_campaign(Utc::now())
        .unwrap();
        let campaign = CampaignRepository::create(&repo, campaign).await.unwrap();

        let err = CampaignRepository::update(
            &repo,
            &campaign.id,
            CampaignPatch {
                spend: Some(-5.0),
                ..CampaignPatch::default()
            },
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Invalid(_)));
    }
}
