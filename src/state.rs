use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::http::HeaderValue;
use chrono::Duration;

use crate::auth::SessionManager;
use crate::repository::{
    CampaignRepository, EventRepository, LeadRepository, StoreRepository, UserRepository,
};
use crate::shuffle::{Clock, ShuffleService, SystemClock};
use crate::storage::DocumentStore;
use crate::web::rate_limit::{RateLimitPolicy, RateLimiter};

/// Knobs for assembling an [`AppState`]. `Default` matches the production defaults.
#[derive(Clone)]
pub struct StateOptions {
    pub session_ttl: Duration,
    pub bcrypt_cost: u32,
    pub default_limit: RateLimitPolicy,
    pub manager_limit: RateLimitPolicy,
    pub clock: Arc<dyn Clock>,
    /// Allowed CORS origin; `None` allows any origin.
    pub cors_origin: Option<HeaderValue>,
}

impl Default for StateOptions {
    fn default() -> Self {
        let window = StdDuration::from_secs(15 * 60);
        Self {
            session_ttl: Duration::hours(24),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            default_limit: RateLimitPolicy::new(window, 100),
            manager_limit: RateLimitPolicy::new(window, 200),
            clock: Arc::new(SystemClock),
            cors_origin: None,
        }
    }
}

/// The two limiter instances handed to the router.
#[derive(Clone)]
pub struct RateLimits {
    pub default: Arc<RateLimiter>,
    pub manager: Arc<RateLimiter>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub leads: Arc<dyn LeadRepository>,
    pub users: Arc<dyn UserRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub events: Arc<dyn EventRepository>,
    pub sessions: Arc<SessionManager>,
    pub shuffle: Arc<ShuffleService>,
    pub clock: Arc<dyn Clock>,
    pub limits: RateLimits,
    pub cors_origin: Option<HeaderValue>,
}

impl AppState {
    pub fn new(store: Arc<DocumentStore>, options: StateOptions) -> Self {
        let repo = Arc::new(StoreRepository::new(store.clone()));
        let leads: Arc<dyn LeadRepository> = repo.clone();
        let users: Arc<dyn UserRepository> = repo.clone();

        let sessions = SessionManager::new(users.clone(), options.session_ttl)
            .with_cost(options.bcrypt_cost);
        let shuffle = ShuffleService::new(leads.clone(), users.clone(), options.clock.clone());

        Self {
            store,
            leads,
            users,
            campaigns: repo.clone(),
            events: repo,
            sessions: Arc::new(sessions),
            shuffle: Arc::new(shuffle),
            clock: options.clock,
            limits: RateLimits {
                default: Arc::new(RateLimiter::new(options.default_limit)),
                manager: Arc::new(RateLimiter::new(options.manager_limit)),
            },
            cors_origin: options.cors_origin,
        }
    }

    pub fn in_memory(options: StateOptions) -> Self {
        Self::new(Arc::new(DocumentStore::in_memory()), options)
    }
}
