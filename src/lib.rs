// ============================================================================
// LeadDesk Library
// ============================================================================

pub mod auth;
pub mod config;
pub mod leads;
pub mod model;
pub mod repository;
pub mod shuffle;
pub mod state;
pub mod storage;
pub mod web;

pub use state::{AppState, StateOptions};
pub use storage::{DocumentStore, StoreError};
pub use web::build_router;
