//! HTTP surface: routing, extractors, error mapping and request limiting.
//!
//! Every route carries exactly one limiter. Manager-only routes use the
//! manager policy; everything else, `/health` included, uses the default one.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod rate_limit;
pub mod response;

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::middleware;
use axum::routing::{MethodRouter, delete, get, post, put};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use self::handlers::{auth, campaigns, events, health, leads, shuffle, users};
use self::rate_limit::{RateLimiter, limit_requests};
use crate::state::AppState;

fn limited(route: MethodRouter<AppState>, limiter: &Arc<RateLimiter>) -> MethodRouter<AppState> {
    route.layer(middleware::from_fn_with_state(limiter.clone(), limit_requests))
}

fn cors(state: &AppState) -> CorsLayer {
    let origin: AllowOrigin = match state.cors_origin.clone() {
        Some(origin) => origin.into(),
        None => Any.into(),
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_headers(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
}

pub fn build_router(state: AppState) -> Router {
    let open = state.limits.default.clone();
    let manager = state.limits.manager.clone();

    Router::new()
        .route("/health", limited(get(health), &open))
        // auth and users
        .route("/auth/login", limited(post(auth::login), &open))
        .route("/auth/logout", limited(post(auth::logout), &open))
        .route("/auth/me", limited(get(auth::me), &open))
        .route(
            "/users",
            limited(post(users::create), &open).merge(limited(get(users::list), &manager)),
        )
        .route("/users/employees", limited(get(users::employees), &manager))
        // shuffle
        .route("/leads/shuffle/filter", limited(post(shuffle::preview), &manager))
        .route("/leads/shuffle/bulk", limited(post(shuffle::bulk), &manager))
        .route(
            "/leads/shuffle/assign/:lead_id",
            limited(post(shuffle::assign), &manager),
        )
        .route("/leads/get/shuffle", limited(get(shuffle::shuffled), &manager))
        // lead records
        .route("/leads/create", limited(post(leads::create), &open))
        .route(
            "/leads/get/single/:lead_id",
            limited(get(leads::get_single), &open),
        )
        .route("/leads/get/phone/:phone", limited(get(leads::get_by_phone), &open))
        .route("/leads/get/employee", limited(get(leads::get_employee), &open))
        .route("/leads/get/all", limited(get(leads::get_all), &manager))
        .route("/leads/get/stats", limited(get(leads::stats), &open))
        .route("/leads/search", limited(get(leads::search), &open))
        .route("/leads/filter", limited(get(leads::filter), &open))
        .route("/leads/update/:lead_id", limited(put(leads::update), &open))
        .route("/leads/update/shift/:lead_id", limited(put(leads::shift), &open))
        .route("/leads/update/share/:lead_id", limited(put(leads::share), &open))
        .route("/leads/archive/:lead_id", limited(put(leads::archive), &open))
        .route("/leads/delete/:lead_id", limited(delete(leads::delete), &open))
        .route(
            "/leads/delete-whole-collection",
            limited(delete(leads::delete_all), &open),
        )
        // campaigns
        .route(
            "/campaigns",
            limited(get(campaigns::list), &open).merge(limited(post(campaigns::create), &manager)),
        )
        .route(
            "/campaigns/:id",
            limited(get(campaigns::get), &open).merge(limited(
                put(campaigns::update).delete(campaigns::delete),
                &manager,
            )),
        )
        // calendar events
        .route(
            "/events",
            limited(post(events::create), &open).merge(limited(get(events::list_all), &manager)),
        )
        .route("/events/employee", limited(get(events::list_mine), &open))
        .route(
            "/events/:id",
            limited(put(events::update).delete(events::delete), &open),
        )
        .layer(cors(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
