//! # Cointask Server
//!
//! HTTP surface untuk reward ledger: registrasi + login, daily spin,
//! advertisement feed + click accounting, verified-action claims lewat
//! vision gateway, dan admin surface di belakang shared token.
//!
//! The router is built from an [`AppState`] so tests can wire a
//! [`gateway::MockVisionGateway`] and a tempdir-backed store.

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use cointask_store::LedgerDb;

pub mod admin;
pub mod gateway;
pub mod handlers;
pub mod verify;

pub use gateway::{GatewayError, HttpVisionGateway, MockVisionGateway, Verdict, VisionGateway};
pub use verify::{run_verification, VerifyOutcome};

#[derive(Clone)]
pub struct AppState {
    pub db: LedgerDb,
    pub gateway: Arc<dyn VisionGateway>,
    /// Shared admin token; `None` disables the admin surface entirely.
    pub admin_token: Option<String>,
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/accounts/:id", get(handlers::get_account))
        .route("/accounts/:id/spin", post(handlers::spin))
        .route(
            "/advertisements",
            post(handlers::create_ad).get(handlers::list_ads),
        )
        .route("/advertisements/:id/click", post(handlers::click))
        .route("/verify/:action_kind", post(verify::verify))
        .route("/packages", get(handlers::list_packages))
        .route("/admin/advertisements/:id/approve", post(admin::approve_ad))
        .route("/admin/advertisements/:id", delete(admin::reject_ad))
        .route("/admin/packages", post(admin::create_package))
        .route(
            "/admin/packages/:id",
            put(admin::update_package).delete(admin::delete_package),
        )
        .route("/admin/actions", get(admin::list_actions))
        .route("/admin/accounts/:id/coins", post(admin::adjust_coins))
        .with_state(state)
}
