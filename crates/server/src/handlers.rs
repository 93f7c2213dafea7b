//! Public HTTP handlers: accounts, advertisements, packages.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use cointask_common::LedgerError;
use cointask_store::{ClickOutcome, NewAd, SpinOutcome};

use crate::AppState;

/// Current unix time in seconds. The store never reads the clock itself;
/// handlers pin `now` here and pass it down.
pub(crate) fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Map a ledger error onto its HTTP response.
pub(crate) fn error_response(err: &LedgerError) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(err.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": err.to_string()})))
}

// ════════════════════════════════════════════════════════════════════════════
// ACCOUNTS
// ════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct RegisterReq {
    pub name: String,
    pub contact: String,
    pub phone: String,
    pub password: String,
    pub referrer_id: Option<u64>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> (StatusCode, Json<Value>) {
    match state.db.register(
        &req.name,
        &req.contact,
        &req.phone,
        &req.password,
        req.referrer_id,
        now_secs(),
    ) {
        Ok(account) => {
            tracing::info!(id = account.id, "account registered");
            (StatusCode::CREATED, Json(json!({"account": account.public_json()})))
        }
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct LoginReq {
    pub contact: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> (StatusCode, Json<Value>) {
    match state.db.authenticate(&req.contact, &req.password) {
        Ok(account) => (StatusCode::OK, Json(json!({"account": account.public_json()}))),
        Err(e) => error_response(&e),
    }
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> (StatusCode, Json<Value>) {
    let account = match state.db.get_account(id) {
        Ok(Some(a)) => a,
        Ok(None) => return error_response(&LedgerError::NotFound("account".into())),
        Err(e) => return error_response(&e),
    };
    match state.db.referred_ids(id) {
        Ok(referred) => (
            StatusCode::OK,
            Json(json!({"account": account.public_json(), "referred": referred})),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn spin(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> (StatusCode, Json<Value>) {
    match state.db.claim_daily_spin(id, now_secs()) {
        Ok(SpinOutcome::Rewarded { balance }) => {
            (StatusCode::OK, Json(json!({"status": 1, "balance": balance})))
        }
        Ok(SpinOutcome::CoolingDown { remaining_secs }) => (
            StatusCode::OK,
            Json(json!({"status": 0, "remaining_seconds": remaining_secs})),
        ),
        Err(e) => error_response(&e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ADVERTISEMENTS
// ════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct CreateAdReq {
    pub owner: u64,
    #[serde(flatten)]
    pub fields: NewAd,
}

pub async fn create_ad(
    State(state): State<AppState>,
    Json(req): Json<CreateAdReq>,
) -> (StatusCode, Json<Value>) {
    match state.db.create_ad(req.owner, req.fields, now_secs()) {
        Ok(ad) => {
            tracing::info!(id = ad.id, owner = ad.owner, "advertisement created, pending approval");
            (StatusCode::CREATED, Json(json!({"advertisement": ad})))
        }
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct AdsQuery {
    pub account_id: u64,
    pub interest: Option<String>,
}

pub async fn list_ads(
    State(state): State<AppState>,
    Query(q): Query<AdsQuery>,
) -> (StatusCode, Json<Value>) {
    match state.db.list_available(q.account_id, q.interest.as_deref()) {
        Ok(ads) => (StatusCode::OK, Json(json!({"advertisements": ads}))),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct ClickReq {
    pub clicker_id: u64,
}

pub async fn click(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<ClickReq>,
) -> (StatusCode, Json<Value>) {
    match state.db.record_link_click(id, req.clicker_id) {
        Ok(ClickOutcome::Rewarded { clicks, owner_balance }) => (
            StatusCode::OK,
            Json(json!({
                "rewarded": true,
                "new_click_total": clicks,
                "owner_new_balance": owner_balance,
            })),
        ),
        Ok(ClickOutcome::AlreadyClicked { clicks }) => (
            StatusCode::OK,
            Json(json!({"rewarded": false, "new_click_total": clicks})),
        ),
        Err(e) => error_response(&e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PACKAGES
// ════════════════════════════════════════════════════════════════════════════

pub async fn list_packages(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.db.list_packages() {
        Ok(packages) => (StatusCode::OK, Json(json!({"packages": packages}))),
        Err(e) => error_response(&e),
    }
}
