//! Admin surface. Every handler checks the shared `X-Admin-Token` header
//! against the configured token before touching the store; with no token
//! configured the whole surface answers 403.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use cointask_common::LedgerError;

use crate::handlers::{error_response, now_secs};
use crate::AppState;

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Compare fixed-length digests instead of the raw strings, so the time
/// taken does not depend on how much of the token prefix matches.
fn token_matches(presented: &str, configured: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(configured.as_bytes())
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    let configured = state.admin_token.as_deref().ok_or_else(|| {
        error_response(&LedgerError::Forbidden("admin surface disabled".into()))
    })?;
    let presented = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    match presented {
        Some(p) if token_matches(p, configured) => Ok(()),
        _ => {
            tracing::warn!("rejected admin request with missing or wrong token");
            Err(error_response(&LedgerError::Forbidden(
                "invalid admin token".into(),
            )))
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ADVERTISEMENT MODERATION
// ════════════════════════════════════════════════════════════════════════════

pub async fn approve_ad(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    match state.db.approve_ad(id, now_secs()) {
        Ok(ad) => {
            tracing::info!(id = ad.id, "advertisement approved");
            (StatusCode::OK, Json(json!({"advertisement": ad})))
        }
        Err(e) => error_response(&e),
    }
}

pub async fn reject_ad(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    match state.db.reject_ad(id) {
        Ok(()) => {
            tracing::info!(id, "advertisement rejected, records cascaded");
            (StatusCode::OK, Json(json!({"deleted": id})))
        }
        Err(e) => error_response(&e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PACKAGES
// ════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct PackageReq {
    pub name: String,
    pub coins: u64,
    pub price_cents: u64,
}

pub async fn create_package(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PackageReq>,
) -> (StatusCode, Json<Value>) {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    match state
        .db
        .create_package(&req.name, req.coins, req.price_cents, now_secs())
    {
        Ok(pkg) => (StatusCode::CREATED, Json(json!({"package": pkg}))),
        Err(e) => error_response(&e),
    }
}

pub async fn update_package(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(req): Json<PackageReq>,
) -> (StatusCode, Json<Value>) {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    match state
        .db
        .update_package(id, &req.name, req.coins, req.price_cents)
    {
        Ok(pkg) => (StatusCode::OK, Json(json!({"package": pkg}))),
        Err(e) => error_response(&e),
    }
}

pub async fn delete_package(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    match state.db.delete_package(id) {
        Ok(()) => (StatusCode::OK, Json(json!({"deleted": id}))),
        Err(e) => error_response(&e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LEDGER INSPECTION / MANUAL ADJUSTMENT
// ════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct ActionsQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

pub async fn list_actions(
    State(state): State<AppState>,
    Query(q): Query<ActionsQuery>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let page = q.page.unwrap_or(1);
    let per_page = q.per_page.unwrap_or(50);
    match state.db.list_actions(page, per_page) {
        Ok((actions, total)) => (
            StatusCode::OK,
            Json(json!({
                "actions": actions,
                "page": page,
                "per_page": per_page,
                "total": total,
            })),
        ),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct CoinsReq {
    pub delta: i64,
}

pub async fn adjust_coins(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(req): Json<CoinsReq>,
) -> (StatusCode, Json<Value>) {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    match state.db.adjust_coins(id, req.delta) {
        Ok(balance) => {
            tracing::info!(account = id, delta = req.delta, balance, "manual coin adjustment");
            (StatusCode::OK, Json(json!({"balance": balance})))
        }
        Err(e) => error_response(&e),
    }
}
