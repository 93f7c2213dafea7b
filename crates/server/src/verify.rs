//! Verified-action claim flow.
//!
//! Ordering is load-bearing: local duplicate checks run before the
//! classifier is consulted, so a duplicate submission never costs a
//! gateway call; and the fingerprint is consumed only inside the atomic
//! commit, so a negative, indeterminate, or failed verification leaves
//! the image claimable on retry.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use cointask_common::fingerprint::{digest, validate_proof_image};
use cointask_common::{ActionKind, LedgerError, Result};
use cointask_store::{ClaimOutcome, LedgerDb};

use crate::gateway::{instruction_for, Verdict, VisionGateway};
use crate::handlers::{error_response, now_secs};
use crate::AppState;

/// Final outcome of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Credited { amount: u64, balance: u64 },
    NotConfirmed,
    DuplicateImage,
    AlreadyCompleted,
}

/// Run the full claim flow for one submission.
///
/// 1. shallow image validation (no gateway call for garbage input)
/// 2. fingerprint + action-ledger precheck (early duplicate verdicts)
/// 3. classifier call
/// 4. atomic commit on `Confirmed`; everything else mutates nothing
pub async fn run_verification(
    db: &LedgerDb,
    gateway: &dyn VisionGateway,
    account_id: u64,
    ad_id: u64,
    kind: ActionKind,
    username: Option<&str>,
    image: &[u8],
    now: u64,
) -> Result<VerifyOutcome> {
    validate_proof_image(image)?;
    let proof = digest(image);

    match db.claim_precheck(account_id, ad_id, kind, &proof)? {
        Some(ClaimOutcome::AlreadyProcessed) => return Ok(VerifyOutcome::DuplicateImage),
        Some(ClaimOutcome::AlreadyCompleted) => return Ok(VerifyOutcome::AlreadyCompleted),
        Some(ClaimOutcome::Credited { .. }) | None => {}
    }

    let instruction = instruction_for(kind, username);
    let verdict = gateway
        .classify(image, &instruction)
        .await
        .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

    match verdict {
        Verdict::NotConfirmed => {
            tracing::warn!(account = account_id, ad = ad_id, kind = %kind, "claim not confirmed");
            Ok(VerifyOutcome::NotConfirmed)
        }
        Verdict::Indeterminate => Err(LedgerError::Internal(
            "classifier returned an indeterminate verdict".to_string(),
        )),
        Verdict::Confirmed => match db.apply_verified_action(account_id, ad_id, kind, &proof, now)? {
            ClaimOutcome::Credited { amount, balance } => {
                Ok(VerifyOutcome::Credited { amount, balance })
            }
            // A racing duplicate landed between precheck and commit.
            ClaimOutcome::AlreadyProcessed => Ok(VerifyOutcome::DuplicateImage),
            ClaimOutcome::AlreadyCompleted => Ok(VerifyOutcome::AlreadyCompleted),
        },
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP HANDLER
// ════════════════════════════════════════════════════════════════════════════

struct VerifyForm {
    account_id: u64,
    advertisement_id: u64,
    proof_image: Vec<u8>,
    username: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<VerifyForm> {
    let mut account_id = None;
    let mut advertisement_id = None;
    let mut proof_image = None;
    let mut username = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| LedgerError::Validation(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "account_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| LedgerError::Validation(e.to_string()))?;
                account_id = Some(parse_id("account_id", &text)?);
            }
            "advertisement_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| LedgerError::Validation(e.to_string()))?;
                advertisement_id = Some(parse_id("advertisement_id", &text)?);
            }
            "proof_image" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| LedgerError::Validation(e.to_string()))?;
                proof_image = Some(bytes.to_vec());
            }
            "username" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| LedgerError::Validation(e.to_string()))?;
                if !text.trim().is_empty() {
                    username = Some(text);
                }
            }
            _ => {} // unknown fields ignored
        }
    }

    let mut missing = Vec::new();
    if account_id.is_none() {
        missing.push("account_id");
    }
    if advertisement_id.is_none() {
        missing.push("advertisement_id");
    }
    if proof_image.is_none() {
        missing.push("proof_image");
    }
    match (account_id, advertisement_id, proof_image) {
        (Some(account_id), Some(advertisement_id), Some(proof_image)) => Ok(VerifyForm {
            account_id,
            advertisement_id,
            proof_image,
            username,
        }),
        _ => Err(LedgerError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        ))),
    }
}

fn parse_id(name: &str, text: &str) -> Result<u64> {
    text.trim()
        .parse::<u64>()
        .map_err(|_| LedgerError::Validation(format!("{} must be a positive integer", name)))
}

/// `POST /verify/:action_kind` — multipart claim submission.
pub async fn verify(
    State(state): State<AppState>,
    Path(action_kind): Path<String>,
    multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let Some(kind) = ActionKind::parse(&action_kind) else {
        return error_response(&LedgerError::Validation(format!(
            "unknown action kind: {}",
            action_kind
        )));
    };
    let form = match read_form(multipart).await {
        Ok(f) => f,
        Err(e) => return error_response(&e),
    };

    let result = run_verification(
        &state.db,
        state.gateway.as_ref(),
        form.account_id,
        form.advertisement_id,
        kind,
        form.username.as_deref(),
        &form.proof_image,
        now_secs(),
    )
    .await;

    match result {
        Ok(VerifyOutcome::Credited { amount, balance }) => (
            StatusCode::OK,
            Json(json!({"status": 1, "amount": amount, "balance": balance})),
        ),
        Ok(VerifyOutcome::NotConfirmed) => (
            StatusCode::OK,
            Json(json!({"status": 0, "message": "action not confirmed"})),
        ),
        Ok(VerifyOutcome::DuplicateImage) => (
            StatusCode::OK,
            Json(json!({"status": -1, "message": "proof image already used"})),
        ),
        Ok(VerifyOutcome::AlreadyCompleted) => (
            StatusCode::OK,
            Json(json!({"status": -2, "message": "action already completed"})),
        ),
        Err(e) => {
            tracing::error!(error = %e, "verification failed");
            error_response(&e)
        }
    }
}
