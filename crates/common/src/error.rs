//! Ledger error taxonomy.
//!
//! Errors here are transport-level or integrity failures. Business verdicts
//! (duplicate fingerprint, action already completed, spin cooling down) are
//! NOT errors — they are expressed as outcome enums by the store so callers
//! can map them to 200-level responses.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or missing input. Maps to HTTP 400.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced entity absent. Maps to HTTP 404.
    #[error("{0} not found")]
    NotFound(String),

    /// Uniqueness violation (duplicate contact, duplicate insert). HTTP 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Generic credential failure. Same message whether the account exists
    /// or the password is wrong, to avoid account enumeration. HTTP 401.
    #[error("invalid contact or password")]
    InvalidCredentials,

    /// Operation not permitted in the entity's current state. HTTP 403.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// External verification service unreachable or unconfigured. HTTP 503.
    #[error("verification service unavailable: {0}")]
    Unavailable(String),

    /// Storage or serialization failure. HTTP 500.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// HTTP status code this error maps to at the API boundary.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::Validation(_) => 400,
            LedgerError::InvalidCredentials => 401,
            LedgerError::Forbidden(_) => 403,
            LedgerError::NotFound(_) => 404,
            LedgerError::Conflict(_) => 409,
            LedgerError::Unavailable(_) => 503,
            LedgerError::Internal(_) => 500,
        }
    }
}
