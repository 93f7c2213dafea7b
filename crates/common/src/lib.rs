//! # Cointask Common Crate
//!
//! Shared types dan helpers untuk backend cointask.
//!
//! ## Modules
//! - `policy`: action kinds, reward table, spin cooldown evaluation
//! - `fingerprint`: proof-image digest + basic image validation
//! - `crypto`: salted credential hashing
//! - `error`: ledger error taxonomy
//! - `config`: TOML configuration loader

pub mod config;
pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod policy;

pub use error::LedgerError;
pub use policy::{ActionKind, SpinStatus, REFERRAL_BONUS, SPIN_COOLDOWN_SECS, SPIN_REWARD};

pub type Result<T> = std::result::Result<T, LedgerError>;
