//! # Cointask Ledger Store
//!
//! Persistent reward ledger on LMDB. Semua multi-step mutation (referral
//! bonus, link click credit, verified-action reward) berjalan dalam satu
//! LMDB write transaction — commit semuanya atau tidak sama sekali.
//!
//! ## Buckets
//! - `accounts`        id (u64 BE) → bincode Account
//! - `contacts`        contact bytes → id (u64 BE), unique index
//! - `ads`             id (u64 BE) → bincode Advertisement
//! - `ad_clicks`       ad_id(8) + account_id(8) → marker, the per-ad click-set
//! - `actions`         account_id(8) + ad_id(8) + kind(1) → bincode ActionRecord
//! - `fingerprints`    account_id(8) + sha256(32) → marker, per-account guard
//! - `packages`        id (u64 BE) → bincode CoinPackage
//! - `meta`            sequence counters
//!
//! Uniqueness is enforced with `WriteFlags::NO_OVERWRITE`: the insert itself
//! is the arbiter, never a check-then-insert pair.

mod accounts;
mod actions;
mod ads;
mod db;
mod packages;

pub use accounts::{Account, SpinOutcome};
pub use actions::{ActionRecord, ClaimOutcome};
pub use ads::{AdAvailability, Advertisement, ClickOutcome, NewAd};
pub use db::LedgerDb;
pub use packages::CoinPackage;
