//! Action ledger and fingerprint guard.
//!
//! A verified-action claim is split in two: [`LedgerDb::claim_precheck`]
//! runs the cheap local checks before the vision gateway is consulted, and
//! [`LedgerDb::apply_verified_action`] commits the reward atomically after
//! a confirmed verdict. Both re-check under the write transaction, so a
//! racing duplicate loses at the NO_OVERWRITE insert, never after it.

use lmdb::{Cursor, Transaction as LmdbTxn, WriteFlags};
use serde::{Deserialize, Serialize};

use cointask_common::fingerprint::{digest_hex, ProofDigest};
use cointask_common::{ActionKind, LedgerError, Result};

use crate::db::{action_key, fingerprint_key, internal, LedgerDb};

/// One credited action, keyed by `(account, ad, kind)`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionRecord {
    pub account_id: u64,
    pub ad_id: u64,
    pub kind: ActionKind,
    /// Coins credited for this action, frozen at claim time.
    pub amount: u64,
    pub created_at: u64,
}

/// Outcome of a verified-action claim. Duplicates are verdicts, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Reward committed; `balance` is the account's new total.
    Credited { amount: u64, balance: u64 },
    /// Proof image already consumed by this account (any kind, any ad).
    AlreadyProcessed,
    /// This `(account, ad, kind)` was already rewarded.
    AlreadyCompleted,
}

impl LedgerDb {
    /// Has `account_id` already consumed this proof digest?
    pub fn fingerprint_consumed(&self, account_id: u64, digest: &ProofDigest) -> Result<bool> {
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        match rtxn.get(self.db_fingerprints, &fingerprint_key(account_id, digest)) {
            Ok(_) => Ok(true),
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(internal(e)),
        }
    }

    /// Has `(account, ad, kind)` already been rewarded?
    pub fn action_exists(&self, account_id: u64, ad_id: u64, kind: ActionKind) -> Result<bool> {
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        match rtxn.get(self.db_actions, &action_key(account_id, ad_id, kind.tag())) {
            Ok(_) => Ok(true),
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(internal(e)),
        }
    }

    /// All credited actions of one account (prefix scan on the account id).
    pub fn actions_for(&self, account_id: u64) -> Result<Vec<ActionRecord>> {
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        let prefix = account_id.to_be_bytes();
        let mut out = Vec::new();
        let mut cursor = rtxn.open_ro_cursor(self.db_actions).map_err(internal)?;
        for (key, val) in cursor.iter() {
            if key.len() == 17 && key[0..8] == prefix {
                out.push(bincode::deserialize(val).map_err(internal)?);
            }
        }
        Ok(out)
    }

    /// Paginated ledger dump for the admin surface. `page` is 1-based.
    /// Returns the page plus the total record count.
    pub fn list_actions(&self, page: usize, per_page: usize) -> Result<(Vec<ActionRecord>, usize)> {
        if page == 0 || per_page == 0 {
            return Err(LedgerError::Validation(
                "page and per_page must be >= 1".into(),
            ));
        }
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        let mut all = Vec::new();
        let mut cursor = rtxn.open_ro_cursor(self.db_actions).map_err(internal)?;
        for (_key, val) in cursor.iter() {
            all.push(bincode::deserialize(val).map_err(internal)?);
        }
        let total = all.len();
        let start = (page - 1).saturating_mul(per_page);
        let items = if start >= total {
            Vec::new()
        } else {
            all[start..(start + per_page).min(total)].to_vec()
        };
        Ok((items, total))
    }

    /// Cheap checks before the vision gateway is consulted.
    ///
    /// Validates the account, the ad, and its approved/active state, then
    /// looks for an early duplicate verdict. `Ok(None)` means clear to call
    /// the gateway; `Ok(Some(..))` is a final verdict reached without it.
    pub fn claim_precheck(
        &self,
        account_id: u64,
        ad_id: u64,
        kind: ActionKind,
        digest: &ProofDigest,
    ) -> Result<Option<ClaimOutcome>> {
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        if self.read_account(&rtxn, account_id)?.is_none() {
            return Err(LedgerError::NotFound("account".into()));
        }
        let ad = self
            .read_ad(&rtxn, ad_id)?
            .ok_or_else(|| LedgerError::NotFound("advertisement".into()))?;
        if !ad.is_approved || !ad.is_active {
            return Err(LedgerError::Forbidden(
                "advertisement is not active or not approved".into(),
            ));
        }

        // Fingerprint first: a reused image is rejected before the action
        // ledger is even consulted.
        match rtxn.get(self.db_fingerprints, &fingerprint_key(account_id, digest)) {
            Ok(_) => return Ok(Some(ClaimOutcome::AlreadyProcessed)),
            Err(lmdb::Error::NotFound) => {}
            Err(e) => return Err(internal(e)),
        }
        match rtxn.get(self.db_actions, &action_key(account_id, ad_id, kind.tag())) {
            Ok(_) => return Ok(Some(ClaimOutcome::AlreadyCompleted)),
            Err(lmdb::Error::NotFound) => {}
            Err(e) => return Err(internal(e)),
        }
        Ok(None)
    }

    /// Commit a confirmed action: consume the fingerprint, append the ledger
    /// record, credit the reward. One write transaction; the NO_OVERWRITE
    /// inserts re-arbitrate the duplicate checks so a concurrent claim that
    /// passed precheck still resolves to a duplicate verdict here.
    pub fn apply_verified_action(
        &self,
        account_id: u64,
        ad_id: u64,
        kind: ActionKind,
        digest: &ProofDigest,
        now: u64,
    ) -> Result<ClaimOutcome> {
        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;
        let mut account = self
            .read_account(&wtxn, account_id)?
            .ok_or_else(|| LedgerError::NotFound("account".into()))?;
        if self.read_ad(&wtxn, ad_id)?.is_none() {
            return Err(LedgerError::NotFound("advertisement".into()));
        }

        match wtxn.put(
            self.db_fingerprints,
            &fingerprint_key(account_id, digest),
            b"1",
            WriteFlags::NO_OVERWRITE,
        ) {
            Ok(()) => {}
            Err(lmdb::Error::KeyExist) => return Ok(ClaimOutcome::AlreadyProcessed),
            Err(e) => return Err(internal(e)),
        }

        let amount = kind.reward();
        let record = ActionRecord {
            account_id,
            ad_id,
            kind,
            amount,
            created_at: now,
        };
        let blob = bincode::serialize(&record).map_err(internal)?;
        match wtxn.put(
            self.db_actions,
            &action_key(account_id, ad_id, kind.tag()),
            &blob,
            WriteFlags::NO_OVERWRITE,
        ) {
            Ok(()) => {}
            // Dropping the txn also rolls back the fingerprint insert, so
            // the image stays claimable for a different action.
            Err(lmdb::Error::KeyExist) => return Ok(ClaimOutcome::AlreadyCompleted),
            Err(e) => return Err(internal(e)),
        }

        account.coins = account.coins.saturating_add(amount);
        self.put_account(&mut wtxn, &account)?;
        wtxn.commit().map_err(internal)?;

        tracing::info!(
            account = account_id,
            ad = ad_id,
            kind = %kind,
            amount,
            proof = %digest_hex(digest),
            "verified action credited"
        );
        Ok(ClaimOutcome::Credited {
            amount,
            balance: account.coins,
        })
    }
}
