//! Account store: registration (atomic referral bonus), authentication,
//! coin adjustment, daily spin.

use lmdb::{Cursor, Transaction as LmdbTxn, WriteFlags};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cointask_common::policy::{spin_status, SpinStatus};
use cointask_common::{crypto, LedgerError, Result, REFERRAL_BONUS, SPIN_REWARD};

use crate::db::{id_key, internal, LedgerDb, SEQ_ACCOUNT};

/// Account persisted in the ledger.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: u64,
    pub name: String,
    pub contact: String,
    pub phone: String,
    /// Salted credential hash (`salt$digest`). Never serialized outward.
    pub password_hash: String,
    pub coins: u64,
    /// Back-reference to the referring account, set once at creation.
    pub referrer: Option<u64>,
    /// Unix seconds of the last successful spin.
    pub last_spin_time: Option<u64>,
    pub created_at: u64,
}

impl Account {
    /// JSON view safe for API responses (no credential hash).
    #[must_use]
    pub fn public_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "contact": self.contact,
            "phone": self.phone,
            "coins": self.coins,
            "referrer": self.referrer,
            "created_at": self.created_at,
        })
    }
}

/// Outcome of a daily spin claim. Cooling down is a verdict, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinOutcome {
    Rewarded { balance: u64 },
    CoolingDown { remaining_secs: u64 },
}

impl LedgerDb {
    /// Register a new account with zero balance.
    ///
    /// If `referrer_id` is given it must resolve to an existing account
    /// (`NotFound` otherwise) and the referral bonus is credited to the
    /// referrer **in the same transaction** — registration and bonus commit
    /// together or not at all. A taken contact yields `Conflict` via the
    /// NO_OVERWRITE insert on the contact index.
    pub fn register(
        &self,
        name: &str,
        contact: &str,
        phone: &str,
        password: &str,
        referrer_id: Option<u64>,
        now: u64,
    ) -> Result<Account> {
        let mut missing = Vec::new();
        if name.trim().is_empty() {
            missing.push("name");
        }
        if contact.trim().is_empty() {
            missing.push("contact");
        }
        if phone.trim().is_empty() {
            missing.push("phone");
        }
        if password.is_empty() {
            missing.push("password");
        }
        if !missing.is_empty() {
            return Err(LedgerError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        // Canonical contact: the index key and the stored field must agree,
        // otherwise a padded spelling slips past the uniqueness check.
        let contact = contact.trim();

        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;

        // Resolve the referrer first; a dangling referrer_id fails the whole
        // registration. The new id is allocated afterwards, so a self
        // referral is structurally impossible.
        let mut referrer: Option<Account> = None;
        if let Some(rid) = referrer_id {
            match wtxn.get(self.db_accounts, &id_key(rid)) {
                Ok(v) => referrer = Some(bincode::deserialize(v).map_err(internal)?),
                Err(lmdb::Error::NotFound) => {
                    return Err(LedgerError::NotFound("referrer".into()))
                }
                Err(e) => return Err(internal(e)),
            }
        }

        let id = self.next_id(&mut wtxn, SEQ_ACCOUNT)?;

        // Contact uniqueness: the index insert is the arbiter.
        match wtxn.put(
            self.db_contacts,
            &contact.as_bytes(),
            &id_key(id),
            WriteFlags::NO_OVERWRITE,
        ) {
            Ok(()) => {}
            Err(lmdb::Error::KeyExist) => {
                return Err(LedgerError::Conflict("contact already registered".into()))
            }
            Err(e) => return Err(internal(e)),
        }

        let account = Account {
            id,
            name: name.trim().to_string(),
            contact: contact.to_string(),
            phone: phone.trim().to_string(),
            password_hash: crypto::hash_password(password),
            coins: 0,
            referrer: referrer_id,
            last_spin_time: None,
            created_at: now,
        };
        let blob = bincode::serialize(&account).map_err(internal)?;
        wtxn.put(self.db_accounts, &id_key(id), &blob, WriteFlags::empty())
            .map_err(internal)?;

        if let Some(mut r) = referrer.take() {
            r.coins = r.coins.saturating_add(REFERRAL_BONUS);
            let rblob = bincode::serialize(&r).map_err(internal)?;
            wtxn.put(self.db_accounts, &id_key(r.id), &rblob, WriteFlags::empty())
                .map_err(internal)?;
            tracing::info!(referrer = r.id, referee = id, bonus = REFERRAL_BONUS, "referral bonus credited");
        }

        wtxn.commit().map_err(internal)?;
        Ok(account)
    }

    /// Load an account by id.
    pub fn get_account(&self, id: u64) -> Result<Option<Account>> {
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        match rtxn.get(self.db_accounts, &id_key(id)) {
            Ok(v) => Ok(Some(bincode::deserialize(v).map_err(internal)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(internal(e)),
        }
    }

    /// Ids of accounts whose referrer is `id` (derived, full scan).
    pub fn referred_ids(&self, id: u64) -> Result<Vec<u64>> {
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        let mut out = Vec::new();
        let mut cursor = rtxn.open_ro_cursor(self.db_accounts).map_err(internal)?;
        for (_key, val) in cursor.iter() {
            let acct: Account = bincode::deserialize(val).map_err(internal)?;
            if acct.referrer == Some(id) {
                out.push(acct.id);
            }
        }
        Ok(out)
    }

    /// Authenticate by contact + password.
    ///
    /// Unknown contact and wrong password both produce the same generic
    /// `InvalidCredentials` so callers cannot enumerate accounts.
    pub fn authenticate(&self, contact: &str, password: &str) -> Result<Account> {
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        let id = match rtxn.get(self.db_contacts, &contact.as_bytes()) {
            Ok(v) if v.len() == 8 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(v);
                u64::from_be_bytes(arr)
            }
            Ok(_) => return Err(LedgerError::Internal("corrupt contact index".into())),
            Err(lmdb::Error::NotFound) => return Err(LedgerError::InvalidCredentials),
            Err(e) => return Err(internal(e)),
        };
        let account: Account = match rtxn.get(self.db_accounts, &id_key(id)) {
            Ok(v) => bincode::deserialize(v).map_err(internal)?,
            Err(lmdb::Error::NotFound) => return Err(LedgerError::InvalidCredentials),
            Err(e) => return Err(internal(e)),
        };
        let ok = crypto::verify_password(&account.password_hash, password).map_err(internal)?;
        if ok {
            Ok(account)
        } else {
            Err(LedgerError::InvalidCredentials)
        }
    }

    /// Apply a coin delta to an account, returning the new balance.
    ///
    /// Subtraction floors at zero — the balance never goes negative and an
    /// insufficient balance is not an error.
    pub fn adjust_coins(&self, id: u64, delta: i64) -> Result<u64> {
        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;
        let mut account: Account = match wtxn.get(self.db_accounts, &id_key(id)) {
            Ok(v) => bincode::deserialize(v).map_err(internal)?,
            Err(lmdb::Error::NotFound) => return Err(LedgerError::NotFound("account".into())),
            Err(e) => return Err(internal(e)),
        };
        account.coins = apply_delta(account.coins, delta);
        let blob = bincode::serialize(&account).map_err(internal)?;
        wtxn.put(self.db_accounts, &id_key(id), &blob, WriteFlags::empty())
            .map_err(internal)?;
        wtxn.commit().map_err(internal)?;
        Ok(account.coins)
    }

    /// Claim the daily spin at `now` (unix seconds).
    ///
    /// The eligibility check and the `last_spin_time` update run in one
    /// write transaction; LMDB serializes writers, so a concurrent second
    /// spin observes the committed timestamp and cools down.
    pub fn claim_daily_spin(&self, id: u64, now: u64) -> Result<SpinOutcome> {
        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;
        let mut account: Account = match wtxn.get(self.db_accounts, &id_key(id)) {
            Ok(v) => bincode::deserialize(v).map_err(internal)?,
            Err(lmdb::Error::NotFound) => return Err(LedgerError::NotFound("account".into())),
            Err(e) => return Err(internal(e)),
        };
        match spin_status(account.last_spin_time, now) {
            SpinStatus::CoolingDown { remaining_secs } => {
                // No mutation; dropping the txn aborts it.
                Ok(SpinOutcome::CoolingDown { remaining_secs })
            }
            SpinStatus::Eligible => {
                account.last_spin_time = Some(now);
                account.coins = account.coins.saturating_add(SPIN_REWARD);
                let blob = bincode::serialize(&account).map_err(internal)?;
                wtxn.put(self.db_accounts, &id_key(id), &blob, WriteFlags::empty())
                    .map_err(internal)?;
                wtxn.commit().map_err(internal)?;
                Ok(SpinOutcome::Rewarded {
                    balance: account.coins,
                })
            }
        }
    }

    /// Write an account record directly. Internal helper for sibling modules
    /// operating inside their own transactions.
    pub(crate) fn put_account(
        &self,
        wtxn: &mut lmdb::RwTransaction<'_>,
        account: &Account,
    ) -> Result<()> {
        let blob = bincode::serialize(account).map_err(internal)?;
        wtxn.put(self.db_accounts, &id_key(account.id), &blob, WriteFlags::empty())
            .map_err(internal)
    }

    /// Read an account inside an existing transaction.
    pub(crate) fn read_account<T: LmdbTxn>(&self, txn: &T, id: u64) -> Result<Option<Account>> {
        match txn.get(self.db_accounts, &id_key(id)) {
            Ok(v) => Ok(Some(bincode::deserialize(v).map_err(internal)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(internal(e)),
        }
    }
}

/// Saturating signed delta on an unsigned balance.
fn apply_delta(coins: u64, delta: i64) -> u64 {
    if delta >= 0 {
        coins.saturating_add(delta as u64)
    } else {
        coins.saturating_sub(delta.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db() -> (tempfile::TempDir, LedgerDb) {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let db = LedgerDb::open(tmp.path()).expect("open");
        (tmp, db)
    }

    #[test]
    fn test_register_and_get() {
        let (_tmp, db) = open_db();
        let a = db
            .register("Alice", "alice@mail", "0812", "pw", None, 1_000)
            .expect("register");
        assert_eq!(a.coins, 0);
        assert_eq!(a.referrer, None);
        let loaded = db.get_account(a.id).expect("get").expect("some");
        assert_eq!(loaded, a);
    }

    #[test]
    fn test_register_missing_fields() {
        let (_tmp, db) = open_db();
        let err = db.register("", "c", "p", "pw", None, 0).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_register_duplicate_contact_conflict() {
        let (_tmp, db) = open_db();
        db.register("A", "same@mail", "1", "pw", None, 0).expect("first");
        let err = db.register("B", "same@mail", "2", "pw", None, 0).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[test]
    fn test_register_padded_contact_conflict() {
        let (_tmp, db) = open_db();
        db.register("A", "a@mail", "1", "pw", None, 0).expect("first");
        // Whitespace padding must not mint a second account for the same
        // contact; the index is keyed on the canonical spelling.
        let err = db.register("B", " a@mail ", "2", "pw", None, 0).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));

        // And a padded first registration stays reachable canonically.
        let padded = db
            .register("C", "  c@mail", "3", "pw", None, 0)
            .expect("padded register");
        assert_eq!(padded.contact, "c@mail");
        let got = db.authenticate("c@mail", "pw").expect("auth");
        assert_eq!(got.id, padded.id);
    }

    #[test]
    fn test_register_unknown_referrer() {
        let (_tmp, db) = open_db();
        let err = db
            .register("A", "a@mail", "1", "pw", Some(99), 0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        // The failed registration must not leave a contact index entry.
        db.register("A", "a@mail", "1", "pw", None, 0)
            .expect("retry without referrer");
    }

    #[test]
    fn test_referral_bonus_once_atomically() {
        let (_tmp, db) = open_db();
        let b = db.register("B", "b@mail", "1", "pw", None, 0).expect("b");
        assert_eq!(b.coins, 0);
        let a = db
            .register("A", "a@mail", "2", "pw", Some(b.id), 10)
            .expect("a");
        assert_eq!(a.coins, 0);
        let b2 = db.get_account(b.id).expect("get").expect("some");
        assert_eq!(b2.coins, REFERRAL_BONUS);
        assert_eq!(db.referred_ids(b.id).expect("referred"), vec![a.id]);
    }

    #[test]
    fn test_authenticate() {
        let (_tmp, db) = open_db();
        let a = db
            .register("A", "a@mail", "1", "topsecret", None, 0)
            .expect("register");
        let got = db.authenticate("a@mail", "topsecret").expect("auth");
        assert_eq!(got.id, a.id);
        assert_eq!(
            db.authenticate("a@mail", "wrong").unwrap_err(),
            LedgerError::InvalidCredentials
        );
        assert_eq!(
            db.authenticate("nobody@mail", "x").unwrap_err(),
            LedgerError::InvalidCredentials
        );
    }

    #[test]
    fn test_adjust_coins_floors_at_zero() {
        let (_tmp, db) = open_db();
        let a = db.register("A", "a@mail", "1", "pw", None, 0).expect("r");
        assert_eq!(db.adjust_coins(a.id, 50).expect("add"), 50);
        assert_eq!(db.adjust_coins(a.id, -20).expect("sub"), 30);
        // Over-subtraction floors, never errors, never wraps.
        assert_eq!(db.adjust_coins(a.id, -1_000).expect("floor"), 0);
        assert_eq!(db.adjust_coins(a.id, -1).expect("still zero"), 0);
    }

    #[test]
    fn test_spin_cooldown_window() {
        let (_tmp, db) = open_db();
        let a = db.register("A", "a@mail", "1", "pw", None, 0).expect("r");

        let first = db.claim_daily_spin(a.id, 1_000).expect("spin");
        assert_eq!(first, SpinOutcome::Rewarded { balance: SPIN_REWARD });

        // Inside the window: cooling down, remaining strictly decreasing.
        let r1 = match db.claim_daily_spin(a.id, 2_000).expect("spin") {
            SpinOutcome::CoolingDown { remaining_secs } => remaining_secs,
            other => panic!("expected cooldown, got {:?}", other),
        };
        let r2 = match db.claim_daily_spin(a.id, 3_000).expect("spin") {
            SpinOutcome::CoolingDown { remaining_secs } => remaining_secs,
            other => panic!("expected cooldown, got {:?}", other),
        };
        assert!(r2 < r1);

        // Balance unchanged while cooling down.
        assert_eq!(
            db.get_account(a.id).expect("get").expect("some").coins,
            SPIN_REWARD
        );

        // Window elapsed → eligible again.
        let second = db
            .claim_daily_spin(a.id, 1_000 + cointask_common::SPIN_COOLDOWN_SECS)
            .expect("spin");
        assert_eq!(
            second,
            SpinOutcome::Rewarded {
                balance: 2 * SPIN_REWARD
            }
        );
    }

    #[test]
    fn test_spin_unknown_account() {
        let (_tmp, db) = open_db();
        assert!(matches!(
            db.claim_daily_spin(42, 0).unwrap_err(),
            LedgerError::NotFound(_)
        ));
    }

    #[test]
    fn test_apply_delta_bounds() {
        assert_eq!(apply_delta(0, i64::MIN), 0);
        assert_eq!(apply_delta(u64::MAX, i64::MAX), u64::MAX);
        assert_eq!(apply_delta(10, -10), 0);
    }
}
