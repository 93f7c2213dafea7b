//! LMDB environment and bucket handles for the ledger store.

use std::path::Path;
use std::sync::Arc;

use lmdb::{Database, DatabaseFlags, Environment, RwTransaction, Transaction as LmdbTxn, WriteFlags};

use cointask_common::{LedgerError, Result};

// ════════════════════════════════════════════════════════════════════════════
// BUCKET CONSTANTS
// ════════════════════════════════════════════════════════════════════════════

pub const BUCKET_ACCOUNTS: &str = "accounts";
pub const BUCKET_CONTACTS: &str = "contacts";
pub const BUCKET_ADS: &str = "ads";
pub const BUCKET_AD_CLICKS: &str = "ad_clicks";
pub const BUCKET_ACTIONS: &str = "actions";
pub const BUCKET_FINGERPRINTS: &str = "fingerprints";
pub const BUCKET_PACKAGES: &str = "packages";
pub const BUCKET_META: &str = "meta";

/// Sequence counter keys in the meta bucket.
pub(crate) const SEQ_ACCOUNT: &[u8] = b"account_seq";
pub(crate) const SEQ_AD: &[u8] = b"ad_seq";
pub(crate) const SEQ_PACKAGE: &[u8] = b"package_seq";

// ════════════════════════════════════════════════════════════════════════════
// LEDGER DB
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct LedgerDb {
    pub(crate) env: Arc<Environment>,
    pub(crate) db_accounts: Database,
    pub(crate) db_contacts: Database,
    pub(crate) db_ads: Database,
    pub(crate) db_ad_clicks: Database,
    pub(crate) db_actions: Database,
    pub(crate) db_fingerprints: Database,
    pub(crate) db_packages: Database,
    pub(crate) db_meta: Database,
}

impl LedgerDb {
    /// Open the LMDB environment at `path`, creating named buckets.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let p = path.as_ref();
        std::fs::create_dir_all(p).map_err(internal)?;

        let env = Environment::new()
            .set_max_dbs(8)
            .set_map_size(1_000_000_000usize)
            .open(p)
            .map_err(internal)?;

        let db_accounts = env
            .create_db(Some(BUCKET_ACCOUNTS), DatabaseFlags::empty())
            .map_err(internal)?;
        let db_contacts = env
            .create_db(Some(BUCKET_CONTACTS), DatabaseFlags::empty())
            .map_err(internal)?;
        let db_ads = env
            .create_db(Some(BUCKET_ADS), DatabaseFlags::empty())
            .map_err(internal)?;
        let db_ad_clicks = env
            .create_db(Some(BUCKET_AD_CLICKS), DatabaseFlags::empty())
            .map_err(internal)?;
        let db_actions = env
            .create_db(Some(BUCKET_ACTIONS), DatabaseFlags::empty())
            .map_err(internal)?;
        let db_fingerprints = env
            .create_db(Some(BUCKET_FINGERPRINTS), DatabaseFlags::empty())
            .map_err(internal)?;
        let db_packages = env
            .create_db(Some(BUCKET_PACKAGES), DatabaseFlags::empty())
            .map_err(internal)?;
        let db_meta = env
            .create_db(Some(BUCKET_META), DatabaseFlags::empty())
            .map_err(internal)?;

        Ok(Self {
            env: Arc::new(env),
            db_accounts,
            db_contacts,
            db_ads,
            db_ad_clicks,
            db_actions,
            db_fingerprints,
            db_packages,
            db_meta,
        })
    }

    /// Allocate the next id from a meta-bucket sequence counter.
    /// Runs inside the caller's write transaction so the allocation commits
    /// (or rolls back) together with the insert it backs.
    pub(crate) fn next_id(&self, wtxn: &mut RwTransaction<'_>, seq_key: &[u8]) -> Result<u64> {
        let current = match wtxn.get(self.db_meta, &seq_key) {
            Ok(v) if v.len() == 8 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(v);
                u64::from_be_bytes(arr)
            }
            Ok(_) => return Err(LedgerError::Internal("corrupt sequence counter".into())),
            Err(lmdb::Error::NotFound) => 0,
            Err(e) => return Err(internal(e)),
        };
        let next = current + 1;
        wtxn.put(self.db_meta, &seq_key, &next.to_be_bytes(), WriteFlags::empty())
            .map_err(internal)?;
        Ok(next)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// KEY HELPERS
// ════════════════════════════════════════════════════════════════════════════

/// Big-endian id key. BE keeps cursor iteration in id order.
pub(crate) fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Composite key `a(8) + b(8)`.
pub(crate) fn pair_key(a: u64, b: u64) -> [u8; 16] {
    let mut k = [0u8; 16];
    k[0..8].copy_from_slice(&a.to_be_bytes());
    k[8..16].copy_from_slice(&b.to_be_bytes());
    k
}

/// Action ledger key `account(8) + ad(8) + kind(1)`.
pub(crate) fn action_key(account_id: u64, ad_id: u64, kind_tag: u8) -> [u8; 17] {
    let mut k = [0u8; 17];
    k[0..8].copy_from_slice(&account_id.to_be_bytes());
    k[8..16].copy_from_slice(&ad_id.to_be_bytes());
    k[16] = kind_tag;
    k
}

/// Fingerprint guard key `account(8) + digest(32)`.
pub(crate) fn fingerprint_key(account_id: u64, digest: &[u8; 32]) -> [u8; 40] {
    let mut k = [0u8; 40];
    k[0..8].copy_from_slice(&account_id.to_be_bytes());
    k[8..40].copy_from_slice(digest);
    k
}

/// Map a storage/serialization failure into the ledger taxonomy.
pub(crate) fn internal<E: std::fmt::Display>(e: E) -> LedgerError {
    LedgerError::Internal(e.to_string())
}
