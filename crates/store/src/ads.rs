//! Advertisement store: creation pending approval, idempotent approval,
//! rejection with cascade, the click-to-coin ledger, and the availability
//! query used by the client feed.

use lmdb::{Cursor, Transaction as LmdbTxn, WriteFlags};
use serde::{Deserialize, Serialize};

use cointask_common::{ActionKind, LedgerError, Result};

use crate::db::{action_key, id_key, internal, pair_key, LedgerDb, SEQ_AD};

/// Advertisement persisted in the ledger.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Advertisement {
    pub id: u64,
    pub owner: u64,
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub interests: Vec<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Coins credited to the owner per unique click.
    pub coin_per_click: u64,
    pub clicks: u64,
    pub is_active: bool,
    pub is_approved: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Fields supplied by the client when creating an advertisement.
#[derive(Clone, Debug, Deserialize)]
pub struct NewAd {
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    #[serde(default)]
    pub interests: Vec<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub coin_per_click: u64,
}

/// Outcome of a link click. A repeat click is a verdict, not an error:
/// it returns the current count and credits nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Rewarded { clicks: u64, owner_balance: u64 },
    AlreadyClicked { clicks: u64 },
}

/// One entry of the availability feed: the ad plus what this account can
/// still do with it.
#[derive(Debug, Clone, Serialize)]
pub struct AdAvailability {
    #[serde(flatten)]
    pub ad: Advertisement,
    pub clicked: bool,
    pub remaining_actions: Vec<ActionKind>,
}

impl LedgerDb {
    /// Create an advertisement pending approval
    /// (`is_approved = false`, `is_active = true`).
    pub fn create_ad(&self, owner: u64, fields: NewAd, now: u64) -> Result<Advertisement> {
        if fields.title.trim().is_empty() || fields.link.trim().is_empty() {
            return Err(LedgerError::Validation(
                "missing required fields: title, link".into(),
            ));
        }

        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;
        if self.read_account(&wtxn, owner)?.is_none() {
            return Err(LedgerError::NotFound("owner account".into()));
        }
        let id = self.next_id(&mut wtxn, SEQ_AD)?;
        let ad = Advertisement {
            id,
            owner,
            title: fields.title.trim().to_string(),
            description: fields.description,
            link: fields.link.trim().to_string(),
            interests: fields.interests,
            category: fields.category,
            subcategory: fields.subcategory,
            coin_per_click: fields.coin_per_click,
            clicks: 0,
            is_active: true,
            is_approved: false,
            created_at: now,
            updated_at: now,
        };
        let blob = bincode::serialize(&ad).map_err(internal)?;
        wtxn.put(self.db_ads, &id_key(id), &blob, WriteFlags::empty())
            .map_err(internal)?;
        wtxn.commit().map_err(internal)?;
        Ok(ad)
    }

    pub fn get_ad(&self, id: u64) -> Result<Option<Advertisement>> {
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        self.read_ad(&rtxn, id)
    }

    /// Approve an advertisement. Idempotent: approving an already-approved
    /// ad returns it unchanged without touching storage.
    pub fn approve_ad(&self, id: u64, now: u64) -> Result<Advertisement> {
        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;
        let mut ad = self
            .read_ad(&wtxn, id)?
            .ok_or_else(|| LedgerError::NotFound("advertisement".into()))?;
        if ad.is_approved {
            return Ok(ad);
        }
        ad.is_approved = true;
        ad.updated_at = now;
        let blob = bincode::serialize(&ad).map_err(internal)?;
        wtxn.put(self.db_ads, &id_key(id), &blob, WriteFlags::empty())
            .map_err(internal)?;
        wtxn.commit().map_err(internal)?;
        Ok(ad)
    }

    /// Reject (delete) an advertisement, cascading deletion of its action
    /// records and click-set entries. One transaction, all-or-nothing.
    ///
    /// Consumed proof fingerprints survive the cascade on purpose: they are
    /// scoped to the account, not the ad, and an image once burned stays
    /// burned.
    pub fn reject_ad(&self, id: u64) -> Result<()> {
        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;
        match wtxn.del(self.db_ads, &id_key(id), None) {
            Ok(()) => {}
            Err(lmdb::Error::NotFound) => {
                return Err(LedgerError::NotFound("advertisement".into()))
            }
            Err(e) => return Err(internal(e)),
        }

        // Click-set entries are prefixed by the ad id.
        let mut del_keys = Vec::new();
        {
            let mut cursor = wtxn.open_rw_cursor(self.db_ad_clicks).map_err(internal)?;
            for (key, _val) in cursor.iter() {
                if key.len() == 16 && key[0..8] == id_key(id) {
                    del_keys.push(key.to_vec());
                }
            }
        }
        for key in del_keys {
            wtxn.del(self.db_ad_clicks, &key, None).map_err(internal)?;
        }

        // Action records carry the ad id in bytes 8..16.
        let mut del_keys = Vec::new();
        {
            let mut cursor = wtxn.open_rw_cursor(self.db_actions).map_err(internal)?;
            for (key, _val) in cursor.iter() {
                if key.len() == 17 && key[8..16] == id_key(id) {
                    del_keys.push(key.to_vec());
                }
            }
        }
        for key in del_keys {
            wtxn.del(self.db_actions, &key, None).map_err(internal)?;
        }

        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    /// Record a link click by `clicker` on ad `ad_id`.
    ///
    /// First click per (ad, account): insert the click-set entry, bump the
    /// counter, credit the owner — all in one transaction. A repeat click is
    /// detected by the NO_OVERWRITE insert and changes nothing.
    pub fn record_link_click(&self, ad_id: u64, clicker: u64) -> Result<ClickOutcome> {
        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;
        let mut ad = self
            .read_ad(&wtxn, ad_id)?
            .ok_or_else(|| LedgerError::NotFound("advertisement".into()))?;
        if !ad.is_approved || !ad.is_active {
            return Err(LedgerError::Forbidden(
                "advertisement is not active or not approved".into(),
            ));
        }
        if self.read_account(&wtxn, clicker)?.is_none() {
            return Err(LedgerError::NotFound("clicker account".into()));
        }

        match wtxn.put(
            self.db_ad_clicks,
            &pair_key(ad_id, clicker),
            b"1",
            WriteFlags::NO_OVERWRITE,
        ) {
            Ok(()) => {}
            Err(lmdb::Error::KeyExist) => {
                // Dropping the txn discards the aborted insert attempt.
                return Ok(ClickOutcome::AlreadyClicked { clicks: ad.clicks });
            }
            Err(e) => return Err(internal(e)),
        }

        ad.clicks += 1;
        let ad_blob = bincode::serialize(&ad).map_err(internal)?;
        wtxn.put(self.db_ads, &id_key(ad_id), &ad_blob, WriteFlags::empty())
            .map_err(internal)?;

        let mut owner = self
            .read_account(&wtxn, ad.owner)?
            .ok_or_else(|| LedgerError::NotFound("advertisement owner".into()))?;
        owner.coins = owner.coins.saturating_add(ad.coin_per_click);
        self.put_account(&mut wtxn, &owner)?;

        wtxn.commit().map_err(internal)?;
        Ok(ClickOutcome::Rewarded {
            clicks: ad.clicks,
            owner_balance: owner.coins,
        })
    }

    /// Approved + active ads with what `account_id` can still earn from
    /// them. Ads the account has exhausted (clicked AND completed every
    /// action kind) are excluded. `interest` is a case-insensitive substring
    /// filter on the ad's interest tags.
    pub fn list_available(
        &self,
        account_id: u64,
        interest: Option<&str>,
    ) -> Result<Vec<AdAvailability>> {
        let needle = interest.map(|s| s.to_ascii_lowercase());
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        let mut ads = Vec::new();
        {
            let mut cursor = rtxn.open_ro_cursor(self.db_ads).map_err(internal)?;
            for (_key, val) in cursor.iter() {
                let ad: Advertisement = bincode::deserialize(val).map_err(internal)?;
                if !ad.is_approved || !ad.is_active {
                    continue;
                }
                if let Some(q) = &needle {
                    let hit = ad
                        .interests
                        .iter()
                        .any(|i| i.to_ascii_lowercase().contains(q.as_str()));
                    if !hit {
                        continue;
                    }
                }
                ads.push(ad);
            }
        }

        let mut out = Vec::new();
        for ad in ads {
            let clicked = match rtxn.get(self.db_ad_clicks, &pair_key(ad.id, account_id)) {
                Ok(_) => true,
                Err(lmdb::Error::NotFound) => false,
                Err(e) => return Err(internal(e)),
            };
            let mut remaining = Vec::new();
            for kind in ActionKind::ALL {
                match rtxn.get(self.db_actions, &action_key(account_id, ad.id, kind.tag())) {
                    Ok(_) => {}
                    Err(lmdb::Error::NotFound) => remaining.push(kind),
                    Err(e) => return Err(internal(e)),
                }
            }
            if clicked && remaining.is_empty() {
                continue; // fully exhausted for this account
            }
            out.push(AdAvailability {
                ad,
                clicked,
                remaining_actions: remaining,
            });
        }
        Ok(out)
    }

    pub(crate) fn read_ad<T: LmdbTxn>(&self, txn: &T, id: u64) -> Result<Option<Advertisement>> {
        match txn.get(self.db_ads, &id_key(id)) {
            Ok(v) => Ok(Some(bincode::deserialize(v).map_err(internal)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(internal(e)),
        }
    }
}
