//! Coin package catalog (admin-managed).

use lmdb::{Cursor, Transaction as LmdbTxn, WriteFlags};
use serde::{Deserialize, Serialize};

use cointask_common::{LedgerError, Result};

use crate::db::{id_key, internal, LedgerDb, SEQ_PACKAGE};

/// Purchasable coin bundle shown in the store front.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoinPackage {
    pub id: u64,
    pub name: String,
    pub coins: u64,
    pub price_cents: u64,
    pub created_at: u64,
}

impl LedgerDb {
    pub fn create_package(
        &self,
        name: &str,
        coins: u64,
        price_cents: u64,
        now: u64,
    ) -> Result<CoinPackage> {
        if name.trim().is_empty() {
            return Err(LedgerError::Validation("missing required fields: name".into()));
        }
        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;
        let id = self.next_id(&mut wtxn, SEQ_PACKAGE)?;
        let pkg = CoinPackage {
            id,
            name: name.trim().to_string(),
            coins,
            price_cents,
            created_at: now,
        };
        let blob = bincode::serialize(&pkg).map_err(internal)?;
        wtxn.put(self.db_packages, &id_key(id), &blob, WriteFlags::empty())
            .map_err(internal)?;
        wtxn.commit().map_err(internal)?;
        Ok(pkg)
    }

    pub fn get_package(&self, id: u64) -> Result<Option<CoinPackage>> {
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        match rtxn.get(self.db_packages, &id_key(id)) {
            Ok(v) => Ok(Some(bincode::deserialize(v).map_err(internal)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(internal(e)),
        }
    }

    /// All packages in id order (BE keys keep the cursor sorted).
    pub fn list_packages(&self) -> Result<Vec<CoinPackage>> {
        let rtxn = self.env.begin_ro_txn().map_err(internal)?;
        let mut out = Vec::new();
        let mut cursor = rtxn.open_ro_cursor(self.db_packages).map_err(internal)?;
        for (_key, val) in cursor.iter() {
            out.push(bincode::deserialize(val).map_err(internal)?);
        }
        Ok(out)
    }

    /// Replace a package's fields, keeping id and creation time.
    pub fn update_package(
        &self,
        id: u64,
        name: &str,
        coins: u64,
        price_cents: u64,
    ) -> Result<CoinPackage> {
        if name.trim().is_empty() {
            return Err(LedgerError::Validation("missing required fields: name".into()));
        }
        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;
        let mut pkg: CoinPackage = match wtxn.get(self.db_packages, &id_key(id)) {
            Ok(v) => bincode::deserialize(v).map_err(internal)?,
            Err(lmdb::Error::NotFound) => return Err(LedgerError::NotFound("package".into())),
            Err(e) => return Err(internal(e)),
        };
        pkg.name = name.trim().to_string();
        pkg.coins = coins;
        pkg.price_cents = price_cents;
        let blob = bincode::serialize(&pkg).map_err(internal)?;
        wtxn.put(self.db_packages, &id_key(id), &blob, WriteFlags::empty())
            .map_err(internal)?;
        wtxn.commit().map_err(internal)?;
        Ok(pkg)
    }

    pub fn delete_package(&self, id: u64) -> Result<()> {
        let mut wtxn = self.env.begin_rw_txn().map_err(internal)?;
        match wtxn.del(self.db_packages, &id_key(id), None) {
            Ok(()) => {}
            Err(lmdb::Error::NotFound) => {
                return Err(LedgerError::NotFound("package".into()))
            }
            Err(e) => return Err(internal(e)),
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
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
    fn test_package_lifecycle() {
        let (_tmp, db) = open_db();
        let a = db.create_package("Starter", 100, 199, 0).expect("create");
        let b = db.create_package("Pro", 1_000, 999, 1).expect("create");
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);

        let listed = db.list_packages().expect("list");
        assert_eq!(listed, vec![a.clone(), b.clone()]);
        assert_eq!(db.get_package(a.id).expect("get"), Some(a.clone()));

        let updated = db.update_package(a.id, "Starter+", 150, 249).expect("update");
        assert_eq!(updated.coins, 150);
        assert_eq!(updated.created_at, a.created_at);
        assert!(matches!(
            db.update_package(99, "X", 1, 1).unwrap_err(),
            LedgerError::NotFound(_)
        ));

        db.delete_package(a.id).expect("delete");
        assert_eq!(db.get_package(a.id).expect("get"), None);
        assert_eq!(db.list_packages().expect("list"), vec![b]);
        assert!(matches!(
            db.delete_package(a.id).unwrap_err(),
            LedgerError::NotFound(_)
        ));
    }

    #[test]
    fn test_package_requires_name() {
        let (_tmp, db) = open_db();
        assert!(matches!(
            db.create_package("  ", 1, 1, 0).unwrap_err(),
            LedgerError::Validation(_)
        ));
    }
}
