pub use redb;

#[allow(unused_imports)]
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition, TableHandle};
use std::sync::Arc;
use strum::EnumIs;

use super::{P2SHScript, Proof, ProofExtended, ProofStore, ProofsExtended};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tables {
    /// live proofs
    pub proofs: &'static str,
    /// spent history, keeps secrets known after invalidation
    pub spent_proofs: &'static str,
    pub scripts: &'static str,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            proofs: "proofs",
            spent_proofs: "spent_proofs",
            scripts: "scripts",
        }
    }
}

impl Tables {
    pub fn check(&self) -> anyhow::Result<()> {
        let strs = [self.proofs, self.spent_proofs, self.scripts];
        let mut names = strs.iter().filter(|s| !s.is_empty()).collect::<Vec<_>>();
        if names.len() != strs.len() {
            bail!("empty table name");
        }

        names.dedup();
        if names.len() != strs.len() {
            bail!("duplicate table name");
        }

        Ok(())
    }
}

#[derive(Debug)]
//
#[derive(EnumIs, thiserror::Error)]
pub enum StoreError {
    /// Json error
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Database(#[from] redb::DatabaseError),
    #[error("{0}")]
    Commit(#[from] redb::CommitError),
    #[error("{0}")]
    Store(#[from] redb::StorageError),
    #[error("{0}")]
    Table(anyhow::Error),
    #[error("{0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("{0}")]
    Custom(#[from] anyhow::Error),
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        Self::Table(err.into())
    }
}

impl From<StoreError> for crate::wallet::WalletError<StoreError> {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// redb wrap
pub struct Redb {
    tables: Tables,
    db: Database,
}

impl Redb {
    pub fn new(db: Database, tables: Tables) -> Result<Arc<Redb>, StoreError> {
        tables.check()?;

        let this = Self { db, tables };
        this.init()?;

        Ok(Arc::new(this))
    }

    pub fn open<P: AsRef<std::path::Path>>(
        dbpath: P,
        tables: Tables,
    ) -> Result<Arc<Redb>, StoreError> {
        let db = Database::builder().create(dbpath)?;

        Self::new(db, tables)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn init(&self) -> Result<(), StoreError> {
        let tn = self.db.begin_write()?;
        {
            tn.open_table(self.definition_proofs())?;
            tn.open_table(self.definition_spent_proofs())?;
            tn.open_table(self.definition_scripts())?;
        }
        tn.commit()?;

        Ok(())
    }

    // <'a>: not use the self life
    ///
    /// <secret, proofJSON>
    #[inline]
    pub fn definition_proofs<'a>(&self) -> TableDefinition<'static, &'a str, &'a str> {
        TableDefinition::new(self.tables.proofs)
    }

    /// <secret, proofJSON>
    #[inline]
    pub fn definition_spent_proofs<'a>(&self) -> TableDefinition<'static, &'a str, &'a str> {
        TableDefinition::new(self.tables.spent_proofs)
    }

    /// <address, scriptJSON>
    #[inline]
    pub fn definition_scripts<'a>(&self) -> TableDefinition<'static, &'a str, &'a str> {
        TableDefinition::new(self.tables.scripts)
    }
}

#[async_trait]
impl ProofStore for Redb {
    type Error = StoreError;

    async fn store_proof(&self, proof: &ProofExtended) -> Result<(), Self::Error> {
        let json = serde_json::to_string(proof)?;
        debug!("store_proof: {}", json);

        let define = self.definition_proofs();

        let tn = self.database().begin_write()?;
        {
            let mut table = tn.open_table(define)?;
            table.insert(proof.raw.secret.as_str(), json.as_str())?;
        }
        tn.commit()?;

        Ok(())
    }

    async fn get_proofs(&self) -> Result<ProofsExtended, Self::Error> {
        let define = self.definition_proofs();

        let tn = self.database().begin_read()?;
        let table = tn.open_table(define)?;
        debug!("get.proofs.len: {:?}", table.len());

        let mut proofs = vec![];
        for row in table.iter()? {
            let (_secret, json) = row?;
            let p: ProofExtended = serde_json::from_str(json.value())?;
            proofs.push(p);
        }

        Ok(proofs)
    }

    async fn invalidate_proof(&self, proof: &Proof) -> Result<(), Self::Error> {
        let json = serde_json::to_string(proof)?;
        debug!("invalidate_proof: {}", json);

        let define = self.definition_proofs();
        let define_spent = self.definition_spent_proofs();

        let tn = self.database().begin_write()?;
        {
            let mut live = tn.open_table(define)?;
            live.remove(proof.secret.as_str())?;

            let mut spent = tn.open_table(define_spent)?;
            spent.insert(proof.secret.as_str(), json.as_str())?;
        }
        tn.commit()?;

        Ok(())
    }

    async fn secret_used(&self, secret: &str) -> Result<bool, Self::Error> {
        let tn = self.database().begin_read()?;

        let live = tn.open_table(self.definition_proofs())?;
        if live.get(secret)?.is_some() {
            return Ok(true);
        }

        let spent = tn.open_table(self.definition_spent_proofs())?;
        Ok(spent.get(secret)?.is_some())
    }

    async fn update_proof_reserved(
        &self,
        proof: &Proof,
        reserved: bool,
        send_id: Option<&str>,
    ) -> Result<(), Self::Error> {
        let define = self.definition_proofs();

        let tn = self.database().begin_write()?;
        {
            let mut table = tn.open_table(define)?;

            let mut stored = {
                let got = table.get(proof.secret.as_str())?;
                match got {
                    Some(json) => serde_json::from_str::<ProofExtended>(json.value())?,
                    None => ProofExtended::from(proof.clone()),
                }
            };
            stored.reserved = reserved;
            stored.send_id = send_id.map(|s| s.to_owned());

            let json = serde_json::to_string(&stored)?;
            debug!("update_proof_reserved: {}", json);
            table.insert(proof.secret.as_str(), json.as_str())?;
        }
        tn.commit()?;

        Ok(())
    }

    async fn store_p2sh(&self, script: &P2SHScript) -> Result<(), Self::Error> {
        let json = serde_json::to_string(script)?;

        let key = script.address.as_deref().unwrap_or(script.script.as_str());

        let define = self.definition_scripts();

        let tn = self.database().begin_write()?;
        {
            let mut table = tn.open_table(define)?;
            table.insert(key, json.as_str())?;
        }
        tn.commit()?;

        Ok(())
    }

    async fn get_p2sh(&self, address: &str) -> Result<Option<P2SHScript>, Self::Error> {
        let define = self.definition_scripts();

        let tn = self.database().begin_read()?;
        {
            let table = tn.open_table(define)?;
            let got = table.get(address)?;

            match got {
                Some(json) => Ok(Some(serde_json::from_str(json.value())?)),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    // cargo test store::impl_redb --  --nocapture
    #[tokio::test]
    async fn it_works_proof_lifecycle() {
        let (_td, tf) = crate::store::tests::tmpfi("test.redb");

        let db = Redb::open(tf, Default::default()).unwrap();
        crate::store::tests::test_proof_lifecycle(&db).await.unwrap();
    }

    #[tokio::test]
    async fn it_works_reserved() {
        let (_td, tf) = crate::store::tests::tmpfi("test.redb");

        let db = Redb::open(tf, Default::default()).unwrap();
        crate::store::tests::test_reserved(&db).await.unwrap();
    }

    #[tokio::test]
    async fn it_works_p2sh() {
        let (_td, tf) = crate::store::tests::tmpfi("test.redb");

        let db = Redb::open(tf, Default::default()).unwrap();
        crate::store::tests::test_p2sh(&db).await.unwrap();
    }

    #[test]
    fn tables_check() {
        assert!(Tables::default().check().is_ok());

        let dup = Tables {
            proofs: "x",
            spent_proofs: "x",
            scripts: "scripts",
        };
        assert!(dup.check().is_err());

        let empty = Tables {
            proofs: "",
            spent_proofs: "spent",
            scripts: "scripts",
        };
        assert!(empty.check().is_err());
    }
}
