use std::path::Path;

use leadbook_core::{Caller, Lead, LeadDraft, LeadId, UserId};
use leadbook_engine::{Engine, EngineConfig, EngineError};
use leadbook_storage::{HistoryStore, LeadStore, SqliteStorage};

use crate::failing_store::FailingStore;

/// An engine plus a few signed-in users. `owner` creates leads; `other` is
/// a second agent who can read them but not change them.
pub struct TestDesk<S = SqliteStorage> {
    pub engine: Engine<S>,
    pub owner: Caller,
    pub other: Caller,
}

impl TestDesk<SqliteStorage> {
    /// In-memory engine with production defaults (create limit included).
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::in_memory())
    }

    /// In-memory engine whose create limit is out of the way, for tests
    /// that need to seed more than a handful of leads.
    pub fn relaxed() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig {
            create_limit: 10_000,
            ..EngineConfig::in_memory()
        })
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        let storage = SqliteStorage::open_in_memory()?;
        Ok(Self::wrap(Engine::with_storage(config, storage)?))
    }

    /// Engine backed by a database file under `dir`.
    pub fn on_disk(dir: &Path) -> Result<Self, EngineError> {
        let path = dir.join("leadbook.db");
        let config = EngineConfig {
            db_path: path.to_string_lossy().into_owned(),
            ..EngineConfig::default()
        };
        Ok(Self::wrap(Engine::open(config)?))
    }

    /// On-disk engine in a fresh temporary directory. The directory is
    /// removed when the returned guard drops.
    pub fn temporary() -> Result<(tempfile::TempDir, Self), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let desk = Self::on_disk(dir.path())?;
        Ok((dir, desk))
    }
}

impl TestDesk<FailingStore> {
    /// In-memory engine over a fault-injecting store.
    pub fn faulty(store: FailingStore) -> Result<Self, EngineError> {
        Ok(Self::wrap(Engine::with_storage(EngineConfig::in_memory(), store)?))
    }

    /// In-memory engine whose store rejects every lead insert after the
    /// first `inserts` succeed.
    pub fn failing_after(inserts: usize) -> Result<Self, EngineError> {
        Self::faulty(FailingStore::in_memory()?.fail_inserts_after(inserts))
    }

    pub fn store(&self) -> &FailingStore {
        self.engine.storage()
    }
}

impl<S: LeadStore + HistoryStore> TestDesk<S> {
    fn wrap(engine: Engine<S>) -> Self {
        Self {
            engine,
            owner: Caller::with_email(UserId::new(), "owner@example.com"),
            other: Caller::with_email(UserId::new(), "other@example.com"),
        }
    }

    pub fn create(&mut self, draft: &LeadDraft) -> Result<Lead, EngineError> {
        let owner = self.owner.clone();
        self.engine.create_lead(Some(&owner), draft)
    }

    pub fn reload(&self, lead_id: LeadId) -> Result<Lead, EngineError> {
        self.engine.get_lead(Some(&self.owner), lead_id)
    }

    /// Run a CSV import as the owner.
    pub fn import(&mut self, csv: &str) -> Result<leadbook_engine::ImportResult, EngineError> {
        let owner = self.owner.clone();
        self.engine.import_csv(Some(&owner), csv.as_bytes())
    }

    pub fn lead_count(&self) -> Result<u64, EngineError> {
        Ok(self.engine.storage().count_leads(&Default::default())?)
    }
}
