use leadbook_core::{
    FieldValue, HistoryEntry, Hlc, Lead, LeadField, LeadFilter, LeadId, LeadSort,
};
use leadbook_storage::{HistoryStore, LeadStore, SqliteStorage, StorageError};

const BREAK_HISTORY: &str = "CREATE TRIGGER IF NOT EXISTS history_unavailable
     BEFORE INSERT ON lead_history
     BEGIN SELECT RAISE(ABORT, 'history store unavailable'); END;";

const RESTORE_HISTORY: &str = "DROP TRIGGER IF EXISTS history_unavailable;";

/// Store wrapper for fault injection. It can:
///
/// - reject lead inserts after a set number of successes;
/// - make every history write fail inside the store's own transaction;
/// - let a competing writer land between an update's read and its write.
///
/// Everything else passes straight through.
pub struct FailingStore {
    inner: SqliteStorage,
    fail_after: Option<usize>,
    inserts: usize,
    race_updates: bool,
}

impl FailingStore {
    pub fn new(inner: SqliteStorage) -> Self {
        Self {
            inner,
            fail_after: None,
            inserts: 0,
            race_updates: false,
        }
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self::new(SqliteStorage::open_in_memory()?))
    }

    pub fn fail_inserts_after(mut self, inserts: usize) -> Self {
        self.fail_after = Some(inserts);
        self
    }

    /// Before each update, bump the stored stamp as another writer would.
    pub fn race_updates(mut self) -> Self {
        self.race_updates = true;
        self
    }

    /// From now on every history row is refused by SQLite itself.
    pub fn break_history(&self) -> Result<(), StorageError> {
        self.inner.conn().execute_batch(BREAK_HISTORY)?;
        Ok(())
    }

    pub fn restore_history(&self) -> Result<(), StorageError> {
        self.inner.conn().execute_batch(RESTORE_HISTORY)?;
        Ok(())
    }
}

impl LeadStore for FailingStore {
    fn get_lead(&self, lead_id: LeadId) -> Result<Option<Lead>, StorageError> {
        self.inner.get_lead(lead_id)
    }

    fn insert_lead(&mut self, lead: &Lead, entry: &HistoryEntry) -> Result<Lead, StorageError> {
        if self.fail_after.is_some_and(|limit| self.inserts >= limit) {
            return Err(StorageError::Unavailable("injected insert failure".into()));
        }
        let stored = self.inner.insert_lead(lead, entry)?;
        self.inserts += 1;
        Ok(stored)
    }

    fn update_lead(
        &mut self,
        lead_id: LeadId,
        expected: Hlc,
        changes: &[(LeadField, FieldValue)],
        updated_at: Hlc,
        entry: Option<&HistoryEntry>,
    ) -> Result<Option<Lead>, StorageError> {
        if self.race_updates {
            let competing = Hlc::new(expected.wall_ms(), expected.counter() + 1);
            self.inner
                .update_lead(lead_id, expected, &[], competing, None)?;
        }
        self.inner
            .update_lead(lead_id, expected, changes, updated_at, entry)
    }

    fn delete_lead(&mut self, lead_id: LeadId) -> Result<bool, StorageError> {
        self.inner.delete_lead(lead_id)
    }

    fn list_leads(
        &self,
        filter: &LeadFilter,
        sort: &LeadSort,
        limit: Option<u32>,
        offset: u64,
    ) -> Result<Vec<Lead>, StorageError> {
        self.inner.list_leads(filter, sort, limit, offset)
    }

    fn count_leads(&self, filter: &LeadFilter) -> Result<u64, StorageError> {
        self.inner.count_leads(filter)
    }

    fn latest_stamp(&self) -> Result<Option<Hlc>, StorageError> {
        self.inner.latest_stamp()
    }
}

impl HistoryStore for FailingStore {
    fn list_history(
        &self,
        lead_id: LeadId,
        limit: Option<u32>,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        self.inner.list_history(lead_id, limit)
    }
}
