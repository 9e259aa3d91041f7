use leadbook_core::{
    field_value::FieldValue,
    history::HistoryEntry,
    hlc::Hlc,
    ids::LeadId,
    lead::{Lead, LeadField},
    query::{LeadFilter, LeadSort},
};

use crate::error::StorageError;

/// Record store gateway for leads.
///
/// Writes return the row as persisted, including server-assigned fields.
/// A write and the history entry describing it commit together or not at
/// all.
pub trait LeadStore {
    fn get_lead(&self, lead_id: LeadId) -> Result<Option<Lead>, StorageError>;

    /// Insert a lead and its first history entry in one transaction.
    fn insert_lead(&mut self, lead: &Lead, entry: &HistoryEntry) -> Result<Lead, StorageError>;

    /// Apply `changes` and stamp `updated_at`, but only if the stored
    /// `updated_at` still equals `expected`. `entry`, when given, is appended
    /// in the same transaction. Returns `None` when the lead is gone or the
    /// stamp moved (compare-and-swap lost); nothing is written then.
    fn update_lead(
        &mut self,
        lead_id: LeadId,
        expected: Hlc,
        changes: &[(LeadField, FieldValue)],
        updated_at: Hlc,
        entry: Option<&HistoryEntry>,
    ) -> Result<Option<Lead>, StorageError>;

    /// Remove a lead together with its history, atomically.
    /// Returns false if there was nothing to delete.
    fn delete_lead(&mut self, lead_id: LeadId) -> Result<bool, StorageError>;

    /// Leads matching `filter` in `sort` order, ties broken by id.
    /// `limit: None` returns every row from `offset` on.
    fn list_leads(
        &self,
        filter: &LeadFilter,
        sort: &LeadSort,
        limit: Option<u32>,
        offset: u64,
    ) -> Result<Vec<Lead>, StorageError>;

    fn count_leads(&self, filter: &LeadFilter) -> Result<u64, StorageError>;

    /// Greatest timestamp ever written, used to seed the clock on open.
    fn latest_stamp(&self) -> Result<Option<Hlc>, StorageError>;
}

/// Append-only audit log keyed by lead. Entries are written alongside the
/// lead writes in [`LeadStore`].
pub trait HistoryStore {
    /// Entries for one lead, newest first.
    fn list_history(
        &self,
        lead_id: LeadId,
        limit: Option<u32>,
    ) -> Result<Vec<HistoryEntry>, StorageError>;
}
