pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod rate_limit;

pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, ErrorKind, ErrorReport};
pub use export::{ExportRow, default_export_filename, export_filename};
pub use import::{ImportError, ImportResult};

use tracing::{debug, error, info, warn};

use leadbook_core::{
    Caller, FieldValue, HistoryEntry, HistoryKind, Lead, LeadDraft, LeadField, LeadId, LeadPage,
    LeadPatch, LeadQuery, ValidationErrors, Violation,
    diff::{creation_diff, diff},
    hlc::{Hlc, HlcClock, physical_now},
    query::total_pages,
    validation::validate,
};
use leadbook_storage::{HistoryStore, LeadStore, SqliteStorage};

use crate::rate_limit::RateLimiter;

/// Reject a missing caller before anything else runs.
fn authenticated(caller: Option<&Caller>) -> Result<&Caller, EngineError> {
    caller.ok_or(EngineError::Unauthorized)
}

pub struct Engine<S = SqliteStorage> {
    config: EngineConfig,
    clock: HlcClock,
    storage: S,
    create_limiter: RateLimiter,
}

impl Engine<SqliteStorage> {
    /// Open (or create) the database at `config.db_path`.
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        let storage = SqliteStorage::open(&config.db_path)?;
        Self::with_storage(config, storage)
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        Self::with_storage(EngineConfig::in_memory(), SqliteStorage::open_in_memory()?)
    }
}

impl<S: LeadStore + HistoryStore> Engine<S> {
    /// Wrap an already opened store. The clock is fast-forwarded past every
    /// stamp the store holds.
    pub fn with_storage(config: EngineConfig, storage: S) -> Result<Self, EngineError> {
        let mut clock = HlcClock::new();
        if let Some(latest) = storage.latest_stamp()? {
            clock.observe(latest);
        }
        Ok(Self {
            create_limiter: RateLimiter::new(config.create_limit, config.create_window),
            config,
            clock,
            storage,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Validate and persist a new lead owned by the caller, recording a
    /// creation history entry.
    pub fn create_lead(
        &mut self,
        caller: Option<&Caller>,
        draft: &LeadDraft,
    ) -> Result<Lead, EngineError> {
        let caller = authenticated(caller)?;

        let now_ms = physical_now()?;
        self.create_limiter.prune(now_ms);
        if let Err(retry_after_ms) = self.create_limiter.check(caller.user_id, now_ms) {
            warn!(owner = %caller.user_id, retry_after_ms, "create rate limit hit");
            return Err(EngineError::TooManyRequests { retry_after_ms });
        }

        let validated = validate(draft).inspect_err(|errors| {
            debug!(owner = %caller.user_id, errors = errors.violations().len(), "create rejected");
        })?;

        let stamp = self.clock.tick()?;
        let lead = Lead {
            id: LeadId::new(),
            data: validated,
            owner_id: caller.user_id,
            created_at: stamp,
            updated_at: stamp,
        };
        let lead = self.persist_new(&lead, caller, HistoryKind::Created)?;
        info!(lead_id = %lead.id, owner = %caller.user_id, "created lead");
        Ok(lead)
    }

    /// Insert a lead together with its creation-style history entry.
    fn persist_new(
        &mut self,
        lead: &Lead,
        caller: &Caller,
        kind: HistoryKind,
    ) -> Result<Lead, EngineError> {
        let entry = HistoryEntry::new(
            lead.id,
            caller.user_id,
            lead.created_at,
            kind,
            creation_diff(&lead.data),
        );
        let stored = self.storage.insert_lead(lead, &entry).inspect_err(|e| {
            error!(lead_id = %lead.id, error = %e, "failed to insert lead");
        })?;
        Ok(stored)
    }

    /// Fetch a lead and check the caller owns it.
    fn owned_lead(&self, caller: &Caller, lead_id: LeadId) -> Result<Lead, EngineError> {
        let lead = self
            .storage
            .get_lead(lead_id)?
            .ok_or_else(|| EngineError::NotFound(lead_id.to_string()))?;
        if !caller.owns(lead.owner_id) {
            warn!(
                %lead_id,
                caller = %caller.user_id,
                owner = %lead.owner_id,
                "write by non-owner rejected"
            );
            return Err(EngineError::Forbidden(lead_id.to_string()));
        }
        Ok(lead)
    }

    /// Apply a partial update.
    ///
    /// `token` is the caller's last-seen `updated_at`. When given it must
    /// match the stored value exactly. Whether or not a token is given, the
    /// write itself only lands if nobody else has written since the read.
    pub fn update_lead(
        &mut self,
        caller: Option<&Caller>,
        lead_id: LeadId,
        patch: &LeadPatch,
        token: Option<Hlc>,
    ) -> Result<Lead, EngineError> {
        let caller = authenticated(caller)?;
        let current = self.owned_lead(caller, lead_id)?;

        if let Some(token) = token {
            if token != current.updated_at {
                warn!(%lead_id, %token, current = %current.updated_at, "stale update token");
                return Err(EngineError::ConcurrencyConflict(lead_id.to_string()));
            }
        }

        let mut merged = LeadDraft::from_validated(&current.data);
        let mut shape_errors = Vec::new();
        for (field, value) in patch.changes() {
            if let Err(message) = merged.set(*field, value.clone()) {
                shape_errors.push(Violation::new(field.as_str(), message));
            }
        }
        if !shape_errors.is_empty() {
            return Err(ValidationErrors(shape_errors).into());
        }
        let validated = validate(&merged).inspect_err(|errors| {
            debug!(%lead_id, errors = errors.violations().len(), "update rejected");
        })?;

        let incoming: Vec<(LeadField, FieldValue)> = patch
            .fields()
            .map(|field| (field, validated.value(field)))
            .collect();
        let changes = diff(&current, &incoming);
        let changed: Vec<(LeadField, FieldValue)> = changes
            .iter()
            .map(|(field, change)| (*field, change.new.clone()))
            .collect();

        let stamp = self.clock.tick()?;
        let entry = (!changes.is_empty()).then(|| {
            HistoryEntry::new(lead_id, caller.user_id, stamp, HistoryKind::Updated, changes)
        });
        let updated = self
            .storage
            .update_lead(lead_id, current.updated_at, &changed, stamp, entry.as_ref())
            .inspect_err(|e| error!(%lead_id, error = %e, "failed to update lead"))?
            .ok_or_else(|| {
                warn!(%lead_id, "lead changed between read and write");
                EngineError::ConcurrencyConflict(lead_id.to_string())
            })?;

        info!(%lead_id, owner = %caller.user_id, fields = changed.len(), "updated lead");
        Ok(updated)
    }

    /// Remove a lead and its history.
    pub fn delete_lead(
        &mut self,
        caller: Option<&Caller>,
        lead_id: LeadId,
    ) -> Result<(), EngineError> {
        let caller = authenticated(caller)?;
        self.owned_lead(caller, lead_id)?;
        let removed = self
            .storage
            .delete_lead(lead_id)
            .inspect_err(|e| error!(%lead_id, error = %e, "failed to delete lead"))?;
        if !removed {
            return Err(EngineError::NotFound(lead_id.to_string()));
        }
        info!(%lead_id, owner = %caller.user_id, "deleted lead");
        Ok(())
    }

    /// Any signed-in user may read any lead.
    pub fn get_lead(&self, caller: Option<&Caller>, lead_id: LeadId) -> Result<Lead, EngineError> {
        authenticated(caller)?;
        self.storage
            .get_lead(lead_id)?
            .ok_or_else(|| EngineError::NotFound(lead_id.to_string()))
    }

    /// Most recent history entries for a lead, newest first. `limit: None`
    /// uses the configured default.
    pub fn lead_history(
        &self,
        caller: Option<&Caller>,
        lead_id: LeadId,
        limit: Option<u32>,
    ) -> Result<Vec<HistoryEntry>, EngineError> {
        authenticated(caller)?;
        if self.storage.get_lead(lead_id)?.is_none() {
            return Err(EngineError::NotFound(lead_id.to_string()));
        }
        let limit = limit.unwrap_or(self.config.history_limit);
        Ok(self.storage.list_history(lead_id, Some(limit))?)
    }

    /// One page of leads matching `query`.
    pub fn query_leads(
        &self,
        caller: Option<&Caller>,
        query: &LeadQuery,
    ) -> Result<LeadPage, EngineError> {
        authenticated(caller)?;
        let total_count = self.storage.count_leads(&query.filter)?;
        let items = self.storage.list_leads(
            &query.filter,
            &query.sort,
            Some(query.page.limit()),
            query.page.offset(),
        )?;
        Ok(LeadPage {
            items,
            current_page: query.page.page(),
            total_pages: total_pages(total_count),
            total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadbook_core::{Status, UserId};

    fn draft() -> LeadDraft {
        LeadDraft {
            full_name: Some("Rohan Mehta".into()),
            phone: Some("9812345678".into()),
            city: Some("Chandigarh".into()),
            property_type: Some("Apartment".into()),
            bhk: Some("2".into()),
            purpose: Some("Buy".into()),
            timeline: Some("0-3m".into()),
            source: Some("Website".into()),
            ..Default::default()
        }
    }

    #[test]
    fn anonymous_calls_are_unauthorized() {
        let mut engine = Engine::in_memory().unwrap();
        let err = engine.create_lead(None, &draft()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = engine.query_leads(None, &LeadQuery::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn create_forces_owner_and_defaults_status() {
        let mut engine = Engine::in_memory().unwrap();
        let caller = Caller::new(UserId::new());
        let lead = engine.create_lead(Some(&caller), &draft()).unwrap();
        assert_eq!(lead.owner_id, caller.user_id);
        assert_eq!(lead.data.status, Status::New);
        assert_eq!(lead.created_at, lead.updated_at);

        let history = engine.lead_history(Some(&caller), lead.id, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, HistoryKind::Created);
        assert!(history[0].diff.contains_key(&LeadField::FullName));
    }

    #[test]
    fn rate_limit_applies_before_validation() {
        let mut engine = Engine::in_memory().unwrap();
        let caller = Caller::new(UserId::new());
        for _ in 0..5 {
            engine.create_lead(Some(&caller), &LeadDraft::default()).unwrap_err();
        }
        let err = engine.create_lead(Some(&caller), &draft()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyRequests);
    }

    #[test]
    fn wrong_value_shape_is_a_validation_error() {
        let mut engine = Engine::in_memory().unwrap();
        let caller = Caller::new(UserId::new());
        let lead = engine.create_lead(Some(&caller), &draft()).unwrap();
        let patch = LeadPatch::new().text(LeadField::BudgetMax, "a lot");
        let err = engine
            .update_lead(Some(&caller), lead.id, &patch, None)
            .unwrap_err();
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::Validation);
        assert_eq!(report.violations[0].field, "budgetMax");
    }
}
