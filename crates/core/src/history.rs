use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::diff::FieldDiff;
use crate::hlc::Hlc;
use crate::ids::{HistoryId, LeadId, UserId};
use crate::lead::string_enum;

string_enum!(
    /// What kind of mutation produced a history entry.
    HistoryKind {
        Created => "created",
        Updated => "updated",
        Imported => "imported",
    }
);

/// One immutable audit record for a lead mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub lead_id: LeadId,
    pub changed_by: UserId,
    pub changed_at: Hlc,
    pub kind: HistoryKind,
    pub diff: FieldDiff,
}

impl HistoryEntry {
    pub fn new(
        lead_id: LeadId,
        changed_by: UserId,
        changed_at: Hlc,
        kind: HistoryKind,
        diff: FieldDiff,
    ) -> Self {
        Self {
            id: HistoryId::new(),
            lead_id,
            changed_by,
            changed_at,
            kind,
            diff,
        }
    }

    pub fn diff_to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(&self.diff)
    }

    pub fn diff_from_msgpack(bytes: &[u8]) -> Result<FieldDiff, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}
