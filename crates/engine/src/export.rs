use std::io::Write;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use leadbook_core::{Caller, Lead, LeadQuery};
use leadbook_storage::{HistoryStore, LeadStore};

use crate::{Engine, EngineError, authenticated};

/// A lead flattened for CSV. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub city: &'static str,
    pub property_type: &'static str,
    pub bhk: Option<&'static str>,
    pub purpose: &'static str,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub timeline: &'static str,
    pub source: &'static str,
    pub status: &'static str,
    pub notes: Option<String>,
    pub tags: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Lead> for ExportRow {
    fn from(lead: &Lead) -> Self {
        let data = &lead.data;
        Self {
            full_name: data.full_name.clone(),
            email: data.email.clone(),
            phone: data.phone.clone(),
            city: data.city.as_str(),
            property_type: data.property_type.as_str(),
            bhk: data.bhk.map(|b| b.as_str()),
            purpose: data.purpose.as_str(),
            budget_min: data.budget_min,
            budget_max: data.budget_max,
            timeline: data.timeline.as_str(),
            source: data.source.as_str(),
            status: data.status.as_str(),
            notes: data.notes.clone(),
            tags: data.tags.join(","),
            created_at: lead.created_at.to_rfc3339(),
            updated_at: lead.updated_at.to_rfc3339(),
        }
    }
}

/// `leads-YYYY-MM-DD.csv`
pub fn export_filename(date: NaiveDate) -> String {
    format!("leads-{}.csv", date.format("%Y-%m-%d"))
}

/// Export filename for the current UTC date.
pub fn default_export_filename() -> String {
    export_filename(Utc::now().date_naive())
}

impl<S: LeadStore + HistoryStore> Engine<S> {
    /// Every lead matching the query's filter, in its sort order. Paging is
    /// ignored.
    pub fn export_rows(
        &self,
        caller: Option<&Caller>,
        query: &LeadQuery,
    ) -> Result<Vec<ExportRow>, EngineError> {
        authenticated(caller)?;
        let leads = self
            .storage
            .list_leads(&query.filter, &query.sort, None, 0)?;
        Ok(leads.iter().map(ExportRow::from).collect())
    }

    /// Write matching leads as CSV, header first. Returns the number of rows.
    pub fn export_csv<W: Write>(
        &self,
        caller: Option<&Caller>,
        query: &LeadQuery,
        out: W,
    ) -> Result<usize, EngineError> {
        let rows = self.export_rows(caller, query)?;
        let mut writer = csv::Writer::from_writer(out);
        if rows.is_empty() {
            writer.write_record(EXPORT_COLUMNS)?;
        }
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        info!(rows = rows.len(), "exported leads");
        Ok(rows.len())
    }
}

/// Header written even when nothing matched.
pub const EXPORT_COLUMNS: &[&str] = &[
    "fullName",
    "email",
    "phone",
    "city",
    "propertyType",
    "bhk",
    "purpose",
    "budgetMin",
    "budgetMax",
    "timeline",
    "source",
    "status",
    "notes",
    "tags",
    "createdAt",
    "updatedAt",
];
