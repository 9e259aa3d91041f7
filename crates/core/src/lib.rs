pub mod diff;
pub mod error;
pub mod field_value;
pub mod history;
pub mod hlc;
pub mod identity;
pub mod ids;
pub mod import_row;
pub mod lead;
pub mod query;
pub mod validation;

pub use diff::{FieldChange, FieldDiff};
pub use error::CoreError;
pub use field_value::FieldValue;
pub use history::{HistoryEntry, HistoryKind};
pub use hlc::Hlc;
pub use identity::{Caller, IdentityProvider, StaticIdentity};
pub use ids::*;
pub use import_row::ImportRow;
pub use lead::{
    Bhk, City, Lead, LeadDraft, LeadField, LeadPatch, PropertyType, Purpose, Source, Status,
    Timeline, ValidatedLead,
};
pub use query::{LeadFilter, LeadPage, LeadQuery, LeadSort, PageRequest, SortDirection, SortField};
pub use validation::{ValidationErrors, Violation};
