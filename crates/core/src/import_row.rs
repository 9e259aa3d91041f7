//! Raw CSV import rows and their coercion into lead drafts.

use serde::Deserialize;

use crate::lead::{LeadDraft, LeadField, Status};
use crate::validation::Violation;

/// One import row exactly as read from the file, keyed by header.
///
/// Unknown columns (`createdAt`, `updatedAt` from an export) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportRow {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub bhk: Option<String>,
    pub purpose: Option<String>,
    pub budget_min: Option<String>,
    pub budget_max: Option<String>,
    pub timeline: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
}

fn cell(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ImportRow {
    /// True when every cell is empty or missing.
    pub fn is_blank(&self) -> bool {
        [
            &self.full_name,
            &self.email,
            &self.phone,
            &self.city,
            &self.property_type,
            &self.bhk,
            &self.purpose,
            &self.budget_min,
            &self.budget_max,
            &self.timeline,
            &self.source,
            &self.status,
            &self.notes,
            &self.tags,
        ]
        .into_iter()
        .all(|v| cell(v).is_none())
    }

    /// Coerce string cells into a draft. Budget cells that are not whole
    /// numbers come back as violations and are left out of the draft.
    pub fn to_draft(&self) -> (LeadDraft, Vec<Violation>) {
        let mut violations = Vec::new();
        let mut budget = |field: LeadField, raw: &Option<String>| -> Option<i64> {
            let raw = cell(raw)?;
            match raw.parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    violations.push(Violation::new(
                        field.as_str(),
                        "Budget must be a whole number",
                    ));
                    None
                }
            }
        };
        let budget_min = budget(LeadField::BudgetMin, &self.budget_min);
        let budget_max = budget(LeadField::BudgetMax, &self.budget_max);

        let tags = self
            .tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let draft = LeadDraft {
            full_name: cell(&self.full_name),
            email: cell(&self.email),
            phone: cell(&self.phone),
            city: cell(&self.city),
            property_type: cell(&self.property_type),
            bhk: cell(&self.bhk),
            purpose: cell(&self.purpose),
            budget_min,
            budget_max,
            timeline: cell(&self.timeline),
            source: cell(&self.source),
            status: cell(&self.status).or_else(|| Some(Status::default().as_str().to_string())),
            notes: cell(&self.notes),
            tags,
        };
        (draft, violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ImportRow {
        ImportRow {
            full_name: Some("  Meera Nair ".into()),
            email: Some("".into()),
            phone: Some("9876501234".into()),
            city: Some("Mohali".into()),
            property_type: Some("Plot".into()),
            bhk: Some(" ".into()),
            purpose: Some("Buy".into()),
            budget_min: Some("2500000".into()),
            budget_max: None,
            timeline: Some("Exploring".into()),
            source: Some("Call".into()),
            status: None,
            notes: None,
            tags: Some(" corner, ,east-facing ,".into()),
        }
    }

    #[test]
    fn cells_are_trimmed_and_blanks_dropped() {
        let (draft, violations) = row().to_draft();
        assert!(violations.is_empty());
        assert_eq!(draft.full_name.as_deref(), Some("Meera Nair"));
        assert_eq!(draft.email, None);
        assert_eq!(draft.bhk, None);
        assert_eq!(draft.budget_min, Some(2_500_000));
        assert_eq!(draft.budget_max, None);
        assert_eq!(draft.tags, vec!["corner", "east-facing"]);
    }

    #[test]
    fn status_defaults_to_new() {
        let (draft, _) = row().to_draft();
        assert_eq!(draft.status.as_deref(), Some("New"));

        let explicit = ImportRow {
            status: Some("Visited".into()),
            ..row()
        };
        assert_eq!(explicit.to_draft().0.status.as_deref(), Some("Visited"));
    }

    #[test]
    fn non_numeric_budget_is_a_violation() {
        let bad = ImportRow {
            budget_min: Some("25 lakh".into()),
            budget_max: Some("3e6".into()),
            ..row()
        };
        let (draft, violations) = bad.to_draft();
        assert_eq!(draft.budget_min, None);
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["budgetMin", "budgetMax"]);
    }

    #[test]
    fn blank_row_detection() {
        assert!(ImportRow::default().is_blank());
        let spaces = ImportRow {
            notes: Some("   ".into()),
            ..Default::default()
        };
        assert!(spaces.is_blank());
        assert!(!row().is_blank());
    }
}
