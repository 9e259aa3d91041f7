use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::lead::{Lead, LeadField, ValidatedLead};

/// Before and after value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Field-level change set, keyed and ordered by field.
pub type FieldDiff = BTreeMap<LeadField, FieldChange>;

/// Changes that applying `incoming` to `previous` would make.
///
/// Only fields listed in `incoming` are compared; a field whose value is
/// equal to the stored one is left out.
pub fn diff(previous: &Lead, incoming: &[(LeadField, FieldValue)]) -> FieldDiff {
    incoming
        .iter()
        .filter_map(|(field, new)| {
            let old = previous.value(*field);
            (old != *new).then(|| {
                (
                    *field,
                    FieldChange {
                        old,
                        new: new.clone(),
                    },
                )
            })
        })
        .collect()
}

/// Diff recorded when a lead first comes into existence: every provided
/// field, with `old` set to null.
pub fn creation_diff(lead: &ValidatedLead) -> FieldDiff {
    LeadField::ALL
        .iter()
        .filter_map(|field| {
            let new = lead.value(*field);
            let provided = match &new {
                FieldValue::Null => false,
                FieldValue::Tags(tags) => !tags.is_empty(),
                _ => true,
            };
            provided.then(|| {
                (
                    *field,
                    FieldChange {
                        old: FieldValue::Null,
                        new,
                    },
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hlc::Hlc;
    use crate::ids::{LeadId, UserId};
    use crate::lead::{City, PropertyType, Purpose, Source, Status, Timeline};

    fn plot_lead() -> Lead {
        Lead {
            id: LeadId::new(),
            data: ValidatedLead {
                full_name: "Meera Shah".into(),
                email: None,
                phone: "9876543210".into(),
                city: City::Mohali,
                property_type: PropertyType::Plot,
                bhk: None,
                purpose: Purpose::Buy,
                budget_min: Some(50),
                budget_max: None,
                timeline: Timeline::Exploring,
                source: Source::Call,
                status: Status::New,
                notes: None,
                tags: vec!["corner".into()],
            },
            owner_id: UserId::new(),
            created_at: Hlc::new(1, 0),
            updated_at: Hlc::new(1, 0),
        }
    }

    #[test]
    fn only_changed_fields_appear() {
        let lead = plot_lead();
        let changes = diff(
            &lead,
            &[
                (LeadField::Status, FieldValue::text("Qualified")),
                (LeadField::City, FieldValue::text("Mohali")),
                (LeadField::BudgetMax, FieldValue::Integer(90)),
            ],
        );
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[&LeadField::Status],
            FieldChange {
                old: FieldValue::text("New"),
                new: FieldValue::text("Qualified"),
            }
        );
        assert_eq!(changes[&LeadField::BudgetMax].old, FieldValue::Null);
    }

    #[test]
    fn identical_update_yields_empty_diff() {
        let lead = plot_lead();
        let incoming: Vec<_> = LeadField::ALL
            .iter()
            .map(|f| (*f, lead.value(*f)))
            .collect();
        assert!(diff(&lead, &incoming).is_empty());
    }

    #[test]
    fn tags_compare_by_value() {
        let lead = plot_lead();
        let same = diff(&lead, &[(LeadField::Tags, FieldValue::Tags(vec!["corner".into()]))]);
        assert!(same.is_empty());
        let reordered = diff(
            &lead,
            &[(LeadField::Tags, FieldValue::Tags(vec!["park".into(), "corner".into()]))],
        );
        assert!(reordered.contains_key(&LeadField::Tags));
    }

    #[test]
    fn creation_diff_skips_absent_fields() {
        let lead = plot_lead();
        let created = creation_diff(&lead.data);
        assert!(created.values().all(|c| c.old.is_null()));
        assert!(created.contains_key(&LeadField::BudgetMin));
        assert!(!created.contains_key(&LeadField::Email));
        assert!(!created.contains_key(&LeadField::Bhk));
        assert_eq!(created[&LeadField::Status].new, FieldValue::text("New"));
    }
}
