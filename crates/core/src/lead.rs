use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::field_value::FieldValue;
use crate::hlc::Hlc;
use crate::ids::{LeadId, UserId};

/// Closed set of string values with a fixed wire spelling.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} value: {s}",
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

pub(crate) use string_enum;

string_enum!(City {
    Chandigarh => "Chandigarh",
    Mohali => "Mohali",
    Zirakpur => "Zirakpur",
    Panchkula => "Panchkula",
    Other => "Other",
});

string_enum!(PropertyType {
    Apartment => "Apartment",
    Villa => "Villa",
    Plot => "Plot",
    Office => "Office",
    Retail => "Retail",
});

impl PropertyType {
    /// Residential types carry a BHK; everything else must not.
    pub fn requires_bhk(&self) -> bool {
        matches!(self, PropertyType::Apartment | PropertyType::Villa)
    }
}

string_enum!(Bhk {
    One => "1",
    Two => "2",
    Three => "3",
    Four => "4",
    Studio => "Studio",
});

string_enum!(Purpose {
    Buy => "Buy",
    Rent => "Rent",
});

string_enum!(Timeline {
    ZeroToThreeMonths => "0-3m",
    ThreeToSixMonths => "3-6m",
    MoreThanSixMonths => ">6m",
    Exploring => "Exploring",
});

string_enum!(Source {
    Website => "Website",
    Referral => "Referral",
    WalkIn => "Walk-in",
    Call => "Call",
    Other => "Other",
});

string_enum!(Status {
    New => "New",
    Qualified => "Qualified",
    Contacted => "Contacted",
    Visited => "Visited",
    Negotiation => "Negotiation",
    Converted => "Converted",
    Dropped => "Dropped",
});

impl Default for Status {
    fn default() -> Self {
        Status::New
    }
}

string_enum!(
    /// Names of the caller-editable lead fields, in display order.
    LeadField {
        FullName => "fullName",
        Email => "email",
        Phone => "phone",
        City => "city",
        PropertyType => "propertyType",
        Bhk => "bhk",
        Purpose => "purpose",
        BudgetMin => "budgetMin",
        BudgetMax => "budgetMax",
        Timeline => "timeline",
        Source => "source",
        Status => "status",
        Notes => "notes",
        Tags => "tags",
    }
);

/// Lead fields that passed validation. Only the validator builds these from
/// caller input; storage rebuilds them from rows it wrote itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedLead {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub city: City,
    pub property_type: PropertyType,
    pub bhk: Option<Bhk>,
    pub purpose: Purpose,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub timeline: Timeline,
    pub source: Source,
    pub status: Status,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

impl ValidatedLead {
    /// Current value of one field, in the shape used by patches and diffs.
    pub fn value(&self, field: LeadField) -> FieldValue {
        match field {
            LeadField::FullName => FieldValue::text(&self.full_name),
            LeadField::Email => self.email.clone().into(),
            LeadField::Phone => FieldValue::text(&self.phone),
            LeadField::City => FieldValue::text(self.city.as_str()),
            LeadField::PropertyType => FieldValue::text(self.property_type.as_str()),
            LeadField::Bhk => self.bhk.map(|b| b.as_str().to_string()).into(),
            LeadField::Purpose => FieldValue::text(self.purpose.as_str()),
            LeadField::BudgetMin => self.budget_min.into(),
            LeadField::BudgetMax => self.budget_max.into(),
            LeadField::Timeline => FieldValue::text(self.timeline.as_str()),
            LeadField::Source => FieldValue::text(self.source.as_str()),
            LeadField::Status => FieldValue::text(self.status.as_str()),
            LeadField::Notes => self.notes.clone().into(),
            LeadField::Tags => FieldValue::Tags(self.tags.clone()),
        }
    }
}

/// A persisted buyer lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    #[serde(flatten)]
    pub data: ValidatedLead,
    pub owner_id: UserId,
    pub created_at: Hlc,
    pub updated_at: Hlc,
}

impl Lead {
    pub fn value(&self, field: LeadField) -> FieldValue {
        self.data.value(field)
    }
}

/// Raw candidate fields for a new lead, before validation.
///
/// Enum-valued fields are plain strings here so that an unknown value is
/// reported as a violation instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadDraft {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub bhk: Option<String>,
    pub purpose: Option<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub timeline: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

impl LeadDraft {
    /// Draft holding exactly the values of an already validated lead.
    pub fn from_validated(lead: &ValidatedLead) -> Self {
        Self {
            full_name: Some(lead.full_name.clone()),
            email: lead.email.clone(),
            phone: Some(lead.phone.clone()),
            city: Some(lead.city.as_str().to_string()),
            property_type: Some(lead.property_type.as_str().to_string()),
            bhk: lead.bhk.map(|b| b.as_str().to_string()),
            purpose: Some(lead.purpose.as_str().to_string()),
            budget_min: lead.budget_min,
            budget_max: lead.budget_max,
            timeline: Some(lead.timeline.as_str().to_string()),
            source: Some(lead.source.as_str().to_string()),
            status: Some(lead.status.as_str().to_string()),
            notes: lead.notes.clone(),
            tags: lead.tags.clone(),
        }
    }

    /// Overwrite one field. Returns the expected value shape when `value`
    /// has the wrong type for `field`.
    pub fn set(&mut self, field: LeadField, value: FieldValue) -> Result<(), &'static str> {
        fn text(value: FieldValue) -> Result<Option<String>, &'static str> {
            match value {
                FieldValue::Null => Ok(None),
                FieldValue::Text(s) => Ok(Some(s)),
                _ => Err("Expected a text value"),
            }
        }

        fn integer(value: FieldValue) -> Result<Option<i64>, &'static str> {
            match value {
                FieldValue::Null => Ok(None),
                FieldValue::Integer(n) => Ok(Some(n)),
                _ => Err("Expected a whole number"),
            }
        }

        match field {
            LeadField::FullName => self.full_name = text(value)?,
            LeadField::Email => self.email = text(value)?,
            LeadField::Phone => self.phone = text(value)?,
            LeadField::City => self.city = text(value)?,
            LeadField::PropertyType => self.property_type = text(value)?,
            LeadField::Bhk => self.bhk = text(value)?,
            LeadField::Purpose => self.purpose = text(value)?,
            LeadField::BudgetMin => self.budget_min = integer(value)?,
            LeadField::BudgetMax => self.budget_max = integer(value)?,
            LeadField::Timeline => self.timeline = text(value)?,
            LeadField::Source => self.source = text(value)?,
            LeadField::Status => self.status = text(value)?,
            LeadField::Notes => self.notes = text(value)?,
            LeadField::Tags => {
                self.tags = match value {
                    FieldValue::Null => Vec::new(),
                    FieldValue::Tags(tags) => tags,
                    _ => return Err("Expected a list of tags"),
                }
            }
        }
        Ok(())
    }
}

/// A partial update: the fields a caller wants to change, in the order given.
/// Fields not listed are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadPatch {
    changes: Vec<(LeadField, FieldValue)>,
}

impl LeadPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to `value`, replacing an earlier entry for the same field.
    pub fn set(mut self, field: LeadField, value: FieldValue) -> Self {
        self.changes.retain(|(f, _)| *f != field);
        self.changes.push((field, value));
        self
    }

    pub fn text(self, field: LeadField, value: impl Into<String>) -> Self {
        self.set(field, FieldValue::Text(value.into()))
    }

    pub fn integer(self, field: LeadField, value: i64) -> Self {
        self.set(field, FieldValue::Integer(value))
    }

    pub fn clear(self, field: LeadField) -> Self {
        self.set(field, FieldValue::Null)
    }

    pub fn tags<I, T>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.set(
            LeadField::Tags,
            FieldValue::Tags(tags.into_iter().map(Into::into).collect()),
        )
    }

    pub fn changes(&self) -> &[(LeadField, FieldValue)] {
        &self.changes
    }

    pub fn fields(&self) -> impl Iterator<Item = LeadField> + '_ {
        self.changes.iter().map(|(f, _)| *f)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_spelling_matches_wire_values() {
        assert_eq!(Timeline::parse(">6m"), Some(Timeline::MoreThanSixMonths));
        assert_eq!(Source::WalkIn.as_str(), "Walk-in");
        assert_eq!(Bhk::parse("Studio"), Some(Bhk::Studio));
        assert_eq!(Bhk::parse("5"), None);
        assert_eq!(City::parse("chandigarh"), None);
        assert_eq!(Status::default(), Status::New);
    }

    #[test]
    fn only_apartment_and_villa_require_bhk() {
        let requiring: Vec<_> = PropertyType::ALL
            .iter()
            .filter(|p| p.requires_bhk())
            .collect();
        assert_eq!(requiring, vec![&PropertyType::Apartment, &PropertyType::Villa]);
    }

    #[test]
    fn patch_keeps_last_value_per_field() {
        let patch = LeadPatch::new()
            .text(LeadField::Status, "Contacted")
            .integer(LeadField::BudgetMax, 10)
            .text(LeadField::Status, "Qualified");
        assert_eq!(
            patch.changes(),
            &[
                (LeadField::BudgetMax, FieldValue::Integer(10)),
                (LeadField::Status, FieldValue::text("Qualified")),
            ]
        );
    }

    #[test]
    fn draft_set_rejects_wrong_shape() {
        let mut draft = LeadDraft::default();
        assert!(draft.set(LeadField::BudgetMin, FieldValue::text("lots")).is_err());
        assert!(draft.set(LeadField::Phone, FieldValue::Integer(9)).is_err());
        draft.set(LeadField::Email, FieldValue::Null).unwrap();
        assert_eq!(draft.email, None);
    }
}
