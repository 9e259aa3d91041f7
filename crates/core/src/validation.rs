//! Schema rules for buyer leads.
//!
//! Validation runs an ordered list of independent rules over a normalized
//! draft. Every rule sees the whole draft and pushes its own violations, so a
//! caller always gets the full set of problems in one pass.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lead::{
    Bhk, City, LeadDraft, LeadField, PropertyType, Purpose, Source, Status, Timeline,
    ValidatedLead,
};

pub const FULL_NAME_MIN: usize = 2;
pub const FULL_NAME_MAX: usize = 80;
pub const PHONE_MIN_DIGITS: usize = 10;
pub const PHONE_MAX_DIGITS: usize = 15;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_NOTES_LENGTH: usize = 1000;
pub const MAX_TAG_LENGTH: usize = 40;

/// One failed rule: a dotted field path and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn on(field: LeadField, message: impl Into<String>) -> Self {
        Self::new(field.as_str(), message)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// The complete, non-empty set of violations for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{} validation error(s): {}", .0.len(), summary(.0))]
pub struct ValidationErrors(pub Vec<Violation>);

fn summary(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    /// True if any violation is reported against `field` (or a path below it).
    pub fn touches(&self, field: &str) -> bool {
        self.0.iter().any(|v| {
            v.field == field
                || v.field
                    .strip_prefix(field)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

type Rule = fn(&LeadDraft, &mut Vec<Violation>);

/// Evaluated in this order; all of them always run.
const RULES: &[Rule] = &[
    required_fields,
    field_formats,
    bhk_matches_property_type,
    budget_range,
    enum_membership,
];

/// Validate a candidate lead, returning the typed lead or every violation.
pub fn validate(draft: &LeadDraft) -> Result<ValidatedLead, ValidationErrors> {
    let draft = normalize(draft);
    let mut violations = Vec::new();
    for rule in RULES {
        rule(&draft, &mut violations);
    }
    if !violations.is_empty() {
        return Err(ValidationErrors(violations));
    }
    assemble(draft)
}

/// Trim text, and turn empty optional strings into "not provided".
pub fn normalize(draft: &LeadDraft) -> LeadDraft {
    fn trimmed(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    LeadDraft {
        full_name: trimmed(&draft.full_name),
        email: trimmed(&draft.email),
        phone: trimmed(&draft.phone),
        city: trimmed(&draft.city),
        property_type: trimmed(&draft.property_type),
        bhk: trimmed(&draft.bhk),
        purpose: trimmed(&draft.purpose),
        budget_min: draft.budget_min,
        budget_max: draft.budget_max,
        timeline: trimmed(&draft.timeline),
        source: trimmed(&draft.source),
        status: trimmed(&draft.status),
        notes: trimmed(&draft.notes),
        tags: draft.tags.iter().map(|t| t.trim().to_string()).collect(),
    }
}

fn required_fields(draft: &LeadDraft, out: &mut Vec<Violation>) {
    let required = [
        (LeadField::FullName, &draft.full_name, "Full name is required"),
        (LeadField::Phone, &draft.phone, "Phone is required"),
        (LeadField::City, &draft.city, "City is required"),
        (LeadField::PropertyType, &draft.property_type, "Property type is required"),
        (LeadField::Purpose, &draft.purpose, "Purpose is required"),
        (LeadField::Timeline, &draft.timeline, "Timeline is required"),
        (LeadField::Source, &draft.source, "Source is required"),
    ];
    for (field, value, message) in required {
        if value.is_none() {
            out.push(Violation::on(field, message));
        }
    }
}

fn field_formats(draft: &LeadDraft, out: &mut Vec<Violation>) {
    if let Some(name) = &draft.full_name {
        let len = name.chars().count();
        if !(FULL_NAME_MIN..=FULL_NAME_MAX).contains(&len) {
            out.push(Violation::on(
                LeadField::FullName,
                format!("Full name must be {FULL_NAME_MIN}-{FULL_NAME_MAX} characters"),
            ));
        }
    }

    if let Some(email) = &draft.email {
        if let Err(message) = check_email(email) {
            out.push(Violation::on(LeadField::Email, message));
        }
    }

    if let Some(phone) = &draft.phone {
        let digits_only = phone.chars().all(|c| c.is_ascii_digit());
        if !digits_only || !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&phone.len()) {
            out.push(Violation::on(
                LeadField::Phone,
                format!("Phone must be {PHONE_MIN_DIGITS}-{PHONE_MAX_DIGITS} digits"),
            ));
        }
    }

    for (field, value) in [
        (LeadField::BudgetMin, draft.budget_min),
        (LeadField::BudgetMax, draft.budget_max),
    ] {
        if value.is_some_and(|n| n < 0) {
            out.push(Violation::on(field, "Budget must be a non-negative amount"));
        }
    }

    if let Some(notes) = &draft.notes {
        if notes.chars().count() > MAX_NOTES_LENGTH {
            out.push(Violation::on(
                LeadField::Notes,
                format!("Notes must be at most {MAX_NOTES_LENGTH} characters"),
            ));
        }
    }

    for (index, tag) in draft.tags.iter().enumerate() {
        let path = format!("{}.{index}", LeadField::Tags.as_str());
        if tag.is_empty() {
            out.push(Violation::new(path, "Tags cannot be empty"));
        } else if tag.chars().count() > MAX_TAG_LENGTH {
            out.push(Violation::new(
                path,
                format!("Tags must be at most {MAX_TAG_LENGTH} characters"),
            ));
        }
    }
}

fn bhk_matches_property_type(draft: &LeadDraft, out: &mut Vec<Violation>) {
    let Some(property_type) = draft.property_type.as_deref().and_then(PropertyType::parse) else {
        return;
    };
    match (property_type.requires_bhk(), draft.bhk.is_some()) {
        (true, false) => out.push(Violation::on(
            LeadField::Bhk,
            "BHK is required for Apartment and Villa",
        )),
        (false, true) => out.push(Violation::on(
            LeadField::Bhk,
            format!("BHK must be empty for {property_type}"),
        )),
        _ => {}
    }
}

fn budget_range(draft: &LeadDraft, out: &mut Vec<Violation>) {
    if let (Some(min), Some(max)) = (draft.budget_min, draft.budget_max) {
        if max < min {
            out.push(Violation::on(
                LeadField::BudgetMax,
                "Maximum budget must be greater than or equal to minimum budget",
            ));
        }
    }
}

fn enum_membership(draft: &LeadDraft, out: &mut Vec<Violation>) {
    fn check(
        out: &mut Vec<Violation>,
        field: LeadField,
        value: &Option<String>,
        known: bool,
        allowed: &[&str],
    ) {
        if value.is_some() && !known {
            out.push(Violation::on(
                field,
                format!("Invalid {}; expected one of: {}", field, allowed.join(", ")),
            ));
        }
    }

    fn names<T: Copy>(all: &[T], as_str: fn(&T) -> &'static str) -> Vec<&'static str> {
        all.iter().map(as_str).collect()
    }

    check(
        out,
        LeadField::City,
        &draft.city,
        draft.city.as_deref().and_then(City::parse).is_some(),
        &names(City::ALL, City::as_str),
    );
    check(
        out,
        LeadField::PropertyType,
        &draft.property_type,
        draft.property_type.as_deref().and_then(PropertyType::parse).is_some(),
        &names(PropertyType::ALL, PropertyType::as_str),
    );
    check(
        out,
        LeadField::Purpose,
        &draft.purpose,
        draft.purpose.as_deref().and_then(Purpose::parse).is_some(),
        &names(Purpose::ALL, Purpose::as_str),
    );
    check(
        out,
        LeadField::Timeline,
        &draft.timeline,
        draft.timeline.as_deref().and_then(Timeline::parse).is_some(),
        &names(Timeline::ALL, Timeline::as_str),
    );
    check(
        out,
        LeadField::Source,
        &draft.source,
        draft.source.as_deref().and_then(Source::parse).is_some(),
        &names(Source::ALL, Source::as_str),
    );
    check(
        out,
        LeadField::Status,
        &draft.status,
        draft.status.as_deref().and_then(Status::parse).is_some(),
        &names(Status::ALL, Status::as_str),
    );
    check(
        out,
        LeadField::Bhk,
        &draft.bhk,
        draft.bhk.as_deref().and_then(Bhk::parse).is_some(),
        &names(Bhk::ALL, Bhk::as_str),
    );
}

/// Basic `local@domain.tld` shape check.
fn check_email(email: &str) -> Result<(), &'static str> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err("Email is too long");
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email address");
    };
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || domain.contains("..")
        || email.chars().any(char::is_whitespace)
    {
        return Err("Invalid email address");
    }
    Ok(())
}

/// Build the typed lead once every rule has passed.
fn assemble(draft: LeadDraft) -> Result<ValidatedLead, ValidationErrors> {
    fn parsed<T>(
        field: LeadField,
        value: Option<&str>,
        parse: fn(&str) -> Option<T>,
    ) -> Result<T, ValidationErrors> {
        value
            .and_then(parse)
            .ok_or_else(|| ValidationErrors(vec![Violation::on(field, "Invalid value")]))
    }

    let bhk = match draft.bhk.as_deref() {
        Some(raw) => Some(parsed(LeadField::Bhk, Some(raw), Bhk::parse)?),
        None => None,
    };
    let status = match draft.status.as_deref() {
        Some(raw) => parsed(LeadField::Status, Some(raw), Status::parse)?,
        None => Status::default(),
    };

    Ok(ValidatedLead {
        city: parsed(LeadField::City, draft.city.as_deref(), City::parse)?,
        property_type: parsed(
            LeadField::PropertyType,
            draft.property_type.as_deref(),
            PropertyType::parse,
        )?,
        purpose: parsed(LeadField::Purpose, draft.purpose.as_deref(), Purpose::parse)?,
        timeline: parsed(LeadField::Timeline, draft.timeline.as_deref(), Timeline::parse)?,
        source: parsed(LeadField::Source, draft.source.as_deref(), Source::parse)?,
        full_name: draft.full_name.unwrap_or_default(),
        phone: draft.phone.unwrap_or_default(),
        email: draft.email,
        bhk,
        budget_min: draft.budget_min,
        budget_max: draft.budget_max,
        status,
        notes: draft.notes,
        tags: draft.tags,
    })
}
