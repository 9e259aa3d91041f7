//! Filter, sort and page parameters for lead listings.
//!
//! Parameters arrive as loose string pairs. Anything unrecognized or invalid
//! is dropped rather than rejected, so a stale bookmark still loads a page.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::lead::{City, Lead, PropertyType, Status, Timeline, string_enum};

/// Fixed number of leads per listing page.
pub const PAGE_SIZE: u32 = 10;

/// AND-combined lead predicate. `None` means "don't filter on this".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilter {
    /// Substring matched against full name, phone or email.
    pub search: Option<String>,
    pub city: Option<City>,
    pub property_type: Option<PropertyType>,
    pub status: Option<Status>,
    pub timeline: Option<Timeline>,
}

impl LeadFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

string_enum!(
    /// Columns a listing can be ordered by.
    SortField {
        FullName => "fullName",
        Phone => "phone",
        City => "city",
        PropertyType => "propertyType",
        BudgetMin => "budgetMin",
        BudgetMax => "budgetMax",
        Timeline => "timeline",
        Status => "status",
        CreatedAt => "createdAt",
        UpdatedAt => "updatedAt",
    }
);

string_enum!(SortDirection {
    Asc => "asc",
    Desc => "desc",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for LeadSort {
    fn default() -> Self {
        Self {
            field: SortField::UpdatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl LeadSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Parse `sortBy`/`sortOrder`. An unknown field falls back to the default
    /// ordering entirely; a known field with a missing or unknown direction
    /// sorts descending.
    pub fn parse(sort_by: Option<&str>, sort_order: Option<&str>) -> Self {
        match sort_by.and_then(SortField::parse) {
            Some(field) => Self {
                field,
                direction: sort_order
                    .and_then(SortDirection::parse)
                    .unwrap_or(SortDirection::Desc),
            },
            None => Self::default(),
        }
    }
}

/// 1-based page number; anything below 1 is clamped to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1 }
    }
}

impl PageRequest {
    pub fn new(page: i64) -> Self {
        Self {
            page: page.clamp(1, u32::MAX as i64) as u32,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        PAGE_SIZE
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * PAGE_SIZE as u64
    }
}

/// `ceil(total_count / PAGE_SIZE)`.
pub fn total_pages(total_count: u64) -> u64 {
    total_count.div_ceil(PAGE_SIZE as u64)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadQuery {
    pub filter: LeadFilter,
    pub sort: LeadSort,
    pub page: PageRequest,
}

impl LeadQuery {
    /// Build a query from request parameters (`search`, `city`,
    /// `propertyType`, `status`, `timeline`, `sortBy`, `sortOrder`, `page`).
    /// Later duplicates win.
    pub fn from_params<'a, I>(params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = LeadFilter::default();
        let mut sort_by = None;
        let mut sort_order = None;
        let mut page = PageRequest::default();

        for (key, value) in params {
            let value = value.trim();
            match key {
                "search" => {
                    filter.search = (!value.is_empty()).then(|| value.to_string());
                }
                "city" => filter.city = City::parse(value),
                "propertyType" => filter.property_type = PropertyType::parse(value),
                "status" => filter.status = Status::parse(value),
                "timeline" => filter.timeline = Timeline::parse(value),
                "sortBy" => sort_by = Some(value),
                "sortOrder" => sort_order = Some(value),
                "page" => page = value.parse().map(PageRequest::new).unwrap_or_default(),
                _ => {}
            }
        }

        Self {
            filter,
            sort: LeadSort::parse(sort_by, sort_order),
            page,
        }
    }
}

/// One page of a lead listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPage {
    pub items: Vec<Lead>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_params_build_filter() {
        let query = LeadQuery::from_params([
            ("search", " Rao "),
            ("city", "Mohali"),
            ("status", "Converted"),
            ("timeline", ">6m"),
            ("page", "3"),
        ]);
        assert_eq!(query.filter.search.as_deref(), Some("Rao"));
        assert_eq!(query.filter.city, Some(City::Mohali));
        assert_eq!(query.filter.status, Some(Status::Converted));
        assert_eq!(query.filter.timeline, Some(Timeline::MoreThanSixMonths));
        assert_eq!(query.filter.property_type, None);
        assert_eq!(query.page.page(), 3);
        assert_eq!(query.page.offset(), 20);
        assert_eq!(query.sort, LeadSort::default());
    }

    #[test]
    fn invalid_filter_values_are_ignored() {
        let query = LeadQuery::from_params([
            ("city", "Delhi"),
            ("propertyType", "Castle"),
            ("status", ""),
            ("search", "   "),
            ("color", "blue"),
        ]);
        assert!(query.filter.is_empty());
    }

    #[test]
    fn page_below_one_clamps() {
        for raw in ["0", "-4", "abc", ""] {
            let query = LeadQuery::from_params([("page", raw)]);
            assert_eq!(query.page.page(), 1, "{raw}");
            assert_eq!(query.page.offset(), 0);
        }
    }

    #[test]
    fn unknown_sort_field_falls_back_to_default() {
        assert_eq!(
            LeadSort::parse(Some("ownerId"), Some("asc")),
            LeadSort::default()
        );
        assert_eq!(
            LeadSort::parse(Some("fullName"), Some("asc")),
            LeadSort::new(SortField::FullName, SortDirection::Asc)
        );
        assert_eq!(
            LeadSort::parse(Some("budgetMax"), Some("sideways")),
            LeadSort::new(SortField::BudgetMax, SortDirection::Desc)
        );
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0), 0);
        assert_eq!(total_pages(1), 1);
        assert_eq!(total_pages(10), 1);
        assert_eq!(total_pages(11), 2);
    }
}
