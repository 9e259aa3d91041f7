use leadbook_core::LeadDraft;

/// Header row accepted by the importer, in export column order.
pub const IMPORT_HEADER: &str =
    "fullName,email,phone,city,propertyType,bhk,purpose,budgetMin,budgetMax,timeline,source,status,notes,tags";

/// Valid Chandigarh apartment lead with a 2 BHK.
pub fn apartment_draft(full_name: &str) -> LeadDraft {
    LeadDraft {
        full_name: Some(full_name.to_string()),
        email: Some("buyer@example.com".to_string()),
        phone: Some("9876543210".to_string()),
        city: Some("Chandigarh".to_string()),
        property_type: Some("Apartment".to_string()),
        bhk: Some("2".to_string()),
        purpose: Some("Buy".to_string()),
        budget_min: Some(4_000_000),
        budget_max: Some(6_000_000),
        timeline: Some("0-3m".to_string()),
        source: Some("Website".to_string()),
        status: None,
        notes: None,
        tags: vec!["first-home".to_string()],
    }
}

/// Valid plot lead, no BHK.
pub fn plot_draft(full_name: &str) -> LeadDraft {
    LeadDraft {
        property_type: Some("Plot".to_string()),
        bhk: None,
        city: Some("Mohali".to_string()),
        timeline: Some("Exploring".to_string()),
        tags: Vec::new(),
        ..apartment_draft(full_name)
    }
}

/// A valid import row whose name and phone vary with `n`.
pub fn csv_row(n: usize) -> String {
    format!(
        "Buyer {n},buyer{n}@example.com,98{n:08},Zirakpur,Villa,3,Buy,3000000,5000000,3-6m,Referral,,imported,\"villa,{n}\""
    )
}

/// Header plus the given rows, newline separated.
pub fn csv_file<I, R>(rows: I) -> String
where
    I: IntoIterator<Item = R>,
    R: AsRef<str>,
{
    let mut out = String::from(IMPORT_HEADER);
    for row in rows {
        out.push('\n');
        out.push_str(row.as_ref());
    }
    out.push('\n');
    out
}

/// `count` valid rows, numbered from 1.
pub fn valid_rows(count: usize) -> Vec<String> {
    (1..=count).map(csv_row).collect()
}
