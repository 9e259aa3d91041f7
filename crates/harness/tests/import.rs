use leadbook_core::{FieldValue, HistoryKind, LeadField, LeadQuery, Status};
use leadbook_engine::ErrorKind;
use leadbook_harness::{TestDesk, csv_file, csv_row, valid_rows};
use leadbook_storage::HistoryStore;

// ============================================================================
// Happy path
// ============================================================================

#[test]
fn valid_file_imports_every_row_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let mut desk = TestDesk::new()?;
    let result = desk.import(&csv_file(valid_rows(12)))?;

    assert!(result.success, "{result:?}");
    assert_eq!(result.imported_count, 12);
    assert!(result.errors.is_empty());
    assert_eq!(result.message, "Successfully imported 12 lead(s)");
    assert_eq!(desk.lead_count()?, 12);

    // Imports bypass the create limit and land oldest first.
    let query = LeadQuery::from_params([("sortBy", "createdAt"), ("sortOrder", "asc")]);
    let page = desk.engine.query_leads(Some(&desk.owner), &query)?;
    assert_eq!(page.items[0].data.full_name, "Buyer 1");
    assert_eq!(page.items[9].data.full_name, "Buyer 10");
    assert!(page.items.iter().all(|l| l.owner_id == desk.owner.user_id));
    Ok(())
}

#[test]
fn imported_rows_get_import_history() -> Result<(), Box<dyn std::error::Error>> {
    let mut desk = TestDesk::new()?;
    desk.import(&csv_file([csv_row(7)]))?;

    let page = desk.engine.query_leads(Some(&desk.owner), &LeadQuery::default())?;
    let lead = &page.items[0];
    assert_eq!(lead.data.status, Status::New);
    assert_eq!(lead.data.tags, vec!["villa", "7"]);

    let history = desk.engine.lead_history(Some(&desk.owner), lead.id, None)?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, HistoryKind::Imported);
    assert_eq!(
        history[0].diff[&LeadField::FullName].new,
        FieldValue::text("Buyer 7")
    );
    assert_eq!(history[0].diff[&LeadField::FullName].old, FieldValue::Null);
    Ok(())
}

#[test]
fn export_output_can_be_imported_again() -> Result<(), Box<dyn std::error::Error>> {
    let mut desk = TestDesk::new()?;
    desk.import(&csv_file(valid_rows(3)))?;

    let mut exported = Vec::new();
    desk.engine
        .export_csv(Some(&desk.owner), &LeadQuery::default(), &mut exported)?;

    let mut second = TestDesk::new()?;
    let result = second.import(std::str::from_utf8(&exported)?)?;
    assert!(result.success, "{result:?}");
    assert_eq!(result.imported_count, 3);
    Ok(())
}

// ============================================================================
// Gate
// ============================================================================

#[test]
fn one_bad_row_rejects_the_whole_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut desk = TestDesk::new()?;
    let mut rows = valid_rows(8);
    rows[4] = rows[4].replace(",9800000005,", ",12345,");

    let result = desk.import(&csv_file(&rows))?;
    assert!(!result.success);
    assert_eq!(result.imported_count, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 6);
    assert_eq!(result.errors[0].field, "phone");
    assert_eq!(result.message, "Validation failed for 1 row(s)");
    assert_eq!(desk.lead_count()?, 0);
    Ok(())
}

#[test]
fn every_row_is_checked_before_giving_up() -> Result<(), Box<dyn std::error::Error>> {
    let mut desk = TestDesk::new()?;
    let rows = [
        csv_row(1).replace("Villa,3", "Villa,"),
        csv_row(2),
        csv_row(3).replace("3000000,5000000", "9000000,100"),
        csv_row(4).replace("Zirakpur", "Delhi").replace("3000000", "lots"),
    ];

    let result = desk.import(&csv_file(&rows))?;
    let found: Vec<_> = result
        .errors
        .iter()
        .map(|e| (e.row, e.field.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![(2, "bhk"), (4, "budgetMax"), (5, "budgetMin"), (5, "city")]
    );
    assert_eq!(result.message, "Validation failed for 3 row(s)");
    assert_eq!(desk.lead_count()?, 0);
    Ok(())
}

#[test]
fn more_than_two_hundred_rows_is_a_capacity_error() -> Result<(), Box<dyn std::error::Error>> {
    let mut desk = TestDesk::new()?;
    let result = desk.import(&csv_file(valid_rows(201)))?;

    assert!(!result.success);
    assert_eq!(result.imported_count, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 0);
    assert_eq!(result.errors[0].field, "file");
    assert_eq!(result.errors[0].message, "Maximum 200 rows allowed");
    assert_eq!(
        result.message,
        "File contains too many rows. Maximum 200 rows allowed."
    );
    assert_eq!(desk.lead_count()?, 0);

    let result = desk.import(&csv_file(valid_rows(200)))?;
    assert!(result.success);
    assert_eq!(result.imported_count, 200);
    Ok(())
}

#[test]
fn malformed_file_is_reported_not_raised() -> Result<(), Box<dyn std::error::Error>> {
    let mut desk = TestDesk::new()?;
    for input in ["", "name,mobile\nAsha,9876543210\n"] {
        let result = desk.import(input)?;
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "file");
        assert_eq!(result.errors[0].row, 0);
    }
    Ok(())
}

#[test]
fn anonymous_import_is_unauthorized() -> Result<(), Box<dyn std::error::Error>> {
    let mut desk = TestDesk::new()?;
    let err = desk
        .engine
        .import_csv(None, csv_file(valid_rows(1)).as_bytes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    Ok(())
}

// ============================================================================
// Store failure during commit
// ============================================================================

#[test]
fn store_failure_keeps_rows_already_committed() -> Result<(), Box<dyn std::error::Error>> {
    let mut desk = TestDesk::failing_after(3)?;
    let result = desk.import(&csv_file(valid_rows(6)))?;

    assert!(!result.success);
    assert_eq!(result.imported_count, 3);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 0);
    assert_eq!(result.errors[0].field, "database");
    assert_eq!(result.message, "An error occurred while importing data");
    assert_eq!(desk.lead_count()?, 3);

    // Committed rows carry their history.
    let page = desk
        .engine
        .query_leads(Some(&desk.owner), &LeadQuery::default())?;
    for lead in &page.items {
        assert_eq!(desk.engine.storage().list_history(lead.id, None)?.len(), 1);
    }
    Ok(())
}
