//! Bulk CSV import.
//!
//! Runs in two phases. [`validate_rows`] is pure and checks every row,
//! collecting all violations. Only when it comes back clean does the engine
//! commit the rows, one by one in file order.

use std::collections::BTreeSet;
use std::io::Read;

use serde::Serialize;
use tracing::{error, info, warn};

use leadbook_core::{
    Caller, HistoryKind, ImportRow, Lead, LeadField, LeadId, ValidatedLead,
    validation::validate,
};
use leadbook_storage::{HistoryStore, LeadStore};

use crate::{Engine, EngineError, authenticated};

/// Columns an import file must carry.
pub const REQUIRED_COLUMNS: &[LeadField] = &[
    LeadField::FullName,
    LeadField::Phone,
    LeadField::City,
    LeadField::PropertyType,
    LeadField::Purpose,
    LeadField::Timeline,
    LeadField::Source,
];

/// One problem found in an import file. Rows are numbered by CSV record with
/// the header as row 1 (see [`parse_rows`]); row 0 means the file as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportError {
    pub row: usize,
    pub field: String,
    pub message: String,
}

impl ImportError {
    fn file(message: impl Into<String>) -> Self {
        Self {
            row: 0,
            field: "file".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub imported_count: usize,
    pub errors: Vec<ImportError>,
    pub message: String,
}

impl ImportResult {
    fn rejected(errors: Vec<ImportError>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            imported_count: 0,
            errors,
            message: message.into(),
        }
    }
}

/// Read data rows numbered by record: the header is row 1 and the first
/// record row 2. Empty lines are not records and take no number. Records
/// whose cells are all blank are skipped but keep theirs.
pub fn parse_rows<R: Read>(input: R) -> Result<Vec<(usize, ImportRow)>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| ImportError::file(format!("Error processing CSV file: {e}")))?
        .clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ImportError::file("CSV file has no header row"));
    }
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .map(|c| c.as_str())
        .filter(|c| !headers.iter().any(|h| h.trim() == *c))
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::file(format!(
            "Missing required column(s): {}",
            missing.join(", ")
        )));
    }

    let trimmed: csv::StringRecord = headers.iter().map(str::trim).collect();
    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| ImportError::file(format!("Error processing CSV file: {e}")))?;
        let row: ImportRow = record
            .deserialize(Some(&trimmed))
            .map_err(|e| ImportError::file(format!("Error processing CSV file: {e}")))?;
        if !row.is_blank() {
            rows.push((index + 2, row));
        }
    }
    Ok(rows)
}

/// Coerce and validate every row. Either all rows pass, or every violation
/// from every row comes back tagged with its row number.
pub fn validate_rows(
    rows: &[(usize, ImportRow)],
) -> Result<Vec<(usize, ValidatedLead)>, Vec<ImportError>> {
    let mut validated = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for (row_number, row) in rows {
        let (draft, coercion) = row.to_draft();
        let outcome = validate(&draft);
        let violations = coercion
            .into_iter()
            .chain(outcome.as_ref().err().into_iter().flat_map(|e| e.violations().iter().cloned()));
        errors.extend(violations.map(|v| ImportError {
            row: *row_number,
            field: v.field,
            message: v.message,
        }));
        if let Ok(lead) = outcome {
            validated.push((*row_number, lead));
        }
    }

    if errors.is_empty() {
        Ok(validated)
    } else {
        Err(errors)
    }
}

impl<S: LeadStore + HistoryStore> Engine<S> {
    /// Import leads from CSV, owned by the caller.
    ///
    /// Only a missing caller is an `Err`; every other failure is reported in
    /// the returned [`ImportResult`]. If the store fails partway through the
    /// commit phase, rows already written stay written.
    pub fn import_csv<R: Read>(
        &mut self,
        caller: Option<&Caller>,
        input: R,
    ) -> Result<ImportResult, EngineError> {
        let caller = authenticated(caller)?;

        let rows = match parse_rows(input) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(owner = %caller.user_id, message = %err.message, "unreadable import file");
                return Ok(ImportResult::rejected(
                    vec![err],
                    "An error occurred while processing the file",
                ));
            }
        };

        let max_rows = self.config.import_max_rows;
        if rows.len() > max_rows {
            let capacity = EngineError::CapacityExceeded { max_rows };
            warn!(owner = %caller.user_id, rows = rows.len(), max_rows, "import over capacity");
            return Ok(ImportResult::rejected(
                vec![ImportError::file(capacity.to_string())],
                format!("File contains too many rows. {capacity}."),
            ));
        }

        let validated = match validate_rows(&rows) {
            Ok(validated) => validated,
            Err(errors) => {
                let failed_rows: BTreeSet<usize> = errors.iter().map(|e| e.row).collect();
                warn!(
                    owner = %caller.user_id,
                    rows = failed_rows.len(),
                    errors = errors.len(),
                    "import rejected"
                );
                let message = format!("Validation failed for {} row(s)", failed_rows.len());
                return Ok(ImportResult::rejected(errors, message));
            }
        };

        let mut imported_count = 0;
        for (row_number, data) in validated {
            if let Err(err) = self.commit_row(caller, data) {
                error!(
                    owner = %caller.user_id,
                    row = row_number,
                    imported = imported_count,
                    error = %err,
                    "import aborted by store failure"
                );
                return Ok(ImportResult {
                    success: false,
                    imported_count,
                    errors: vec![ImportError {
                        row: 0,
                        field: "database".to_string(),
                        message: "Database error during import".to_string(),
                    }],
                    message: "An error occurred while importing data".to_string(),
                });
            }
            imported_count += 1;
        }

        info!(owner = %caller.user_id, rows = imported_count, "imported leads");
        Ok(ImportResult {
            success: true,
            imported_count,
            errors: Vec::new(),
            message: format!("Successfully imported {imported_count} lead(s)"),
        })
    }

    fn commit_row(&mut self, caller: &Caller, data: ValidatedLead) -> Result<Lead, EngineError> {
        let stamp = self.clock.tick()?;
        let lead = Lead {
            id: LeadId::new(),
            data,
            owner_id: caller.user_id,
            created_at: stamp,
            updated_at: stamp,
        };
        self.persist_new(&lead, caller, HistoryKind::Imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "fullName,email,phone,city,propertyType,bhk,purpose,budgetMin,budgetMax,timeline,source,status,notes,tags";

    fn file(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    const VALID: &str =
        "Asha Rao,asha@example.com,9876543210,Mohali,Villa,3,Buy,5000000,7000000,3-6m,Referral,,,\"garden,corner\"";

    #[test]
    fn rows_are_numbered_from_two() {
        let rows = parse_rows(file(&[VALID, VALID]).as_bytes()).unwrap();
        let numbers: Vec<_> = rows.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert_eq!(rows[0].1.tags.as_deref(), Some("garden,corner"));
    }

    #[test]
    fn missing_columns_reject_the_file() {
        let err = parse_rows("fullName,phone\nAsha,9876543210".as_bytes()).unwrap_err();
        assert_eq!(err.row, 0);
        assert_eq!(err.field, "file");
        assert!(err.message.contains("city"));
    }

    #[test]
    fn empty_input_rejects_the_file() {
        let err = parse_rows("".as_bytes()).unwrap_err();
        assert_eq!(err.field, "file");
    }

    #[test]
    fn blank_rows_are_skipped() {
        let rows = parse_rows(file(&[VALID, ",,,,,,,,,,,,,", VALID]).as_bytes()).unwrap();
        let numbers: Vec<_> = rows.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![2, 4]);
    }

    #[test]
    fn empty_lines_take_no_row_number() {
        let bad_phone = VALID.replace("9876543210", "12345");
        let input = format!("{HEADER}\n{VALID}\n\n{bad_phone}\n\n,,,,,,,,,,,,,\n{VALID}\n");
        let rows = parse_rows(input.as_bytes()).unwrap();
        let numbers: Vec<_> = rows.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![2, 3, 5]);

        let errors = validate_rows(&rows).unwrap_err();
        let found: Vec<_> = errors.iter().map(|e| (e.row, e.field.as_str())).collect();
        assert_eq!(found, vec![(3, "phone")]);
    }

    #[test]
    fn validation_collects_every_row() {
        let bad_phone = VALID.replace("9876543210", "12345");
        let plot_with_bhk = VALID.replace("Villa", "Plot");
        let rows = parse_rows(file(&[VALID, &bad_phone, VALID, &plot_with_bhk]).as_bytes())
            .unwrap();
        let errors = validate_rows(&rows).unwrap_err();
        let found: Vec<_> = errors.iter().map(|e| (e.row, e.field.as_str())).collect();
        assert_eq!(found, vec![(3, "phone"), (5, "bhk")]);
    }

    #[test]
    fn clean_rows_validate_in_order() {
        let rows = parse_rows(file(&[VALID, &VALID.replace("Asha Rao", "Vikram Rao")]).as_bytes())
            .unwrap();
        let validated = validate_rows(&rows).unwrap();
        assert_eq!(validated[0].0, 2);
        assert_eq!(validated[1].1.full_name, "Vikram Rao");
        assert_eq!(validated[0].1.tags, vec!["garden", "corner"]);
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = ImportResult::rejected(vec![ImportError::file("x")], "nope");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["importedCount"], 0);
        assert_eq!(json["errors"][0]["row"], 0);
    }
}
