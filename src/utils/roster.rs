// src/utils/roster.rs

//! Parsing of the roster spreadsheet that admins upload.
//!
//! The first sheet of an Excel or OpenDocument workbook is read; anything
//! that is not a workbook is read as UTF-8 CSV. The first non-empty row is a
//! header. Columns are located by name (`name`, `email`, `phone`,
//! case-insensitive) so extra columns and any column order are accepted.

use std::io::Cursor;

use calamine::{Reader, open_workbook_auto_from_rs};

use crate::error::AppError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One data row of the roster, already trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl RosterRow {
    /// Rows without an email or phone cannot identify a candidate.
    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.phone.is_empty()
    }
}

pub fn parse_roster(file: &[u8]) -> Result<Vec<RosterRow>, AppError> {
    let records = match read_workbook(file) {
        Some(records) => records?,
        None => read_csv(file)?,
    };

    rows_from_records(records)
}

/// Returns `None` when the bytes are not a workbook calamine recognises.
fn read_workbook(file: &[u8]) -> Option<Result<Vec<Vec<String>>, AppError>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(file.to_vec())).ok()?;

    let sheet = match workbook.worksheet_range_at(0) {
        Some(Ok(sheet)) => sheet,
        Some(Err(e)) => {
            return Some(Err(AppError::BadRequest(format!(
                "Roster workbook could not be read: {}",
                e
            ))));
        }
        None => return Some(Err(AppError::BadRequest("Roster file is empty".to_string()))),
    };

    Some(Ok(sheet
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()))
}

fn read_csv(file: &[u8]) -> Result<Vec<Vec<String>>, AppError> {
    let file = file.strip_prefix(UTF8_BOM).unwrap_or(file);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| {
                    AppError::BadRequest(format!(
                        "Roster must be an Excel workbook or a UTF-8 CSV file: {}",
                        e
                    ))
                })
        })
        .collect()
}

fn rows_from_records(records: Vec<Vec<String>>) -> Result<Vec<RosterRow>, AppError> {
    let mut records = records
        .into_iter()
        .filter(|fields| fields.iter().any(|f| !f.trim().is_empty()));

    let header = records
        .next()
        .ok_or_else(|| AppError::BadRequest("Roster file is empty".to_string()))?;

    let column = |wanted: &str| {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    };

    let email_col = column("email")
        .ok_or_else(|| AppError::BadRequest("Roster is missing an 'email' column".to_string()))?;
    let phone_col = column("phone")
        .ok_or_else(|| AppError::BadRequest("Roster is missing a 'phone' column".to_string()))?;
    let name_col = column("name");

    let cell = |fields: &[String], idx: Option<usize>| {
        idx.and_then(|i| fields.get(i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    Ok(records
        .map(|fields| RosterRow {
            name: cell(&fields, name_col),
            email: cell(&fields, Some(email_col)),
            phone: cell(&fields, Some(phone_col)),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_columns_by_header_name() {
        let rows = parse_roster(b"Phone,Email,Name\n555-0101, ada@example.com ,Ada\n").unwrap();
        assert_eq!(
            rows,
            vec![RosterRow {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                phone: "555-0101".into(),
            }]
        );
    }

    #[test]
    fn handles_bom_quotes_crlf_and_blank_lines() {
        let csv = "\u{feff}name,email,phone\r\n\"Lovelace, Ada\",ada@example.com,1\r\n\r\n\"Say \"\"hi\"\"\",bob@example.com,2";
        let rows = parse_roster(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Lovelace, Ada");
        assert_eq!(rows[1].name, "Say \"hi\"");
        assert_eq!(rows[1].phone, "2");
    }

    #[test]
    fn short_rows_yield_incomplete_entries() {
        let rows = parse_roster(b"name,email,phone\nNo Email\n,carol@example.com,3\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].is_complete());
        assert!(rows[1].is_complete());
        assert_eq!(rows[1].name, "");
    }

    #[test]
    fn rejects_missing_columns_and_unreadable_files() {
        assert!(parse_roster(b"name,phone\nAda,1\n").is_err());
        assert!(parse_roster(b"").is_err());
        assert!(parse_roster(&[0xff, 0xfe, b',', 0x80, b'\n']).is_err());
    }
}
