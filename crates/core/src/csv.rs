//! Bulk import: CSV text to process inputs.
//!
//! The expected header uses the column names of the spreadsheet template
//! the finance teams fill in:
//!
//! ```text
//! Email ID,Team,Process Name,Description,Apps Used,Frequency,Duration,Volume,Process Status,Documentation
//! ```
//!
//! `Description` and `Documentation` may be omitted. Fields follow RFC 4180
//! quoting, so an `Apps Used` cell such as `"ERP, Excel"` stays one field.

use std::collections::HashMap;
use std::fmt;

use crate::input::ProcessInput;

const EMAIL: &str = "Email ID";
const TEAM: &str = "Team";
const PROCESS_NAME: &str = "Process Name";
const DESCRIPTION: &str = "Description";
const APPS_USED: &str = "Apps Used";
const FREQUENCY: &str = "Frequency";
const DURATION: &str = "Duration";
const VOLUME: &str = "Volume";
const PROCESS_STATUS: &str = "Process Status";
const DOCUMENTATION: &str = "Documentation";

const REQUIRED_COLUMNS: [&str; 8] = [
    EMAIL,
    TEAM,
    PROCESS_NAME,
    APPS_USED,
    FREQUENCY,
    DURATION,
    VOLUME,
    PROCESS_STATUS,
];

/// Problems that make a whole CSV document unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvError {
    /// No header row.
    Empty,
    /// The header lacks a required column.
    MissingColumn(&'static str),
    /// A quoted field runs to the end of the input.
    UnterminatedQuote { line: usize },
}

impl fmt::Display for CsvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvError::Empty => f.write_str("CSV input has no header row"),
            CsvError::MissingColumn(name) => write!(f, "CSV header is missing column '{name}'"),
            CsvError::UnterminatedQuote { line } => {
                write!(f, "unterminated quoted field starting on line {line}")
            }
        }
    }
}

impl std::error::Error for CsvError {}

/// One data row: the line it starts on and either its input or why it
/// could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub line: usize,
    pub input: Result<ProcessInput, String>,
}

/// Split CSV text into records of fields, tagging each record with the
/// 1-based line it starts on. Blank lines are skipped.
fn split_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, CsvError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut quote_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                quote_line = line;
            }
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                if !(fields.len() == 1 && fields[0].trim().is_empty()) {
                    records.push((record_line, std::mem::take(&mut fields)));
                }
                fields.clear();
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote { line: quote_line });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        if !(fields.len() == 1 && fields[0].trim().is_empty()) {
            records.push((record_line, fields));
        }
    }
    Ok(records)
}

/// Parse CSV text into one [`CsvRow`] per data row.
///
/// Header problems fail the whole document; row problems (such as a
/// non-numeric volume) are reported on that row only. Field values are
/// not validated here.
pub fn parse_process_csv(text: &str) -> Result<Vec<CsvRow>, CsvError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = split_records(text)?.into_iter();
    let (_, header) = records.next().ok_or(CsvError::Empty)?;

    let columns: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_string(), i))
        .collect();
    for name in REQUIRED_COLUMNS {
        if !columns.contains_key(name) {
            return Err(CsvError::MissingColumn(name));
        }
    }

    let rows = records
        .map(|(line, fields)| {
            let cell = |name: &str| -> Option<String> {
                columns
                    .get(name)
                    .and_then(|&i| fields.get(i))
                    .map(|value| value.trim().to_string())
            };
            let optional = |name: &str| cell(name).filter(|value| !value.is_empty());
            let input = row_input(&cell, &optional);
            CsvRow { line, input }
        })
        .collect();
    Ok(rows)
}

fn row_input(
    cell: &dyn Fn(&str) -> Option<String>,
    optional: &dyn Fn(&str) -> Option<String>,
) -> Result<ProcessInput, String> {
    let volume = match cell(VOLUME).as_deref() {
        None | Some("") => None,
        Some(text) => Some(
            text.parse::<i64>()
                .map_err(|_| format!("Volume: '{text}' is not a whole number"))?,
        ),
    };
    Ok(ProcessInput {
        email: cell(EMAIL),
        department: cell(TEAM),
        process_name: cell(PROCESS_NAME),
        description: Some(optional(DESCRIPTION)),
        apps_used: cell(APPS_USED),
        frequency: cell(FREQUENCY),
        duration: cell(DURATION),
        volume,
        status: cell(PROCESS_STATUS),
        documentation: Some(optional(DOCUMENTATION)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Email ID,Team,Process Name,Description,Apps Used,Frequency,Duration,Volume,Process Status,Documentation";

    #[test]
    fn parses_rows_with_quoted_fields() {
        let text = format!(
            "{HEADER}\n\
             ana@example.com,AP,Invoice entry,,\"ERP, Excel\",DAILY,00:15,12,UNSTRUCTURED,\n\
             ben@example.com,GL,Close,\"Month \"\"end\"\" close\",ERP,MONTHLY,04:00,1,OPTIMIZED,wiki/close\n"
        );
        let rows = parse_process_csv(&text).unwrap();
        assert_eq!(rows.len(), 2);

        let first = rows[0].input.as_ref().unwrap();
        assert_eq!(rows[0].line, 2);
        assert_eq!(first.apps_used.as_deref(), Some("ERP, Excel"));
        assert_eq!(first.description, Some(None));
        assert_eq!(first.volume, Some(12));

        let second = rows[1].input.as_ref().unwrap();
        assert_eq!(rows[1].line, 3);
        assert_eq!(second.description, Some(Some("Month \"end\" close".to_string())));
        assert_eq!(second.documentation, Some(Some("wiki/close".to_string())));
    }

    #[test]
    fn bad_volume_fails_only_that_row() {
        let text = format!(
            "{HEADER}\n\
             a@b.co,AP,One,,ERP,DAILY,00:15,lots,UNSTRUCTURED,\n\
             a@b.co,AP,Two,,ERP,DAILY,00:15,2,UNSTRUCTURED,\n"
        );
        let rows = parse_process_csv(&text).unwrap();
        assert_eq!(rows[0].input, Err("Volume: 'lots' is not a whole number".to_string()));
        assert!(rows[1].input.is_ok());
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let text = "Email ID,Team,Process Name,Apps Used,Frequency,Duration,Volume,Process Status\r\n\
                    a@b.co,AR,Dunning,Email,WEEKLY,01:00,3,STANDARDIZED\r\n";
        let rows = parse_process_csv(text).unwrap();
        assert_eq!(rows.len(), 1);
        let input = rows[0].input.as_ref().unwrap();
        assert_eq!(input.department.as_deref(), Some("AR"));
        assert_eq!(input.status.as_deref(), Some("STANDARDIZED"));
    }

    #[test]
    fn multiline_quoted_cell_keeps_row_start_line() {
        let text = format!(
            "{HEADER}\n\
             a@b.co,AP,One,\"line one\nline two\",ERP,DAILY,00:15,1,UNSTRUCTURED,\n\
             a@b.co,AP,Two,,ERP,DAILY,00:15,1,UNSTRUCTURED,\n"
        );
        let rows = parse_process_csv(&text).unwrap();
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].line, 4);
    }

    #[test]
    fn missing_required_column_fails_document() {
        let err = parse_process_csv("Email ID,Team\na@b.co,AP\n").unwrap_err();
        assert_eq!(err, CsvError::MissingColumn("Process Name"));
    }

    #[test]
    fn empty_and_unterminated_inputs() {
        assert_eq!(parse_process_csv("").unwrap_err(), CsvError::Empty);
        let text = format!("{HEADER}\n\"a@b.co,AP\n");
        assert_eq!(
            parse_process_csv(&text).unwrap_err(),
            CsvError::UnterminatedQuote { line: 2 }
        );
    }

    #[test]
    fn blank_lines_and_bom_are_skipped() {
        let text = format!("\u{feff}{HEADER}\n\na@b.co,AP,One,,ERP,DAILY,00:15,1,UNSTRUCTURED,\n\n");
        let rows = parse_process_csv(&text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 3);
    }
}
