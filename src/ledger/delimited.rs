//! Comma-separated BOQ import and export.
//!
//! Import reads `id, description, unit, qty, rate` from each row and ignores
//! further columns. Export writes the ten-column sheet below, quoting any
//! cell that contains a comma (internal quotes doubled). Quoted cells are
//! taken verbatim on import, so padded or empty text survives a round trip.

use super::parse_lenient_number;
use crate::models::LineItem;

/// Header row written by [`export_to_delimited_text`].
pub const EXPORT_HEADERS: [&str; 10] = [
    "ID",
    "Description",
    "Unit",
    "Qty",
    "Rate",
    "Amount",
    "Prev %",
    "Current %",
    "Total %",
    "Work Done Value",
];

/// Minimum columns a row needs to become a line item.
pub const MIN_IMPORT_COLUMNS: usize = 5;

/// Result of parsing import text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedImport {
    pub items: Vec<LineItem>,
    pub header_skipped: bool,
    /// Non-blank rows with fewer than [`MIN_IMPORT_COLUMNS`] columns
    pub skipped_rows: usize,
}

/// One parsed cell and whether it was written in quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub quoted: bool,
}

impl Cell {
    /// Unquoted cells are trimmed; quoted cells are kept as written.
    fn value(&self) -> &str {
        if self.quoted {
            &self.text
        } else {
            self.text.trim()
        }
    }
}

/// Parse comma-separated BOQ rows into line items with zero progress.
///
/// Blank rows are ignored. The first row is treated as a header when its
/// second cell contains "description" (any case). Malformed numbers read as 0
/// and an unquoted empty description becomes "N/A".
pub fn import_from_delimited_text(text: &str) -> ParsedImport {
    let rows: Vec<Vec<Cell>> = parse_records(text)
        .into_iter()
        .filter(|row| !is_blank(row))
        .collect();

    let header_skipped = rows.first().is_some_and(|row| is_header(row));
    let start = usize::from(header_skipped);

    let mut items = Vec::new();
    let mut skipped_rows = 0;
    for row in &rows[start..] {
        if row.len() < MIN_IMPORT_COLUMNS {
            skipped_rows += 1;
            continue;
        }

        let description = row[1].value();
        items.push(LineItem::new(
            row[0].value().to_string(),
            if description.is_empty() && !row[1].quoted {
                "N/A".to_string()
            } else {
                description.to_string()
            },
            row[2].value().to_string(),
            parse_lenient_number(&row[3].text),
            parse_lenient_number(&row[4].text),
        ));
    }

    ParsedImport {
        items,
        header_skipped,
        skipped_rows,
    }
}

/// Serialize items and their derived columns as comma-separated text.
///
/// Rows are joined with `\n`; there is no trailing newline.
pub fn export_to_delimited_text(items: &[LineItem]) -> String {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push(EXPORT_HEADERS.join(","));

    for item in items {
        let cells = [
            escape_cell(&item.id),
            escape_description(&item.description),
            escape_cell(&item.unit),
            format_number(item.qty),
            format_number(item.rate),
            format_number(item.amount()),
            format_number(item.prev_perc),
            format_number(item.curr_perc),
            format_number(item.total_perc()),
            format_number(item.work_done_value()),
        ];
        lines.push(cells.join(","));
    }

    lines.join("\n")
}

/// File name used when exporting a project's BOQ.
pub fn export_file_name(job_no: &str) -> String {
    format!("{}_BOQ_Export.csv", job_no)
}

/// Quote a cell that would otherwise split or mis-parse on import.
///
/// Cells containing a comma are always quoted. Cells starting with a quote,
/// containing a line break, or padded with whitespace are quoted too so they
/// survive a round trip.
pub fn escape_cell(cell: &str) -> String {
    let padded = cell.starts_with(char::is_whitespace) || cell.ends_with(char::is_whitespace);
    if padded
        || cell.contains(',')
        || cell.starts_with('"')
        || cell.contains('\n')
        || cell.contains('\r')
    {
        quote(cell)
    } else {
        cell.to_string()
    }
}

/// An empty description is written as `""` so import does not read it as "N/A".
fn escape_description(cell: &str) -> String {
    if cell.is_empty() {
        quote(cell)
    } else {
        escape_cell(cell)
    }
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

/// Split text into records of cells.
///
/// A double quote at the start of a cell opens a quoted section in which
/// commas and line breaks are literal and `""` is an escaped quote. Outside
/// quotes, `\r` is dropped so CRLF files parse like LF files.
pub fn parse_records(text: &str) -> Vec<Vec<Cell>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    cell.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                cell.push(c);
            }
            continue;
        }

        match c {
            '"' if cell.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            ',' => record.push(finish_cell(&mut cell, &mut quoted)),
            '\n' => {
                record.push(finish_cell(&mut cell, &mut quoted));
                records.push(std::mem::take(&mut record));
            }
            '\r' => {}
            _ => cell.push(c),
        }
    }

    if !cell.is_empty() || quoted || !record.is_empty() {
        record.push(finish_cell(&mut cell, &mut quoted));
        records.push(record);
    }

    records
}

fn finish_cell(text: &mut String, quoted: &mut bool) -> Cell {
    Cell {
        text: std::mem::take(text),
        quoted: std::mem::take(quoted),
    }
}

fn is_blank(row: &[Cell]) -> bool {
    row.len() == 1 && !row[0].quoted && row[0].text.trim().is_empty()
}

fn is_header(row: &[Cell]) -> bool {
    row.get(1)
        .is_some_and(|cell| cell.text.to_lowercase().contains("description"))
}

/// Shortest decimal form of a number; negative zero prints as `0`.
fn format_number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}
