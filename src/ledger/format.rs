//! Text format of the ledger file.
//!
//! ```text
//! file   = header entry*
//! header = "kfdl-save" TAB major TAB minor LF
//! entry  = date TAB download-link TAB state LF
//! ```
//!
//! Dates are ISO-8601 (`yyyy-mm-dd`), states are `QUEUED`, `DOWNLOADING`,
//! `SUCCESSFUL` or `FAILED`. Any `1.x` header is accepted; `1.0` is written.

use chrono::NaiveDate;

use crate::error::LedgerError;
use crate::types::DownloadState;

use super::LedgerEntry;

const MAGIC: &str = "kfdl-save";
const MAJOR_VERSION: u32 = 1;
const MINOR_VERSION: u32 = 0;

/// Outcome of parsing a ledger file with a valid header
#[derive(Debug, Default)]
pub(crate) struct ParsedLedger {
    /// Records that parsed, in file order
    pub(crate) entries: Vec<LedgerEntry>,
    /// One error per dropped record
    pub(crate) problems: Vec<LedgerError>,
}

/// Parse ledger file content
///
/// Only a missing or unsupported header fails the whole file. Every other problem
/// drops the offending line and is reported in [`ParsedLedger::problems`].
pub(crate) fn parse(content: &str) -> Result<ParsedLedger, LedgerError> {
    let mut lines = content.split('\n');
    let header = lines.next().unwrap_or_default().trim_end_matches('\r');
    check_header(header)?;

    let mut parsed = ParsedLedger::default();
    // Line 1 is the header
    for (index, raw) in lines.enumerate() {
        let line_no = index + 2;
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        match parse_entry(line_no, line) {
            Ok(entry) => parsed.entries.push(entry),
            Err(e) => parsed.problems.push(e),
        }
    }

    Ok(parsed)
}

fn check_header(header: &str) -> Result<(), LedgerError> {
    let invalid = || LedgerError::InvalidHeader(header.to_string());
    let fields: Vec<&str> = header.split('\t').collect();
    let [magic, major, minor] = fields.as_slice() else {
        return Err(invalid());
    };
    if *magic != MAGIC {
        return Err(invalid());
    }
    let major: u32 = major.parse().map_err(|_| invalid())?;
    minor.parse::<u32>().map_err(|_| invalid())?;
    if major != MAJOR_VERSION {
        return Err(invalid());
    }
    Ok(())
}

fn parse_entry(line_no: usize, line: &str) -> Result<LedgerEntry, LedgerError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [date, link, state] = fields.as_slice() else {
        return Err(LedgerError::FieldCount {
            line: line_no,
            found: fields.len(),
        });
    };

    let date = date
        .parse::<NaiveDate>()
        .map_err(|_| LedgerError::InvalidDate {
            line: line_no,
            value: date.to_string(),
        })?;
    let state = state
        .parse::<DownloadState>()
        .map_err(|token| LedgerError::UnknownState {
            line: line_no,
            token,
        })?;

    Ok(LedgerEntry {
        date,
        download_link: link.to_string(),
        state,
    })
}

/// Render a complete ledger file, entries in the given order
pub(crate) fn render<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> String {
    let mut out = format!("{MAGIC}\t{MAJOR_VERSION}\t{MINOR_VERSION}\n");
    for entry in entries {
        out.push_str(&entry.date.to_string());
        out.push('\t');
        out.push_str(&entry.download_link);
        out.push('\t');
        out.push_str(entry.state.as_str());
        out.push('\n');
    }
    out
}
