//! TLE Loader & Validator (C1).
//!
//! Parses a byte stream of two-line-element text into validated
//! [`TleRecord`]s, rejecting malformed groups and deduplicating by
//! satellite id (keeping the record with the latest epoch).

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

mod checksum;
mod parse;

pub use checksum::{checksum_valid, tle_checksum};

#[derive(Error, Debug)]
pub enum TleError {
    #[error("malformed TLE line: {0}")]
    MalformedLine(String),
    #[error("checksum mismatch on line {0}")]
    ChecksumMismatch(u8),
    #[error("degenerate Keplerian elements: {0}")]
    DegenerateElements(String),
    #[error("empty TLE input")]
    EmptyTleInput,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TleError>;

/// Constellation family a satellite belongs to, inferred from its TLE
/// name line. Used by the Signal Model (C4) to pick per-constellation
/// link-budget constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstellationTag {
    Starlink,
    OneWeb,
    Unknown,
}

impl ConstellationTag {
    /// Infer the constellation from a TLE name line. Name-based tagging
    /// is a pragmatic choice: TLEs carry no standardized constellation
    /// field, and both Starlink and OneWeb embed their name in the
    /// object-name line NORAD publishes.
    pub fn from_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        if upper.contains("STARLINK") {
            ConstellationTag::Starlink
        } else if upper.contains("ONEWEB") {
            ConstellationTag::OneWeb
        } else {
            ConstellationTag::Unknown
        }
    }
}

/// An immutable, validated TLE record. See spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TleRecord {
    pub satellite_id: String,
    pub constellation_tag: ConstellationTag,
    pub line1: String,
    pub line2: String,
    pub epoch_instant: DateTime<Utc>,
    pub norad_id: u32,
}

/// Per-batch parse diagnostics: how many groups were accepted, skipped
/// for malformed/checksum/degenerate reasons, and deduplicated away.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub groups_seen: usize,
    pub accepted: usize,
    pub skipped: usize,
    pub deduplicated: usize,
}

/// Parse a full TLE batch (any number of 3-line groups, blank lines
/// between groups tolerated) from a single UTF-8 string.
pub fn load_str(text: &str) -> Result<(Vec<TleRecord>, LoadReport)> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return Err(TleError::EmptyTleInput);
    }

    let mut report = LoadReport::default();
    let mut records: HashMap<String, TleRecord> = HashMap::new();

    let mut i = 0;
    while i < lines.len() {
        // A group is always name + line1 + line2. A line starting with
        // '1' in the name slot means the name line was omitted; treat it
        // as an anonymous (empty-name) 2-line group instead.
        let (name, line1, line2, consumed) = if lines[i].starts_with('1') {
            if i + 1 >= lines.len() {
                warn!("trailing incomplete TLE group, skipping");
                report.skipped += 1;
                break;
            }
            ("", lines[i], lines[i + 1], 2)
        } else {
            if i + 2 >= lines.len() {
                warn!("trailing incomplete TLE group, skipping");
                report.skipped += 1;
                break;
            }
            (lines[i], lines[i + 1], lines[i + 2], 3)
        };

        report.groups_seen += 1;
        match parse::parse_group(name, line1, line2) {
            Ok(record) => {
                let key = record.satellite_id.clone();
                match records.get(&key) {
                    Some(existing) if existing.epoch_instant >= record.epoch_instant => {
                        report.deduplicated += 1;
                    }
                    _ => {
                        if records.insert(key, record).is_some() {
                            report.deduplicated += 1;
                        }
                        report.accepted += 1;
                    }
                }
            }
            Err(e) => {
                warn!("skipping malformed TLE group at line {i}: {e}");
                report.skipped += 1;
            }
        }

        i += consumed;
    }

    info!(
        "parsed TLE batch: {} groups seen, {} accepted, {} skipped, {} deduplicated",
        report.groups_seen, report.accepted, report.skipped, report.deduplicated
    );

    Ok((records.into_values().collect(), report))
}

/// Load and parse a TLE batch from a file path.
pub fn load_path(path: impl AsRef<Path>) -> Result<(Vec<TleRecord>, LoadReport)> {
    let path = path.as_ref();
    info!("loading TLE batch from {:?}", path);
    let text = std::fs::read_to_string(path)?;
    load_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "ISS (ZARYA)\n\
1 25544U 98067A   24001.50000000  .00016717  00000-0  10270-3 0  9025\n\
2 25544  51.6400 208.9163 0006703 130.5360 325.0288 15.50377579999999\n";

    #[test]
    fn parses_single_group() {
        let (records, report) = load_str(SAMPLE).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(records[0].norad_id, 25544);
    }

    #[test]
    fn empty_batch_fails() {
        assert!(matches!(load_str(""), Err(TleError::EmptyTleInput)));
    }

    #[test]
    fn deduplicates_by_latest_epoch() {
        let older = "1 25544U 98067A   24001.00000000  .00016717  00000-0  10270-3 0  9022\n\
2 25544  51.6400 208.9163 0006703 130.5360 325.0288 15.50377579999999\n";
        let newer = "1 25544U 98067A   24002.00000000  .00016717  00000-0  10270-3 0  9023\n\
2 25544  51.6400 208.9163 0006703 130.5360 325.0288 15.50377579999999\n";
        let batch = format!("SAT-A\n{older}SAT-A\n{newer}");
        let (records, report) = load_str(&batch).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(report.deduplicated, 1);
        assert_eq!(records[0].epoch_instant.to_string(), "2024-01-02 00:00:00 UTC");
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let batch = format!("BAD\ntoo short\nalso short\n{SAMPLE}");
        let (records, report) = load_str(&batch).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn constellation_tag_inferred_from_name() {
        assert_eq!(ConstellationTag::from_name("STARLINK-1234"), ConstellationTag::Starlink);
        assert_eq!(ConstellationTag::from_name("ONEWEB-0123"), ConstellationTag::OneWeb);
        assert_eq!(ConstellationTag::from_name("ISS (ZARYA)"), ConstellationTag::Unknown);
    }
}
