//! Single TLE 3-line group parsing.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::checksum::checksum_valid;
use crate::{ConstellationTag, TleError, TleRecord};

const LINE_LEN: usize = 69;

/// Parse one `(name, line1, line2)` group into a validated [`TleRecord`].
///
/// Performs every check spec.md §4.1 requires: exact 69-character lines,
/// mod-10 checksums, and non-degenerate Keplerian elements (eccentricity
/// in `[0, 1)`, inclination in `[0, 180]` degrees, mean motion `> 0`).
pub fn parse_group(name: &str, line1: &str, line2: &str) -> Result<TleRecord, TleError> {
    if line1.chars().count() != LINE_LEN {
        return Err(TleError::MalformedLine(format!(
            "line 1 has {} characters, expected {LINE_LEN}",
            line1.chars().count()
        )));
    }
    if line2.chars().count() != LINE_LEN {
        return Err(TleError::MalformedLine(format!(
            "line 2 has {} characters, expected {LINE_LEN}",
            line2.chars().count()
        )));
    }
    if !line1.starts_with('1') {
        return Err(TleError::MalformedLine("line 1 missing line-number marker '1'".into()));
    }
    if !line2.starts_with('2') {
        return Err(TleError::MalformedLine("line 2 missing line-number marker '2'".into()));
    }
    if !checksum_valid(line1) {
        return Err(TleError::ChecksumMismatch(1));
    }
    if !checksum_valid(line2) {
        return Err(TleError::ChecksumMismatch(2));
    }

    let norad_id_1 = field(line1, 2, 7)?;
    let norad_id_2 = field(line2, 2, 7)?;
    if norad_id_1 != norad_id_2 {
        return Err(TleError::MalformedLine(format!(
            "NORAD id mismatch between lines: {norad_id_1} vs {norad_id_2}"
        )));
    }
    let norad_id: u32 = norad_id_1
        .trim()
        .parse()
        .map_err(|_| TleError::MalformedLine(format!("invalid NORAD id {norad_id_1:?}")))?;

    let epoch_year_str = field(line1, 18, 20)?;
    let epoch_day_str = field(line1, 20, 32)?;
    let epoch_instant = resolve_epoch(epoch_year_str.trim(), epoch_day_str.trim())?;

    let inclination: f64 = parse_f64(field(line2, 8, 16)?.trim())?;
    let eccentricity: f64 = parse_decimal_fraction(field(line2, 26, 33)?.trim())?;
    let mean_motion: f64 = parse_f64(field(line2, 52, 63)?.trim())?;

    if !(0.0..1.0).contains(&eccentricity) {
        return Err(TleError::DegenerateElements(format!(
            "eccentricity {eccentricity} out of [0, 1)"
        )));
    }
    if !(0.0..=180.0).contains(&inclination) {
        return Err(TleError::DegenerateElements(format!(
            "inclination {inclination} out of [0, 180]"
        )));
    }
    if !(mean_motion > 0.0) {
        return Err(TleError::DegenerateElements(format!(
            "mean motion {mean_motion} must be positive"
        )));
    }

    let trimmed_name = name.trim();
    let satellite_id = if trimmed_name.is_empty() {
        format!("NORAD-{norad_id}")
    } else {
        trimmed_name.to_string()
    };

    Ok(TleRecord {
        satellite_id,
        constellation_tag: ConstellationTag::from_name(trimmed_name),
        line1: line1.to_string(),
        line2: line2.to_string(),
        epoch_instant,
        norad_id,
    })
}

fn field(line: &str, start: usize, end: usize) -> Result<&str, TleError> {
    line.get(start..end)
        .ok_or_else(|| TleError::MalformedLine(format!("column range {start}..{end} out of bounds")))
}

fn parse_f64(s: &str) -> Result<f64, TleError> {
    s.parse()
        .map_err(|_| TleError::MalformedLine(format!("expected a number, got {s:?}")))
}

/// Parse a TLE-style implied-decimal field, e.g. `"0001234"` → `0.0001234`,
/// `"-12345"` → `-0.012345`.
fn parse_decimal_fraction(s: &str) -> Result<f64, TleError> {
    if s.is_empty() {
        return Err(TleError::MalformedLine("empty decimal field".into()));
    }
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, s.strip_prefix('+').unwrap_or(s)),
    };
    let value: f64 = digits
        .parse()
        .map_err(|_| TleError::MalformedLine(format!("expected digits, got {digits:?}")))?;
    Ok(sign * value / 10f64.powi(digits.len() as i32))
}

/// Resolve a 2-digit epoch year and fractional day-of-year into a UTC
/// instant, pivoting at 1957 (Sputnik launch year) per spec.md §4.1:
/// `yy >= 57` → `1900 + yy`, else `2000 + yy`.
fn resolve_epoch(year_str: &str, day_str: &str) -> Result<DateTime<Utc>, TleError> {
    let yy: i32 = year_str
        .parse()
        .map_err(|_| TleError::MalformedLine(format!("invalid epoch year {year_str:?}")))?;
    let year = if yy >= 57 { 1900 + yy } else { 2000 + yy };

    let day_of_year: f64 = day_str
        .parse()
        .map_err(|_| TleError::MalformedLine(format!("invalid epoch day {day_str:?}")))?;
    if day_of_year < 1.0 || day_of_year >= 367.0 {
        return Err(TleError::MalformedLine(format!(
            "epoch day-of-year {day_of_year} out of range"
        )));
    }

    let base = NaiveDate::from_yo_opt(year, 1)
        .ok_or_else(|| TleError::MalformedLine(format!("invalid epoch year {year}")))?
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid");
    let whole_days = (day_of_year - 1.0).floor() as i64;
    let fractional_seconds = ((day_of_year - 1.0) - whole_days as f64) * 86_400.0;

    let naive = base + Duration::days(whole_days) + Duration::milliseconds(
        (fractional_seconds * 1000.0).round() as i64,
    );
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "ISS (ZARYA)";
    const LINE1: &str = "1 25544U 98067A   24001.50000000  .00016717  00000-0  10270-3 0  9025";
    const LINE2: &str = "2 25544  51.6400 208.9163 0006703 130.5360 325.0288 15.50377579999999";

    #[test]
    fn parses_known_good_group() {
        let record = parse_group(NAME, LINE1, LINE2).expect("should parse");
        assert_eq!(record.norad_id, 25544);
        assert_eq!(record.satellite_id, "ISS (ZARYA)");
        assert_eq!(record.epoch_instant.to_string(), "2024-01-01 12:00:00 UTC");
    }

    #[test]
    fn rejects_wrong_length() {
        let short = &LINE1[..60];
        assert!(matches!(
            parse_group(NAME, short, LINE2),
            Err(TleError::MalformedLine(_))
        ));
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut bytes: Vec<u8> = LINE1.bytes().collect();
        *bytes.last_mut().unwrap() = if bytes[68] == b'5' { b'6' } else { b'5' };
        let bad_line1 = String::from_utf8(bytes).unwrap();
        assert!(matches!(
            parse_group(NAME, &bad_line1, LINE2),
            Err(TleError::ChecksumMismatch(1))
        ));
    }

    #[test]
    fn pivot_year_resolves_1900s_and_2000s() {
        // yy=98 -> 1998, yy=24 -> 2024 (checked against the ISS fixture above).
        assert_eq!(resolve_epoch("98", "1.0").unwrap().to_string(), "1998-01-01 00:00:00 UTC");
        assert_eq!(resolve_epoch("24", "1.0").unwrap().to_string(), "2024-01-01 00:00:00 UTC");
        assert_eq!(resolve_epoch("56", "1.0").unwrap().to_string(), "2056-01-01 00:00:00 UTC");
        assert_eq!(resolve_epoch("57", "1.0").unwrap().to_string(), "1957-01-01 00:00:00 UTC");
    }
}
