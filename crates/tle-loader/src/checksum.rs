//! TLE line checksum (mod-10 over columns 1-68).

/// Compute the NORAD mod-10 checksum for a TLE data line.
///
/// Digits contribute their value, `-` contributes 1, every other
/// character (including `+`, `.`, letters and spaces) contributes 0.
/// Only the first 68 columns participate; column 69 holds the checksum
/// digit itself and is never included.
pub fn tle_checksum(line: &str) -> u8 {
    (line
        .bytes()
        .take(68)
        .map(|b| {
            if b.is_ascii_digit() {
                (b - b'0') as u16
            } else if b == b'-' {
                1u16
            } else {
                0u16
            }
        })
        .sum::<u16>()
        % 10) as u8
}

/// Validate that `line`'s trailing checksum digit matches the computed one.
pub fn checksum_valid(line: &str) -> bool {
    match line.as_bytes().get(68) {
        Some(&b) if b.is_ascii_digit() => tle_checksum(line) == (b - b'0'),
        _ => false,
    }
}
