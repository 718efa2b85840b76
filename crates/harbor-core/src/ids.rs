//! # Identifier Helpers
//!
//! Opaque id generation and receipt-number formatting.
//!
//! Ids are short, sortable-by-creation, and unique within the local process:
//! millisecond timestamp in base36 concatenated with a random base36 suffix.
//! Receipt numbers are minted from the per-day `order_sequences` counter in
//! the store; this module only formats them.

use chrono::{DateTime, Utc};
use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random suffix appended to the timestamp component.
const RANDOM_SUFFIX_LEN: usize = 6;

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Generates a short opaque identifier: timestamp-base36 ++ random-base36.
///
/// ## Example
/// ```rust
/// let id = harbor_core::new_id();
/// assert!(id.len() > 6);
/// ```
pub fn new_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..RANDOM_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..36)] as char)
        .collect();
    format!("{}{}", to_base36(millis), suffix)
}

/// Returns the `YYYYMMDD` date key for the given instant.
pub fn date_key(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d").to_string()
}

/// Formats a receipt number as `YYYYMMDD-NNNN` from a date key and the
/// sequence value minted by the store.
pub fn format_receipt_number(date_key: &str, sequence: i64) -> String {
    format!("{}-{:04}", date_key, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_id_unique_in_process() {
        let ids: HashSet<String> = (0..1000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_receipt_number_format() {
        assert_eq!(format_receipt_number("20260801", 1), "20260801-0001");
        assert_eq!(format_receipt_number("20260801", 1234), "20260801-1234");
        // Sequence wider than the pad is kept intact, not truncated.
        assert_eq!(format_receipt_number("20260801", 12345), "20260801-12345");
    }

    #[test]
    fn test_date_key() {
        let at = chrono::DateTime::parse_from_rfc3339("2026-08-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(date_key(at), "20260801");
    }
}
