//! Hex identifiers.
//!
//! Ledger ids and 128-bit user data travel as hex strings, with or without a
//! `0x` prefix. The empty string is zero.

use parking_lot::Mutex;
use thiserror::Error;
use ulid::{Generator, Ulid};

/// Maximum number of hex digits in a 128-bit value.
const MAX_HEX_DIGITS: usize = 32;

/// A hex field that does not hold a 128-bit value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("{field}: invalid hex value {value:?}")]
    InvalidHex { field: &'static str, value: String },

    #[error("{field}: {digits} hex digits exceed 128 bits")]
    TooLong { field: &'static str, digits: usize },
}

/// Parses the hex value of `field`.
pub fn parse_id(field: &'static str, value: &str) -> Result<u128, IdParseError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    if digits.is_empty() {
        return if value.is_empty() {
            Ok(0)
        } else {
            Err(IdParseError::InvalidHex {
                field,
                value: value.to_string(),
            })
        };
    }
    // from_str_radix would accept a leading '+'
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(IdParseError::InvalidHex {
            field,
            value: value.to_string(),
        });
    }
    if digits.len() > MAX_HEX_DIGITS {
        return Err(IdParseError::TooLong {
            field,
            digits: digits.len(),
        });
    }

    u128::from_str_radix(digits, 16).map_err(|_| IdParseError::InvalidHex {
        field,
        value: value.to_string(),
    })
}

/// Parses a list of ids, all reported under `field`.
pub fn parse_ids(field: &'static str, values: &[String]) -> Result<Vec<u128>, IdParseError> {
    values.iter().map(|v| parse_id(field, v)).collect()
}

/// Lowercase hex without prefix or padding.
pub fn format_id(id: u128) -> String {
    format!("{id:x}")
}

/// Time-ordered id source for `GetID`.
///
/// Ids are ULIDs: a 48-bit millisecond timestamp followed by 80 random bits,
/// strictly increasing within the process. When a millisecond's random space
/// is used up, ids continue in the next millisecond.
pub struct IdGenerator {
    inner: Mutex<Monotonic>,
}

struct Monotonic {
    generator: Generator,
    last: Ulid,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Monotonic {
                generator: Generator::new(),
                last: Ulid::nil(),
            }),
        }
    }

    pub fn generate(&self) -> u128 {
        let mut state = self.inner.lock();
        let last = state.last;
        let ulid = match state.generator.generate() {
            Ok(ulid) if ulid > last => ulid,
            // Random part exhausted, or the clock is behind an earlier carry
            _ => next_after(last),
        };
        state.last = ulid;
        ulid.into()
    }
}

/// The smallest ULID greater than `ulid`.
fn next_after(ulid: Ulid) -> Ulid {
    ulid.increment()
        .unwrap_or_else(|| Ulid::from_parts(ulid.timestamp_ms() + 1, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("id", ""), Ok(0));
        assert_eq!(parse_id("id", "1"), Ok(1));
        assert_eq!(parse_id("id", "0xff"), Ok(255));
        assert_eq!(parse_id("id", "0XFF"), Ok(255));
        assert_eq!(parse_id("id", "DeadBeef"), Ok(0xdead_beef));
        assert_eq!(
            parse_id("id", "ffffffffffffffffffffffffffffffff"),
            Ok(u128::MAX)
        );
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        for value in ["0x", "xyz", "+1", "-1", " 1", "12 34", "0x0x1"] {
            assert!(
                matches!(parse_id("id", value), Err(IdParseError::InvalidHex { .. })),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_id_rejects_more_than_128_bits() {
        let err = parse_id("pending_id", &"1".repeat(33)).unwrap_err();
        assert_eq!(
            err,
            IdParseError::TooLong {
                field: "pending_id",
                digits: 33
            }
        );
        assert!(err.to_string().starts_with("pending_id:"));
    }

    #[test]
    fn test_parse_ids_reports_field() {
        let values = vec!["1".to_string(), "zz".to_string()];
        let err = parse_ids("account_ids", &values).unwrap_err();
        assert!(err.to_string().contains("account_ids"));
    }

    #[test]
    fn test_format_id() {
        assert_eq!(format_id(0), "0");
        assert_eq!(format_id(0xabc), "abc");
        assert_eq!(parse_id("id", &format_id(u128::MAX)), Ok(u128::MAX));
    }

    #[test]
    fn test_generated_ids_increase() {
        let ids = IdGenerator::new();
        let mut previous = ids.generate();
        for _ in 0..1000 {
            let next = ids.generate();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_exhausted_millisecond_carries_into_next() {
        let random_max = (1u128 << 80) - 1;
        let last = Ulid::from_parts(5, random_max);

        let next = next_after(last);
        assert_eq!(next, Ulid::from_parts(6, 0));
        assert!(next > last);

        assert_eq!(next_after(next), Ulid::from_parts(6, 1));
    }

    #[test]
    fn test_generated_ids_stay_above_carried_id() {
        let ids = IdGenerator::new();
        // An id far ahead of the clock, as left behind by a carry
        let ahead = Ulid::from_parts(u64::from(u32::MAX) << 12, 0);
        ids.inner.lock().last = ahead;

        let next = ids.generate();
        assert_eq!(next, u128::from(ahead) + 1);
        assert!(ids.generate() > next);
    }

    #[test]
    fn test_generated_id_carries_timestamp() {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let id = IdGenerator::new().generate();
        let id_ms = id >> 80;
        assert!(id_ms + 5_000 >= now_ms && id_ms <= now_ms + 5_000);
    }
}
