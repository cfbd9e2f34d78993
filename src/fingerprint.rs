//! Request fingerprinting for the DeepL JSON-RPC protocol.
//!
//! The browser extension this server emulates stamps every request with a
//! numeric id drawn from a fixed range and a timestamp derived from the text
//! being translated. Both must be reproduced exactly; the upstream service
//! is known to reject requests whose fingerprints don't match the pattern.

use std::time::{SystemTime, UNIX_EPOCH};

/// Lower bound (inclusive) of the raw id range, before the x1000 scaling.
const ID_MIN: u64 = 8_300_000;

/// Upper bound (exclusive) of the raw id range, before the x1000 scaling.
const ID_MAX: u64 = 8_399_998;

/// Generates a fresh request id: uniform in `[8_300_000, 8_399_998)`,
/// scaled to a multiple of 1000.
///
/// Called once per outbound call; the split and handle-jobs requests of a
/// single translation each get their own id.
pub fn next_id() -> u64 {
    id_from_entropy(entropy())
}

/// Maps raw entropy into the id range. Split out from [`next_id`] so tests
/// can drive it with fixed values.
fn id_from_entropy(raw: u64) -> u64 {
    (ID_MIN + raw % (ID_MAX - ID_MIN)) * 1000
}

/// Entropy from the system clock's sub-second nanoseconds.
fn entropy() -> u64 {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    duration.subsec_nanos() as u64 ^ duration.as_millis() as u64
}

/// Counts occurrences of the letter `i` in the text.
///
/// The emulated client derives its request timestamp from this count, so the
/// count operates on the raw input text exactly as submitted.
pub fn i_count(text: &str) -> usize {
    text.matches('i').count()
}

/// Produces the request timestamp for the given input text, in Unix
/// milliseconds.
///
/// With zero `i` occurrences the current time is used unchanged. Otherwise
/// the time is rounded up to the next multiple of `i_count + 1` milliseconds,
/// making the timestamp derivable from the visible text.
pub fn next_timestamp(text: &str) -> u64 {
    adjusted_timestamp(now_millis(), i_count(text))
}

/// The timestamp adjustment itself, on an explicit clock value.
fn adjusted_timestamp(now_ms: u64, i_count: usize) -> u64 {
    if i_count == 0 {
        return now_ms;
    }
    let n = i_count as u64 + 1;
    now_ms - (now_ms % n) + n
}

/// Current Unix time in milliseconds.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_range_and_granularity() {
        for raw in [0u64, 1, 99_997, 12_345_678_901, u64::MAX] {
            let id = id_from_entropy(raw);
            assert!(id >= 8_300_000_000, "id {} below range", id);
            assert!(id < 8_399_998_000, "id {} above range", id);
            assert_eq!(id % 1000, 0, "id {} not a multiple of 1000", id);
        }
    }

    #[test]
    fn test_next_id_repeated_draws() {
        for _ in 0..100 {
            let id = next_id();
            assert!((8_300_000_000..8_399_998_000).contains(&id));
            assert_eq!(id % 1000, 0);
        }
    }

    #[test]
    fn test_i_count() {
        assert_eq!(i_count(""), 0);
        assert_eq!(i_count("hello world"), 0);
        assert_eq!(i_count("this is it"), 3);
        assert_eq!(i_count("iii"), 3);
    }

    #[test]
    fn test_timestamp_zero_count_is_passthrough() {
        assert_eq!(adjusted_timestamp(1_700_000_000_123, 0), 1_700_000_000_123);
    }

    #[test]
    fn test_timestamp_rounds_up_to_multiple() {
        // i_count = 2 -> n = 3
        let ts = adjusted_timestamp(1_700_000_000_123, 2);
        assert_eq!(ts % 3, 0);
        assert!(ts >= 1_700_000_000_123);
        assert!(ts < 1_700_000_000_123 + 3);
    }

    #[test]
    fn test_timestamp_already_aligned() {
        // now is a multiple of n: the heuristic still bumps to the next one.
        let ts = adjusted_timestamp(3_000, 2);
        assert_eq!(ts, 3_003);
    }

    #[test]
    fn test_next_timestamp_bounds() {
        let text = "iii"; // 3 i's -> n = 4
        let before = now_millis();
        let ts = next_timestamp(text);
        assert_eq!(ts % 4, 0);
        assert!(ts >= before);
        assert!(ts < before + 1000, "timestamp drifted too far from now");
    }
}
