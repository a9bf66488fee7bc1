//! Keep-1-in-N sampling keyed on the numeric suffix embedded in a path.
//!
//! Upstream producers number their frames sequentially, so the last digit
//! run of the path acts as a frame counter. Selection is therefore uniform
//! only when that naming convention holds.

use std::sync::LazyLock;

use regex::Regex;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[0-9]+").expect("digit run regex should compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDecision {
    /// The path carries no digits; it is always kept.
    Unnumbered,
    Keep,
    Skip { remainder: u64 },
}

impl SampleDecision {
    pub fn is_kept(self) -> bool {
        !matches!(self, SampleDecision::Skip { .. })
    }
}

/// Last run of ASCII digits in `path`, if any.
pub fn last_digit_run(path: &str) -> Option<&str> {
    DIGIT_RUN.find_iter(path).last().map(|m| m.as_str())
}

/// `digits mod rate`, computed one digit at a time so arbitrarily long runs
/// never overflow.
pub fn digits_mod(digits: &str, rate: u64) -> u64 {
    let rate = rate.max(1);
    digits.bytes().fold(0u64, |acc, byte| {
        let digit = u64::from(byte - b'0');
        ((u128::from(acc) * 10 + u128::from(digit)) % u128::from(rate)) as u64
    })
}

pub fn sample(path: &str, rate: u64) -> SampleDecision {
    match last_digit_run(path) {
        None => SampleDecision::Unnumbered,
        Some(digits) => match digits_mod(digits, rate) {
            0 => SampleDecision::Keep,
            remainder => SampleDecision::Skip { remainder },
        },
    }
}
