//! Grammars for the small string languages embedded in rule documents:
//! state-path segments, durations and clock times.

mod error;
mod grammar;

use std::time::Duration;

use winnow::Parser;

pub use error::ParseError;

use crate::types::{Segment, TimeOfDay};

/// Split a state path (`$.a.b[2]` or `state:$.a`) into its segments.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a well-formed state path.
pub fn parse_state_path(input: &str) -> Result<Vec<Segment>, ParseError> {
    grammar::state_path
        .parse(input)
        .map_err(|e| ParseError::new(input, e.to_string()))
}

/// Parse a duration literal such as `250ms`, `1.5s` or `1h30m`.
///
/// # Errors
///
/// Returns [`ParseError`] on a missing or unknown unit, or an out-of-range amount.
pub fn parse_duration(input: &str) -> Result<Duration, ParseError> {
    grammar::duration
        .parse(input)
        .map_err(|e| ParseError::new(input, e.to_string()))
}

/// Parse a 24-hour clock time, `HH:MM` or `HH:MM:SS`.
///
/// # Errors
///
/// Returns [`ParseError`] if the text is malformed or a field is out of range.
pub fn parse_time_of_day(input: &str) -> Result<TimeOfDay, ParseError> {
    let (hour, minute, second) = grammar::time_of_day
        .parse(input)
        .map_err(|e| ParseError::new(input, e.to_string()))?;
    TimeOfDay::new(hour, minute, second)
        .ok_or_else(|| ParseError::new(input, "clock time out of range"))
}
