use std::time::Duration;

use winnow::ascii::digit1;
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::types::Segment;

// -- State paths ------------------------------------------------------------

fn field_name<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-').parse_next(input)
}

fn field_segment(input: &mut &str) -> ModalResult<Segment> {
    preceded('.', cut_err(field_name))
        .context(StrContext::Expected(StrContextValue::Description(
            "field name",
        )))
        .map(|name: &str| Segment::Field(name.to_owned()))
        .parse_next(input)
}

fn index_segment(input: &mut &str) -> ModalResult<Segment> {
    delimited(
        '[',
        cut_err(digit1.try_map(|s: &str| s.parse::<usize>())),
        cut_err(']'),
    )
    .context(StrContext::Expected(StrContextValue::Description(
        "array index",
    )))
    .map(Segment::Index)
    .parse_next(input)
}

fn segment(input: &mut &str) -> ModalResult<Segment> {
    alt((field_segment, index_segment)).parse_next(input)
}

pub(crate) fn state_path(input: &mut &str) -> ModalResult<Vec<Segment>> {
    let _: Option<&str> = opt("state:").parse_next(input)?;
    '$'.parse_next(input)?;
    let first = cut_err(field_segment).parse_next(input)?;
    let rest: Vec<Segment> = repeat(0.., segment).parse_next(input)?;

    let mut segments = Vec::with_capacity(rest.len() + 1);
    segments.push(first);
    segments.extend(rest);
    Ok(segments)
}

// -- Durations --------------------------------------------------------------

fn amount(input: &mut &str) -> ModalResult<f64> {
    (digit1, opt(('.', digit1)))
        .take()
        .try_map(|s: &str| s.parse::<f64>())
        .parse_next(input)
}

/// Milliseconds per unit.
fn unit_scale(input: &mut &str) -> ModalResult<f64> {
    alt((
        "ms".value(1.0),
        "s".value(1_000.0),
        "m".value(60_000.0),
        "h".value(3_600_000.0),
        "d".value(86_400_000.0),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "duration unit (ms, s, m, h, d)",
    )))
    .parse_next(input)
}

fn duration_part(input: &mut &str) -> ModalResult<Duration> {
    (amount, cut_err(unit_scale))
        .try_map(|(amount, millis): (f64, f64)| {
            Duration::try_from_secs_f64(amount * millis / 1_000.0)
        })
        .parse_next(input)
}

pub(crate) fn duration(input: &mut &str) -> ModalResult<Duration> {
    repeat(1.., duration_part)
        .fold(
            || Some(Duration::ZERO),
            |total: Option<Duration>, part| total.and_then(|t| t.checked_add(part)),
        )
        .verify_map(|total| total)
        .context(StrContext::Expected(StrContextValue::Description(
            "duration within range",
        )))
        .parse_next(input)
}

// -- Time of day ------------------------------------------------------------

fn clock_field(input: &mut &str) -> ModalResult<u8> {
    take_while(1..=2, |c: char| c.is_ascii_digit())
        .try_map(|s: &str| s.parse::<u8>())
        .parse_next(input)
}

pub(crate) fn time_of_day(input: &mut &str) -> ModalResult<(u8, u8, u8)> {
    let hour = clock_field.parse_next(input)?;
    ':'.parse_next(input)?;
    let minute = cut_err(clock_field).parse_next(input)?;
    let second = opt(preceded(':', cut_err(clock_field))).parse_next(input)?;
    Ok((hour, minute, second.unwrap_or(0)))
}
