//! Scalar comparison functions registered on every catalog connection.
//!
//! Attribute values are stored as text, so numeric and timestamp operators
//! compare through these functions instead of SQLite's own ordering. Each
//! returns `1` when the comparison holds and `0` otherwise, including when
//! either side fails to parse.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

type Comparison = fn(Ordering) -> bool;

const COMPARISONS: [(&str, Comparison); 4] = [
    ("less_than", Ordering::is_lt),
    ("less_or_equal", Ordering::is_le),
    ("greater_than", Ordering::is_gt),
    ("greater_or_equal", Ordering::is_ge),
];

pub(crate) fn register(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    for (suffix, holds) in COMPARISONS {
        conn.create_scalar_function(&format!("num_{suffix}"), 2, flags, move |ctx| {
            Ok(compare_numbers(ctx, holds))
        })?;
        conn.create_scalar_function(&format!("timestamp_{suffix}"), 3, flags, move |ctx| {
            Ok(compare_timestamps(ctx, holds))
        })?;
    }
    Ok(())
}

fn compare_numbers(ctx: &Context<'_>, holds: Comparison) -> bool {
    let (Some(value), Some(bound)) = (number_arg(ctx, 0), number_arg(ctx, 1)) else {
        return false;
    };
    value.partial_cmp(&bound).is_some_and(holds)
}

fn compare_timestamps(ctx: &Context<'_>, holds: Comparison) -> bool {
    let Some(format) = text_arg(ctx, 2) else {
        return false;
    };
    let value = text_arg(ctx, 0).and_then(|v| parse_timestamp(v, format));
    let bound = text_arg(ctx, 1).and_then(|b| parse_timestamp(b, format));
    match (value, bound) {
        (Some(value), Some(bound)) => holds(value.cmp(&bound)),
        _ => false,
    }
}

fn number_arg(ctx: &Context<'_>, idx: usize) -> Option<f64> {
    match ctx.get_raw(idx) {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        ValueRef::Text(bytes) => parse_number(std::str::from_utf8(bytes).ok()?),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

fn text_arg<'a>(ctx: &'a Context<'_>, idx: usize) -> Option<&'a str> {
    match ctx.get_raw(idx) {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok(),
        _ => None,
    }
}

pub(crate) fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Parse with a chrono format; date-only formats resolve to midnight.
pub(crate) fn parse_timestamp(value: &str, format: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
