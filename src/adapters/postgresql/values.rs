//! Column value rendering
//!
//! Converts PostgreSQL values into the text written to CSV fields.

use crate::adapters::source::RowBuffer;
use crate::domain::{Result, SourceError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::error::Error as StdError;
use std::fmt::Write;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::Row;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Renders column `idx` of `row` into the matching buffer slot
///
/// # Errors
///
/// Returns `SourceError::Scan` if the value cannot be decoded.
pub fn render_column(row: &Row, idx: usize, out: &mut RowBuffer) -> Result<()> {
    match *row.columns()[idx].type_() {
        Type::BOOL => put::<bool, _>(row, idx, out, |v, s| {
            s.push(if v { '1' } else { '0' })
        }),
        Type::INT2 => put::<i16, _>(row, idx, out, display),
        Type::INT4 => put::<i32, _>(row, idx, out, display),
        Type::INT8 => put::<i64, _>(row, idx, out, display),
        Type::OID => put::<u32, _>(row, idx, out, display),
        Type::FLOAT4 => put::<f32, _>(row, idx, out, display),
        Type::FLOAT8 => put::<f64, _>(row, idx, out, display),
        Type::NUMERIC => render_numeric(row, idx, out),
        Type::CHAR => put::<i8, _>(row, idx, out, |v, s| s.push(v as u8 as char)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            put::<&str, _>(row, idx, out, |v, s| s.push_str(v))
        }
        Type::TIMESTAMP => put::<NaiveDateTime, _>(row, idx, out, |v, s| {
            let _ = write!(s, "{}", v.format(DATETIME_FORMAT));
        }),
        Type::TIMESTAMPTZ => put::<DateTime<Utc>, _>(row, idx, out, |v, s| {
            let _ = write!(s, "{}", v.naive_utc().format(DATETIME_FORMAT));
        }),
        Type::DATE => put::<NaiveDate, _>(row, idx, out, |v, s| {
            let _ = write!(s, "{}", v.format("%Y-%m-%d"));
        }),
        Type::TIME => put::<NaiveTime, _>(row, idx, out, |v, s| {
            let _ = write!(s, "{}", v.format(TIME_FORMAT));
        }),
        Type::UUID => put::<uuid::Uuid, _>(row, idx, out, |v, s| {
            let _ = write!(s, "{}", v.hyphenated());
        }),
        Type::JSON | Type::JSONB => put::<serde_json::Value, _>(row, idx, out, display),
        Type::BYTEA => put::<&[u8], _>(row, idx, out, |v, s| {
            s.push_str("\\x");
            for byte in v {
                let _ = write!(s, "{byte:02x}");
            }
        }),
        _ => put::<RawText, _>(row, idx, out, |v, s| s.push_str(&v.0)),
    }
}

fn display<T: std::fmt::Display>(value: T, out: &mut String) {
    let _ = write!(out, "{value}");
}

fn put<'a, T, F>(row: &'a Row, idx: usize, out: &mut RowBuffer, render: F) -> Result<()>
where
    T: FromSql<'a>,
    F: FnOnce(T, &mut String),
{
    let value: Option<T> = row.try_get(idx).map_err(|e| scan_error(row, idx, &e))?;
    match value {
        Some(v) => render(v, out.slot_mut(idx)),
        None => out.set_null(idx),
    }
    Ok(())
}

fn render_numeric(row: &Row, idx: usize, out: &mut RowBuffer) -> Result<()> {
    match row.try_get::<_, Option<Decimal>>(idx) {
        Ok(Some(v)) => {
            let _ = write!(out.slot_mut(idx), "{v}");
            Ok(())
        }
        Ok(None) => {
            out.set_null(idx);
            Ok(())
        }
        // NaN and infinities have no Decimal representation
        Err(decimal_err) => match row.try_get::<_, Option<SpecialNumeric>>(idx) {
            Ok(Some(special)) => {
                out.set(idx, special.0);
                Ok(())
            }
            _ => Err(scan_error(row, idx, &decimal_err)),
        },
    }
}

fn scan_error(row: &Row, idx: usize, err: &tokio_postgres::Error) -> crate::domain::SyncError {
    SourceError::Scan(format!(
        "column '{}' ({}): {}",
        row.columns()[idx].name(),
        row.columns()[idx].type_(),
        err
    ))
    .into()
}

/// Raw wire bytes of a type without a dedicated rendering, as lossy UTF-8
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(RawText(String::from_utf8_lossy(raw).into_owned()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// NUMERIC special values (`NaN`, `Infinity`, `-Infinity`)
struct SpecialNumeric(&'static str);

impl<'a> FromSql<'a> for SpecialNumeric {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, Box<dyn StdError + Sync + Send>> {
        // Header: ndigits, weight, sign, dscale as big-endian 16-bit words
        if raw.len() < 8 {
            return Err("numeric value too short".into());
        }
        let sign = u16::from_be_bytes([raw[4], raw[5]]);
        match sign {
            0xC000 => Ok(SpecialNumeric("NaN")),
            0xD000 => Ok(SpecialNumeric("Infinity")),
            0xF000 => Ok(SpecialNumeric("-Infinity")),
            _ => Err("numeric value out of range".into()),
        }
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}
