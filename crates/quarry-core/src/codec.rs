//! Canonical value encoding.
//!
//! Every encoded value compares byte-wise in the natural order of its type,
//! which is what lets value ranges and sorting run directly on the stored
//! bytes. Integers and floats use fixed 8-byte big-endian keys, temporal
//! values a fixed-width digit string, booleans a single `t`/`f` byte.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Error, Result};
use crate::types::{FieldType, FieldValue};

/// Lowest encodable timestamp, used as the open lower end of temporal ranges.
pub const DATE_MIN: &str = "00010101000000";
/// Open upper end of temporal ranges. Values later than 9999-01-01 fall outside it.
pub const DATE_MAX: &str = "99990101000000";

const SIGN_BIT: u64 = 1 << 63;

pub fn sortable_i64(v: i64) -> [u8; 8] {
    ((v as u64) ^ SIGN_BIT).to_be_bytes()
}

fn from_sortable_i64(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ SIGN_BIT) as i64
}

pub fn sortable_f64(v: f64) -> [u8; 8] {
    let bits = v.to_bits();
    let key = if bits & SIGN_BIT != 0 { !bits } else { bits | SIGN_BIT };
    key.to_be_bytes()
}

fn from_sortable_f64(bytes: [u8; 8]) -> f64 {
    let key = u64::from_be_bytes(bytes);
    let bits = if key & SIGN_BIT != 0 { key & !SIGN_BIT } else { !key };
    f64::from_bits(bits)
}

/// Encode a scalar value for a column of type `ty`.
///
/// Text columns accept any scalar (rendered with `Display`), float columns
/// accept longs, and date/datetime columns accept either temporal variant.
/// Anything else is an [`Error::Encoding`].
pub fn encode(value: &FieldValue, ty: FieldType) -> Result<Vec<u8>> {
    let mismatch = || Error::encoding(format!("cannot encode {value:?} as {ty}"));
    match (ty, value) {
        (_, FieldValue::List(_)) => Err(Error::encoding(format!("list value given where a single {ty} is expected"))),
        (FieldType::Text, v) => Ok(v.to_string().into_bytes()),
        (FieldType::Long, FieldValue::Long(v)) => Ok(sortable_i64(*v).to_vec()),
        (FieldType::Float, FieldValue::Float(v)) => encode_float(*v),
        (FieldType::Float, FieldValue::Long(v)) => encode_float(*v as f64),
        (FieldType::Boolean, FieldValue::Boolean(v)) => Ok(if *v { b"t".to_vec() } else { b"f".to_vec() }),
        (FieldType::Date, FieldValue::Date(d)) => encode_date(*d),
        (FieldType::Date, FieldValue::DateTime(dt)) => encode_date(dt.date()),
        (FieldType::DateTime, FieldValue::DateTime(dt)) => encode_datetime(*dt),
        (FieldType::DateTime, FieldValue::Date(d)) => {
            d.and_hms_opt(0, 0, 0).ok_or_else(mismatch).and_then(encode_datetime)
        }
        (FieldType::Decimal, FieldValue::Decimal(s)) => encode_decimal(s),
        (FieldType::Decimal, FieldValue::Long(v)) => encode_decimal(&v.to_string()),
        _ => Err(mismatch()),
    }
}

/// Encode every element of a possibly multi-valued value.
pub fn encode_all(value: &FieldValue, ty: FieldType) -> Result<Vec<Vec<u8>>> {
    value.elements().into_iter().map(|v| encode(v, ty)).collect()
}

pub fn decode(bytes: &[u8], ty: FieldType) -> Result<FieldValue> {
    let wrong = || Error::encoding(format!("{} bytes are not a valid {ty} encoding", bytes.len()));
    match ty {
        FieldType::Text => String::from_utf8(bytes.to_vec()).map(FieldValue::Text).map_err(|_| wrong()),
        FieldType::Long => fixed8(bytes).map(|b| FieldValue::Long(from_sortable_i64(b))).ok_or_else(wrong),
        FieldType::Float => fixed8(bytes).map(|b| FieldValue::Float(from_sortable_f64(b))).ok_or_else(wrong),
        FieldType::Boolean => match bytes {
            b"t" => Ok(FieldValue::Boolean(true)),
            b"f" => Ok(FieldValue::Boolean(false)),
            _ => Err(wrong()),
        },
        FieldType::Date => {
            let text = std::str::from_utf8(bytes).map_err(|_| wrong())?;
            if text.len() != 14 {
                return Err(wrong());
            }
            decode_datetime(text).map(|dt| FieldValue::Date(dt.date()))
        }
        FieldType::DateTime => {
            let text = std::str::from_utf8(bytes).map_err(|_| wrong())?;
            decode_datetime(text).map(FieldValue::DateTime)
        }
        FieldType::Decimal => {
            if bytes.len() <= 8 {
                return Err(wrong());
            }
            let literal = std::str::from_utf8(&bytes[8..]).map_err(|_| wrong())?;
            validate_decimal(literal)?;
            Ok(FieldValue::Decimal(literal.to_string()))
        }
    }
}

/// Lower end used when a range on `ty` is open at the bottom.
///
/// Text has no finite sentinel; `None` asks the caller for an explicitly
/// unbounded range instead.
pub fn lower_sentinel(ty: FieldType) -> Option<Vec<u8>> {
    match ty {
        FieldType::Text => None,
        FieldType::Long => Some(sortable_i64(i64::MIN).to_vec()),
        FieldType::Float | FieldType::Decimal => Some(sortable_f64(f64::NEG_INFINITY).to_vec()),
        FieldType::Boolean => Some(b"f".to_vec()),
        FieldType::Date | FieldType::DateTime => Some(DATE_MIN.as_bytes().to_vec()),
    }
}

/// Upper end used when a range on `ty` is open at the top. See [`lower_sentinel`].
pub fn upper_sentinel(ty: FieldType) -> Option<Vec<u8>> {
    match ty {
        FieldType::Text => None,
        FieldType::Long => Some(sortable_i64(i64::MAX).to_vec()),
        FieldType::Float | FieldType::Decimal => Some(sortable_f64(f64::INFINITY).to_vec()),
        FieldType::Boolean => Some(b"t".to_vec()),
        FieldType::Date | FieldType::DateTime => Some(DATE_MAX.as_bytes().to_vec()),
    }
}

/// Accepts `[+-]digits[.digits]`; no exponents, no non-finite values.
pub fn validate_decimal(literal: &str) -> Result<()> {
    let invalid = || Error::encoding(format!("'{literal}' is not a decimal literal"));
    let unsigned = literal.strip_prefix(['-', '+']).unwrap_or(literal);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !digits_only(int) || !digits_only(frac) || unsigned.ends_with('.') {
        return Err(invalid());
    }
    match literal.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(()),
        _ => Err(invalid()),
    }
}

fn fixed8(bytes: &[u8]) -> Option<[u8; 8]> {
    bytes.try_into().ok()
}

/// Negative zero encodes as zero.
fn encode_float(v: f64) -> Result<Vec<u8>> {
    if v.is_nan() {
        return Err(Error::encoding("NaN has no sortable encoding"));
    }
    Ok(sortable_f64(v + 0.0).to_vec())
}

/// Canonical spelling of a decimal literal: no `+` sign, no leading zeros
/// in the integer part, no trailing zeros or dot in the fraction, and `0`
/// for every spelling of zero. Equal values always share one spelling.
pub fn canonical_decimal(literal: &str) -> Result<String> {
    validate_decimal(literal)?;
    let (negative, unsigned) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal.strip_prefix('+').unwrap_or(literal)),
    };
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let int = match int.trim_start_matches('0') {
        "" => "0",
        digits => digits,
    };
    let frac = frac.trim_end_matches('0');
    let mut out = String::with_capacity(literal.len());
    if negative && !(int == "0" && frac.is_empty()) {
        out.push('-');
    }
    out.push_str(int);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    Ok(out)
}

fn encode_decimal(literal: &str) -> Result<Vec<u8>> {
    let canonical = canonical_decimal(literal)?;
    let numeric: f64 = canonical.parse().map_err(|_| Error::encoding(format!("'{literal}' is not a decimal literal")))?;
    let mut out = sortable_f64(numeric + 0.0).to_vec();
    out.extend_from_slice(canonical.as_bytes());
    Ok(out)
}

fn encode_date(d: NaiveDate) -> Result<Vec<u8>> {
    check_year(d.year())?;
    Ok(format!("{:04}{:02}{:02}000000", d.year(), d.month(), d.day()).into_bytes())
}

/// Microseconds are appended only when non-zero; sub-microsecond precision is dropped.
fn encode_datetime(dt: NaiveDateTime) -> Result<Vec<u8>> {
    check_year(dt.year())?;
    if dt.nanosecond() >= 1_000_000_000 {
        return Err(Error::encoding("leap seconds cannot be encoded"));
    }
    let mut out = format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    );
    let micros = dt.nanosecond() / 1_000;
    if micros != 0 {
        out.push_str(&format!("{micros:06}"));
    }
    Ok(out.into_bytes())
}

fn check_year(year: i32) -> Result<()> {
    if (1..=9999).contains(&year) {
        Ok(())
    } else {
        Err(Error::encoding(format!("year {year} is outside 0001..9999")))
    }
}

fn decode_datetime(text: &str) -> Result<NaiveDateTime> {
    let invalid = || Error::encoding(format!("'{text}' is not a YYYYMMDDhhmmss[ffffff] timestamp"));
    if !(text.len() == 14 || text.len() == 20) || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let num = |from: usize, to: usize| text[from..to].parse::<u32>().map_err(|_| invalid());
    let year = i32::try_from(num(0, 4)?).map_err(|_| invalid())?;
    let micros = if text.len() == 20 { num(14, 20)? } else { 0 };
    NaiveDate::from_ymd_opt(year, num(4, 6)?, num(6, 8)?)
        .and_then(|d| d.and_hms_micro_opt(num(8, 10).ok()?, num(10, 12).ok()?, num(12, 14).ok()?, micros))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, us: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).and_then(|d| d.and_hms_micro_opt(h, mi, s, us)).expect("valid datetime")
    }

    #[test]
    fn booleans_are_single_characters() {
        assert_eq!(encode(&FieldValue::Boolean(true), FieldType::Boolean).expect("t"), b"t");
        assert_eq!(encode(&FieldValue::Boolean(false), FieldType::Boolean).expect("f"), b"f");
    }

    #[test]
    fn datetimes_use_fixed_width_digits() {
        let plain = encode(&FieldValue::DateTime(dt(2009, 5, 18, 1, 16, 30, 0)), FieldType::DateTime).expect("dt");
        assert_eq!(plain, b"20090518011630");
        let micro = encode(&FieldValue::DateTime(dt(2009, 5, 18, 1, 16, 30, 250)), FieldType::DateTime).expect("dt");
        assert_eq!(micro, b"20090518011630000250");
        let date = encode(&FieldValue::Date(NaiveDate::from_ymd_opt(1, 1, 1).expect("d")), FieldType::Date).expect("d");
        assert_eq!(date, DATE_MIN.as_bytes());
    }

    #[test]
    fn wrong_types_are_encoding_errors() {
        assert!(matches!(encode(&FieldValue::Text("x".into()), FieldType::Long), Err(Error::Encoding(_))));
        assert!(matches!(encode(&FieldValue::Float(f64::NAN), FieldType::Float), Err(Error::Encoding(_))));
        assert!(matches!(decode(b"tt", FieldType::Boolean), Err(Error::Encoding(_))));
        assert!(matches!(decode(b"1234", FieldType::Long), Err(Error::Encoding(_))));
        assert!(matches!(decode(b"20091340000000", FieldType::DateTime), Err(Error::Encoding(_))));
        assert!(matches!(decode(b"2009", FieldType::Date), Err(Error::Encoding(_))));
    }

    #[test]
    fn text_columns_render_any_scalar() {
        assert_eq!(encode(&FieldValue::Long(5), FieldType::Text).expect("text"), b"5");
    }

    #[test]
    fn decimals_keep_their_literal() {
        let enc = encode(&FieldValue::Decimal("22.34".into()), FieldType::Decimal).expect("decimal");
        assert_eq!(decode(&enc, FieldType::Decimal).expect("decode"), FieldValue::Decimal("22.34".into()));
        assert!(validate_decimal("1e5").is_err());
        assert!(validate_decimal("1.").is_err());
        assert!(validate_decimal("-.5").is_ok());
    }

    #[test]
    fn equal_decimals_share_one_key() {
        let key = |s: &str| encode(&FieldValue::Decimal(s.into()), FieldType::Decimal).expect("decimal");
        assert_eq!(key("5"), key("5.0"));
        assert_eq!(key("5"), key("+05.00"));
        assert_eq!(key("0"), key("-0.000"));
        assert_eq!(key("-0.5"), key("-.50"));
        assert!(key("5") < key("5.01"));
        assert_eq!(canonical_decimal("+005.500").expect("canonical"), "5.5");
        assert_eq!(canonical_decimal("-0").expect("canonical"), "0");
        assert_eq!(canonical_decimal("10").expect("canonical"), "10");
        assert_eq!(decode(&key("5.0"), FieldType::Decimal).expect("decode"), FieldValue::Decimal("5".into()));
    }

    #[test]
    fn signed_zero_floats_share_one_key() {
        let key = |v: f64| encode(&FieldValue::Float(v), FieldType::Float).expect("float");
        assert_eq!(key(-0.0), key(0.0));
        assert!(key(-f64::MIN_POSITIVE) < key(-0.0));
    }

    #[test]
    fn sentinels_bracket_real_values() {
        let v = encode(&FieldValue::Long(-3), FieldType::Long).expect("long");
        assert!(lower_sentinel(FieldType::Long).expect("lo") <= v);
        assert!(upper_sentinel(FieldType::Long).expect("hi") >= v);
        assert!(lower_sentinel(FieldType::Text).is_none());
        let d = encode(&FieldValue::Date(NaiveDate::from_ymd_opt(2009, 2, 25).expect("d")), FieldType::Date).expect("d");
        assert!(DATE_MIN.as_bytes() < d.as_slice() && d.as_slice() < DATE_MAX.as_bytes());
    }
}
