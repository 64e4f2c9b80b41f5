//! Domain types shared by the codec, the schema and the engine adapter.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::codec;
use crate::error::{Error, Result};

/// Field name to value map produced by an index definition for one object.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Declared storage type of an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Long,
    Float,
    Boolean,
    Date,
    DateTime,
    Decimal,
}

impl FieldType {
    /// Everything except text is indexed as a single unstemmed token.
    pub fn is_exact_only(self) -> bool {
        !matches!(self, FieldType::Text)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateTime)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Decimal => "decimal",
        };
        f.write_str(name)
    }
}

/// A typed field value. `List` carries the elements of a multi-valued field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Long(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Decimal literal kept as written, e.g. `"22.34"`.
    Decimal(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn decimal(literal: impl Into<String>) -> Result<Self> {
        let literal = literal.into();
        codec::validate_decimal(&literal)?;
        Ok(FieldValue::Decimal(literal))
    }

    /// Scalar elements: the value itself, or the items of a list.
    pub fn elements(&self) -> Vec<&FieldValue> {
        match self {
            FieldValue::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            FieldValue::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }

    /// Parse a literal typed by a user (free-text ranges) into a value of `ty`.
    ///
    /// Dates accept ISO `YYYY-MM-DD[THH:MM:SS]` as well as the canonical
    /// digit form `YYYYMMDD[hhmmss]`.
    pub fn parse(literal: &str, ty: FieldType) -> Result<Self> {
        let bad = || Error::Query(format!("'{literal}' is not a valid {ty} literal"));
        match ty {
            FieldType::Text => Ok(FieldValue::Text(literal.to_string())),
            FieldType::Long => literal.parse().map(FieldValue::Long).map_err(|_| bad()),
            FieldType::Float => literal.parse().map(FieldValue::Float).map_err(|_| bad()),
            FieldType::Boolean => match literal.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(FieldValue::Boolean(true)),
                "false" | "f" | "0" => Ok(FieldValue::Boolean(false)),
                _ => Err(bad()),
            },
            FieldType::Decimal => FieldValue::decimal(literal).map_err(|_| bad()),
            FieldType::Date | FieldType::DateTime => {
                let dt = parse_temporal(literal).ok_or_else(bad)?;
                Ok(if ty == FieldType::Date { FieldValue::Date(dt.date()) } else { FieldValue::DateTime(dt) })
            }
        }
    }
}

fn parse_temporal(literal: &str) -> Option<NaiveDateTime> {
    if literal.bytes().all(|b| b.is_ascii_digit()) {
        let padded = if literal.len() == 8 { format!("{literal}000000") } else { literal.to_string() };
        return match codec::decode(padded.as_bytes(), FieldType::DateTime) {
            Ok(FieldValue::DateTime(dt)) => Some(dt),
            _ => None,
        };
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(literal, pattern) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(literal, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            // equal decimals and both zeros render as one token
            FieldValue::Decimal(s) => match codec::canonical_decimal(s) {
                Ok(canonical) => f.write_str(&canonical),
                Err(_) => f.write_str(s),
            },
            FieldValue::Long(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{}", v + 0.0),
            FieldValue::Boolean(v) => write!(f, "{v}"),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            FieldValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Long(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Long(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        FieldValue::Date(v)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(v: NaiveDateTime) -> Self {
        FieldValue::DateTime(v)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// A field as declared by an index definition.
///
/// - `indexed`: gets terms and a value column
/// - `stored`: kept in the document payload and returned with results
/// - `multi_valued`: the prepared value is a list, each element indexed on its own
/// - `document`: marks the primary full-text ("content") field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub indexed: bool,
    pub stored: bool,
    pub multi_valued: bool,
    pub document: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type, indexed: true, stored: true, multi_valued: false, document: false }
    }

    pub fn content(name: impl Into<String>) -> Self {
        Self { document: true, ..Self::new(name, FieldType::Text) }
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    pub fn not_indexed(mut self) -> Self {
        self.indexed = false;
        self
    }

    pub fn not_stored(mut self) -> Self {
        self.stored = false;
        self
    }
}

/// Unique object identity, rendered as `<kind>.<pk>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub kind: String,
    pub pk: String,
}

impl Identifier {
    /// Marker prepended to the identifier when it is stored as a term.
    pub const TERM_MARKER: char = 'Q';

    pub fn new(kind: impl Into<String>, pk: impl Into<String>) -> Self {
        Self { kind: kind.into(), pk: pk.into() }
    }

    pub fn term(&self) -> String {
        format!("{}{}", Self::TERM_MARKER, self)
    }

    /// Kind first, then primary key; keys that are both integers compare numerically.
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        self.kind.cmp(&other.kind).then_with(|| match (self.pk.parse::<i64>(), other.pk.parse::<i64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => self.pk.cmp(&other.pk),
        })
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.pk)
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once('.') {
            Some((kind, pk)) if !kind.is_empty() && !pk.is_empty() => Ok(Identifier::new(kind, pk)),
            _ => Err(Error::Query(format!("'{s}' is not a <kind>.<pk> identifier"))),
        }
    }
}

/// One typed result.
///
/// `fields` holds the stored fields decoded from the document payload.
/// `highlighted` is only set when highlighting was requested, keyed by the
/// content field name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub identifier: Identifier,
    pub score: f32,
    pub fields: FieldMap,
    pub highlighted: Option<BTreeMap<String, String>>,
}

impl SearchHit {
    pub fn pk(&self) -> &str {
        &self.identifier.pk
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Facets {
    pub fields: BTreeMap<String, Vec<(FieldValue, u64)>>,
    pub dates: BTreeMap<String, Vec<(NaiveDateTime, u64)>>,
    pub queries: BTreeMap<String, (String, u64)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub hits: usize,
    pub facets: Facets,
    pub spelling_suggestion: Option<String>,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn pks(&self) -> Vec<&str> {
        self.results.iter().map(SearchHit::pk).collect()
    }
}
