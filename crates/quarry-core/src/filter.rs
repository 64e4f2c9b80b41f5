//! Declarative filter tree handed to the query compiler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::FieldValue;

/// How a filter joins the filters before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connector {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lookup {
    Exact,
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
    Range,
    In,
    StartsWith,
}

impl FromStr for Lookup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "exact" => Lookup::Exact,
            "contains" => Lookup::Contains,
            "gt" => Lookup::Gt,
            "gte" => Lookup::Gte,
            "lt" => Lookup::Lt,
            "lte" => Lookup::Lte,
            "range" => Lookup::Range,
            "in" => Lookup::In,
            "startswith" => Lookup::StartsWith,
            other => return Err(Error::Query(format!("unknown lookup '{other}'"))),
        })
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lookup::Exact => "exact",
            Lookup::Contains => "contains",
            Lookup::Gt => "gt",
            Lookup::Gte => "gte",
            Lookup::Lt => "lt",
            Lookup::Lte => "lte",
            Lookup::Range => "range",
            Lookup::In => "in",
            Lookup::StartsWith => "startswith",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    /// `range` expects a two-element list and `in` a list of candidates.
    Field { field: String, lookup: Lookup, value: FieldValue },
    Group(Vec<QueryFilter>),
}

/// One node of the filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub connector: Connector,
    pub negated: bool,
    pub clause: Clause,
}

impl QueryFilter {
    pub fn new(field: impl Into<String>, lookup: Lookup, value: impl Into<FieldValue>) -> Self {
        Self {
            connector: Connector::And,
            negated: false,
            clause: Clause::Field { field: field.into(), lookup, value: value.into() },
        }
    }

    /// Parse a `field__lookup` key; a bare field name means `exact`.
    pub fn parse(key: &str, value: impl Into<FieldValue>) -> Result<Self> {
        match key.split_once("__") {
            Some((field, lookup)) => Ok(Self::new(field, lookup.parse()?, value)),
            None => Ok(Self::new(key, Lookup::Exact, value)),
        }
    }

    pub fn content(value: impl Into<FieldValue>) -> Self {
        Self::new(crate::schema::CONTENT_FIELD, Lookup::Exact, value)
    }

    pub fn range(field: impl Into<String>, low: impl Into<FieldValue>, high: impl Into<FieldValue>) -> Self {
        Self::new(field, Lookup::Range, FieldValue::List(vec![low.into(), high.into()]))
    }

    pub fn group(filters: Vec<QueryFilter>) -> Self {
        Self { connector: Connector::And, negated: false, clause: Clause::Group(filters) }
    }

    pub fn or(mut self) -> Self {
        self.connector = Connector::Or;
        self
    }

    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_split_into_field_and_lookup() {
        let f = QueryFilter::parse("pub_date__lte", 5).expect("filter");
        assert_eq!(f.clause, Clause::Field { field: "pub_date".into(), lookup: Lookup::Lte, value: FieldValue::Long(5) });
        let bare = QueryFilter::parse("name", "david").expect("filter");
        assert!(matches!(bare.clause, Clause::Field { lookup: Lookup::Exact, .. }));
        assert!(QueryFilter::parse("name__regex", "x").is_err());
    }

    #[test]
    fn modifiers_compose() {
        let f = QueryFilter::content("hello").or().not();
        assert_eq!(f.connector, Connector::Or);
        assert!(f.negated);
    }
}
