//! Search-term value serialisation rules (§4.D): ordered sequences are
//! comma-joined, dates/datetimes use fixed formats, everything else is
//! serialised via its own string form.

use chrono::{DateTime, NaiveDate, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A value supplied for one search term, before serialisation to the query
/// string.
#[derive(Debug, Clone)]
pub enum SearchTermValue {
    Text(String),
    Sequence(Vec<String>),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl SearchTermValue {
    pub fn serialize(&self) -> String {
        match self {
            SearchTermValue::Text(s) => s.clone(),
            SearchTermValue::Sequence(items) => items.join(","),
            SearchTermValue::Date(d) => d.format(DATE_FORMAT).to_string(),
            SearchTermValue::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        }
    }
}

/// Parses a `YYYY-MM-DD` string back into a date, the inverse of
/// `SearchTermValue::Date(_).serialize()`.
pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
}

impl From<&str> for SearchTermValue {
    fn from(s: &str) -> Self {
        SearchTermValue::Text(s.to_string())
    }
}

impl From<String> for SearchTermValue {
    fn from(s: String) -> Self {
        SearchTermValue::Text(s)
    }
}

impl From<Vec<String>> for SearchTermValue {
    fn from(items: Vec<String>) -> Self {
        SearchTermValue::Sequence(items)
    }
}

impl From<NaiveDate> for SearchTermValue {
    fn from(d: NaiveDate) -> Self {
        SearchTermValue::Date(d)
    }
}

impl From<DateTime<Utc>> for SearchTermValue {
    fn from(dt: DateTime<Utc>) -> Self {
        SearchTermValue::DateTime(dt)
    }
}
