//! Safelisted list filters.
//!
//! Filterable fields are an explicit enumeration. Anything a client sends that
//! is not in it degrades to "no filter", so a column name taken from a request
//! can never reach the SQL text.

use crate::models::Document;
use sqlx::{Postgres, QueryBuilder};

/// Document fields a listing may be filtered on. Each is an equality match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterField {
    Name,
    Mime,
}

impl FilterField {
    pub const ALL: [FilterField; 2] = [FilterField::Name, FilterField::Mime];

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(FilterField::Name),
            "mime" => Some(FilterField::Mime),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            FilterField::Name => "name",
            FilterField::Mime => "mime",
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            FilterField::Name => "d.name",
            FilterField::Mime => "d.mime",
        }
    }

    fn value_of<'a>(&self, doc: &'a Document) -> &'a str {
        match self {
            FilterField::Name => &doc.name,
            FilterField::Mime => &doc.mime,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ListFilter {
    #[default]
    None,
    Eq(FilterField, String),
}

impl ListFilter {
    /// Build a filter from untrusted input. Unknown keys and empty values yield `None`.
    pub fn parse(key: &str, value: &str) -> Self {
        match FilterField::from_key(key) {
            Some(field) if !value.is_empty() => ListFilter::Eq(field, value.to_string()),
            _ => ListFilter::None,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            ListFilter::None => true,
            ListFilter::Eq(field, value) => field.value_of(doc) == value,
        }
    }

    /// Append ` AND <column> = $n` with the value bound as a parameter.
    pub(crate) fn push_condition<'a>(&'a self, qb: &mut QueryBuilder<'a, Postgres>) {
        if let ListFilter::Eq(field, value) = self {
            qb.push(" AND ")
                .push(field.column())
                .push(" = ")
                .push_bind(value.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_safelisted_keys_are_kept() {
        assert_eq!(
            ListFilter::parse("name", "a.txt"),
            ListFilter::Eq(FilterField::Name, "a.txt".into())
        );
        assert_eq!(
            ListFilter::parse("mime", "text/plain"),
            ListFilter::Eq(FilterField::Mime, "text/plain".into())
        );
        assert_eq!(ListFilter::parse("password_hash", "x"), ListFilter::None);
        assert_eq!(ListFilter::parse("name; DROP TABLE users", "x"), ListFilter::None);
        assert_eq!(ListFilter::parse("NAME", "x"), ListFilter::None);
        assert_eq!(ListFilter::parse("", ""), ListFilter::None);
        assert_eq!(ListFilter::parse("name", ""), ListFilter::None);
    }

    #[test]
    fn keys_round_trip() {
        for field in FilterField::ALL {
            assert_eq!(FilterField::from_key(field.key()), Some(field));
        }
    }

    #[test]
    fn condition_binds_value() {
        let filter = ListFilter::parse("mime", "image/png' OR 1=1 --");
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 WHERE true");
        filter.push_condition(&mut qb);
        assert_eq!(qb.sql(), "SELECT 1 WHERE true AND d.mime = $1");
    }
}
