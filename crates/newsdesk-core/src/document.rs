//! Document schema descriptions
//!
//! Every stored type names its collection and declares which fields the
//! list endpoints may filter, search and sort on. Field names are the
//! camelCase keys of the serialized document.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::query::QueryError;

/// How a filter field's raw query value is interpreted
#[derive(Debug, Clone, Copy)]
pub enum FilterKind {
    /// Exact string match
    Text,
    /// Exact match against a closed set of values
    Enum(&'static [&'static str]),
    /// `true` / `false`
    Bool,
    /// Whole number
    Integer,
}

/// A field that list endpoints accept as an exact-match filter
#[derive(Debug, Clone, Copy)]
pub struct FilterField {
    pub name: &'static str,
    pub kind: FilterKind,
}

impl FilterField {
    pub const fn new(name: &'static str, kind: FilterKind) -> Self {
        Self { name, kind }
    }

    /// Convert a raw query-string value into the JSON value stored documents hold
    pub fn parse_value(&self, raw: &str) -> Result<Value, QueryError> {
        let raw = raw.trim();
        let invalid = || QueryError::InvalidFilterValue {
            field: self.name.to_string(),
            value: raw.to_string(),
        };

        match self.kind {
            FilterKind::Text => Ok(Value::String(raw.to_string())),
            FilterKind::Enum(allowed) => {
                let lowered = raw.to_lowercase();
                if allowed.contains(&lowered.as_str()) {
                    Ok(Value::String(lowered))
                } else {
                    Err(invalid())
                }
            }
            FilterKind::Bool => match raw.to_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            FilterKind::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid()),
        }
    }
}

/// Static description of a collection
#[derive(Debug)]
pub struct CollectionSchema {
    /// Collection (table) name
    pub name: &'static str,
    /// Exact-match filter fields
    pub filterable: &'static [FilterField],
    /// Text fields searched by the free-text `search` parameter
    pub search_fields: &'static [&'static str],
    /// Fields accepted by `sortBy`
    pub sortable: &'static [&'static str],
    /// Fields that must be unique, compared case-insensitively
    pub unique: &'static [&'static str],
}

impl CollectionSchema {
    pub fn filter_field(&self, name: &str) -> Option<&FilterField> {
        self.filterable.iter().find(|f| f.name == name)
    }

    pub fn is_sortable(&self, name: &str) -> bool {
        self.sortable.contains(&name)
    }
}

/// A type persisted in the document store
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn collection_schema() -> &'static CollectionSchema;

    fn id(&self) -> Uuid;

    fn created_at(&self) -> DateTime<Utc>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: FilterField = FilterField::new("status", FilterKind::Enum(&["draft", "published"]));

    #[test]
    fn test_enum_filter_is_case_insensitive() {
        assert_eq!(STATUS.parse_value("Published").unwrap(), Value::from("published"));
        assert!(matches!(
            STATUS.parse_value("deleted"),
            Err(QueryError::InvalidFilterValue { .. })
        ));
    }

    #[test]
    fn test_bool_and_integer_filters() {
        let featured = FilterField::new("featured", FilterKind::Bool);
        assert_eq!(featured.parse_value("true").unwrap(), Value::Bool(true));
        assert_eq!(featured.parse_value("0").unwrap(), Value::Bool(false));
        assert!(featured.parse_value("yes").is_err());

        let rating = FilterField::new("rating", FilterKind::Integer);
        assert_eq!(rating.parse_value(" 4 ").unwrap(), Value::from(4));
        assert!(rating.parse_value("four").is_err());
    }
}
