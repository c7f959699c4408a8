//! Query options for tag lookups and tag counts.
//!
//! Options arriving from untyped sources (JSON, config files) go through
//! [`FindOptions::from_deserializer`] / [`CountOptions::from_deserializer`],
//! which reject unknown keys instead of ignoring them.

use serde::{Deserialize, Deserializer, Serialize};
use time::{OffsetDateTime, UtcOffset};

fn default_canonical() -> bool {
    true
}

/// Options for finding taggables by tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FindOptions {
    /// Require every query tag instead of any one of them.
    pub match_all: bool,
    /// Return taggables carrying none of the query tags.
    pub exclude: bool,
    /// Extra SQL predicate over the host table and query aliases.
    pub conditions: Option<String>,
    /// Extra SQL join clauses appended after the tag joins.
    pub joins: Vec<String>,
    /// SQL ordering, e.g. `posts.created_at DESC`.
    pub order: Option<String>,
    pub limit: Option<u32>,
    /// Treat synonyms as their canonical tag.
    #[serde(default = "default_canonical")]
    pub canonical: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            match_all: false,
            exclude: false,
            conditions: None,
            joins: Vec::new(),
            order: None,
            limit: None,
            canonical: default_canonical(),
        }
    }
}

impl FindOptions {
    /// Deserialize and validate an option bag.
    pub fn from_deserializer<'de, D: Deserializer<'de>>(deserializer: D) -> crate::Result<Self> {
        let options =
            Self::deserialize(deserializer).map_err(|e| crate::Error::InvalidOption(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Check option combinations.
    pub fn validate(&self) -> crate::Result<()> {
        if self.match_all && self.exclude {
            return Err(crate::Error::InvalidOption(
                "match_all and exclude cannot be combined".to_string(),
            ));
        }
        validate_fragments(self.conditions.as_deref(), &self.joins, self.order.as_deref())
    }
}

/// Options for tag frequency queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CountOptions {
    /// Only count taggings created at or after this instant.
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_at: Option<OffsetDateTime>,
    /// Only count taggings created at or before this instant.
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_at: Option<OffsetDateTime>,
    /// Extra SQL predicate, applied before aggregation.
    pub conditions: Option<String>,
    /// Extra SQL join clauses.
    pub joins: Vec<String>,
    /// Drop tags used fewer times than this.
    pub at_least: Option<u64>,
    /// Drop tags used more times than this.
    pub at_most: Option<u64>,
    /// SQL ordering, e.g. `count DESC`.
    pub order: Option<String>,
    pub limit: Option<u32>,
    /// Fold synonyms into their canonical tag.
    #[serde(default = "default_canonical")]
    pub canonical: bool,
}

impl Default for CountOptions {
    fn default() -> Self {
        Self {
            start_at: None,
            end_at: None,
            conditions: None,
            joins: Vec::new(),
            at_least: None,
            at_most: None,
            order: None,
            limit: None,
            canonical: default_canonical(),
        }
    }
}

impl CountOptions {
    /// Deserialize and validate an option bag.
    pub fn from_deserializer<'de, D: Deserializer<'de>>(deserializer: D) -> crate::Result<Self> {
        let options =
            Self::deserialize(deserializer).map_err(|e| crate::Error::InvalidOption(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Check option combinations.
    pub fn validate(&self) -> crate::Result<()> {
        if let (Some(at_least), Some(at_most)) = (self.at_least, self.at_most) {
            if at_least > at_most {
                return Err(crate::Error::InvalidOption(format!(
                    "at_least ({at_least}) is greater than at_most ({at_most})"
                )));
            }
        }
        for (key, bound) in [("start_at", self.start_at), ("end_at", self.end_at)] {
            if let Some(at) = bound {
                if at.checked_to_offset(UtcOffset::UTC).is_none() {
                    return Err(crate::Error::InvalidOption(format!(
                        "{key} ({at}) is out of range in UTC"
                    )));
                }
            }
        }
        if let (Some(start_at), Some(end_at)) = (self.start_at, self.end_at) {
            if start_at > end_at {
                return Err(crate::Error::InvalidOption(format!(
                    "start_at ({start_at}) is after end_at ({end_at})"
                )));
            }
        }
        validate_fragments(self.conditions.as_deref(), &self.joins, self.order.as_deref())
    }
}

fn validate_fragments(
    conditions: Option<&str>,
    joins: &[String],
    order: Option<&str>,
) -> crate::Result<()> {
    let blank = |fragment: &str| fragment.trim().is_empty();
    if conditions.is_some_and(blank) {
        return Err(crate::Error::InvalidOption(
            "conditions cannot be blank".to_string(),
        ));
    }
    if joins.iter().any(|join| blank(join.as_str())) {
        return Err(crate::Error::InvalidOption(
            "joins cannot contain blank clauses".to_string(),
        ));
    }
    if order.is_some_and(blank) {
        return Err(crate::Error::InvalidOption(
            "order cannot be blank".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_defaults_are_canonical() {
        assert!(FindOptions::default().canonical);
        assert!(CountOptions::default().canonical);
        let options = FindOptions::from_deserializer(json!({})).unwrap();
        assert_eq!(options, FindOptions::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = FindOptions::from_deserializer(json!({ "match_any": true })).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidOption(_)));
        assert!(err.to_string().contains("match_any"));

        let err = CountOptions::from_deserializer(json!({ "exclude": true })).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidOption(_)));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let err = CountOptions::from_deserializer(json!({ "at_least": "two" })).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidOption(_)));
    }

    #[test]
    fn test_modes_are_exclusive() {
        let err = FindOptions::from_deserializer(json!({ "match_all": true, "exclude": true }))
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidOption(_)));
    }

    #[test]
    fn test_count_bounds_are_checked() {
        let options = CountOptions {
            at_least: Some(3),
            at_most: Some(2),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = CountOptions {
            start_at: Some(datetime!(2024-02-01 0:00 UTC)),
            end_at: Some(datetime!(2024-01-01 0:00 UTC)),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_bound_outside_utc_range_is_rejected() {
        let err = CountOptions::from_deserializer(json!({
            "end_at": "9999-12-31T23:30:00-01:00",
        }))
        .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidOption(_)));
        assert!(err.to_string().contains("end_at"));

        let options = CountOptions::from_deserializer(json!({
            "end_at": "9999-12-31T23:30:00+01:00",
        }))
        .unwrap();
        assert!(options.end_at.is_some());
    }

    #[test]
    fn test_count_options_parse_timestamps() {
        let options = CountOptions::from_deserializer(json!({
            "start_at": "2024-01-01T00:00:00Z",
            "at_least": 2,
            "canonical": false,
        }))
        .unwrap();
        assert_eq!(options.start_at, Some(datetime!(2024-01-01 0:00 UTC)));
        assert_eq!(options.at_least, Some(2));
        assert!(!options.canonical);
    }

    #[test]
    fn test_blank_fragments_are_rejected() {
        let options = FindOptions {
            conditions: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}
