//! Configuration for the ordering engine
use serde::{Deserialize, Serialize};

/// Hard ceiling for `max_depth`; the observed documents use two levels
const MAX_SUPPORTED_DEPTH: usize = 64;

/// Limits and switches for reorder processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    /// Maximum nesting depth of a submission (top-level entries are depth 1)
    pub max_depth: usize,

    /// Maximum number of entries across all levels of one submission
    pub max_entries: usize,

    /// Re-walk every touched sibling group after persistence and log any
    /// traversal issue that remains
    pub verify_after_apply: bool,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_entries: 10_000,
            verify_after_apply: true,
        }
    }
}

impl OrderingConfig {
    /// Build a config from `PAGEORDER_*` environment variables, falling back
    /// to defaults for anything unset or unparseable
    ///
    /// - `PAGEORDER_MAX_DEPTH`
    /// - `PAGEORDER_MAX_ENTRIES`
    /// - `PAGEORDER_VERIFY_AFTER_APPLY` (`true`/`false`/`1`/`0`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_depth = lookup("PAGEORDER_MAX_DEPTH")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.max_depth);

        let max_entries = lookup("PAGEORDER_MAX_ENTRIES")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.max_entries);

        let verify_after_apply = lookup("PAGEORDER_VERIFY_AFTER_APPLY")
            .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => None,
            })
            .unwrap_or(defaults.verify_after_apply);

        Self {
            max_depth,
            max_entries,
            verify_after_apply,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("max_depth must be greater than 0".to_string());
        }

        if self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(format!(
                "max_depth cannot exceed {}",
                MAX_SUPPORTED_DEPTH
            ));
        }

        if self.max_entries == 0 {
            return Err("max_entries must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = OrderingConfig::default();
        assert_eq!(config.max_depth, 8);
        assert!(config.verify_after_apply);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = OrderingConfig::default();
        config.max_depth = 0;
        assert!(config.validate().is_err());

        config.max_depth = MAX_SUPPORTED_DEPTH + 1;
        assert!(config.validate().is_err());

        config.max_depth = 2;
        config.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("PAGEORDER_MAX_DEPTH", "3"),
            ("PAGEORDER_MAX_ENTRIES", "not-a-number"),
            ("PAGEORDER_VERIFY_AFTER_APPLY", "False"),
        ]
        .into_iter()
        .collect();

        let config = OrderingConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.max_entries, OrderingConfig::default().max_entries);
        assert!(!config.verify_after_apply);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: OrderingConfig = serde_json::from_str(r#"{"max_depth": 2}"#).unwrap();
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.max_entries, 10_000);
    }
}
