//! Engine configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// SQLite database path.
    pub db_path: String,
    /// Creates allowed per caller in one window.
    pub create_limit: u32,
    /// Length of the create rate-limit window.
    pub create_window: Duration,
    /// Maximum data rows accepted by one import.
    pub import_max_rows: usize,
    /// History entries shown on the lead detail view.
    pub history_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: "leadbook.db".to_string(),
            create_limit: 5,
            create_window: Duration::from_secs(60),
            import_max_rows: 200,
            history_limit: 5,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `LEADBOOK_DB_PATH` | SQLite database path | `leadbook.db` |
    /// | `LEADBOOK_CREATE_LIMIT` | Creates per caller per window | `5` |
    /// | `LEADBOOK_CREATE_WINDOW_SECS` | Rate-limit window in seconds | `60` |
    /// | `LEADBOOK_IMPORT_MAX_ROWS` | Import row cap | `200` |
    /// | `LEADBOOK_HISTORY_LIMIT` | History entries per lead view | `5` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            db_path: lookup("LEADBOOK_DB_PATH")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.db_path),
            create_limit: parsed(&lookup, "LEADBOOK_CREATE_LIMIT")?
                .unwrap_or(defaults.create_limit),
            create_window: positive(&lookup, "LEADBOOK_CREATE_WINDOW_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.create_window),
            import_max_rows: parsed(&lookup, "LEADBOOK_IMPORT_MAX_ROWS")?
                .unwrap_or(defaults.import_max_rows),
            history_limit: parsed(&lookup, "LEADBOOK_HISTORY_LIMIT")?
                .unwrap_or(defaults.history_limit),
        })
    }

    /// In-memory database, everything else default.
    pub fn in_memory() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            ..Self::default()
        }
    }
}

fn parsed<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

/// Like [`parsed`], but zero is rejected as well.
fn positive<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parsed::<u64, F>(lookup, var)? {
        Some(0) => Err(ConfigError::Invalid {
            var,
            value: lookup(var).unwrap_or_default(),
        }),
        other => Ok(other),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.create_limit, 5);
        assert_eq!(config.create_window, Duration::from_secs(60));
        assert_eq!(config.import_max_rows, 200);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("LEADBOOK_DB_PATH", "/tmp/leads.db"),
            ("LEADBOOK_CREATE_LIMIT", " 10 "),
            ("LEADBOOK_CREATE_WINDOW_SECS", "30"),
            ("LEADBOOK_IMPORT_MAX_ROWS", "50"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, "/tmp/leads.db");
        assert_eq!(config.create_limit, 10);
        assert_eq!(config.create_window, Duration::from_secs(30));
        assert_eq!(config.import_max_rows, 50);
        assert_eq!(config.history_limit, 5);
    }

    #[test]
    fn malformed_value_names_the_variable() {
        let err = EngineConfig::from_lookup(lookup(&[("LEADBOOK_CREATE_LIMIT", "five")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { var: "LEADBOOK_CREATE_LIMIT", ref value } if value == "five"
        ));
    }

    #[test]
    fn zero_length_window_is_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[("LEADBOOK_CREATE_WINDOW_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { var: "LEADBOOK_CREATE_WINDOW_SECS", ref value } if value == "0"
        ));
    }
}
