use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub collection: CollectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Defaults for a collection run; all overridable from the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Trailing window length in minutes.
    pub lookback_mins: i64,
    /// Sampling cadence in seconds.
    pub interval_secs: i64,
    /// Order-book levels requested per side.
    pub depth: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/arb_dashboard".to_string(),
                max_connections: 10,
            },
            collection: CollectionConfig {
                lookback_mins: 5,
                interval_secs: 60,
                depth: 10,
            },
        }
    }
}

/// Credentials required to initialize one exchange collector.
///
/// Loaded from environment variables; an exchange with any required
/// variable absent is treated as "not configured" and skipped, never as an
/// error. There is no partial-credential mode.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
}

impl ExchangeConfig {
    /// Reads `{PREFIX}_API_KEY` and `{PREFIX}_API_SECRET` (plus
    /// `{PREFIX}_PASSPHRASE` when `needs_passphrase`). Returns `None` if
    /// any required variable is absent or empty.
    #[must_use]
    pub fn from_env(prefix: &str, needs_passphrase: bool) -> Option<Self> {
        let api_key = non_empty_var(&format!("{prefix}_API_KEY"))?;
        let api_secret = non_empty_var(&format!("{prefix}_API_SECRET"))?;
        let passphrase = if needs_passphrase {
            Some(non_empty_var(&format!("{prefix}_PASSPHRASE"))?)
        } else {
            None
        };
        Some(Self {
            api_key,
            api_secret,
            passphrase,
        })
    }

    /// True if key and secret (and passphrase, when required) are present.
    #[must_use]
    pub fn is_complete(&self, needs_passphrase: bool) -> bool {
        !self.api_key.is_empty()
            && !self.api_secret.is_empty()
            && (!needs_passphrase || self.passphrase.as_ref().is_some_and(|p| !p.is_empty()))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
