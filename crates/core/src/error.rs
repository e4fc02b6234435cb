//! Error types for the collection pipeline.
//!
//! Every failure a collector or the orchestrator can hit is mapped onto a
//! small taxonomy so callers can decide what is fatal, what is skipped, and
//! what is counted and carried on past.

use thiserror::Error;

/// Errors that can occur while collecting or persisting market data.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Required credentials are missing or empty. The exchange is skipped,
    /// never collected from.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Instrument-list bootstrap failed for one exchange. Recorded per
    /// exchange, does not abort the others.
    #[error("initialization failed for {exchange}: {message}")]
    Initialization {
        /// Exchange that failed to initialize.
        exchange: String,
        /// What went wrong.
        message: String,
    },

    /// The exchange returned no data for a resolved pair identifier.
    #[error("no data available for {pair}")]
    DataUnavailable {
        /// The exchange-native pair identifier that came back empty.
        pair: String,
    },

    /// API request failed with an HTTP error status.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The exchange answered HTTP 200 but embedded an error payload.
    #[error("exchange error: {0}")]
    Exchange(String),

    /// Network-level error (connect failure, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// A numeric field in the payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Persistence write or read failed. Counted per pair.
    #[error("storage error: {0}")]
    Storage(String),

    /// The run cannot proceed at all (no collectors, no eligible pairs).
    /// The only kind that reaches the process boundary.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CollectError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates an initialization error for the given exchange.
    pub fn initialization(exchange: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Initialization {
            exchange: exchange.into(),
            message: message.into(),
        }
    }

    /// Creates a data-unavailable error for a resolved pair identifier.
    pub fn data_unavailable(pair: impl Into<String>) -> Self {
        Self::DataUnavailable { pair: pair.into() }
    }

    /// Returns true if this error must abort the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<reqwest::Error> for CollectError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("request timeout: {err}"))
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CollectError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectError>;

/// Parses a stringly-typed numeric payload field into `f64`.
///
/// Several exchanges return prices and quantities as JSON strings; a
/// malformed value surfaces as [`CollectError::Parse`] naming the field.
pub fn parse_f64(field: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| CollectError::Parse(format!("invalid numeric value for {field}: {value:?}")))
}
