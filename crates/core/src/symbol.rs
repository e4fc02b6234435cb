//! Canonical-to-exchange symbol translation.
//!
//! Each collector owns one [`SymbolMap`] built from the exchange's public
//! instrument list during initialization and kept for the collector's
//! lifetime. Currency aliases (BTC→XBT, USDT→USD on Kraken) are applied
//! before the pair lookup; when no mapping exists the map falls back to
//! naive concatenation with the exchange's separator, a degraded but
//! non-fatal path.

use std::collections::HashMap;

/// Per-collector symbol and pair mapping table.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    /// Canonical currency → exchange-native spelling.
    aliases: HashMap<String, String>,
    /// Native `(base, quote)` → exchange pair identifier.
    pairs: HashMap<(String, String), String>,
    /// Separator used for the concatenation fallback ("" on Binance,
    /// "-" on OKX and Zonda).
    separator: &'static str,
}

impl SymbolMap {
    /// Creates an empty map with the exchange's pair separator.
    #[must_use]
    pub fn new(separator: &'static str) -> Self {
        Self {
            aliases: HashMap::new(),
            pairs: HashMap::new(),
            separator,
        }
    }

    /// Adds currency aliases, canonical spelling first.
    #[must_use]
    pub fn with_aliases(mut self, aliases: &[(&str, &str)]) -> Self {
        for (canonical, native) in aliases {
            self.aliases
                .insert((*canonical).to_uppercase(), (*native).to_uppercase());
        }
        self
    }

    /// Translates a canonical currency into the exchange-native spelling.
    /// Currencies without an alias pass through unchanged.
    #[must_use]
    pub fn alias(&self, currency: &str) -> String {
        let upper = currency.to_uppercase();
        self.aliases.get(&upper).cloned().unwrap_or(upper)
    }

    /// Registers a tradable pair under its native currency spellings.
    pub fn insert_pair(
        &mut self,
        native_base: &str,
        native_quote: &str,
        pair_id: impl Into<String>,
    ) {
        self.pairs.insert(
            (native_base.to_uppercase(), native_quote.to_uppercase()),
            pair_id.into(),
        );
    }

    /// Resolves a canonical `base`/`quote` to the exchange pair identifier,
    /// applying aliases first.
    #[must_use]
    pub fn resolve(&self, base: &str, quote: &str) -> Option<&str> {
        self.pairs
            .get(&(self.alias(base), self.alias(quote)))
            .map(String::as_str)
    }

    /// Resolves a pair, falling back to aliased concatenation when the
    /// instrument list never mentioned it.
    #[must_use]
    pub fn resolve_or_concat(&self, base: &str, quote: &str) -> String {
        match self.resolve(base, quote) {
            Some(id) => id.to_string(),
            None => {
                let fallback =
                    format!("{}{}{}", self.alias(base), self.separator, self.alias(quote));
                tracing::debug!(base, quote, %fallback, "no pair mapping, using concatenation");
                fallback
            }
        }
    }

    /// Number of registered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True if no pairs are registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
