use std::collections::HashMap;

/// Maps bare tickers to exchange-qualified symbols.
///
/// Read-only after construction; share it freely between invocations.
#[derive(Debug, Clone)]
pub struct SymbolResolver {
    mappings: HashMap<String, String>,
    default_exchange: String,
}

impl SymbolResolver {
    /// ```
    /// use pricehound_extract::SymbolResolver;
    ///
    /// let resolver = SymbolResolver::new([("PETR4", "PETR4:BVMF")], "BVMF");
    /// assert_eq!(resolver.resolve("petr4"), "PETR4:BVMF");
    /// assert_eq!(resolver.resolve("wege3"), "WEGE3:BVMF");
    /// ```
    pub fn new<I, K, V>(mappings: I, default_exchange: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            mappings: mappings
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_uppercase(), v.into()))
                .collect(),
            default_exchange: default_exchange.into(),
        }
    }

    pub fn default_exchange(&self) -> &str {
        &self.default_exchange
    }

    /// Never fails: unmapped tickers become `TICKER:EXCHANGE`.
    pub fn resolve(&self, ticker: &str) -> String {
        let upper = ticker.to_uppercase();
        match self.mappings.get(&upper) {
            Some(symbol) => symbol.clone(),
            None => format!("{upper}:{}", self.default_exchange),
        }
    }
}
