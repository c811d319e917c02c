//! Loader for Pricehound configuration with YAML + environment overlays.
//!
//! Sources are merged in order: YAML file(s), inline YAML, then
//! `PRICEHOUND__`-prefixed environment variables (`__` separates nesting, so
//! `PRICEHOUND__STORAGE__DATABASE_URL` overrides `storage.database_url`).
//! String values may reference `${VAR}` placeholders, expanded recursively.
//! Every section is optional; missing values take the defaults below.
use config::{Config, ConfigError, Environment, File};
use pricehound_common::observability::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricehoundConfig {
    pub version: Option<String>,
    pub symbols: SymbolSettings,
    pub sources: SourceSettings,
    pub browser: BrowserSettings,
    pub diagnostics: DiagnosticsSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
    /// Maximum number of tickers processed concurrently.
    pub workers: usize,
}

impl Default for PricehoundConfig {
    fn default() -> Self {
        Self {
            version: None,
            symbols: SymbolSettings::default(),
            sources: SourceSettings::default(),
            browser: BrowserSettings::default(),
            diagnostics: DiagnosticsSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
            workers: 4,
        }
    }
}

/// Ticker → exchange-qualified symbol table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SymbolSettings {
    pub default_exchange: String,
    pub mappings: BTreeMap<String, String>,
}

impl Default for SymbolSettings {
    fn default() -> Self {
        let mappings = ["PETR4", "PETR3", "VALE3", "ITUB4", "BBDC4"]
            .into_iter()
            .map(|t| (t.to_string(), format!("{t}:BVMF")))
            .collect();
        Self {
            default_exchange: "BVMF".into(),
            mappings,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Quote page URL; `{symbol}` is replaced by the resolved symbol.
    pub quote_url: String,
    /// Search page URL; `{ticker}` is replaced by the sanitised raw ticker.
    pub search_url: String,
    pub wait_hint_ms: u64,
    pub element_timeout_ms: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            quote_url: "https://www.google.com/finance/quote/{symbol}".into(),
            search_url: "https://www.google.com/search?q=preço+ação+{ticker}".into(),
            wait_hint_ms: 3_000,
            element_timeout_ms: 15_000,
        }
    }
}

impl SourceSettings {
    pub fn wait_hint(&self) -> Duration {
        Duration::from_millis(self.wait_hint_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    pub screenshots: bool,
    pub dir: PathBuf,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            screenshots: true,
            dir: std::env::temp_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database_url: String,
    /// Persist sentinel (`0.0`) outcomes as well as real extractions.
    pub persist_sentinel: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://pricehound.db".into(),
            persist_sentinel: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub emit_stderr: bool,
    pub filter: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            emit_stderr: true,
            filter: "info".into(),
            dir: None,
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') => {
            let mut cur = std::mem::take(s);
            for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                let expanded = shellexpand::env(&cur)
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| cur.clone());
                if expanded == cur {
                    break;
                }
                cur = expanded;
            }
            *s = cur;
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

fn validate(cfg: &PricehoundConfig) -> Result<(), ConfigError> {
    if cfg.workers == 0 {
        return Err(ConfigError::Message("workers must be at least 1".into()));
    }
    if !cfg.sources.quote_url.contains("{symbol}") {
        return Err(ConfigError::Message(
            "sources.quote_url must contain a {symbol} placeholder".into(),
        ));
    }
    if !cfg.sources.search_url.contains("{ticker}") {
        return Err(ConfigError::Message(
            "sources.search_url must contain a {ticker} placeholder".into(),
        ));
    }
    if cfg.symbols.default_exchange.trim().is_empty() {
        return Err(ConfigError::Message(
            "symbols.default_exchange must not be empty".into(),
        ));
    }
    Ok(())
}

/// Builder over the `config` crate wiring (YAML + env overrides).
pub struct PricehoundConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PricehoundConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PricehoundConfigLoader {
    /// Start with no file sources; every setting has a default. Environment
    /// overrides are applied last, in [`load`](Self::load).
    ///
    /// ```
    /// use pricehound_config::PricehoundConfigLoader;
    ///
    /// let cfg = PricehoundConfigLoader::new().load().expect("defaults are valid");
    /// assert_eq!(cfg.symbols.default_exchange, "BVMF");
    /// assert_eq!(cfg.symbols.mappings.get("PETR4").map(String::as_str), Some("PETR4:BVMF"));
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a required YAML/TOML/JSON file; format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use pricehound_config::PricehoundConfigLoader;
    ///
    /// let cfg = PricehoundConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// symbols:
    ///   default_exchange: NASDAQ
    ///   mappings:
    ///     aapl: "AAPL:NASDAQ"
    /// workers: 2
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.workers, 2);
    /// assert_eq!(cfg.symbols.mappings.get("AAPL").map(String::as_str), Some("AAPL:NASDAQ"));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and validate.
    pub fn load(self) -> Result<PricehoundConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("PRICEHOUND")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let mut typed: PricehoundConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        typed.symbols.mappings = std::mem::take(&mut typed.symbols.mappings)
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        typed.symbols.default_exchange = typed.symbols.default_exchange.trim().to_uppercase();

        validate(&typed)?;
        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("PH_DB", Some("/data/p.db"), || {
            let mut v = json!("sqlite://${PH_DB}");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("sqlite:///data/p.db"));
        });
    }

    #[test]
    fn expands_nested_values() {
        temp_env::with_vars([("EXCH", Some("BVMF")), ("HOST", Some("wd"))], || {
            let mut v = json!({
                "symbols": { "default_exchange": "$EXCH" },
                "urls": ["http://${HOST}:9515", 7, null]
            });
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!({
                    "symbols": { "default_exchange": "BVMF" },
                    "urls": ["http://wd:9515", 7, null]
                })
            );
        });
    }

    #[test]
    fn cyclic_references_terminate() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("${PRICEHOUND_SURELY_UNSET_VAR}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("${PRICEHOUND_SURELY_UNSET_VAR}"));
    }

    #[test]
    fn rejects_zero_workers() {
        let cfg = PricehoundConfig {
            workers: 0,
            ..PricehoundConfig::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_quote_url_without_placeholder() {
        let mut cfg = PricehoundConfig::default();
        cfg.sources.quote_url = "https://example.test/quote".into();
        assert!(validate(&cfg).is_err());
    }
}
