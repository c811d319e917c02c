use pricehound_common::observability::LogFormat;
use pricehound_config::PricehoundConfigLoader;
use serial_test::serial;
use std::{fs, path::PathBuf, time::Duration};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const FILE_YAML: &str = r#"
version: "1"
symbols:
  default_exchange: bvmf
  mappings:
    petr4: "PETR4:BVMF"
    wege3: "WEGE3:BVMF"
sources:
  wait_hint_ms: 500
  element_timeout_ms: 2000
storage:
  database_url: "sqlite://${PH_TEST_DATA}/prices.db"
  persist_sentinel: false
logging:
  format: json
  emit_stderr: false
workers: 3
"#;

#[test]
#[serial]
fn loads_file_with_expansion_and_normalised_keys() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "pricehound.yaml", FILE_YAML);

    let cfg = temp_env::with_var("PH_TEST_DATA", Some("/srv/ph"), || {
        PricehoundConfigLoader::new()
            .with_file(&p)
            .load()
            .expect("load config")
    });

    assert_eq!(cfg.version.as_deref(), Some("1"));
    assert_eq!(cfg.symbols.default_exchange, "BVMF");
    assert_eq!(
        cfg.symbols.mappings.get("WEGE3").map(String::as_str),
        Some("WEGE3:BVMF")
    );
    assert!(!cfg.symbols.mappings.contains_key("wege3"));
    assert_eq!(cfg.sources.wait_hint(), Duration::from_millis(500));
    assert_eq!(cfg.sources.element_timeout(), Duration::from_secs(2));
    assert!(cfg.sources.quote_url.contains("{symbol}"));
    assert_eq!(cfg.storage.database_url, "sqlite:///srv/ph/prices.db");
    assert!(!cfg.storage.persist_sentinel);
    assert_eq!(cfg.logging.format, LogFormat::Json);
    assert_eq!(cfg.workers, 3);
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "pricehound.yaml", FILE_YAML);

    let cfg = temp_env::with_vars(
        [
            ("PH_TEST_DATA", Some("/srv/ph")),
            ("PRICEHOUND__WORKERS", Some("8")),
            ("PRICEHOUND__BROWSER__WEBDRIVER_URL", Some("http://chrome:4444")),
        ],
        || {
            PricehoundConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load config")
        },
    );

    assert_eq!(cfg.workers, 8);
    assert_eq!(cfg.browser.webdriver_url, "http://chrome:4444");
}

#[test]
#[serial]
fn missing_optional_file_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let cfg = PricehoundConfigLoader::new()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("defaults");

    assert_eq!(cfg.workers, 4);
    assert!(cfg.storage.persist_sentinel);
    assert_eq!(cfg.symbols.mappings.len(), 5);
    assert_eq!(cfg.browser.webdriver_url, "http://localhost:9515");
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let res = PricehoundConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(res.is_err());
}

#[test]
#[serial]
fn environment_overrides_inline_yaml_added_after_file() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "pricehound.yaml", "workers: 3\n");

    let cfg = temp_env::with_var("PRICEHOUND__WORKERS", Some("6"), || {
        PricehoundConfigLoader::new()
            .with_file(&p)
            .with_yaml_str("workers: 5\nstorage:\n  persist_sentinel: false\n")
            .load()
            .expect("load config")
    });

    assert_eq!(cfg.workers, 6);
    assert!(!cfg.storage.persist_sentinel);
}
