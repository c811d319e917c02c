use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use pricehound_common::{PriceRecord, PriceStore};
use serde::Serialize;
use tracing::{error, info};

use crate::normalize::NormalizedPrice;
use crate::panic_message;
use crate::pipeline::ExtractionReport;

/// What the outer caller gets back. Never an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum RunOutput {
    Price(String),
    Error(String),
}

impl RunOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<&ExtractionReport> for RunOutput {
    fn from(report: &ExtractionReport) -> Self {
        Self::Price(report.price.value.to_string())
    }
}

impl fmt::Display for RunOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Price(p) => f.write_str(p),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Builds and persists [`PriceRecord`]s. Storage failures, including a
/// panicking store, are logged and swallowed.
pub struct ResultRecorder {
    store: Arc<dyn PriceStore>,
    persist_sentinel: bool,
}

impl ResultRecorder {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self {
            store,
            persist_sentinel: true,
        }
    }

    /// Whether sentinel outcomes are stored. Defaults to `true`.
    pub fn persist_sentinel(mut self, persist: bool) -> Self {
        self.persist_sentinel = persist;
        self
    }

    /// Build the record for `name` and hand it to the store.
    pub async fn record(&self, name: &str, price: &NormalizedPrice) -> PriceRecord {
        let record = PriceRecord::new(name, price.value, Utc::now());

        if price.is_sentinel() && !self.persist_sentinel {
            info!(name, "recorder.sentinel.skipped");
            return record;
        }

        match AssertUnwindSafe(self.store.save(&record)).catch_unwind().await {
            Ok(Ok(())) => info!(name, price = %record.price, "recorder.saved"),
            Ok(Err(err)) => error!(name, price = %record.price, error = %err, "recorder.save.failed"),
            Err(panic) => error!(
                name,
                price = %record.price,
                error = %panic_message(&*panic),
                "recorder.save.panicked"
            ),
        }
        record
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_output_is_prefixed() {
        assert_eq!(RunOutput::Error("boom".into()).to_string(), "error: boom");
        assert_eq!(RunOutput::Price("32.45".into()).to_string(), "32.45");
    }

    #[test]
    fn serializes_with_status_tag() {
        let v = serde_json::to_value(RunOutput::Price("1.0".into())).unwrap();
        assert_eq!(v, serde_json::json!({"status": "price", "value": "1.0"}));
    }
}
