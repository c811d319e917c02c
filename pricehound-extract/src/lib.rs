//! Resilient price extraction from fetched finance pages.
//!
//! - [`SymbolResolver`]: bare ticker → exchange-qualified symbol
//! - [`normalize`]: locale-aware numeric normalisation with a `0.0` sentinel
//! - [`strategy`]: ordered structural and pattern strategies per source kind
//! - [`pipeline`]: the fallback state machine over quote page, search page
//!   and raw source
//! - [`recorder`]: record building, persistence and the caller-facing output
//! - [`PriceService`]: session lifecycle around a single invocation
pub mod diagnostics;
pub mod normalize;
pub mod pipeline;
pub mod recorder;
pub mod service;
pub mod strategy;
pub mod symbol;

pub use diagnostics::ScreenshotCapture;
pub use normalize::{normalize, NormalizedPrice, PriceOrigin, SENTINEL_PRICE};
pub use pipeline::{ExtractionPipeline, ExtractionReport, PipelineSettings, PipelineStage};
pub use recorder::{ResultRecorder, RunOutput};
pub use service::PriceService;
pub use strategy::{ExtractionCandidate, StrategyChain};
pub use symbol::SymbolResolver;

/// Failures that escape the fallback chain and reach the caller as an
/// error value.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("failed to open fetch session: {0}")]
    SessionUnavailable(String),

    #[error("extraction aborted: {0}")]
    Aborted(String),

    #[error("invalid locator `{locator}`: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("invalid source pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic without message".to_string()
    }
}
