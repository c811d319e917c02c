use std::sync::Arc;

use anyhow::{Context, Result};
use pricehound_common::{DiagnosticCapture, NoopCapture};
use pricehound_config::PricehoundConfig;
use pricehound_drivers::browser::{BrowserOptions, Pacing, WebDriverSessions};
use pricehound_extract::{
    ExtractionPipeline, PipelineSettings, PriceService, ResultRecorder, ScreenshotCapture,
    SymbolResolver,
};
use pricehound_store::SqlitePriceStore;
use tracing::info;

/// Assemble the service from config: store, browser sessions, diagnostics,
/// resolver and pipeline.
pub async fn build_service(cfg: &PricehoundConfig) -> Result<PriceService> {
    let store = SqlitePriceStore::connect(&cfg.storage.database_url).await?;
    info!(url = %cfg.storage.database_url, "app.store.connected");

    let sessions = WebDriverSessions::new(BrowserOptions {
        webdriver_url: cfg.browser.webdriver_url.clone(),
        headless: cfg.browser.headless,
        user_agent: cfg.browser.user_agent.clone(),
        ..BrowserOptions::default()
    })
    .with_pacing(Pacing::default());

    let capture: Arc<dyn DiagnosticCapture> = if cfg.diagnostics.screenshots {
        std::fs::create_dir_all(&cfg.diagnostics.dir).with_context(|| {
            format!(
                "failed to create screenshot directory: {}",
                cfg.diagnostics.dir.display()
            )
        })?;
        Arc::new(ScreenshotCapture::new(&cfg.diagnostics.dir))
    } else {
        Arc::new(NoopCapture)
    };

    let resolver = SymbolResolver::new(
        cfg.symbols.mappings.clone(),
        cfg.symbols.default_exchange.clone(),
    );
    let settings = PipelineSettings {
        quote_url: cfg.sources.quote_url.clone(),
        search_url: cfg.sources.search_url.clone(),
        wait_hint: cfg.sources.wait_hint(),
        element_timeout: cfg.sources.element_timeout(),
    };
    let pipeline = ExtractionPipeline::new(resolver, settings, capture)?;
    let recorder =
        ResultRecorder::new(Arc::new(store)).persist_sentinel(cfg.storage.persist_sentinel);

    Ok(PriceService::new(Arc::new(sessions), pipeline, recorder))
}
