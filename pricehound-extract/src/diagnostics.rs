use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pricehound_common::{DiagnosticCapture, FetchSession};
use tracing::debug;

/// Writes a PNG screenshot per capture to `{dir}/{label}.png`.
#[derive(Debug, Clone)]
pub struct ScreenshotCapture {
    dir: PathBuf,
}

impl ScreenshotCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DiagnosticCapture for ScreenshotCapture {
    async fn capture(&self, session: &mut dyn FetchSession, label: &str) -> Result<()> {
        let png = session.screenshot().await?;
        let path = self.dir.join(format!("{label}.png"));
        tokio::fs::write(&path, &png)
            .await
            .with_context(|| format!("failed to write screenshot {}", path.display()))?;
        debug!(path = %path.display(), bytes = png.len(), "diagnostics.screenshot.saved");
        Ok(())
    }
}
