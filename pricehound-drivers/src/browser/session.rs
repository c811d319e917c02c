use anyhow::Result;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use pricehound_common::{
    FetchRequest, FetchSession, PageSource, PricehoundError, SessionFactory,
};
use tracing::{debug, info};

use crate::browser::options::{BrowserOptions, EVASION_SCRIPT};
use crate::browser::pacing::Pacing;

/// Opens one Chrome session per invocation through a running WebDriver
/// service (Chromedriver by default).
#[derive(Debug, Clone)]
pub struct WebDriverSessions {
    options: BrowserOptions,
    pacing: Pacing,
}

impl WebDriverSessions {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            pacing: Pacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }
}

#[async_trait]
impl SessionFactory for WebDriverSessions {
    async fn open(&self) -> Result<Box<dyn FetchSession>> {
        let client = ClientBuilder::native()
            .capabilities(self.options.capabilities())
            .connect(&self.options.webdriver_url)
            .await
            .map_err(|e| {
                PricehoundError::Session(format!(
                    "cannot connect to webdriver at {}: {e}",
                    self.options.webdriver_url
                ))
            })?;
        info!(webdriver = %self.options.webdriver_url, headless = self.options.headless, "browser.session.opened");
        Ok(Box::new(WebDriverSession {
            client,
            pacing: self.pacing,
        }))
    }
}

/// A live browser session.
pub struct WebDriverSession {
    client: Client,
    pacing: Pacing,
}

impl WebDriverSession {
    async fn wait_until_ready(&self, request: &FetchRequest) {
        let Some(locator) = request.ready_locator.as_deref() else {
            return;
        };
        match self
            .client
            .wait()
            .at_most(request.ready_timeout)
            .for_element(Locator::Css(locator))
            .await
        {
            Ok(_) => debug!(%locator, "browser.ready"),
            // The source is still worth scanning with looser strategies.
            Err(err) => info!(%locator, error = %err, "browser.ready.timeout"),
        }
    }
}

#[async_trait]
impl FetchSession for WebDriverSession {
    async fn fetch(&mut self, request: &FetchRequest) -> Result<PageSource> {
        self.pacing.pause().await;
        self.client
            .goto(&request.url)
            .await
            .map_err(|e| PricehoundError::Fetch {
                url: request.url.clone(),
                reason: e.to_string(),
            })?;

        if let Err(err) = self.client.execute(EVASION_SCRIPT, vec![]).await {
            debug!(error = %err, "browser.evasion.failed");
        }

        tokio::time::sleep(request.wait_hint).await;
        self.wait_until_ready(request).await;

        let html = self.client.source().await.map_err(|e| PricehoundError::Fetch {
            url: request.url.clone(),
            reason: format!("page source unavailable: {e}"),
        })?;
        debug!(url = %request.url, kind = %request.kind, bytes = html.len(), "browser.fetched");
        Ok(PageSource::new(request.kind, request.url.as_str(), html))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.close().await?;
        debug!("browser.session.closed");
        Ok(())
    }
}
