//! Seams between the extraction core and the outside world.
//!
//! The core never talks to a browser or a database directly. It opens one
//! [`FetchSession`] per invocation through a [`SessionFactory`], optionally
//! hands the session to a [`DiagnosticCapture`], and persists through a
//! [`PriceStore`].
use anyhow::Result;
use async_trait::async_trait;

use crate::{FetchRequest, PageSource, PriceRecord};

/// Opens fetch sessions. Shared across invocations.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn FetchSession>>;
}

/// A single acquired page-fetch session.
///
/// Callers must hand the session back through [`FetchSession::close`] on
/// every exit path.
#[async_trait]
pub trait FetchSession: Send {
    /// Navigate to `request.url` and return the page source.
    async fn fetch(&mut self, request: &FetchRequest) -> Result<PageSource>;

    /// PNG screenshot of the current page.
    async fn screenshot(&mut self) -> Result<Vec<u8>>;

    /// Release the session.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Side channel for debugging artefacts. Failures never affect extraction.
#[async_trait]
pub trait DiagnosticCapture: Send + Sync {
    async fn capture(&self, session: &mut dyn FetchSession, label: &str) -> Result<()>;
}

/// Capture that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCapture;

#[async_trait]
impl DiagnosticCapture for NoopCapture {
    async fn capture(&self, _session: &mut dyn FetchSession, _label: &str) -> Result<()> {
        Ok(())
    }
}

/// Storage collaborator for [`PriceRecord`]s.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn save(&self, record: &PriceRecord) -> Result<()>;
}
