//! Shared types and collaborator seams for the Pricehound workspace.
//!
//! This crate holds everything the extraction core and its collaborators
//! need to agree on, without pulling in a browser or a database:
//!
//! - [`SourceKind`], [`PageSource`], [`FetchRequest`]: page content handed to
//!   the extraction core
//! - [`PriceRecord`]: the persisted observation
//! - [`collaborators`]: traits implemented by the WebDriver and SQLite crates
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`PricehoundError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use pricehound_common::{PageSource, SourceKind};
//!
//! let page = PageSource::new(SourceKind::SearchPage, "https://example.test", "<p>R$ 1,00</p>");
//! let raw = page.retagged(SourceKind::RawFallback);
//! assert_eq!(raw.kind.as_str(), "raw_fallback");
//! ```
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod collaborators;
pub mod observability;

pub use collaborators::{DiagnosticCapture, FetchSession, NoopCapture, PriceStore, SessionFactory};

/// Which page variant a [`PageSource`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    QuotePage,
    SearchPage,
    RawFallback,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotePage => "quote_page",
            Self::SearchPage => "search_page",
            Self::RawFallback => "raw_fallback",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetched page content, owned by one extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSource {
    pub kind: SourceKind,
    pub url: String,
    pub html: String,
}

impl PageSource {
    pub fn new(kind: SourceKind, url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            html: html.into(),
        }
    }

    /// Reuse the same content under a different source kind.
    pub fn retagged(self, kind: SourceKind) -> Self {
        Self { kind, ..self }
    }
}

/// One navigation request sent to a [`FetchSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub kind: SourceKind,
    /// Settle time after navigation before the source is read.
    pub wait_hint: Duration,
    /// CSS locator worth waiting for before reading the source.
    pub ready_locator: Option<String>,
    /// Upper bound for the `ready_locator` wait.
    pub ready_timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, kind: SourceKind, wait_hint: Duration) -> Self {
        Self {
            url: url.into(),
            kind,
            wait_hint,
            ready_locator: None,
            ready_timeout: Duration::ZERO,
        }
    }

    pub fn wait_for(mut self, locator: impl Into<String>, timeout: Duration) -> Self {
        self.ready_locator = Some(locator.into());
        self.ready_timeout = timeout;
        self
    }
}

/// A persisted price observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub name: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl PriceRecord {
    pub fn new(name: impl Into<String>, price: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            price,
            observed_at,
        }
    }
}

/// Error types shared by the collaborator crates.
#[derive(thiserror::Error, Debug)]
pub enum PricehoundError {
    /// Navigation to a page failed or timed out.
    #[error("Fetch error for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The browser session could not be opened or used.
    #[error("Session error: {0}")]
    Session(String),

    /// The storage backend rejected or corrupted a record.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaborator reported an error without a more specific category.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`PricehoundError`].
pub type Result<T> = std::result::Result<T, PricehoundError>;
