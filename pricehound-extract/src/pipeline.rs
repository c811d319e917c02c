//! The extraction orchestrator: an explicit fallback state machine.
//!
//! ```text
//! ResolveSymbol → FetchQuotePage → TryQuoteExtraction ─found→ Done
//!                      ↓ failed          ↓ none
//!                 FetchSearchPage → TrySearchExtraction ─found→ Done
//!                      ↓ failed          ↓ none
//!                 TryRawPatternExtraction ─found→ Done
//!                      ↓ none
//!                   Sentinel → Done
//! ```
//!
//! Stages only move forward. Fetch failures and extraction misses are typed
//! [`SourceOutcome`]s that drive the next transition; nothing is raised.
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use pricehound_common::{DiagnosticCapture, FetchRequest, FetchSession, PageSource, SourceKind};
use tracing::{debug, info, warn};
use url::Url;

use crate::normalize::{parse_price, NormalizedPrice, PriceOrigin};
use crate::strategy::{ExtractionCandidate, StrategyChain, PRIMARY_PRICE_LOCATOR};
use crate::symbol::SymbolResolver;
use crate::{panic_message, PipelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    ResolveSymbol,
    FetchQuotePage,
    TryQuoteExtraction,
    FetchSearchPage,
    TrySearchExtraction,
    TryRawPatternExtraction,
    Sentinel,
    Done,
}

/// What one source contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Found(ExtractionCandidate),
    FetchFailed(String),
    NoCandidate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAttempt {
    pub kind: SourceKind,
    pub url: Option<String>,
    pub outcome: SourceOutcome,
}

/// Everything one extraction run produced.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub ticker: String,
    pub symbol: String,
    pub price: NormalizedPrice,
    pub candidate: Option<ExtractionCandidate>,
    pub attempts: Vec<SourceAttempt>,
    pub trace: Vec<PipelineStage>,
}

impl ExtractionReport {
    pub fn final_stage_before_done(&self) -> Option<PipelineStage> {
        self.trace.iter().rev().find(|s| **s != PipelineStage::Done).copied()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Must contain `{symbol}`.
    pub quote_url: String,
    /// Must contain `{ticker}`.
    pub search_url: String,
    pub wait_hint: Duration,
    pub element_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            quote_url: "https://www.google.com/finance/quote/{symbol}".into(),
            search_url: "https://www.google.com/search?q=preço+ação+{ticker}".into(),
            wait_hint: Duration::from_secs(3),
            element_timeout: Duration::from_secs(15),
        }
    }
}

impl PipelineSettings {
    pub fn quote_url_for(&self, symbol: &str) -> Result<Url, url::ParseError> {
        Url::parse(&self.quote_url.replace("{symbol}", symbol))
    }

    pub fn search_url_for(&self, ticker: &str) -> Result<Url, url::ParseError> {
        Url::parse(&self.search_url.replace("{ticker}", &ticker.replace(':', "+")))
    }
}

enum State {
    ResolveSymbol,
    FetchQuotePage,
    TryQuoteExtraction(PageSource),
    FetchSearchPage,
    TrySearchExtraction(PageSource),
    TryRawPatternExtraction,
    Sentinel,
    Done(NormalizedPrice, Option<ExtractionCandidate>),
}

impl State {
    fn stage(&self) -> PipelineStage {
        match self {
            Self::ResolveSymbol => PipelineStage::ResolveSymbol,
            Self::FetchQuotePage => PipelineStage::FetchQuotePage,
            Self::TryQuoteExtraction(_) => PipelineStage::TryQuoteExtraction,
            Self::FetchSearchPage => PipelineStage::FetchSearchPage,
            Self::TrySearchExtraction(_) => PipelineStage::TrySearchExtraction,
            Self::TryRawPatternExtraction => PipelineStage::TryRawPatternExtraction,
            Self::Sentinel => PipelineStage::Sentinel,
            Self::Done(..) => PipelineStage::Done,
        }
    }
}

/// Drives the strategy chains across the quote page, the search page and
/// the raw source. Holds no per-run state; share it behind an `Arc`.
pub struct ExtractionPipeline {
    resolver: SymbolResolver,
    settings: PipelineSettings,
    quote_chain: StrategyChain,
    search_chain: StrategyChain,
    raw_chain: StrategyChain,
    capture: Arc<dyn DiagnosticCapture>,
}

// Per-run scratch state.
struct Run<'a> {
    ticker: &'a str,
    symbol: String,
    attempts: Vec<SourceAttempt>,
    last_page: Option<PageSource>,
}

impl ExtractionPipeline {
    pub fn new(
        resolver: SymbolResolver,
        settings: PipelineSettings,
        capture: Arc<dyn DiagnosticCapture>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            resolver,
            settings,
            quote_chain: StrategyChain::for_kind(SourceKind::QuotePage)?,
            search_chain: StrategyChain::for_kind(SourceKind::SearchPage)?,
            raw_chain: StrategyChain::for_kind(SourceKind::RawFallback)?,
            capture,
        })
    }

    pub fn resolver(&self) -> &SymbolResolver {
        &self.resolver
    }

    /// Run the full fallback chain for `ticker` on an already-open session.
    pub async fn extract(&self, ticker: &str, session: &mut dyn FetchSession) -> ExtractionReport {
        let mut run = Run {
            ticker,
            symbol: String::new(),
            attempts: Vec::new(),
            last_page: None,
        };
        let mut trace = Vec::new();
        let mut state = State::ResolveSymbol;

        let (price, candidate) = loop {
            trace.push(state.stage());
            state = match state {
                State::ResolveSymbol => {
                    run.symbol = self.resolver.resolve(ticker);
                    debug!(ticker, symbol = %run.symbol, "pipeline.symbol.resolved");
                    State::FetchQuotePage
                }
                State::FetchQuotePage => {
                    let url = self.settings.quote_url_for(&run.symbol);
                    match self.fetch(&mut run, session, SourceKind::QuotePage, url).await {
                        Some(page) => State::TryQuoteExtraction(page),
                        None => State::FetchSearchPage,
                    }
                }
                State::TryQuoteExtraction(page) => {
                    match self.try_chain(&mut run, &self.quote_chain, page) {
                        Some(c) => finish(c),
                        None => State::FetchSearchPage,
                    }
                }
                State::FetchSearchPage => {
                    let url = self.settings.search_url_for(ticker);
                    match self.fetch(&mut run, session, SourceKind::SearchPage, url).await {
                        Some(page) => State::TrySearchExtraction(page),
                        None => State::TryRawPatternExtraction,
                    }
                }
                State::TrySearchExtraction(page) => {
                    match self.try_chain(&mut run, &self.search_chain, page) {
                        Some(c) => finish(c),
                        None => State::TryRawPatternExtraction,
                    }
                }
                State::TryRawPatternExtraction => match run.last_page.take() {
                    Some(page) => {
                        let raw = page.retagged(SourceKind::RawFallback);
                        match self.try_chain(&mut run, &self.raw_chain, raw) {
                            Some(c) => finish(c),
                            None => State::Sentinel,
                        }
                    }
                    None => {
                        run.attempts.push(SourceAttempt {
                            kind: SourceKind::RawFallback,
                            url: None,
                            outcome: SourceOutcome::FetchFailed(
                                "no page source was fetched".into(),
                            ),
                        });
                        State::Sentinel
                    }
                },
                State::Sentinel => {
                    warn!(ticker, symbol = %run.symbol, "pipeline.sentinel");
                    State::Done(NormalizedPrice::sentinel(PriceOrigin::Sentinel), None)
                }
                State::Done(price, candidate) => break (price, candidate),
            };
        };

        info!(
            ticker,
            symbol = %run.symbol,
            price = %price.value,
            origin = ?price.origin,
            "pipeline.done"
        );

        ExtractionReport {
            ticker: ticker.to_string(),
            symbol: run.symbol,
            price,
            candidate,
            attempts: run.attempts,
            trace,
        }
    }

    async fn fetch(
        &self,
        run: &mut Run<'_>,
        session: &mut dyn FetchSession,
        kind: SourceKind,
        url: Result<Url, url::ParseError>,
    ) -> Option<PageSource> {
        let url = match url {
            Ok(url) => url,
            Err(err) => {
                warn!(ticker = run.ticker, source = %kind, error = %err, "pipeline.fetch.bad_url");
                run.attempts.push(SourceAttempt {
                    kind,
                    url: None,
                    outcome: SourceOutcome::FetchFailed(format!("invalid url: {err}")),
                });
                return None;
            }
        };

        let mut request = FetchRequest::new(url.as_str(), kind, self.settings.wait_hint);
        if kind == SourceKind::QuotePage {
            request = request.wait_for(PRIMARY_PRICE_LOCATOR, self.settings.element_timeout);
        }

        info!(ticker = run.ticker, source = %kind, url = %url, "pipeline.fetch.start");
        match session.fetch(&request).await {
            Ok(page) => {
                let label = capture_label(run.ticker, kind);
                let captured = AssertUnwindSafe(self.capture.capture(session, &label))
                    .catch_unwind()
                    .await;
                match captured {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        warn!(ticker = run.ticker, %label, error = %err, "pipeline.capture.failed")
                    }
                    Err(panic) => warn!(
                        ticker = run.ticker,
                        %label,
                        error = %panic_message(&*panic),
                        "pipeline.capture.panicked"
                    ),
                }
                Some(page)
            }
            Err(err) => {
                warn!(ticker = run.ticker, source = %kind, error = %err, "pipeline.fetch.failed");
                run.attempts.push(SourceAttempt {
                    kind,
                    url: Some(url.to_string()),
                    outcome: SourceOutcome::FetchFailed(format!("{err:#}")),
                });
                None
            }
        }
    }

    fn try_chain(
        &self,
        run: &mut Run<'_>,
        chain: &StrategyChain,
        page: PageSource,
    ) -> Option<ExtractionCandidate> {
        let found = chain.extract(&page);
        let outcome = match &found {
            Some(c) => {
                info!(
                    ticker = run.ticker,
                    source = %page.kind,
                    strategy = c.strategy,
                    text = %c.text,
                    "pipeline.candidate.found"
                );
                SourceOutcome::Found(c.clone())
            }
            None => {
                info!(ticker = run.ticker, source = %page.kind, "pipeline.candidate.none");
                SourceOutcome::NoCandidate
            }
        };
        run.attempts.push(SourceAttempt {
            kind: page.kind,
            url: Some(page.url.clone()),
            outcome,
        });
        run.last_page = Some(page);
        found
    }
}

fn finish(candidate: ExtractionCandidate) -> State {
    let price = match parse_price(&candidate.text) {
        Some(value) => NormalizedPrice::extracted(value),
        None => {
            warn!(text = %candidate.text, strategy = candidate.strategy, "pipeline.parse.failed");
            NormalizedPrice::sentinel(PriceOrigin::ParseFailed)
        }
    };
    State::Done(price, Some(candidate))
}

fn capture_label(ticker: &str, kind: SourceKind) -> String {
    let safe: String = ticker
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    match kind {
        SourceKind::QuotePage => format!("{safe}_finance"),
        SourceKind::SearchPage => format!("{safe}_search"),
        SourceKind::RawFallback => format!("{safe}_raw"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_url_is_templated_on_symbol() {
        let s = PipelineSettings::default();
        assert_eq!(
            s.quote_url_for("PETR4:BVMF").unwrap().as_str(),
            "https://www.google.com/finance/quote/PETR4:BVMF"
        );
    }

    #[test]
    fn search_url_replaces_colons_in_raw_ticker() {
        let s = PipelineSettings {
            search_url: "https://search.test/?q=acao+{ticker}".into(),
            ..PipelineSettings::default()
        };
        let url = s.search_url_for("petr4:bvmf").unwrap();
        assert_eq!(url.as_str(), "https://search.test/?q=acao+petr4+bvmf");
    }

    #[test]
    fn capture_labels_are_filesystem_safe() {
        assert_eq!(capture_label("petr4", SourceKind::QuotePage), "petr4_finance");
        assert_eq!(capture_label("../x", SourceKind::SearchPage), "___x_search");
    }
}
