//! Ordered, data-driven strategies for locating price text in a page.
//!
//! A [`StrategyChain`] is a list of [`Strategy`] descriptors tried in order
//! against one [`PageSource`]. Structural strategies select DOM nodes;
//! source-pattern strategies run regexes over the raw markup.
use pricehound_common::{PageSource, SourceKind};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::normalize::looks_numeric;
use crate::PipelineError;

/// Most specific locator for the quote page's last price.
pub const PRIMARY_PRICE_LOCATOR: &str = "div.YMlKec.fxKbKc";

const QUOTE_ALTERNATIVE_LOCATORS: [&str; 5] = [
    "div.YMlKec",
    "div.kf1m0",
    r#"span[jsname="vWLAgc"]"#,
    r#"div[aria-label="Last price"]"#,
    "div.P6K39c.W9Ufie div.YMlKec",
];

const SEARCH_LOCATORS: [&str; 3] = [
    r#"div[data-attrid*="Price"] span"#,
    "div.BNeawe.iBp4i",
    "div.BNeawe.tAd8D.AP7Wnd",
];

const CURRENCY_MARKER: &str = "R$";

const SOURCE_PATTERNS: [(&str, &str); 3] = [
    ("currency_prefixed", r"R\$\s*(\d+[,.]\d+)"),
    ("currency_word", r"(\d+[,.]\d+)\s*reais"),
    ("bare_decimal", r"(\d+[,.]\d+)"),
];

/// Raw price text found by a strategy, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCandidate {
    pub text: String,
    pub strategy: &'static str,
    pub locator: String,
    pub source: SourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// First match is taken as-is.
    Unconditional,
    /// First match in document order that passes [`looks_numeric`].
    LooksNumeric,
}

#[derive(Debug, Clone)]
pub enum Locator {
    Css { query: String, selector: Selector },
    /// Elements whose own text nodes contain `needle`.
    OwnText {
        tag: String,
        selector: Selector,
        needle: String,
    },
}

impl Locator {
    pub fn css(query: &str) -> Result<Self, PipelineError> {
        Ok(Self::Css {
            query: query.to_string(),
            selector: parse_selector(query)?,
        })
    }

    pub fn own_text(tag: &str, needle: &str) -> Result<Self, PipelineError> {
        Ok(Self::OwnText {
            tag: tag.to_string(),
            selector: parse_selector(tag)?,
            needle: needle.to_string(),
        })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Css { query, .. } => query.clone(),
            Self::OwnText { tag, needle, .. } => format!("{tag}:own-text({needle})"),
        }
    }

    fn matches<'a>(&'a self, doc: &'a Html) -> Box<dyn Iterator<Item = ElementRef<'a>> + 'a> {
        match self {
            Self::Css { selector, .. } => Box::new(doc.select(selector)),
            Self::OwnText {
                selector, needle, ..
            } => Box::new(doc.select(selector).filter(move |el| {
                el.children()
                    .filter_map(|n| n.value().as_text())
                    .any(|t| t.contains(needle.as_str()))
            })),
        }
    }
}

fn parse_selector(query: &str) -> Result<Selector, PipelineError> {
    Selector::parse(query).map_err(|e| PipelineError::InvalidLocator {
        locator: query.to_string(),
        reason: e.to_string(),
    })
}

/// One structural locator plus its acceptance predicate.
#[derive(Debug, Clone)]
pub struct StrategyDescriptor {
    pub name: &'static str,
    pub locator: Locator,
    pub accept: Acceptance,
}

impl StrategyDescriptor {
    fn find(&self, doc: &Html, kind: SourceKind) -> Option<ExtractionCandidate> {
        let mut texts = self.locator.matches(doc).map(|el| element_text(&el));
        let text = match self.accept {
            Acceptance::Unconditional => texts.next().filter(|t| !t.is_empty()),
            Acceptance::LooksNumeric => texts.find(|t| looks_numeric(t)),
        }?;
        Some(ExtractionCandidate {
            text,
            strategy: self.name,
            locator: self.locator.describe(),
            source: kind,
        })
    }
}

/// Regex over the raw source; capture group 1 is the candidate.
#[derive(Debug, Clone)]
pub struct SourcePattern {
    pub name: &'static str,
    pub regex: Regex,
}

impl SourcePattern {
    fn find(&self, html: &str, kind: SourceKind) -> Option<ExtractionCandidate> {
        let caps = self.regex.captures(html)?;
        let text = caps.get(1).unwrap_or(caps.get(0)?).as_str().to_string();
        Some(ExtractionCandidate {
            text,
            strategy: self.name,
            locator: self.regex.as_str().to_string(),
            source: kind,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Strategy {
    Structural(StrategyDescriptor),
    Pattern(SourcePattern),
}

/// Fixed-order strategies for one source kind.
#[derive(Debug, Clone)]
pub struct StrategyChain {
    strategies: Vec<Strategy>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Strategy>) -> Self {
        Self { strategies }
    }

    /// The built-in chain for a source kind.
    pub fn for_kind(kind: SourceKind) -> Result<Self, PipelineError> {
        match kind {
            SourceKind::QuotePage => Self::quote_page(),
            SourceKind::SearchPage => Self::search_page(),
            SourceKind::RawFallback => Self::raw_fallback(),
        }
    }

    /// Primary locator accepted unconditionally, then looser locators
    /// that must look numeric.
    pub fn quote_page() -> Result<Self, PipelineError> {
        let mut strategies = vec![Strategy::Structural(StrategyDescriptor {
            name: "primary",
            locator: Locator::css(PRIMARY_PRICE_LOCATOR)?,
            accept: Acceptance::Unconditional,
        })];
        for query in QUOTE_ALTERNATIVE_LOCATORS {
            strategies.push(Strategy::Structural(StrategyDescriptor {
                name: "alternative",
                locator: Locator::css(query)?,
                accept: Acceptance::LooksNumeric,
            }));
        }
        Ok(Self::new(strategies))
    }

    /// Broad search-result markup and elements carrying a currency marker.
    pub fn search_page() -> Result<Self, PipelineError> {
        let mut strategies = Vec::with_capacity(SEARCH_LOCATORS.len() + 2);
        for query in SEARCH_LOCATORS {
            strategies.push(Strategy::Structural(StrategyDescriptor {
                name: "search_markup",
                locator: Locator::css(query)?,
                accept: Acceptance::LooksNumeric,
            }));
        }
        for tag in ["span", "div"] {
            strategies.push(Strategy::Structural(StrategyDescriptor {
                name: "currency_marker",
                locator: Locator::own_text(tag, CURRENCY_MARKER)?,
                accept: Acceptance::LooksNumeric,
            }));
        }
        Ok(Self::new(strategies))
    }

    /// Regexes over the whole source, most specific first.
    pub fn raw_fallback() -> Result<Self, PipelineError> {
        let strategies = SOURCE_PATTERNS
            .into_iter()
            .map(|(name, pattern)| {
                Ok(Strategy::Pattern(SourcePattern {
                    name,
                    regex: Regex::new(pattern)?,
                }))
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        Ok(Self::new(strategies))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// First candidate produced by the chain, or `None` once every
    /// strategy is exhausted.
    pub fn extract(&self, source: &PageSource) -> Option<ExtractionCandidate> {
        let mut doc: Option<Html> = None;
        for strategy in &self.strategies {
            let found = match strategy {
                Strategy::Structural(desc) => {
                    let doc = doc.get_or_insert_with(|| Html::parse_document(&source.html));
                    desc.find(doc, source.kind)
                }
                Strategy::Pattern(pattern) => pattern.find(&source.html, source.kind),
            };
            if let Some(candidate) = found {
                tracing::debug!(
                    source = %source.kind,
                    strategy = candidate.strategy,
                    locator = %candidate.locator,
                    text = %candidate.text,
                    "extract.candidate"
                );
                return Some(candidate);
            }
        }
        None
    }
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
