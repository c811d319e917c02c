//! Locale-aware conversion of raw price text into a canonical decimal.
//!
//! Every function here is total: unparseable input collapses to
//! [`SENTINEL_PRICE`] instead of failing.
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

/// `0.0`, with one fractional digit so it renders the same way it is stored.
pub const SENTINEL_PRICE: Decimal = Decimal::from_parts(0, 0, 0, false, 1);

const CURRENCY_MARKERS: [&str; 2] = ["R$", "$"];

static NUMERIC_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+|\d+").expect("numeric token pattern"));

static LOOKS_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+[,.]\d+|\d+").expect("looks-numeric pattern"));

/// How a price value came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceOrigin {
    /// Parsed from a candidate.
    Extracted,
    /// A candidate was found but held no numeric token.
    ParseFailed,
    /// No candidate on any source.
    Sentinel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedPrice {
    pub value: Decimal,
    pub origin: PriceOrigin,
}

impl NormalizedPrice {
    pub fn extracted(value: Decimal) -> Self {
        Self {
            value,
            origin: PriceOrigin::Extracted,
        }
    }

    pub fn sentinel(origin: PriceOrigin) -> Self {
        Self {
            value: SENTINEL_PRICE,
            origin,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.origin != PriceOrigin::Extracted
    }
}

/// True when `text` contains a digit run, optionally grouped by `,` or `.`.
pub fn looks_numeric(text: &str) -> bool {
    LOOKS_NUMERIC.is_match(text)
}

/// Convert raw text to a price, or `None` when no numeric token survives.
///
/// ```
/// use pricehound_extract::normalize::parse_price;
///
/// assert_eq!(parse_price("1.234,56").unwrap().to_string(), "1234.56");
/// assert_eq!(parse_price("R$ 45.10").unwrap().to_string(), "45.10");
/// assert!(parse_price("no digits here").is_none());
/// ```
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let mut text = raw.to_string();
    for marker in CURRENCY_MARKERS {
        text = text.replace(marker, "");
    }
    let text = disambiguate_separators(text.trim());

    let token = NUMERIC_TOKEN.find(&text)?;
    Decimal::from_str(token.as_str()).ok()
}

/// [`parse_price`] with the sentinel substituted for failures.
pub fn normalize(raw: &str) -> Decimal {
    parse_price(raw).unwrap_or(SENTINEL_PRICE)
}

// Both separators: `.` groups thousands and `,` is decimal. Comma only:
// decimal comma. Dot only: already canonical.
fn disambiguate_separators(text: &str) -> String {
    match (text.contains(','), text.contains('.')) {
        (true, true) => text.replace('.', "").replace(',', "."),
        (true, false) => text.replace(',', "."),
        _ => text.to_string(),
    }
}
