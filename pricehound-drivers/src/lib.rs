//! WebDriver-backed page fetching for Pricehound.
//!
//! - [`browser::WebDriverSessions`]: [`pricehound_common::SessionFactory`]
//!   that opens one Chrome session per invocation
//! - [`browser::WebDriverSession`]: navigation, page source and screenshots
//! - [`browser::BrowserOptions`]: Chrome arguments and capabilities
//! - [`browser::Pacing`]: human-like pauses before navigation
pub mod browser;
