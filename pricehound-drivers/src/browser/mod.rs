pub mod options;
pub mod pacing;
pub mod session;

pub use options::BrowserOptions;
pub use pacing::Pacing;
pub use session::{WebDriverSession, WebDriverSessions};
