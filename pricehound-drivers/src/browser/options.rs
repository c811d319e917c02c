use serde::{Deserialize, Serialize};
use serde_json::json;
use webdriver::capabilities::Capabilities;

/// Chrome launch settings for a fetch session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub languages: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36".to_string(),
            viewport: (1920, 1080),
            languages: vec!["pt-BR".to_string(), "pt".to_string(), "en-US".to_string()],
        }
    }
}

impl BrowserOptions {
    /// Chrome command-line arguments for these options.
    pub fn chrome_arguments(&self) -> Vec<String> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-infobars".to_string(),
            "--disable-extensions".to_string(),
            format!("--user-agent={}", self.user_agent),
            format!("--window-size={},{}", self.viewport.0, self.viewport.1),
            format!("--lang={}", self.languages.join(",")),
        ];
        if self.headless {
            args.push("--headless".to_string());
            args.push("--disable-gpu".to_string());
        }
        args
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": self.chrome_arguments() }),
        );
        caps
    }
}

/// Hides the most obvious automation markers after each navigation.
pub const EVASION_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    if (!window.chrome) window.chrome = { runtime: {} };
"#;
