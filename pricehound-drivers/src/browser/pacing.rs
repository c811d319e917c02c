use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Human-like random pause before each navigation.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    min_ms: u64,
    max_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(300, 1200)
    }
}

impl Pacing {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: max_ms.max(min_ms),
        }
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn next_delay(&self) -> Duration {
        let ms = OsRng.gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}
