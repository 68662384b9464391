//! Application configuration

use std::time::Duration;

use mortar_core::RuntimeConfig;
use mortar_platform::WindowConfig;

/// Environment variable overriding [`AppConfig::frame_delay`], in milliseconds
pub const FRAME_DELAY_ENV: &str = "MORTAR_FRAME_DELAY_MS";

/// Settings for one window root
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// How long the window waits after the first damage of a burst before
    /// repainting. Damage arriving in the meantime joins the same frame.
    pub frame_delay: Duration,
    pub runtime: RuntimeConfig,
    pub window: WindowConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frame_delay: Duration::from_millis(16),
            runtime: RuntimeConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the frame delay taken from `MORTAR_FRAME_DELAY_MS` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(delay) = parse_frame_delay(std::env::var(FRAME_DELAY_ENV).ok().as_deref()) {
            config.frame_delay = delay;
        }
        config
    }

    pub fn frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    pub fn runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }
}

fn parse_frame_delay(value: Option<&str>) -> Option<Duration> {
    let value = value?;
    match value.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            tracing::warn!(%value, error = %e, "ignoring invalid {FRAME_DELAY_ENV}");
            None
        }
    }
}
