//! Tuning knobs for the mining pipeline.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for content acquisition.
#[derive(Debug, Clone)]
pub struct MiningConfig {
    /// Timeout for the lightweight static fetch.
    pub static_timeout: Duration,
    /// Base timeout for the first scripted navigation attempt. The retry
    /// attempt gets 1.5x this value.
    pub navigation_timeout: Duration,
    /// Best-effort wait for network quiescence after navigation.
    pub quiescence_timeout: Duration,
    /// Best-effort wait for a requested target selector.
    pub selector_timeout: Duration,
    /// Fixed settle interval when no selector was requested.
    pub settle_interval: Duration,
    /// Block images/fonts/stylesheets/media during scripted rendering.
    pub block_resources: bool,
    /// Explicit Chrome/Chromium executable; autodetected when unset.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            static_timeout: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(20),
            quiescence_timeout: Duration::from_secs(3),
            selector_timeout: Duration::from_secs(5),
            settle_interval: Duration::from_secs(2),
            block_resources: true,
            chrome_executable: None,
        }
    }
}

impl MiningConfig {
    /// Apply environment overrides on top of the defaults.
    ///
    /// Unset or unparseable variables keep their default; config never
    /// fails the pipeline.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_u64("MINING_STATIC_TIMEOUT_SECS") {
            config.static_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("MINING_NAVIGATION_TIMEOUT_SECS") {
            config.navigation_timeout = Duration::from_secs(secs);
        }
        if let Ok(value) = std::env::var("MINING_BLOCK_RESOURCES") {
            config.block_resources = value != "0" && !value.eq_ignore_ascii_case("false");
        }
        if let Ok(path) = std::env::var("CHROME_EXECUTABLE") {
            if !path.is_empty() {
                config.chrome_executable = Some(PathBuf::from(path));
            }
        }
        config
    }

    /// Timeout for the relaxed retry navigation attempt.
    pub fn retry_navigation_timeout(&self) -> Duration {
        self.navigation_timeout + self.navigation_timeout / 2
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_timeout_is_one_and_a_half_times_base() {
        let config = MiningConfig {
            navigation_timeout: Duration::from_secs(20),
            ..Default::default()
        };
        assert_eq!(config.retry_navigation_timeout(), Duration::from_secs(30));
    }
}
