//! Node tunables.
//!
//! Every timeout in the protocol is derived from the maintenance period so a
//! whole ring can be sped up (tests) or slowed down by changing one value.

use std::time::Duration;

const DEFAULT_MAINTAIN_PERIOD: Duration = Duration::from_millis(250);
const DEFAULT_LOOKUP_HOPS: usize = 32;
const DEFAULT_GET_ATTEMPTS: usize = 5;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(300);
const DEFAULT_JOIN_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Sleep between two iterations of each maintenance loop.
    pub maintain_period: Duration,
    /// Maximum number of forwards a single FindSuccessor may take.
    pub lookup_hops: usize,
    /// Bounded number of Get attempts made by the façade.
    pub get_attempts: usize,
    /// Delay between façade-level retries of Put/Get/Delete.
    pub retry_delay: Duration,
    /// Delay before the single Join retry.
    pub join_retry_delay: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            maintain_period: DEFAULT_MAINTAIN_PERIOD,
            lookup_hops: DEFAULT_LOOKUP_HOPS,
            get_attempts: DEFAULT_GET_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            join_retry_delay: DEFAULT_JOIN_RETRY_DELAY,
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by `CHORD_*` environment variables when present.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_u64("CHORD_MAINTAIN_PERIOD_MS") {
            config.maintain_period = Duration::from_millis(ms);
        }
        if let Some(hops) = env_u64("CHORD_LOOKUP_HOPS") {
            config.lookup_hops = hops as usize;
        }
        if let Some(attempts) = env_u64("CHORD_GET_ATTEMPTS") {
            config.get_attempts = attempts.max(1) as usize;
        }
        if let Some(ms) = env_u64("CHORD_RETRY_DELAY_MS") {
            config.retry_delay = Duration::from_millis(ms);
        }

        config
    }

    /// Upper bound for one remote call, connection included.
    pub fn call_timeout(&self) -> Duration {
        self.maintain_period * 2
    }

    /// Upper bound for one liveness connect attempt.
    pub fn probe_timeout(&self) -> Duration {
        self.maintain_period
    }

    pub fn probe_spacing(&self) -> Duration {
        self.maintain_period / 2
    }

    /// How long a freshly joined node waits for the ring to pick it up.
    pub fn join_settle(&self) -> Duration {
        self.maintain_period * 3
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.maintain_period, Duration::from_millis(250));
        assert_eq!(config.lookup_hops, 32);
        assert_eq!(config.get_attempts, 5);
    }

    #[test]
    fn test_derived_timeouts_follow_period() {
        let config = NodeConfig {
            maintain_period: Duration::from_millis(100),
            ..Default::default()
        };
        assert_eq!(config.call_timeout(), Duration::from_millis(200));
        assert_eq!(config.probe_timeout(), Duration::from_millis(100));
        assert_eq!(config.probe_spacing(), Duration::from_millis(50));
        assert_eq!(config.join_settle(), Duration::from_millis(300));
    }
}
