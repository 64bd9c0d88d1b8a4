use std::time::Duration;

/// Default interval between pull rounds over the active collectors.
pub const DEFAULT_PULL_INTERVAL: Duration = Duration::from_secs(5);

/// Default interval between start attempts for candidate collectors.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);

const PULL_INTERVAL_ENV: &str = "METASTORE_PULL_INTERVAL_SECS";
const RETRY_INTERVAL_ENV: &str = "METASTORE_RETRY_INTERVAL_SECS";

/// Scheduling configuration of a [`Store`](super::Store).
///
/// The pull interval doubles as the deadline for each pull: a pull still
/// running when the next tick is due is cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub pull_interval: Duration,
    pub retry_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pull_interval: DEFAULT_PULL_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl StoreConfig {
    /// Builds a configuration from the environment, falling back to the
    /// defaults for unset or invalid variables.
    ///
    /// Honors `METASTORE_PULL_INTERVAL_SECS` and
    /// `METASTORE_RETRY_INTERVAL_SECS`, both in whole seconds.
    pub fn from_env() -> Self {
        Self {
            pull_interval: interval_from_env(PULL_INTERVAL_ENV, DEFAULT_PULL_INTERVAL),
            retry_interval: interval_from_env(RETRY_INTERVAL_ENV, DEFAULT_RETRY_INTERVAL),
        }
    }
}

fn interval_from_env(var: &str, default: Duration) -> Duration {
    let Ok(raw) = std::env::var(var) else {
        return default;
    };

    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            log::warn!("invalid value `{raw}` for `{var}`, using default of {default:?}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.pull_interval, Duration::from_secs(5));
        assert_eq!(config.retry_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_env_value_falls_back_to_default() {
        assert_eq!(
            interval_from_env("METASTORE_TEST_UNSET_INTERVAL", DEFAULT_PULL_INTERVAL),
            DEFAULT_PULL_INTERVAL
        );
    }
}
