//! Environment-derived configuration.
//!
//! Every bounded wait and sweep interval in the core is configurable via
//! environment variables; invalid values fall back to the defaults with a
//! warning rather than failing startup.

use std::time::Duration;

use tracing::warn;

/// Tunable durations for the session and lifecycle layers.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hard deadline for one-shot script execution.
    pub exec_timeout: Duration,
    /// Idle duration after which a session is force-closed.
    pub idle_timeout: Duration,
    /// Interval of the idle-session sweep.
    pub idle_sweep_interval: Duration,
    /// Cool-off a released number spends in `Aging` before reuse.
    pub aging_period: Duration,
    /// Configured reservation lifetime. Present as policy only: the sweep
    /// does not auto-expire reservations (see `lifecycle`).
    pub reservation_period: Duration,
    /// Interval of the lifecycle aging sweep.
    pub lifecycle_sweep_interval: Duration,
    /// Bounded wait for a session to reach `Connected`.
    pub connect_timeout: Duration,
    /// Bounded wait for a compound command's completion markers.
    pub completion_timeout: Duration,
    /// Poll interval while waiting on completion markers.
    pub completion_poll: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exec_timeout: Duration::from_secs(120),
            idle_timeout: Duration::from_secs(30 * 60),
            idle_sweep_interval: Duration::from_secs(5 * 60),
            aging_period: Duration::from_secs(24 * 60 * 60),
            reservation_period: Duration::from_secs(7 * 24 * 60 * 60),
            lifecycle_sweep_interval: Duration::from_secs(60 * 60),
            connect_timeout: Duration::from_secs(30),
            completion_timeout: Duration::from_secs(60),
            completion_poll: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Builds a config from the environment, falling back per field.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            exec_timeout: env_secs("LINECTL_EXEC_TIMEOUT_SECS", d.exec_timeout),
            idle_timeout: env_secs("LINECTL_IDLE_TIMEOUT_SECS", d.idle_timeout),
            idle_sweep_interval: env_secs("LINECTL_IDLE_SWEEP_SECS", d.idle_sweep_interval),
            aging_period: env_secs("LINECTL_AGING_SECS", d.aging_period),
            reservation_period: env_secs("LINECTL_RESERVATION_SECS", d.reservation_period),
            lifecycle_sweep_interval: env_secs(
                "LINECTL_LIFECYCLE_SWEEP_SECS",
                d.lifecycle_sweep_interval,
            ),
            connect_timeout: env_secs("LINECTL_CONNECT_TIMEOUT_SECS", d.connect_timeout),
            completion_timeout: env_secs("LINECTL_COMPLETION_TIMEOUT_SECS", d.completion_timeout),
            completion_poll: env_millis("LINECTL_COMPLETION_POLL_MS", d.completion_poll),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(target = "linectl", %key, value = %raw, "ignoring unparsable duration");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(target = "linectl", %key, value = %raw, "ignoring unparsable duration");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.idle_timeout, Duration::from_secs(1800));
        assert_eq!(c.idle_sweep_interval, Duration::from_secs(300));
        assert_eq!(c.connect_timeout, Duration::from_secs(30));
        assert_eq!(c.completion_timeout, Duration::from_secs(60));
        assert_eq!(c.completion_poll, Duration::from_millis(500));
        assert_eq!(c.lifecycle_sweep_interval, Duration::from_secs(3600));
    }

    #[test]
    fn env_override_and_fallback() {
        // SAFETY: variable names are unique to this test.
        unsafe { std::env::set_var("LINECTL_TEST_SECS_OK", "90") };
        unsafe { std::env::set_var("LINECTL_TEST_SECS_BAD", "ninety") };
        assert_eq!(
            env_secs("LINECTL_TEST_SECS_OK", Duration::from_secs(1)),
            Duration::from_secs(90)
        );
        assert_eq!(
            env_secs("LINECTL_TEST_SECS_BAD", Duration::from_secs(1)),
            Duration::from_secs(1)
        );
        unsafe { std::env::remove_var("LINECTL_TEST_SECS_OK") };
        unsafe { std::env::remove_var("LINECTL_TEST_SECS_BAD") };
    }
}
