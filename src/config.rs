//! # Runtime and file configuration.
//!
//! Provides [`SupervisorConfig`] centralized settings for the supervisor runtime, and
//! [`FileConfig`] the JSON document the binary loads at process start.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global semaphore created)
//! - `job_timeout = 0s` → no per-invocation timeout
//!
//! ## File format
//! ```json
//! {
//!   "loggingLevel": "info",
//!   "service": { "name": "video-catalog", "address": "127.0.0.1:50101" },
//!   "schedules": { "addSampleUser": ["every 10 seconds"] },
//!   "supervisor": { "graceMs": 30000, "maxConcurrent": 4 },
//!   "startup": { "maxRetries": 10, "delayMs": 10000 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::RuntimeError;
use crate::jobs::ScheduleConfig;
use crate::policies::{BackoffPolicy, RetryPolicy};

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `service`: name of the dependency whose availability gates all jobs
/// - `grace`: maximum wait for executors to finish after stop (`0s` = no wait)
/// - `max_concurrent`: job invocation concurrency limit (`0` = unlimited)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `job_retry`: retry budget and backoff per occurrence
/// - `job_timeout`: per-invocation timeout (`0s` = no timeout)
/// - `reacquire_delay`: monitor pause after an acquire or watch failure
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Monitored dependency.
    pub service: String,

    /// Maximum time [`Supervisor::shutdown`](crate::Supervisor::shutdown) waits for
    /// cancelled executors to finish their in-flight invocation.
    pub grace: Duration,

    /// Maximum number of job invocations running at once across all executors.
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Retry policy applied to every occurrence.
    pub job_retry: RetryPolicy,

    /// Per-invocation timeout.
    pub job_timeout: Duration,

    /// Fixed delay before the monitor re-acquires a connection after a failure.
    pub reacquire_delay: Duration,
}

impl SupervisorConfig {
    /// Returns the concurrency limit as an `Option` (`None` = unlimited).
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the per-invocation timeout as an `Option` (`None` = no timeout).
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        if self.job_timeout == Duration::ZERO {
            None
        } else {
            Some(self.job_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `service = "video-catalog"`
    /// - `grace = 60s`
    /// - `max_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `job_retry = 10 retries, exponential, base 2s`
    /// - `job_timeout = 0s` (no timeout)
    /// - `reacquire_delay = 5s`
    fn default() -> Self {
        Self {
            service: "video-catalog".to_string(),
            grace: Duration::from_secs(60),
            max_concurrent: 0,
            bus_capacity: 1024,
            job_retry: RetryPolicy::default(),
            job_timeout: Duration::ZERO,
            reacquire_delay: Duration::from_secs(5),
        }
    }
}

/// Monitored dependency as written in the configuration file.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSection {
    /// Service name.
    pub name: String,
    /// `host:port` endpoint.
    pub address: String,
}

/// Optional overrides of [`SupervisorConfig`] defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SupervisorSection {
    pub grace_ms: Option<u64>,
    pub max_concurrent: Option<usize>,
    pub bus_capacity: Option<usize>,
    pub job_timeout_ms: Option<u64>,
    pub reacquire_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_base_ms: Option<u64>,
}

/// Startup dependency check retry budget (fixed backoff).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupSection {
    #[serde(default = "StartupSection::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "StartupSection::default_delay_ms")]
    pub delay_ms: u64,
}

impl StartupSection {
    fn default_max_retries() -> u32 {
        10
    }

    fn default_delay_ms() -> u64 {
        10_000
    }

    /// The check's retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            BackoffPolicy::fixed(Duration::from_millis(self.delay_ms)),
        )
    }
}

impl Default for StartupSection {
    fn default() -> Self {
        Self {
            max_retries: Self::default_max_retries(),
            delay_ms: Self::default_delay_ms(),
        }
    }
}

/// Top-level configuration file.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "FileConfig::default_logging_level")]
    pub logging_level: String,
    /// Monitored dependency.
    pub service: ServiceSection,
    /// Job name → schedule expressions.
    pub schedules: ScheduleConfig,
    /// Runtime overrides.
    #[serde(default)]
    pub supervisor: SupervisorSection,
    /// Startup check budget.
    #[serde(default)]
    pub startup: StartupSection,
}

impl FileConfig {
    fn default_logging_level() -> String {
        "info".to_string()
    }

    /// Parses a JSON document.
    pub fn from_json(text: &str) -> Result<Self, RuntimeError> {
        serde_json::from_str(text).map_err(|e| RuntimeError::Config {
            reason: e.to_string(),
        })
    }

    /// Reads and parses a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RuntimeError::Config {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(&text)
    }

    /// Runtime configuration with file overrides applied to the defaults.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let mut cfg = SupervisorConfig {
            service: self.service.name.clone(),
            ..SupervisorConfig::default()
        };
        let s = &self.supervisor;
        if let Some(ms) = s.grace_ms {
            cfg.grace = Duration::from_millis(ms);
        }
        if let Some(n) = s.max_concurrent {
            cfg.max_concurrent = n;
        }
        if let Some(n) = s.bus_capacity {
            cfg.bus_capacity = n;
        }
        if let Some(ms) = s.job_timeout_ms {
            cfg.job_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = s.reacquire_delay_ms {
            cfg.reacquire_delay = Duration::from_millis(ms);
        }
        if let Some(n) = s.max_retries {
            cfg.job_retry.max_retries = n;
        }
        if let Some(ms) = s.retry_base_ms {
            cfg.job_retry.backoff.base = Duration::from_millis(ms);
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::BackoffMode;

    const SAMPLE: &str = r#"{
        "service": { "name": "video-catalog", "address": "127.0.0.1:50101" },
        "schedules": {
            "addSampleUser": ["every 10 seconds"],
            "addSampleVideo": ["every 30 seconds", "0 0 * * *"]
        },
        "supervisor": { "graceMs": 1500, "maxConcurrent": 4 }
    }"#;

    #[test]
    fn parses_and_applies_overrides() {
        let file = FileConfig::from_json(SAMPLE).unwrap();
        assert_eq!(file.logging_level, "info");
        assert_eq!(file.schedules["addSampleVideo"].len(), 2);
        assert_eq!(file.startup.max_retries, 10);

        let cfg = file.supervisor_config();
        assert_eq!(cfg.service, "video-catalog");
        assert_eq!(cfg.grace, Duration::from_millis(1500));
        assert_eq!(cfg.concurrency_limit(), Some(4));
        assert_eq!(cfg.timeout(), None);
        assert_eq!(cfg.job_retry.max_retries, 10);
        assert_eq!(cfg.job_retry.backoff.mode, BackoffMode::Exponential);
    }

    #[test]
    fn startup_policy_is_fixed() {
        let policy = StartupSection::default().retry_policy();
        assert_eq!(policy.max_attempts(), 11);
        assert_eq!(policy.backoff.next(5), Duration::from_secs(10));
    }

    #[test]
    fn rejects_unknown_supervisor_keys() {
        let text = SAMPLE.replace("graceMs", "gracems");
        let err = FileConfig::from_json(&text).unwrap_err();
        assert_eq!(err.as_label(), "runtime_config");
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, SAMPLE.as_bytes()).unwrap();

        let cfg = FileConfig::load(file.path()).unwrap();
        assert_eq!(cfg.service.address, "127.0.0.1:50101");
        assert_eq!(cfg.schedules["addSampleUser"], vec!["every 10 seconds"]);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = FileConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(err.is_config());
    }
}
