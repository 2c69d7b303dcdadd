//! Runtime settings, read from the environment and overridable from the CLI.

use std::env;
use std::time::Duration;

pub const ENV_LOCATIONIQ_KEY: &str = "LOCATIONIQ_KEY";
pub const ENV_USER_AGENT: &str = "HORA_USER_AGENT";
pub const ENV_HTTP_TIMEOUT: &str = "HORA_HTTP_TIMEOUT_SECS";

/// Placeholder agent. Nominatim's usage policy asks for an agent that
/// identifies the application and a contact; production deployments must
/// set `HORA_USER_AGENT`, e.g. `myapp/1.0 (ops@example.org)`.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "HoraChronos/",
    env!("CARGO_PKG_VERSION"),
    " (birth-place resolver; no contact configured, set HORA_USER_AGENT)"
);
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Enables the keyed LocationIQ providers at the head of both chains.
    pub locationiq_key: Option<String>,
    /// Sent to Nominatim, whose usage policy requires an identifying agent.
    pub user_agent: String,
    /// Per-call timeout; a call that exceeds it counts as a provider failure.
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locationiq_key: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source (for testing).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let locationiq_key = lookup(ENV_LOCATIONIQ_KEY)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let user_agent = lookup(ENV_USER_AGENT)
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or(defaults.user_agent);
        let timeout = lookup(ENV_HTTP_TIMEOUT)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            locationiq_key,
            user_agent,
            timeout,
        }
    }

    pub fn with_locationiq_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.locationiq_key = Some(key);
        }
        self
    }

    pub fn with_timeout_secs(mut self, secs: Option<u64>) -> Self {
        if let Some(secs) = secs.filter(|s| *s > 0) {
            self.timeout = Duration::from_secs(secs);
        }
        self
    }

    /// True when no identifying agent was configured.
    pub fn uses_default_user_agent(&self) -> bool {
        self.user_agent == DEFAULT_USER_AGENT
    }

    /// The shared blocking HTTP agent used by every network provider.
    pub fn http_agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
    }
}
