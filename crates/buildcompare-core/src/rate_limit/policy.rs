use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Named admission policy an endpoint is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyName {
    Default,
    Scraping,
    Auth,
}

impl PolicyName {
    pub const ALL: [Self; 3] = [Self::Default, Self::Scraping, Self::Auth];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Scraping => "scraping",
            Self::Auth => "auth",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Default => 0,
            Self::Scraping => 1,
            Self::Auth => 2,
        }
    }
}

impl Display for PolicyName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyName {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "scraping" => Ok(Self::Scraping),
            "auth" => Ok(Self::Auth),
            other => Err(ValidationError::InvalidPolicy {
                value: other.to_owned(),
            }),
        }
    }
}

/// Fixed-window threshold: at most `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: PolicyName,
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitPolicy {
    pub fn new(name: PolicyName, window: Duration, max_requests: u32) -> Self {
        Self {
            name,
            window,
            max_requests: max_requests.max(1),
        }
    }

    /// General API traffic: 100 requests per minute.
    pub fn default_policy() -> Self {
        Self::new(PolicyName::Default, Duration::from_secs(60), 100)
    }

    /// Price lookups and analysis: 10 requests per minute.
    pub fn scraping() -> Self {
        Self::new(PolicyName::Scraping, Duration::from_secs(60), 10)
    }

    /// Credential attempts: 5 requests per 15 minutes.
    pub fn auth() -> Self {
        Self::new(PolicyName::Auth, Duration::from_secs(15 * 60), 5)
    }

    pub fn default_for(name: PolicyName) -> Self {
        match name {
            PolicyName::Default => Self::default_policy(),
            PolicyName::Scraping => Self::scraping(),
            PolicyName::Auth => Self::auth(),
        }
    }

    pub fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Complete set of policies, one per [`PolicyName`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    policies: [RateLimitPolicy; 3],
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            policies: PolicyName::ALL.map(RateLimitPolicy::default_for),
        }
    }
}

impl PolicyTable {
    /// Replaces the thresholds of the policy with the same name.
    pub fn with_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.policies[policy.name.index()] = policy;
        self
    }

    pub fn get(&self, name: PolicyName) -> &RateLimitPolicy {
        &self.policies[name.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RateLimitPolicy> {
        self.policies.iter()
    }
}
