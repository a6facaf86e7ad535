use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Provenance of a response's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataMode {
    /// Produced by a live upstream.
    Live,
    /// Synthetic because no upstream is configured.
    Mock,
    /// Synthetic because the configured upstream failed or returned nothing.
    MockFallback,
}

impl DataMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Mock => "mock",
            Self::MockFallback => "mock-fallback",
        }
    }

    pub const fn is_synthetic(self) -> bool {
        !matches!(self, Self::Live)
    }
}

impl Display for DataMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
