//! Extension categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The role an extension plays towards the orchestrator.
///
/// The category is the first path segment of every extension route and the
/// name of the field carrying the extension name during self-registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionCategory {
    Driver,
    Actor,
    Reporter,
}

impl ExtensionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Actor => "actor",
            Self::Reporter => "reporter",
        }
    }

    /// Whether extensions of this category take `execute` requests.
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Driver | Self::Actor)
    }
}

impl fmt::Display for ExtensionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtensionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "driver" => Ok(Self::Driver),
            "actor" => Ok(Self::Actor),
            "reporter" => Ok(Self::Reporter),
            other => Err(format!("unknown extension category: {}", other)),
        }
    }
}
