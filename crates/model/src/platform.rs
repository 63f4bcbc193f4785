use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// External platform kinds an organization can connect.
///
/// Only `Commerce` and `Payments` push webhooks; the others are populated by
/// historical sync alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Commerce,
    Payments,
    WebAnalytics,
    Ads,
    EmailMarketing,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Commerce,
        Platform::Payments,
        Platform::WebAnalytics,
        Platform::Ads,
        Platform::EmailMarketing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Commerce => "commerce",
            Platform::Payments => "payments",
            Platform::WebAnalytics => "web_analytics",
            Platform::Ads => "ads",
            Platform::EmailMarketing => "email_marketing",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| ModelError::UnknownPlatform(s.to_string()))
    }
}
