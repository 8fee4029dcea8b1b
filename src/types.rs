use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A subject extracted from (or added to) a transcript, with the reason it was picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub topic: String,
    #[serde(default)]
    pub context: String,
    #[serde(default = "default_checked")]
    pub checked: bool,
}

fn default_checked() -> bool {
    true
}

impl Topic {
    pub fn new(topic: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            context: context.into(),
            checked: true,
        }
    }
}

/// A link as a provider returned it. Nothing about it is trusted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A topic bundled with the links found for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedTopic {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub links: Vec<RawLink>,
}

/// The final, user-facing record: one topic paired with one discovered link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkItem {
    pub id: String,
    pub topic: String,
    pub url: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub checked: bool,
}

/// The capability used to discover links for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// The text-generation capability, asked for sources directly.
    Primary,
    /// The web search capability.
    Secondary,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Primary => "generation provider",
            Provider::Secondary => "search provider",
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "generation" => Ok(Provider::Primary),
            "secondary" | "search" => Ok(Provider::Secondary),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// A provider credential supplied by the caller.
///
/// Construction only fails for blank input; provider-specific key formats are the
/// provider's business and are not sniffed here.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}
