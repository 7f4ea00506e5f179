//! Pinecone configuration.

use serde::{Deserialize, Serialize};

/// Environment name of Pinecone's free starter tier.
///
/// Starter indexes have no namespaces, no `deleteAll`, and upserts may take
/// tens of seconds to become visible.
pub(crate) const STARTER_TIER_ENVIRONMENT: &str = "gcp-starter";

/// Pinecone configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PineconeConfig {
    /// Pinecone API key.
    pub api_key: String,
    /// Environment (e.g., "us-east-1-aws").
    pub environment: String,
    /// Index name.
    pub index: String,
}

impl PineconeConfig {
    /// Creates a new Pinecone configuration.
    pub fn new(
        api_key: impl Into<String>,
        environment: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            environment: environment.into(),
            index: index.into(),
        }
    }

    /// Returns true when the index lives on the free starter tier.
    pub fn is_starter_tier(&self) -> bool {
        self.environment == STARTER_TIER_ENVIRONMENT
    }

    /// Index controller URL used to describe the index.
    pub fn controller_url(&self) -> String {
        format!(
            "https://controller.{}.pinecone.io/databases/{}",
            self.environment, self.index
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_tier_is_detected_from_environment() {
        assert!(PineconeConfig::new("k", "gcp-starter", "idx").is_starter_tier());
        assert!(!PineconeConfig::new("k", "us-east-1-aws", "idx").is_starter_tier());
    }
}
