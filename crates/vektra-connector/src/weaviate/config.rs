//! Weaviate configuration.

use serde::{Deserialize, Serialize};

/// Weaviate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaviateConfig {
    /// Cluster URL, e.g. `http://localhost:8080`.
    pub cluster_url: String,
    /// API key for managed clusters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl WeaviateConfig {
    /// Creates a new Weaviate configuration.
    pub fn new(cluster_url: impl Into<String>) -> Self {
        Self {
            cluster_url: cluster_url.into(),
            api_key: None,
        }
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}
