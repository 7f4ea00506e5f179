//! Embedder configuration.

use serde::{Deserialize, Serialize};

fn default_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_dimensions() -> usize {
    1536
}

/// OpenAI embedder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// OpenAI API key.
    pub api_key: String,
    /// Embedding model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Embedding width of the model.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl EmbedderConfig {
    /// Creates a configuration for the default model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: default_model(),
            dimensions: default_dimensions(),
        }
    }

    /// Sets the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the embedding width.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_and_width_default_to_ada() {
        let config: EmbedderConfig =
            serde_json::from_value(serde_json::json!({ "api_key": "sk-test" })).unwrap();
        assert_eq!(config.model, "text-embedding-ada-002");
        assert_eq!(config.dimensions, 1536);
    }
}
