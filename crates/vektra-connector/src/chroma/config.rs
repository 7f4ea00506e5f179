//! Chroma configuration.

use serde::{Deserialize, Serialize};

/// Chroma configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromaConfig {
    /// Base URL of the instance, e.g. `http://localhost:8000`.
    pub instance_url: String,
    /// Static auth token, if the instance requires one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Header the token is sent in. Defaults to `X-Api-Key`; when set to
    /// `Authorization` the token is sent as a bearer credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token_header: Option<String>,
}

impl ChromaConfig {
    /// Creates a new Chroma configuration.
    pub fn new(instance_url: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into(),
            auth_token: None,
            auth_token_header: None,
        }
    }

    /// Sets the auth token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the auth token header name.
    pub fn with_auth_token_header(mut self, header: impl Into<String>) -> Self {
        self.auth_token_header = Some(header.into());
        self
    }

    /// Returns the header name/value pair for authenticated requests.
    pub(crate) fn auth_header(&self) -> Option<(String, String)> {
        let token = self.auth_token.as_ref()?;
        let header = self.auth_token_header.as_deref().unwrap_or("X-Api-Key");
        let value = if header == "Authorization" {
            format!("Bearer {token}")
        } else {
            token.clone()
        };
        Some((header.to_string(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_header_gets_bearer_prefix() {
        let config = ChromaConfig::new("http://localhost:8000")
            .with_auth_token("tok")
            .with_auth_token_header("Authorization");
        assert_eq!(
            config.auth_header(),
            Some(("Authorization".into(), "Bearer tok".into()))
        );

        let config = ChromaConfig::new("http://localhost:8000").with_auth_token("tok");
        assert_eq!(config.auth_header(), Some(("X-Api-Key".into(), "tok".into())));

        assert_eq!(ChromaConfig::new("http://localhost:8000").auth_header(), None);
    }
}
