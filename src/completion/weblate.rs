use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::{
    Client, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;

use super::{CompletionMap, CompletionSource};
use crate::error::CompletionError;

/// One entry of the project statistics endpoint. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct LanguageStatistics {
    code: String,
    translated_percent: f64,
}

/// Reads per-language completion from a Weblate project.
pub struct WeblateClient {
    client: Client,
    base_url: String,
    project: String,
}

impl WeblateClient {
    /// Build a client authenticating with `api_key`.
    /// TLS peers are verified against the bundled root store.
    pub fn new(base_url: &str, project: &str, api_key: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let mut auth_value = HeaderValue::from_str(&format!("Token {}", key))?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using translation service API key for authentication");
        }

        let client = Client::builder()
            .user_agent(concat!("langpack/", env!("LANGPACK_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
        })
    }

    pub fn statistics_url(&self) -> String {
        format!(
            "{}/api/projects/{}/statistics/?format=json",
            self.base_url, self.project
        )
    }
}

#[async_trait]
impl CompletionSource for WeblateClient {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self) -> Result<CompletionMap, CompletionError> {
        let url = self.statistics_url();
        debug!("Fetching translation statistics from {}...", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(CompletionError::HttpStatus(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let entries: Vec<LanguageStatistics> =
            serde_json::from_str(&body).map_err(|e| CompletionError::Parse(e.to_string()))?;

        debug!("Received completion for {} language(s)", entries.len());

        Ok(entries
            .into_iter()
            .map(|entry| (entry.code, entry.translated_percent))
            .collect())
    }
}
