use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::{credential, read_json, status_error, TranslationProvider};
use crate::error::{TranslationError, TranslationResult};
use crate::models::{ProviderId, Translation, Word};
use crate::settings::{SettingsStore, API_KEY};

pub const DEFAULT_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    data: GoogleData,
}

#[derive(Debug, Deserialize)]
struct GoogleData {
    translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTranslation {
    translated_text: String,
}

/// Paid API-key translator without a tracked quota
pub struct GoogleProvider {
    client: reqwest::Client,
    endpoint: String,
    settings: Arc<dyn SettingsStore>,
}

impl GoogleProvider {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            settings,
        }
    }

    fn api_key(&self) -> Option<String> {
        credential(self.settings.as_ref(), ProviderId::Google, API_KEY)
    }
}

#[async_trait]
impl TranslationProvider for GoogleProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Google
    }

    fn has_credentials(&self) -> bool {
        self.api_key().is_some()
    }

    async fn translate(&self, term: &str) -> TranslationResult<Word> {
        let api_key = self.api_key().ok_or(TranslationError::CredentialMissing)?;

        debug!("Google lookup: {}", term);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", api_key.as_str()),
                ("q", term),
                ("source", "en"),
                ("target", "zh-CN"),
                ("format", "text"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let result: GoogleResponse = read_json(response).await?;
        let text = result
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or(TranslationError::TermNotFound)?;

        Ok(Word::new(term, vec![Translation::new("unknown", text)]))
    }

    async fn check_quota(&self) -> Option<u32> {
        None
    }
}
