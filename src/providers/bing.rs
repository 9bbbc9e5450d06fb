use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::{credential, read_json, status_error, QuotaTracker, TranslationProvider};
use crate::clock::Clock;
use crate::error::{TranslationError, TranslationResult};
use crate::models::{ProviderId, Translation, Word};
use crate::settings::{SettingsStore, API_KEY};

pub const DEFAULT_ENDPOINT: &str = "https://api.cognitive.microsofttranslator.com/translate";

#[derive(Debug, Deserialize)]
struct BingResult {
    translations: Vec<BingTranslation>,
}

#[derive(Debug, Deserialize)]
struct BingTranslation {
    text: String,
}

/// Subscription-key translator with a monthly free tier; batches run concurrently
pub struct BingProvider {
    client: reqwest::Client,
    endpoint: String,
    settings: Arc<dyn SettingsStore>,
    quota: Option<QuotaTracker>,
}

impl BingProvider {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let quota = QuotaTracker::for_provider(ProviderId::Bing, settings.clone(), clock);
        Self {
            client,
            endpoint: endpoint.into(),
            settings,
            quota,
        }
    }

    fn api_key(&self) -> Option<String> {
        credential(self.settings.as_ref(), ProviderId::Bing, API_KEY)
    }
}

#[async_trait]
impl TranslationProvider for BingProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Bing
    }

    fn has_credentials(&self) -> bool {
        self.api_key().is_some()
    }

    async fn translate(&self, term: &str) -> TranslationResult<Word> {
        let api_key = self.api_key().ok_or(TranslationError::CredentialMissing)?;

        debug!("Bing lookup: {}", term);
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("api-version", "3.0"), ("to", "zh-Hans")])
            .header("Ocp-Apim-Subscription-Key", api_key)
            .json(&serde_json::json!([{ "text": term }]))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let results: Vec<BingResult> = read_json(response).await?;
        let text = results
            .into_iter()
            .next()
            .and_then(|r| r.translations.into_iter().next())
            .map(|t| t.text)
            .ok_or(TranslationError::TermNotFound)?;

        if let Some(quota) = &self.quota {
            quota.record_use();
        }

        Ok(Word::new(term, vec![Translation::new("unknown", text)]))
    }

    async fn check_quota(&self) -> Option<u32> {
        self.quota.as_ref().map(QuotaTracker::remaining)
    }
}
