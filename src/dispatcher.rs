//! Provider selection and ordered fallback.
//!
//! Holds one instance per provider, the persisted preferred provider and a
//! fixed fallback order. Any provider error moves on to the next candidate;
//! when nobody can serve a request the caller sees `QuotaExceeded`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{TranslationError, TranslationResult};
use crate::models::{ProviderId, Word};
use crate::providers::{
    BingProvider, GoogleProvider, TranslationProvider, YoudaoProvider,
};
use crate::settings::{SettingsStore, PREFERRED_PROVIDER};

pub struct Dispatcher {
    services: HashMap<ProviderId, Arc<dyn TranslationProvider>>,
    preferred: RwLock<ProviderId>,
    fallback_order: Vec<ProviderId>,
    settings: Arc<dyn SettingsStore>,
}

impl Dispatcher {
    /// Build from explicit provider instances; the preference is read from settings
    pub fn new(
        services: Vec<Arc<dyn TranslationProvider>>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let preferred = settings
            .get_string(PREFERRED_PROVIDER)
            .and_then(|raw| match raw.parse::<ProviderId>() {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Ignoring stored preference: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            services: services.into_iter().map(|s| (s.id(), s)).collect(),
            preferred: RwLock::new(preferred),
            fallback_order: ProviderId::FALLBACK_ORDER.to_vec(),
            settings,
        }
    }

    /// Wire up the real vendor providers against the configured endpoints
    pub fn from_config(
        config: &Config,
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        let services: Vec<Arc<dyn TranslationProvider>> = vec![
            Arc::new(GoogleProvider::new(
                client.clone(),
                config.google_api_url.clone(),
                settings.clone(),
            )),
            Arc::new(
                YoudaoProvider::new(
                    client.clone(),
                    config.youdao_api_url.clone(),
                    settings.clone(),
                    clock.clone(),
                )
                .with_batch_delay(Duration::from_millis(config.youdao_batch_delay_ms)),
            ),
            Arc::new(BingProvider::new(
                client,
                config.bing_api_url.clone(),
                settings.clone(),
                clock,
            )),
        ];

        Ok(Self::new(services, settings))
    }

    pub fn with_fallback_order(mut self, order: Vec<ProviderId>) -> Self {
        self.fallback_order = order;
        self
    }

    pub fn preferred_provider(&self) -> ProviderId {
        *self.preferred.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Change and persist the preferred provider
    pub fn set_preferred_provider(&self, provider: ProviderId) {
        *self.preferred.write().unwrap_or_else(|e| e.into_inner()) = provider;
        self.settings.set_string(PREFERRED_PROVIDER, provider.as_str());
        info!("Preferred translation provider set to {}", provider);
    }

    pub fn service(&self, provider: ProviderId) -> Option<Arc<dyn TranslationProvider>> {
        self.services.get(&provider).cloned()
    }

    /// Preferred provider if usable, otherwise the first usable one in fallback order
    pub async fn resolve_available_service(&self) -> Option<Arc<dyn TranslationProvider>> {
        let preferred = self.preferred_provider();

        if let Some(service) = self.service(preferred) {
            if service.is_available().await {
                return Some(service);
            }
        }

        for provider in self.fallback_order.iter().filter(|p| **p != preferred) {
            if let Some(service) = self.service(*provider) {
                if service.is_available().await {
                    warn!(
                        "Preferred provider {} unavailable, falling back to {}",
                        preferred, provider
                    );
                    return Some(service);
                }
            }
        }

        None
    }

    pub async fn translate(&self, term: &str) -> TranslationResult<Word> {
        let service = self
            .resolve_available_service()
            .await
            .ok_or(TranslationError::QuotaExceeded)?;

        match service.translate(term).await {
            Ok(word) => Ok(word),
            Err(e) => {
                warn!("{} failed to translate '{}': {}", service.id(), term, e);
                self.translate_with_fallback(term, service.id()).await
            }
        }
    }

    /// Walk the fallback order, skipping `exclude` and unavailable providers
    async fn translate_with_fallback(
        &self,
        term: &str,
        exclude: ProviderId,
    ) -> TranslationResult<Word> {
        for provider in self.fallback_order.iter().filter(|p| **p != exclude) {
            let Some(service) = self.service(*provider) else {
                continue;
            };
            if !service.is_available().await {
                continue;
            }

            info!("Retrying '{}' with {}", term, provider);
            match service.translate(term).await {
                Ok(word) => return Ok(word),
                Err(e) => warn!("{} also failed for '{}': {}", provider, term, e),
            }
        }

        Err(TranslationError::QuotaExceeded)
    }

    /// Batch through one provider; if that call fails outright, go word by word
    ///
    /// Words no provider can translate are left out of the result.
    pub async fn translate_batch(&self, terms: &[String]) -> TranslationResult<Vec<Word>> {
        let service = self
            .resolve_available_service()
            .await
            .ok_or(TranslationError::QuotaExceeded)?;

        match service.translate_batch(terms).await {
            Ok(words) => Ok(words),
            Err(e) => {
                warn!(
                    "{} batch translation failed ({}), translating {} words individually",
                    service.id(),
                    e,
                    terms.len()
                );
                let mut words = Vec::with_capacity(terms.len());
                for term in terms {
                    match self.translate(term).await {
                        Ok(word) => words.push(word),
                        Err(e) => warn!("Skipping '{}': {}", term, e),
                    }
                }
                Ok(words)
            }
        }
    }

    /// Remaining quota per provider; `None` means unbounded
    pub async fn check_all_quotas(&self) -> BTreeMap<ProviderId, Option<u32>> {
        let mut quotas = BTreeMap::new();
        for (provider, service) in &self.services {
            quotas.insert(*provider, service.check_quota().await);
        }
        quotas
    }
}
