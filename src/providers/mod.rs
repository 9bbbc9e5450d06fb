//! Translation providers.
//!
//! Every backend implements [`TranslationProvider`]. Shared behavior lives
//! here: the availability rule, batch execution under a per-provider
//! [`BatchPolicy`], and HTTP status mapping.

pub mod bing;
pub mod google;
mod quota;
pub mod youdao;

pub use bing::BingProvider;
pub use google::GoogleProvider;
pub use quota::QuotaTracker;
pub use youdao::{sign_request, truncate_query, YoudaoProvider};

use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tracing::warn;

use crate::error::{TranslationError, TranslationResult};
use crate::models::{ProviderId, Word};

/// How a provider runs a batch of lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    /// Issue every request at once and rejoin
    Concurrent,
    /// One request at a time with a pause before each, for rate-sensitive tiers
    Serial { delay: Duration },
}

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn requires_credentials(&self) -> bool {
        true
    }

    fn has_credentials(&self) -> bool;

    fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy::Concurrent
    }

    async fn translate(&self, term: &str) -> TranslationResult<Word>;

    /// Translate as many terms as possible; individual failures are skipped
    async fn translate_batch(&self, terms: &[String]) -> TranslationResult<Vec<Word>> {
        translate_each(self, terms, self.batch_policy()).await
    }

    /// Calls left in the current period, `None` when the service has no quota
    async fn check_quota(&self) -> Option<u32>;

    async fn is_available(&self) -> bool {
        if self.requires_credentials() && !self.has_credentials() {
            return false;
        }
        !matches!(self.check_quota().await, Some(0))
    }
}

/// Run `translate` for every term under `policy`, dropping failed items
///
/// Fails as a whole only when the provider cannot serve any request at all.
pub async fn translate_each<P>(
    provider: &P,
    terms: &[String],
    policy: BatchPolicy,
) -> TranslationResult<Vec<Word>>
where
    P: TranslationProvider + ?Sized,
{
    if provider.requires_credentials() && !provider.has_credentials() {
        return Err(TranslationError::CredentialMissing);
    }

    let outcomes = match policy {
        BatchPolicy::Concurrent => {
            join_all(terms.iter().map(|term| provider.translate(term))).await
        }
        BatchPolicy::Serial { delay } => {
            let mut outcomes = Vec::with_capacity(terms.len());
            for term in terms {
                tokio::time::sleep(delay).await;
                outcomes.push(provider.translate(term).await);
            }
            outcomes
        }
    };

    let words = terms
        .iter()
        .zip(outcomes)
        .filter_map(|(term, outcome)| match outcome {
            Ok(word) => Some(word),
            Err(e) => {
                warn!("{}: skipping '{}' in batch: {}", provider.id(), term, e);
                None
            }
        })
        .collect();

    Ok(words)
}

/// Map a non-success HTTP status onto the shared error taxonomy
pub(crate) fn status_error(status: reqwest::StatusCode) -> TranslationError {
    match status.as_u16() {
        429 => TranslationError::RateLimited,
        401 | 403 => TranslationError::CredentialMissing,
        _ => TranslationError::MalformedResponse(format!("HTTP {}", status)),
    }
}

/// Read a JSON body, keeping transport and decoding failures apart
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> TranslationResult<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| TranslationError::MalformedResponse(e.to_string()))
}

/// Non-empty credential from the settings store
pub(crate) fn credential(
    settings: &dyn crate::settings::SettingsStore,
    provider: ProviderId,
    field: &str,
) -> Option<String> {
    settings
        .get_string(&crate::settings::provider_key(provider, field))
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Translation;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedProvider {
        credentials: bool,
        quota: Option<u32>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(credentials: bool, quota: Option<u32>) -> Self {
            Self {
                credentials,
                quota,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TranslationProvider for ScriptedProvider {
        fn id(&self) -> ProviderId {
            ProviderId::Youdao
        }

        fn has_credentials(&self) -> bool {
            self.credentials
        }

        async fn translate(&self, term: &str) -> TranslationResult<Word> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if term.starts_with("bad") {
                return Err(TranslationError::TermNotFound);
            }
            Ok(Word::new(term, vec![Translation::new("n.", term.to_uppercase())]))
        }

        async fn check_quota(&self) -> Option<u32> {
            self.quota
        }
    }

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_is_available_requires_credentials() {
        assert!(!ScriptedProvider::new(false, None).is_available().await);
        assert!(ScriptedProvider::new(true, None).is_available().await);
    }

    #[tokio::test]
    async fn test_is_available_requires_remaining_quota() {
        assert!(!ScriptedProvider::new(true, Some(0)).is_available().await);
        assert!(ScriptedProvider::new(true, Some(1)).is_available().await);
    }

    #[tokio::test]
    async fn test_concurrent_batch_skips_failures_and_keeps_order() {
        let provider = ScriptedProvider::new(true, None);
        let words = provider
            .translate_batch(&terms(&["apple", "bad1", "cherry", "bad2"]))
            .await
            .expect("batch");

        let heads: Vec<_> = words.iter().map(|w| w.head_word.as_str()).collect();
        assert_eq!(heads, vec!["apple", "cherry"]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_serial_batch_waits_between_requests() {
        let provider = ScriptedProvider::new(true, None);
        let start = std::time::Instant::now();

        let words = translate_each(
            &provider,
            &terms(&["a", "b", "c"]),
            BatchPolicy::Serial {
                delay: Duration::from_millis(20),
            },
        )
        .await
        .expect("batch");

        assert_eq!(words.len(), 3);
        assert!(
            start.elapsed() >= Duration::from_millis(60),
            "Expected at least 60ms, got {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_batch_without_credentials_fails_fast() {
        let provider = ScriptedProvider::new(false, None);
        let result = provider.translate_batch(&terms(&["apple"])).await;

        assert!(matches!(result, Err(TranslationError::CredentialMissing)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_status_error_mapping() {
        use reqwest::StatusCode;

        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS),
            TranslationError::RateLimited
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN),
            TranslationError::CredentialMissing
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED),
            TranslationError::CredentialMissing
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR),
            TranslationError::MalformedResponse(_)
        ));
    }
}
