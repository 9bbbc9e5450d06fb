use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::WordCache;
use crate::dispatcher::Dispatcher;
use crate::error::TranslationResult;
use crate::models::Word;

/// Cache-first word lookup; anything fetched from a provider is written back
pub struct WordLookup {
    cache: Arc<WordCache>,
    dispatcher: Arc<Dispatcher>,
}

impl WordLookup {
    pub fn new(cache: Arc<WordCache>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { cache, dispatcher }
    }

    pub fn cache(&self) -> &WordCache {
        &self.cache
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn lookup(&self, term: &str) -> TranslationResult<Word> {
        if let Some(word) = self.cache.get(term) {
            debug!("Cache hit: {}", term);
            return Ok(word);
        }

        let word = self.dispatcher.translate(term).await?;
        self.cache.put(word.clone());
        Ok(word)
    }

    /// Look up many terms with a single provider batch for the misses
    ///
    /// Results follow input order; terms nobody could translate are omitted.
    pub async fn lookup_batch(&self, terms: &[String]) -> TranslationResult<Vec<Word>> {
        let mut hits: HashMap<String, Word> = HashMap::new();
        let mut misses: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for term in terms {
            let key = term.to_lowercase();
            if !seen.insert(key.clone()) {
                continue;
            }
            match self.cache.get(term) {
                Some(word) => {
                    hits.insert(key, word);
                }
                None => misses.push(term.clone()),
            }
        }

        if !misses.is_empty() {
            info!(
                "{} of {} words not cached, translating",
                misses.len(),
                terms.len()
            );
            let fetched = self.dispatcher.translate_batch(&misses).await?;
            self.cache.put_batch(fetched.iter().cloned());
            for word in fetched {
                hits.insert(word.key(), word);
            }
        }

        Ok(terms
            .iter()
            .filter_map(|term| hits.get(&term.to_lowercase()).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::clock::SystemClock;
    use crate::error::TranslationError;
    use crate::models::{ProviderId, Translation};
    use crate::providers::TranslationProvider;
    use crate::settings::{MemorySettings, SettingsStore, PREFERRED_PROVIDER};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every term it is asked for
    #[derive(Default)]
    struct RecordingProvider {
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TranslationProvider for RecordingProvider {
        fn id(&self) -> ProviderId {
            ProviderId::Google
        }

        fn has_credentials(&self) -> bool {
            true
        }

        async fn translate(&self, term: &str) -> TranslationResult<Word> {
            self.requested.lock().unwrap().push(term.to_string());
            if term == "zzz" {
                return Err(TranslationError::TermNotFound);
            }
            Ok(Word::new(term, vec![Translation::new("n.", format!("译:{}", term))]))
        }

        async fn check_quota(&self) -> Option<u32> {
            None
        }
    }

    fn setup(dir: &TempDir) -> (WordLookup, Arc<RecordingProvider>) {
        let provider = Arc::new(RecordingProvider::default());
        let settings = Arc::new(MemorySettings::new());
        settings.set_string(PREFERRED_PROVIDER, "google");
        let dispatcher = Dispatcher::new(
            vec![provider.clone() as Arc<dyn TranslationProvider>],
            settings,
        );
        let cache = WordCache::with_clock(
            dir.path().join("words_cache.json"),
            CacheConfig::default(),
            Arc::new(SystemClock),
        );
        (
            WordLookup::new(Arc::new(cache), Arc::new(dispatcher)),
            provider,
        )
    }

    #[tokio::test]
    async fn test_lookup_miss_then_hit() {
        let dir = TempDir::new().unwrap();
        let (lookup, provider) = setup(&dir);

        let first = lookup.lookup("hello").await.expect("translated");
        let second = lookup.lookup("HELLO").await.expect("cached");

        assert_eq!(first, second);
        assert_eq!(provider.requested.lock().unwrap().as_slice(), ["hello"]);
        assert_eq!(lookup.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_error_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let (lookup, _) = setup(&dir);

        assert!(lookup.lookup("zzz").await.is_err());
        assert!(lookup.cache().is_empty());
    }

    #[tokio::test]
    async fn test_batch_translates_only_misses_in_input_order() {
        let dir = TempDir::new().unwrap();
        let (lookup, provider) = setup(&dir);
        lookup.lookup("banana").await.unwrap();
        provider.requested.lock().unwrap().clear();

        let terms: Vec<String> = ["cherry", "banana", "zzz", "apple", "Cherry"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let words = lookup.lookup_batch(&terms).await.expect("batch");

        let heads: Vec<_> = words.iter().map(|w| w.head_word.as_str()).collect();
        assert_eq!(heads, vec!["cherry", "banana", "apple", "cherry"]);

        let mut requested = provider.requested.lock().unwrap().clone();
        requested.sort();
        assert_eq!(requested, vec!["apple", "cherry", "zzz"]);
        assert_eq!(lookup.cache().len(), 3);
    }

    #[tokio::test]
    async fn test_batch_all_cached_skips_dispatcher() {
        let dir = TempDir::new().unwrap();
        let (lookup, provider) = setup(&dir);
        lookup.lookup("apple").await.unwrap();

        let words = lookup
            .lookup_batch(&["apple".to_string()])
            .await
            .expect("batch");

        assert_eq!(words.len(), 1);
        assert_eq!(provider.requested.lock().unwrap().len(), 1);
    }
}
