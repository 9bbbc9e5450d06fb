use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{credential, read_json, status_error, BatchPolicy, QuotaTracker, TranslationProvider};
use crate::clock::Clock;
use crate::error::{TranslationError, TranslationResult};
use crate::models::{ProviderId, Sentence, Translation, Word};
use crate::settings::{SettingsStore, API_KEY, APP_SECRET};

pub const DEFAULT_ENDPOINT: &str = "https://openapi.youdao.com/api";

/// Pause between serialized batch requests on the free tier
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

const PLACEHOLDER_POS: &str = "n.";
const PLACEHOLDER_TEXT: &str = "未找到翻译";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoudaoResponse {
    error_code: String,
    #[serde(default)]
    translation: Option<Vec<String>>,
    #[serde(default)]
    basic: Option<BasicInfo>,
    #[serde(default)]
    web: Option<Vec<WebTranslation>>,
}

#[derive(Debug, Deserialize)]
struct BasicInfo {
    #[serde(rename = "us-phonetic", default)]
    us_phonetic: Option<String>,
    #[serde(rename = "uk-phonetic", default)]
    uk_phonetic: Option<String>,
    #[serde(default)]
    explains: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct WebTranslation {
    key: String,
    value: Vec<String>,
}

/// Query form that goes into the signature: verbatim up to 20 characters,
/// otherwise first 10 + total length + last 10
pub fn truncate_query(query: &str) -> String {
    let chars: Vec<char> = query.chars().collect();
    let len = chars.len();
    if len <= 20 {
        return query.to_string();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[len - 10..].iter().collect();
    format!("{}{}{}", head, len, tail)
}

/// v3 signature: hex sha256 of appKey + truncate(q) + salt + curtime + appSecret
pub fn sign_request(app_key: &str, query: &str, salt: &str, curtime: &str, app_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(app_key.as_bytes());
    hasher.update(truncate_query(query).as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(curtime.as_bytes());
    hasher.update(app_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Vendor error codes; anything unlisted is treated as a malformed reply
fn map_error_code(code: &str) -> TranslationError {
    match code {
        // missing params, unsupported language, invalid app id,
        // invalid developer account, bad signature
        "101" | "102" | "108" | "111" | "202" => TranslationError::CredentialMissing,
        // text too long, empty query
        "103" | "113" => TranslationError::TermNotFound,
        // no active service instance, account in arrears
        "110" | "401" => TranslationError::QuotaExceeded,
        "411" => TranslationError::RateLimited,
        other => TranslationError::MalformedResponse(format!("error code {}", other)),
    }
}

fn to_word(response: YoudaoResponse, head_word: &str) -> Word {
    let basic = response.basic;

    let mut translations: Vec<Translation> = match basic.as_ref().and_then(|b| b.explains.as_ref()) {
        Some(explains) => explains
            .iter()
            .map(|explain| match explain.split_once('.') {
                Some((pos, text)) => Translation::new(pos, text.trim()),
                None => Translation::new(PLACEHOLDER_POS, explain.as_str()),
            })
            .collect(),
        None => response
            .translation
            .as_ref()
            .and_then(|t| t.first())
            .map(|text| vec![Translation::new(PLACEHOLDER_POS, text.as_str())])
            .unwrap_or_default(),
    };
    if translations.is_empty() {
        translations.push(Translation::new(PLACEHOLDER_POS, PLACEHOLDER_TEXT));
    }

    let sentences = response.web.map(|web| {
        web.into_iter()
            .map(|w| Sentence::new(w.key, w.value.join("; ")))
            .collect()
    });

    let (us_phonetic, uk_phonetic) = basic
        .map(|b| (b.us_phonetic, b.uk_phonetic))
        .unwrap_or_default();

    Word {
        head_word: head_word.to_string(),
        us_phonetic,
        uk_phonetic,
        translations,
        sentences,
    }
}

/// Signed dictionary API with a daily free quota; batches run serially
pub struct YoudaoProvider {
    client: reqwest::Client,
    endpoint: String,
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    quota: Option<QuotaTracker>,
    batch_delay: Duration,
}

impl YoudaoProvider {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let quota = QuotaTracker::for_provider(ProviderId::Youdao, settings.clone(), clock.clone());
        Self {
            client,
            endpoint: endpoint.into(),
            settings,
            clock,
            quota,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Credentials are re-read on every call so newly saved keys apply immediately
    fn credentials(&self) -> Option<(String, String)> {
        let app_key = credential(self.settings.as_ref(), ProviderId::Youdao, API_KEY)?;
        let app_secret = credential(self.settings.as_ref(), ProviderId::Youdao, APP_SECRET)?;
        Some((app_key, app_secret))
    }
}

#[async_trait]
impl TranslationProvider for YoudaoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Youdao
    }

    fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }

    fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy::Serial {
            delay: self.batch_delay,
        }
    }

    async fn translate(&self, term: &str) -> TranslationResult<Word> {
        let (app_key, app_secret) = self
            .credentials()
            .ok_or(TranslationError::CredentialMissing)?;

        if self.quota.as_ref().is_some_and(|q| q.remaining() == 0) {
            return Err(TranslationError::QuotaExceeded);
        }

        let salt = Uuid::new_v4().to_string();
        let curtime = self.clock.now().timestamp().to_string();
        let sign = sign_request(&app_key, term, &salt, &curtime, &app_secret);

        debug!("Youdao lookup: {}", term);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", term),
                ("from", "en"),
                ("to", "zh-CHS"),
                ("appKey", app_key.as_str()),
                ("salt", salt.as_str()),
                ("sign", sign.as_str()),
                ("signType", "v3"),
                ("curtime", curtime.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let result: YoudaoResponse = read_json(response).await?;
        if result.error_code != "0" {
            return Err(map_error_code(&result.error_code));
        }

        if let Some(quota) = &self.quota {
            quota.record_use();
        }
        Ok(to_word(result, term))
    }

    async fn check_quota(&self) -> Option<u32> {
        self.quota.as_ref().map(QuotaTracker::remaining)
    }
}
