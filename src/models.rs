use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One sense of a word: part of speech plus localized text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub pos: String,
    pub tran_cn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tran_other: Option<String>,
}

impl Translation {
    pub fn new(pos: impl Into<String>, tran_cn: impl Into<String>) -> Self {
        Self {
            pos: pos.into(),
            tran_cn: tran_cn.into(),
            tran_other: None,
        }
    }
}

/// Example sentence with its localized rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    pub s_content: String,
    pub s_cn: String,
}

impl Sentence {
    pub fn new(s_content: impl Into<String>, s_cn: impl Into<String>) -> Self {
        Self {
            s_content: s_content.into(),
            s_cn: s_cn.into(),
        }
    }
}

/// A lookup result as shown on screen and stored in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub head_word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub us_phonetic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uk_phonetic: Option<String>,
    pub translations: Vec<Translation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentences: Option<Vec<Sentence>>,
}

impl Word {
    pub fn new(head_word: impl Into<String>, translations: Vec<Translation>) -> Self {
        Self {
            head_word: head_word.into(),
            us_phonetic: None,
            uk_phonetic: None,
            translations,
            sentences: None,
        }
    }

    /// Cache key: the lowercased headword
    pub fn key(&self) -> String {
        self.head_word.to_lowercase()
    }

    /// First translation text, or empty
    pub fn primary_translation(&self) -> &str {
        self.translations
            .first()
            .map(|t| t.tran_cn.as_str())
            .unwrap_or("")
    }

    /// Bracketed phonetic, US preferred over UK
    pub fn phonetic(&self) -> String {
        [&self.us_phonetic, &self.uk_phonetic]
            .into_iter()
            .flatten()
            .find(|p| !p.is_empty())
            .map(|p| format!("[{}]", p))
            .unwrap_or_default()
    }

    pub fn translation_display(&self) -> String {
        self.translations
            .iter()
            .map(|t| format!("{} {}", t.pos, t.tran_cn))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Known translation backends
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Google,
    #[default]
    Youdao,
    Bing,
}

/// Quota reset period of a free tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaPeriod {
    Daily,
    Monthly,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Google, ProviderId::Youdao, ProviderId::Bing];

    /// Priority used when the preferred provider cannot serve a request
    pub const FALLBACK_ORDER: [ProviderId; 3] =
        [ProviderId::Youdao, ProviderId::Bing, ProviderId::Google];

    /// Stable identifier used in settings keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Google => "google",
            ProviderId::Youdao => "youdao",
            ProviderId::Bing => "bing",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Google => "Google Translate",
            ProviderId::Youdao => "Youdao Translate",
            ProviderId::Bing => "Bing Translator",
        }
    }

    /// Free-tier ceiling and its reset period; `None` for paid, unbounded services
    pub fn free_quota(&self) -> Option<(u32, QuotaPeriod)> {
        match self {
            ProviderId::Google => None,
            ProviderId::Youdao => Some((100, QuotaPeriod::Daily)),
            ProviderId::Bing => Some((1000, QuotaPeriod::Monthly)),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(ProviderId::Google),
            "youdao" => Ok(ProviderId::Youdao),
            "bing" => Ok(ProviderId::Bing),
            other => anyhow::bail!("Unknown translation provider: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_word() -> Word {
        Word {
            head_word: "Hello".to_string(),
            us_phonetic: Some("həˈloʊ".to_string()),
            uk_phonetic: Some("həˈləʊ".to_string()),
            translations: vec![
                Translation::new("interj.", "你好"),
                Translation::new("n.", "招呼"),
            ],
            sentences: None,
        }
    }

    #[test]
    fn test_word_key_is_lowercase() {
        assert_eq!(sample_word().key(), "hello");
    }

    #[test]
    fn test_primary_translation() {
        assert_eq!(sample_word().primary_translation(), "你好");
        assert_eq!(Word::new("x", vec![]).primary_translation(), "");
    }

    #[test]
    fn test_phonetic_prefers_us() {
        assert_eq!(sample_word().phonetic(), "[həˈloʊ]");

        let mut word = sample_word();
        word.us_phonetic = Some(String::new());
        assert_eq!(word.phonetic(), "[həˈləʊ]");

        word.uk_phonetic = None;
        assert_eq!(word.phonetic(), "");
    }

    #[test]
    fn test_translation_display() {
        assert_eq!(sample_word().translation_display(), "interj. 你好; n. 招呼");
    }

    #[test]
    fn test_word_serde_skips_missing_optionals() {
        let word = Word::new("apple", vec![Translation::new("n.", "苹果")]);
        let json = serde_json::to_string(&word).expect("serialize");
        assert!(json.contains("headWord"));
        assert!(!json.contains("usPhonetic"));
        assert!(!json.contains("sentences"));

        let restored: Word = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, word);
    }

    #[test]
    fn test_provider_id_from_str() {
        assert_eq!("youdao".parse::<ProviderId>().ok(), Some(ProviderId::Youdao));
        assert_eq!(" Bing ".parse::<ProviderId>().ok(), Some(ProviderId::Bing));
        assert!("deepl".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_provider_quotas() {
        assert_eq!(ProviderId::Google.free_quota(), None);
        assert_eq!(
            ProviderId::Youdao.free_quota(),
            Some((100, QuotaPeriod::Daily))
        );
        assert_eq!(
            ProviderId::Bing.free_quota(),
            Some((1000, QuotaPeriod::Monthly))
        );
    }

    #[test]
    fn test_default_provider_is_first_in_fallback_order() {
        assert_eq!(ProviderId::default(), ProviderId::FALLBACK_ORDER[0]);
    }
}
