use axum::http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_LOCALE: &str = "en";
pub const SUPPORTED_LOCALES: [&str; 2] = ["en", "hi"];

const EN_BUNDLE: &str = include_str!("../../locales/en.json");
const HI_BUNDLE: &str = include_str!("../../locales/hi.json");

/// Key lookup over the embedded language bundles.
pub struct Translator {
    bundles: HashMap<&'static str, Value>,
}

impl Translator {
    pub fn new() -> Result<Self, serde_json::Error> {
        let mut bundles = HashMap::new();
        bundles.insert("en", serde_json::from_str(EN_BUNDLE)?);
        bundles.insert("hi", serde_json::from_str(HI_BUNDLE)?);
        Ok(Self { bundles })
    }

    pub fn bundle(&self, locale: &str) -> Option<&Value> {
        self.bundles.get(locale)
    }

    /// Resolves a dotted key in `locale`, then in English, then gives back
    /// the key itself.
    pub fn t(&self, locale: &str, key: &str) -> String {
        self.lookup(locale, key)
            .or_else(|| self.lookup(DEFAULT_LOCALE, key))
            .unwrap_or_else(|| key.to_string())
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<String> {
        let mut node = self.bundles.get(locale)?;
        for part in key.split('.') {
            node = node.get(part)?;
        }
        node.as_str().map(str::to_string)
    }
}

/// Normalizes a tag such as `hi-IN` to a supported locale.
pub fn normalize_locale(tag: &str) -> Option<&'static str> {
    let primary = tag.trim().split(['-', '_']).next()?.to_ascii_lowercase();
    SUPPORTED_LOCALES.iter().copied().find(|l| *l == primary)
}

/// `x-language` wins, then the first supported `Accept-Language` entry.
pub fn detect_locale(headers: &HeaderMap) -> &'static str {
    if let Some(locale) = headers
        .get("x-language")
        .and_then(|v| v.to_str().ok())
        .and_then(normalize_locale)
    {
        return locale;
    }

    headers
        .get(axum::http::header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|accept| {
            accept
                .split(',')
                .filter_map(|entry| entry.split(';').next())
                .find_map(normalize_locale)
        })
        .unwrap_or(DEFAULT_LOCALE)
}
