//! Translation keys for localizable text

use crate::utils::js_string;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyScheme {
    /// The authored text is its own key.
    #[default]
    Content,
    /// Hex md5 digest of the text.
    Hash,
    /// Dotted location of the text in the model.
    Path,
}

impl KeyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyScheme::Content => "content",
            KeyScheme::Hash => "hash",
            KeyScheme::Path => "path",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalizationOptions {
    pub key_scheme: KeyScheme,
    pub tag_prefix: Option<String>,
}

pub fn localization_key(options: &LocalizationOptions, text: &str, path: &[String]) -> String {
    let key = match options.key_scheme {
        KeyScheme::Content => text.to_string(),
        KeyScheme::Hash => hex::encode(md5::compute(text.as_bytes()).0),
        KeyScheme::Path => path
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("."),
    };
    match &options.tag_prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}{}", prefix, key),
        _ => key,
    }
}

/// `($translator?.("key") ?? "text")`
pub fn translation_lookup(key: &str, text: &str) -> String {
    format!("($translator?.({}) ?? {})", js_string(key), js_string(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> Vec<String> {
        vec!["shop".into(), "Button".into(), "label".into(), "text".into(), "".into()]
    }

    #[test]
    fn test_key_schemes() {
        let content = LocalizationOptions::default();
        assert_eq!(localization_key(&content, "Buy now", &path()), "Buy now");

        let hash = LocalizationOptions {
            key_scheme: KeyScheme::Hash,
            tag_prefix: None,
        };
        let key = localization_key(&hash, "Buy now", &path());
        assert_eq!(key.len(), 32);
        assert_eq!(key, localization_key(&hash, "Buy now", &[]));

        let dotted = LocalizationOptions {
            key_scheme: KeyScheme::Path,
            tag_prefix: Some("app.".into()),
        };
        assert_eq!(localization_key(&dotted, "Buy now", &path()), "app.shop.Button.label.text");
    }

    #[test]
    fn test_hash_of_empty_text() {
        let hash = LocalizationOptions {
            key_scheme: KeyScheme::Hash,
            tag_prefix: None,
        };
        assert_eq!(localization_key(&hash, "", &[]), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_translation_lookup() {
        assert_eq!(
            translation_lookup("greeting", "Hi \"there\""),
            "($translator?.(\"greeting\") ?? \"Hi \\\"there\\\"\")"
        );
    }
}
