//! External collaborator contracts consumed by a compiler pass
//!
//! Each contract is a small pure trait with a default implementation so a pass
//! can run without any host integration. Hosts that serve assets from a CDN or
//! inline token values swap in their own implementations.

use crate::types::{ImageAsset, Mixin, StyleToken};
use std::collections::{BTreeMap, HashMap};

/// Token/mixin to literal or variable reference.
pub trait StyleVarResolver {
    /// CSS custom property that carries a token's value.
    fn token_var_name(&self, token: &StyleToken) -> String {
        format!("--token-{}", token.uuid)
    }

    /// What a reference to `token` becomes inside generated code or css.
    fn token_ref(&self, token: &StyleToken) -> String {
        format!("var({})", self.token_var_name(token))
    }

    fn mixin_styles(&self, mixin: &Mixin) -> BTreeMap<String, String> {
        mixin.styles.clone()
    }
}

/// Emits `var(--token-<uuid>)` references.
#[derive(Debug, Clone, Default)]
pub struct CssVarResolver;

impl StyleVarResolver for CssVarResolver {}

/// Inlines token values instead of referencing variables.
#[derive(Debug, Clone, Default)]
pub struct InlineTokenResolver;

impl StyleVarResolver for InlineTokenResolver {
    fn token_ref(&self, token: &StyleToken) -> String {
        token.value.clone()
    }
}

const GENERIC_FAMILIES: &[&str] = &[
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
    "inherit",
    "initial",
    "unset",
];

/// Reports which font families a style map uses.
pub trait FontUsageExtractor {
    fn fonts_in(&self, styles: &BTreeMap<String, String>) -> Vec<String>;

    /// `@import` rule that makes `font` available, if one is needed.
    fn import_rule(&self, font: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct FontFamilyExtractor;

impl FontUsageExtractor for FontFamilyExtractor {
    fn fonts_in(&self, styles: &BTreeMap<String, String>) -> Vec<String> {
        let mut fonts = Vec::new();
        if let Some(value) = styles.get("font-family") {
            for family in value.split(',') {
                let family = family.trim().trim_matches(|c| c == '"' || c == '\'').trim();
                if family.is_empty()
                    || family.starts_with("var(")
                    || GENERIC_FAMILIES.contains(&family.to_ascii_lowercase().as_str())
                {
                    continue;
                }
                fonts.push(family.to_string());
            }
        }
        fonts
    }

    fn import_rule(&self, font: &str) -> Option<String> {
        Some(format!(
            "@import url(\"https://fonts.googleapis.com/css2?family={}:ital,wght@0,400;0,700&display=swap\");",
            font.replace(' ', "+")
        ))
    }
}

/// Asset id to hosted URL or embedded data.
pub trait AssetLinkResolver {
    fn link(&self, asset: &ImageAsset) -> Option<String>;
}

/// Serves the data uri embedded in the model.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedAssetLinks;

impl AssetLinkResolver for EmbeddedAssetLinks {
    fn link(&self, asset: &ImageAsset) -> Option<String> {
        asset.data_uri.clone()
    }
}

/// Uploaded assets keyed by uuid, falling back to embedded data.
#[derive(Debug, Clone, Default)]
pub struct HostedAssetLinks {
    urls: HashMap<String, String>,
}

impl HostedAssetLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset_uuid: impl Into<String>, url: impl Into<String>) {
        self.urls.insert(asset_uuid.into(), url.into());
    }
}

impl AssetLinkResolver for HostedAssetLinks {
    fn link(&self, asset: &ImageAsset) -> Option<String> {
        self.urls
            .get(&asset.uuid)
            .cloned()
            .or_else(|| asset.data_uri.clone())
    }
}

/// Everything a pass consults outside the model itself.
pub struct Collaborators {
    pub style_vars: Box<dyn StyleVarResolver>,
    pub fonts: Box<dyn FontUsageExtractor>,
    pub assets: Box<dyn AssetLinkResolver>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            style_vars: Box::new(CssVarResolver),
            fonts: Box::new(FontFamilyExtractor),
            assets: Box::new(EmbeddedAssetLinks),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
