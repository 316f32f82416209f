//! Stylesheet generation and style value resolution
//!
//! Style values may reference tokens as `token(<uuid>)`; mixins are merged
//! under a setting's own properties. The stylesheet is emitted in a fixed
//! section order so regenerating an unchanged model is byte-stable.

use crate::class_names::{make_class_name, make_class_name_for_combo, rule_variants, TOKENS_CLASS};
use crate::context::PassContext;
use crate::error::{CompilerError, Result};
use crate::types::*;
use crate::variants::{css_pseudo, should_gen_variant_setting, sorted_vsettings, VariantKind};
use crate::StyleScheme;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

const LAYOUT_VARIABLES: &[(&str, &str)] = &[
    ("--dc-standard-width", "800px"),
    ("--dc-wide-width", "1280px"),
    ("--dc-viewport-gap", "16px"),
];

const RESET_RULES: &[(&str, &str)] = &[
    ("box-sizing", "border-box"),
    ("-webkit-font-smoothing", "antialiased"),
    ("text-decoration-line", "none"),
];

pub struct StyleResolver {
    token_pattern: Regex,
    token_cache: HashMap<String, String>,
}

impl StyleResolver {
    pub fn new() -> Result<Self> {
        Ok(Self {
            token_pattern: Regex::new(r"token\(\s*([A-Za-z0-9_-]+)\s*\)")?,
            token_cache: HashMap::new(),
        })
    }

    /// Replace every `token(<uuid>)` in `value` with the resolver's reference.
    pub fn resolve_value(&mut self, ctx: &mut PassContext<'_>, value: &str) -> Result<String> {
        let mut out = String::new();
        let mut last = 0;
        for caps in self.token_pattern.captures_iter(value) {
            let (whole, uuid) = match (caps.get(0), caps.get(1)) {
                (Some(w), Some(u)) => (w, u.as_str()),
                _ => continue,
            };
            out.push_str(&value[last..whole.start()]);
            let resolved = match self.token_cache.get(uuid) {
                Some(r) => r.clone(),
                None => {
                    let token = ctx.site.token(uuid).ok_or_else(|| {
                        ctx.model_error(format!("style references unknown token '{}'", uuid))
                    })?;
                    let r = ctx.collaborators.style_vars.token_ref(token);
                    self.token_cache.insert(uuid.to_string(), r.clone());
                    r
                }
            };
            ctx.metadata.used_tokens.insert(uuid.to_string());
            out.push_str(&resolved);
            last = whole.end();
        }
        out.push_str(&value[last..]);
        Ok(out)
    }

    /// Mixins first, then the setting's own properties, all token-resolved.
    pub fn resolve_styles(
        &mut self,
        ctx: &mut PassContext<'_>,
        mixins: &[String],
        styles: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        let mut merged = BTreeMap::new();
        for uuid in mixins {
            let mixin = ctx
                .site
                .mixin(uuid)
                .ok_or_else(|| ctx.model_error(format!("style references unknown mixin '{}'", uuid)))?;
            merged.extend(ctx.collaborators.style_vars.mixin_styles(mixin));
        }
        merged.extend(styles.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut resolved = BTreeMap::new();
        for (prop, value) in merged {
            let value = self.resolve_value(ctx, &value)?;
            resolved.insert(prop, value);
        }
        for font in ctx.collaborators.fonts.fonts_in(&resolved) {
            ctx.metadata.used_fonts.insert(font);
        }
        Ok(resolved)
    }

    pub fn build_stylesheet(&mut self, ctx: &mut PassContext<'_>) -> Result<String> {
        if ctx.options.debug_mode {
            log::debug!("Building stylesheet for component '{}'", ctx.component.name);
        }

        // Node rules first so every used font is known before the imports.
        let node_rules = self.node_rules(ctx)?;
        let token_section = self.token_variables(ctx)?;
        let tag_section = self.default_tag_variables(ctx)?;
        let theme_section = self.theme_rules(ctx)?;

        let mut css = String::new();
        let _ = writeln!(css, "/* Styles for component {} ({}) */", ctx.component.name, ctx.component.uuid);

        let imports: Vec<String> = ctx
            .metadata
            .used_fonts
            .iter()
            .filter_map(|font| ctx.collaborators.fonts.import_rule(font))
            .collect();
        for import in imports {
            let _ = writeln!(css, "{}", import);
        }

        css.push_str(&token_section);

        let root = shared_selector(ctx, ROOT_RESET_CLASS);
        css.push_str(&rule_block(&format!(":where({})", root), LAYOUT_VARIABLES.iter().map(|(k, v)| (k.to_string(), v.to_string()))));
        css.push_str(&tag_section);
        css.push_str(&theme_section);
        css.push_str(&rule_block(&root, RESET_RULES.iter().map(|(k, v)| (k.to_string(), v.to_string()))));
        css.push_str(&node_rules);
        Ok(css)
    }

    fn token_variables(&mut self, ctx: &mut PassContext<'_>) -> Result<String> {
        let mut css = String::new();
        let site = ctx.site;
        if site.tokens.is_empty() {
            return Ok(css);
        }
        let tokens_sel = shared_selector(ctx, TOKENS_CLASS);

        let mut base = Vec::new();
        let mut by_combo: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        let mut tokens: Vec<&StyleToken> = site.tokens.iter().collect();
        tokens.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        for token in tokens {
            let var = ctx.collaborators.style_vars.token_var_name(token);
            base.push((var.clone(), self.resolve_value(ctx, &token.value)?));
            for vv in &token.variant_values {
                let class = make_class_name_for_combo(ctx, &vv.variants)?;
                let value = self.resolve_value(ctx, &vv.value)?;
                by_combo.entry(class).or_default().push((var.clone(), value));
            }
        }
        css.push_str(&rule_block(&tokens_sel, base.into_iter()));
        for (class, decls) in by_combo {
            let sel = format!("{}{}", shared_selector(ctx, &class), tokens_sel);
            css.push_str(&rule_block(&sel, decls.into_iter()));
        }
        Ok(css)
    }

    fn default_tag_variables(&mut self, ctx: &mut PassContext<'_>) -> Result<String> {
        let mut css = String::new();
        if ctx.site.default_tag_styles.is_empty() {
            return Ok(css);
        }
        let root = shared_selector(ctx, ROOT_RESET_CLASS);
        let site = ctx.site;
        let mut vars = Vec::new();
        let mut tag_rules = String::new();
        for (tag, styles) in &site.default_tag_styles {
            let resolved = self.resolve_styles(ctx, &[], styles)?;
            let mut uses = Vec::new();
            for (prop, value) in resolved {
                let var = format!("--dc-{}-{}", tag, prop);
                uses.push((prop, format!("var({})", var)));
                vars.push((var, value));
            }
            let class = shared_selector(ctx, &format!("{}{}", DEFAULT_TAG_CLASS_PREFIX, tag));
            tag_rules.push_str(&rule_block(&class, uses.into_iter()));
        }
        css.push_str(&rule_block(&format!(":where({})", root), vars.into_iter()));
        css.push_str(&tag_rules);
        Ok(css)
    }

    fn theme_rules(&mut self, ctx: &mut PassContext<'_>) -> Result<String> {
        let mut css = String::new();
        let site = ctx.site;
        for rule in &site.theme_rules {
            let resolved = self.resolve_styles(ctx, &[], &rule.styles)?;
            let mut scope = shared_selector(ctx, ROOT_RESET_CLASS);
            if !rule.variants.is_empty() {
                let class = make_class_name_for_combo(ctx, &rule.variants)?;
                scope.push_str(&shared_selector(ctx, &class));
            }
            let sel = format!(":where({}) {}", scope, rule.selector);
            css.push_str(&rule_block(&sel, resolved.into_iter()));
        }
        Ok(css)
    }

    fn node_rules(&mut self, ctx: &mut PassContext<'_>) -> Result<String> {
        let component = ctx.component;
        let mut nodes: Vec<&Node> = Vec::new();
        component.tpl_tree.walk(&mut |n| nodes.push(n));

        let mut css = String::new();
        for node in nodes {
            for vs in sorted_vsettings(node) {
                if !should_gen_variant_setting(vs, &ctx.variants, component, ctx.options.force_include_internal_props) {
                    continue;
                }
                let mut styles = self.resolve_styles(ctx, &vs.mixins, &vs.styles)?;
                if vs.is_base() {
                    add_layout_defaults(node, &mut styles);
                }
                if styles.is_empty() {
                    continue;
                }
                let (selector, media) = self.node_selector(ctx, node, &vs.variants)?;
                let block = rule_block(&selector, styles.into_iter());
                match media {
                    Some(query) => {
                        let _ = writeln!(css, "@media {} {{", query);
                        for line in block.lines() {
                            if line.is_empty() {
                                css.push('\n');
                            } else {
                                let _ = writeln!(css, "  {}", line);
                            }
                        }
                        css.push_str("}\n");
                    }
                    None => css.push_str(&block),
                }
            }
        }
        Ok(css)
    }

    /// Selector for a node's setting plus the media query wrapping it, if any.
    fn node_selector(
        &self,
        ctx: &PassContext<'_>,
        node: &Node,
        combo: &[String],
    ) -> Result<(String, Option<String>)> {
        let rule: Vec<String> = rule_variants(ctx, combo)?
            .iter()
            .map(|i| i.variant.uuid.clone())
            .collect();
        let class = make_class_name(ctx, node, &rule)?;

        let root_uuid = ctx.component.tpl_tree.uuid();
        let mut own_pseudo = String::new();
        let mut ancestors: BTreeMap<String, String> = BTreeMap::new();
        let mut media: BTreeSet<String> = BTreeSet::new();

        for uuid in combo {
            let info = ctx.variants.require(uuid, &ctx.component.name)?;
            match info.kind {
                VariantKind::Style => {
                    let pseudo: String = info.variant.selectors.iter().map(|s| css_pseudo(s)).collect();
                    let trigger = info.variant.for_node.as_deref().unwrap_or(root_uuid);
                    if trigger == node.uuid() {
                        own_pseudo.push_str(&pseudo);
                    } else {
                        ancestors.entry(trigger.to_string()).or_default().push_str(&pseudo);
                    }
                }
                VariantKind::Screen => {
                    let query = info.variant.media_query.clone().ok_or_else(|| {
                        CompilerError::model(
                            &ctx.component.name,
                            format!("screen variant '{}' has no media query", info.variant.name),
                        )
                    })?;
                    media.insert(query);
                }
                VariantKind::Toggle | VariantKind::GlobalToggle => {}
            }
        }

        let mut parts = Vec::new();
        for (trigger_uuid, pseudo) in &ancestors {
            let trigger_node = ctx.require_node(trigger_uuid)?;
            let trigger_class = make_class_name(ctx, trigger_node, &[])?;
            parts.push(format!(".{}{}", trigger_class, pseudo));
        }
        parts.push(format!(".{}{}", class, own_pseudo));

        let media = if media.is_empty() {
            None
        } else {
            Some(media.into_iter().collect::<Vec<_>>().join(" and "))
        };
        Ok((parts.join(" "), media))
    }
}

fn add_layout_defaults(node: &Node, styles: &mut BTreeMap<String, String>) {
    if let Node::Tag(tag) = node {
        let direction = match tag.kind {
            TagKind::Column => "column",
            TagKind::Row => "row",
            _ => return,
        };
        styles.entry("display".to_string()).or_insert_with(|| "flex".to_string());
        styles
            .entry("flex-direction".to_string())
            .or_insert_with(|| direction.to_string());
    }
}

/// Selector for a class of the shared project stylesheet.
fn shared_selector(ctx: &PassContext<'_>, class: &str) -> String {
    match ctx.options.style_scheme {
        StyleScheme::Scoped => format!(":global(.{})", class),
        StyleScheme::Plain => format!(".{}", class),
    }
}

fn rule_block(selector: &str, decls: impl Iterator<Item = (String, String)>) -> String {
    let mut out = format!("{} {{\n", selector);
    for (prop, value) in decls {
        let _ = writeln!(out, "  {}: {};", prop, value);
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{fixture_ctx, fixture_ctx_with};
    use crate::CompilerOptions;
    use serde_json::json;

    fn site() -> Site {
        serde_json::from_value(json!({
            "tokens": [
                { "uuid": "tok1", "name": "Primary", "value": "#3366ff",
                  "variantValues": [{ "variants": ["v-dark"], "value": "#99bbff" }] }
            ],
            "mixins": [
                { "uuid": "mix1", "name": "Card shadow", "styles": { "box-shadow": "0 1px 2px black", "color": "gray" } }
            ],
            "globalVariantGroups": [
                { "uuid": "g-theme", "name": "theme", "groupType": "globalUserDefined", "variants": [
                    { "uuid": "v-dark", "name": "dark" }
                ]},
                { "uuid": "g-screen", "name": "screen", "groupType": "globalScreen", "variants": [
                    { "uuid": "v-mobile", "name": "mobile", "mediaQuery": "(max-width: 640px)" }
                ]}
            ],
            "themeRules": [
                { "selector": "h1", "styles": { "font-family": "Inter, sans-serif" } }
            ],
            "components": [{
                "uuid": "card",
                "name": "Card",
                "styleVariants": [
                    { "uuid": "v-hover", "name": "Hover", "selectors": [":hover"] }
                ],
                "tplTree": {
                    "type": "tag", "uuid": "root000001", "tag": "div", "kind": "column",
                    "vsettings": [
                        { "variants": [], "mixins": ["mix1"], "styles": { "color": "token(tok1)" } },
                        { "variants": ["v-mobile"], "styles": { "padding": "4px" } }
                    ],
                    "children": [
                        { "type": "tag", "uuid": "icon000001", "tag": "span",
                          "vsettings": [
                            { "variants": [] },
                            { "variants": ["v-hover"], "styles": { "opacity": "1" } }
                          ] }
                    ]
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_value_replaces_tokens() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        let mut resolver = StyleResolver::new().unwrap();
        assert_eq!(
            resolver.resolve_value(&mut ctx, "1px solid token(tok1)").unwrap(),
            "1px solid var(--token-tok1)"
        );
        assert!(ctx.metadata.used_tokens.contains("tok1"));
        assert!(resolver.resolve_value(&mut ctx, "token(nope)").is_err());
    }

    #[test]
    fn test_mixins_merge_under_own_styles() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        let mut resolver = StyleResolver::new().unwrap();
        let mut own = BTreeMap::new();
        own.insert("color".to_string(), "red".to_string());
        let styles = resolver
            .resolve_styles(&mut ctx, &["mix1".to_string()], &own)
            .unwrap();
        assert_eq!(styles.get("color").map(|s| s.as_str()), Some("red"));
        assert_eq!(styles.get("box-shadow").map(|s| s.as_str()), Some("0 1px 2px black"));
    }

    #[test]
    fn test_stylesheet_section_order() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        let css = StyleResolver::new().unwrap().build_stylesheet(&mut ctx).unwrap();

        let import = css.find("@import url(").unwrap();
        let tokens = css.find(".dc_tokens {").unwrap();
        let layout = css.find("--dc-standard-width").unwrap();
        let theme = css.find(":where(.root_reset) h1").unwrap();
        let reset = css.find(".root_reset {").unwrap();
        let nodes = css.find(".Card__freeBox__root0 {").unwrap();
        assert!(import < tokens && tokens < layout && layout < theme && theme < reset && reset < nodes);

        assert!(css.contains(".global_theme_dark.dc_tokens {\n  --token-tok1: #99bbff;\n}"));
        assert!(css.contains("  color: var(--token-tok1);\n"));
        assert!(css.contains("  flex-direction: column;\n"));
        assert!(css.contains("@media (max-width: 640px) {\n  .Card__freeBox__root0 {\n    padding: 4px;\n  }\n}"));
        assert!(css.contains(".Card__freeBox__root0:hover .Card__span__icon0 {\n  opacity: 1;\n}"));
        assert!(ctx.metadata.used_fonts.contains("Inter"));
    }

    #[test]
    fn test_scoped_stylesheet_uses_global_shared_classes() {
        let site = site();
        let mut ctx = fixture_ctx_with(
            &site,
            "card",
            CompilerOptions {
                style_scheme: StyleScheme::Scoped,
                ..Default::default()
            },
        );
        let css = StyleResolver::new().unwrap().build_stylesheet(&mut ctx).unwrap();
        assert!(css.contains(":global(.dc_tokens) {"));
        assert!(css.contains(".root {"));
    }

    #[test]
    fn test_stylesheet_is_deterministic() {
        let site = site();
        let mut a = fixture_ctx(&site, "card");
        let mut b = fixture_ctx(&site, "card");
        let css_a = StyleResolver::new().unwrap().build_stylesheet(&mut a).unwrap();
        let css_b = StyleResolver::new().unwrap().build_stylesheet(&mut b).unwrap();
        assert_eq!(css_a, css_b);
    }
}
