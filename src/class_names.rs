//! Stable style identifiers per (node, variant combo)
//!
//! A class name is `basePart + variantPart + uniqueSuffix`. The suffix is made
//! of fixed-length slices of the node uuid and of every rule variant uuid, so
//! the name only changes when one of those identities changes.

use crate::context::PassContext;
use crate::error::Result;
use crate::types::*;
use crate::utils::{js_key, js_member, js_string, short_id, to_class_name, to_css_ident};
use crate::variants::{combo_key, should_gen_variant_setting, VariantComboChecker, VariantInfo, VariantKind};
use crate::StyleScheme;
use std::collections::{BTreeMap, BTreeSet};

pub const TOKENS_CLASS: &str = "dc_tokens";

/// Variants of `combo` expressed through a class of their own, sorted by uuid.
/// Style and screen variants are left to selectors and media queries.
pub fn rule_variants<'p, 'a>(ctx: &'p PassContext<'a>, combo: &[String]) -> Result<Vec<&'p VariantInfo<'a>>> {
    let mut infos = Vec::new();
    for uuid in combo {
        let info = ctx.variants.require(uuid, &ctx.component.name)?;
        if info.is_base_rule() {
            infos.push(info);
        }
    }
    infos.sort_by(|a, b| a.variant.uuid.cmp(&b.variant.uuid));
    Ok(infos)
}

fn variant_part(info: &VariantInfo<'_>) -> String {
    let group = info.group_key.as_deref().unwrap_or_default();
    match info.kind {
        VariantKind::Toggle if info.standalone => to_css_ident(group),
        VariantKind::Toggle => to_css_ident(&format!("{}_{}", group, info.variant_key())),
        VariantKind::GlobalToggle => {
            to_css_ident(&format!("global_{}_{}", group, info.variant_key()))
        }
        VariantKind::Screen => to_css_ident(&format!("screen_{}", info.variant_key())),
        VariantKind::Style => {
            let selectors: Vec<String> = info.variant.selectors.iter().map(|s| to_css_ident(s)).collect();
            format!("{}__{}", to_css_ident(&info.variant.name), selectors.join("_"))
        }
    }
}

/// Class name for `node` under `combo`.
pub fn make_class_name(ctx: &PassContext<'_>, node: &Node, combo: &[String]) -> Result<String> {
    let infos = rule_variants(ctx, combo)?;

    let mut suffix = short_id(node.uuid());
    for info in &infos {
        suffix.push('_');
        suffix.push_str(&short_id(&info.variant.uuid));
    }

    if ctx.options.use_short_identifiers {
        return Ok(format!("{}{}", SHORT_CLASS_PREFIX, suffix));
    }

    let variant_part = infos.iter().map(|i| variant_part(i)).collect::<Vec<_>>().join("__");
    let variant_part = if variant_part.is_empty() {
        String::new()
    } else {
        format!("__{}", variant_part)
    };

    let name = match ctx.options.style_scheme {
        StyleScheme::Scoped => {
            let base = to_css_ident(&ctx.names.display_name(node.uuid()));
            if ctx.names.is_named(node.uuid()) {
                format!("{}{}", base, variant_part)
            } else {
                format!("{}{}__{}", base, variant_part, suffix)
            }
        }
        StyleScheme::Plain => {
            let base = to_css_ident(ctx.names.summary(node.uuid()));
            format!(
                "{}__{}{}__{}",
                to_class_name(&ctx.component.name),
                base,
                variant_part,
                suffix
            )
        }
    };
    Ok(name)
}

/// Variant part alone, used for site-wide combos such as token themes.
pub fn make_class_name_for_combo(ctx: &PassContext<'_>, combo: &[String]) -> Result<String> {
    let mut infos = Vec::new();
    for uuid in combo {
        infos.push(ctx.variants.require(uuid, &ctx.component.name)?);
    }
    infos.sort_by(|a, b| a.variant.uuid.cmp(&b.variant.uuid));
    Ok(infos.iter().map(|i| variant_part(i)).collect::<Vec<_>>().join("__"))
}

/// Reference to a component-local class.
pub fn class_ref(ctx: &PassContext<'_>, name: &str) -> String {
    match ctx.options.style_scheme {
        StyleScheme::Scoped => js_member("sty", name),
        StyleScheme::Plain => js_string(name),
    }
}

/// Reference to a shared class. Scoped stylesheets declare these `:global`,
/// so the name is never rewritten.
pub fn shared_class_ref(_ctx: &PassContext<'_>, name: &str) -> String {
    js_string(name)
}

fn conditional_key(ctx: &PassContext<'_>, reference: &str) -> String {
    match ctx.options.style_scheme {
        StyleScheme::Scoped => format!("[{}]", reference),
        StyleScheme::Plain => js_key(reference.trim_matches('"')),
    }
}

/// Global combos that carry token or theme values, sorted by key.
pub fn site_theme_combos(site: &Site) -> Vec<Vec<String>> {
    let mut combos: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for token in &site.tokens {
        for vv in &token.variant_values {
            combos.entry(combo_key(&vv.variants)).or_insert_with(|| vv.variants.clone());
        }
    }
    for rule in &site.theme_rules {
        if !rule.variants.is_empty() {
            combos.entry(combo_key(&rule.variants)).or_insert_with(|| rule.variants.clone());
        }
    }
    combos.into_values().collect()
}

/// Shared classes every render of `node` carries regardless of variants.
pub fn default_classes(ctx: &PassContext<'_>, node: &Node) -> Vec<String> {
    let mut out = Vec::new();
    if ctx.is_root(node.uuid()) {
        out.push(ROOT_RESET_CLASS.to_string());
        out.push(TOKENS_CLASS.to_string());
    }
    if let Node::Tag(tag) = node {
        if ctx.site.default_tag_styles.contains_key(&tag.tag) {
            out.push(format!("{}{}", DEFAULT_TAG_CLASS_PREFIX, tag.tag));
        }
        if tag.kind == TagKind::Text {
            out.push(format!("{}text", DEFAULT_TAG_CLASS_PREFIX));
        }
    }
    out
}

/// `classNames(<unconditional>, { <class>: <check> })` for a node.
pub fn serialize_class_names(ctx: &mut PassContext<'_>, node: &Node) -> Result<String> {
    let base = make_class_name(ctx, node, &[])?;
    ctx.metadata
        .class_names
        .insert(node.uuid().to_string(), base.clone());

    let mut uncond: Vec<String> = default_classes(ctx, node)
        .iter()
        .map(|c| shared_class_ref(ctx, c))
        .collect();
    uncond.push(class_ref(ctx, &base));

    let mut conditional: BTreeMap<String, String> = BTreeMap::new();
    let mut recorded: Vec<(String, String)> = Vec::new();
    {
        let checker = VariantComboChecker::new(ctx).ignoring_screen();
        let force = ctx.options.force_include_internal_props;
        let mut seen = BTreeSet::new();
        for vs in node.vsettings() {
            if vs.styles.is_empty() && vs.mixins.is_empty() {
                continue;
            }
            if !should_gen_variant_setting(vs, &ctx.variants, ctx.component, force) {
                continue;
            }
            let rule: Vec<String> = rule_variants(ctx, &vs.variants)?
                .iter()
                .map(|i| i.variant.uuid.clone())
                .collect();
            if rule.is_empty() || !seen.insert(combo_key(&rule)) {
                continue;
            }
            let name = make_class_name(ctx, node, &rule)?;
            recorded.push((format!("{}:{}", node.uuid(), combo_key(&rule)), name.clone()));
            conditional.insert(class_ref(ctx, &name), checker.check(&rule)?);
        }

        if ctx.is_root(node.uuid()) {
            for combo in site_theme_combos(ctx.site) {
                let name = make_class_name_for_combo(ctx, &combo)?;
                conditional.insert(shared_class_ref(ctx, &name), checker.check(&combo)?);
            }
        }
    }
    ctx.metadata.class_names.extend(recorded);
    ctx.metadata.use_runtime("classNames");

    let mut args = uncond;
    if !conditional.is_empty() {
        let entries: Vec<String> = conditional
            .iter()
            .map(|(reference, check)| format!("{}: {}", conditional_key(ctx, reference), check))
            .collect();
        args.push(format!("{{ {} }}", entries.join(", ")));
    }
    Ok(format!("classNames({})", args.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{fixture_ctx, fixture_ctx_with};
    use crate::CompilerOptions;
    use serde_json::json;

    fn site_with(root_uuid: &str, size_uuid: &str) -> Site {
        serde_json::from_value(json!({
            "components": [{
                "uuid": "card",
                "name": "Card",
                "params": [
                    { "uuid": "p-size", "name": "size", "type": "variant" },
                    { "uuid": "p-disabled", "name": "disabled", "type": "variant" }
                ],
                "variantGroups": [
                    { "uuid": "g-size", "name": "size", "param": "p-size", "variants": [
                        { "uuid": size_uuid, "name": "large" }
                    ]},
                    { "uuid": "g-disabled", "name": "disabled", "param": "p-disabled", "variants": [
                        { "uuid": "dis000001", "name": "disabled" }
                    ]}
                ],
                "styleVariants": [
                    { "uuid": "hov000001", "name": "Hover", "selectors": [":hover"] }
                ],
                "tplTree": {
                    "type": "tag", "uuid": root_uuid, "tag": "div",
                    "vsettings": [
                        { "variants": [], "styles": { "color": "blue" } },
                        { "variants": [size_uuid], "styles": { "color": "green" } },
                        { "variants": ["dis000001"], "styles": { "opacity": "0.5" } },
                        { "variants": ["hov000001"], "styles": { "color": "red" } }
                    ],
                    "children": [
                        { "type": "tag", "uuid": "title00001", "name": "Title", "tag": "h1", "kind": "text",
                          "vsettings": [{ "variants": [] }] }
                    ]
                }
            }]
        }))
        .unwrap()
    }

    fn large() -> Vec<String> {
        vec!["lrg000001".to_string()]
    }

    #[test]
    fn test_plain_class_name_shape() {
        let site = site_with("root000001", "lrg000001");
        let ctx = fixture_ctx(&site, "card");
        let root = &ctx.component.tpl_tree;
        assert_eq!(make_class_name(&ctx, root, &[]).unwrap(), "Card__freeBox__root0");
        assert_eq!(
            make_class_name(&ctx, root, &large()).unwrap(),
            "Card__freeBox__size_large__root0_lrg00"
        );
        let standalone = vec!["dis000001".to_string()];
        assert_eq!(
            make_class_name(&ctx, root, &standalone).unwrap(),
            "Card__freeBox__disabled__root0_dis00"
        );
        // style variants are expressed by selectors, not by the name
        let hover = vec!["hov000001".to_string()];
        assert_eq!(make_class_name(&ctx, root, &hover).unwrap(), "Card__freeBox__root0");
    }

    #[test]
    fn test_identifier_stability() {
        let a = site_with("root000001", "lrg000001");
        let b = site_with("root000001", "lrg000001");
        let ctx_a = fixture_ctx(&a, "card");
        let ctx_b = fixture_ctx(&b, "card");
        let name_a = make_class_name(&ctx_a, &ctx_a.component.tpl_tree, &large()).unwrap();
        let name_b = make_class_name(&ctx_b, &ctx_b.component.tpl_tree, &large()).unwrap();
        assert_eq!(name_a, name_b);

        let moved_node = site_with("xyz000001", "lrg000001");
        let ctx_c = fixture_ctx(&moved_node, "card");
        assert_ne!(name_a, make_class_name(&ctx_c, &ctx_c.component.tpl_tree, &large()).unwrap());

        let moved_variant = site_with("root000001", "big000001");
        let ctx_d = fixture_ctx(&moved_variant, "card");
        let big = vec!["big000001".to_string()];
        assert_ne!(name_a, make_class_name(&ctx_d, &ctx_d.component.tpl_tree, &big).unwrap());
    }

    #[test]
    fn test_plain_name_ignores_label_renames() {
        let site = site_with("root000001", "lrg000001");
        let mut renamed = site.clone();
        if let Node::Tag(root) = &mut renamed.components[0].tpl_tree {
            if let Node::Tag(title) = &mut root.children[0] {
                title.name = Some("Headline".to_string());
            }
        }
        let ctx = fixture_ctx(&site, "card");
        let ctx_renamed = fixture_ctx(&renamed, "card");
        let title = ctx.require_node("title00001").unwrap();
        let title_renamed = ctx_renamed.require_node("title00001").unwrap();
        assert_eq!(
            make_class_name(&ctx, title, &[]).unwrap(),
            make_class_name(&ctx_renamed, title_renamed, &[]).unwrap()
        );
    }

    #[test]
    fn test_scoped_and_short_modes() {
        let site = site_with("root000001", "lrg000001");
        let scoped = fixture_ctx_with(
            &site,
            "card",
            CompilerOptions {
                style_scheme: StyleScheme::Scoped,
                ..Default::default()
            },
        );
        let title = scoped.require_node("title00001").unwrap();
        assert_eq!(make_class_name(&scoped, title, &[]).unwrap(), "title");
        assert_eq!(class_ref(&scoped, "title"), "sty.title");

        let short = fixture_ctx_with(
            &site,
            "card",
            CompilerOptions {
                use_short_identifiers: true,
                ..Default::default()
            },
        );
        assert_eq!(
            make_class_name(&short, &short.component.tpl_tree, &large()).unwrap(),
            "_croot0_lrg00"
        );
    }

    #[test]
    fn test_serialize_class_names() {
        let site = site_with("root000001", "lrg000001");
        let mut ctx = fixture_ctx(&site, "card");
        let root = ctx.component.tpl_tree.clone();
        let out = serialize_class_names(&mut ctx, &root).unwrap();
        assert_eq!(
            out,
            "classNames(\"root_reset\", \"dc_tokens\", \"Card__freeBox__root0\", { \
             Card__freeBox__disabled__root0_dis00: hasVariant(variants, \"disabled\", \"disabled\"), \
             Card__freeBox__size_large__root0_lrg00: hasVariant(variants, \"size\", \"large\") })"
        );
        assert!(ctx.metadata.runtime_imports.contains("classNames"));
        assert_eq!(
            ctx.metadata.class_names.get("root000001:lrg000001").map(|s| s.as_str()),
            Some("Card__freeBox__size_large__root0_lrg00")
        );
    }
}
