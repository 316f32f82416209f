//! Expression serialization
//!
//! Turns a model `Expr` into JavaScript expression text. Every arm either
//! produces a complete expression or fails; no partial text escapes.

use crate::class_names::{class_ref, make_class_name};
use crate::context::PassContext;
use crate::error::{CompilerError, Result};
use crate::localization::{localization_key, translation_lookup};
use crate::types::*;
use crate::utils::{js_key, js_member, js_string, paren, to_var_name};
use regex::Regex;

/// Where an expression is being emitted.
#[derive(Debug, Clone, Default)]
pub struct ExprSite {
    /// Static text here goes through the translator when localization is on.
    pub localizable: bool,
    /// Model location used by path-based translation keys.
    pub path: Vec<String>,
}

impl ExprSite {
    pub fn value() -> Self {
        Self::default()
    }

    pub fn localizable(path: Vec<String>) -> Self {
        Self {
            localizable: true,
            path,
        }
    }
}

pub fn serialize_expr(ctx: &mut PassContext<'_>, expr: &Expr, site: &ExprSite) -> Result<String> {
    match expr {
        Expr::Literal { value } => match value {
            serde_json::Value::String(text) => Ok(static_text(ctx, text, site)),
            other => Ok(other.to_string()),
        },

        Expr::Code { code, fallback } => {
            let code = code.trim();
            if code.is_empty() {
                return Ok("undefined".to_string());
            }
            match fallback {
                Some(fb) => with_fallback(ctx, code, fb, site),
                None => Ok(paren(code)),
            }
        }

        Expr::ObjectPath { path, fallback } => {
            let access = object_path(ctx, path)?;
            match fallback {
                Some(fb) => with_fallback(ctx, &access, fb, site),
                None => Ok(access),
            }
        }

        Expr::VarRef { param } => {
            if let Some(p) = ctx.component.param(param) {
                return Ok(js_member("args", &p.prop_name()));
            }
            let owner = ctx
                .site
                .components
                .iter()
                .find(|c| c.param(param).is_some())
                .map(|c| c.name.clone());
            Err(match owner {
                Some(other) => ctx.model_error(format!(
                    "expression references param '{}' of component '{}'",
                    param, other
                )),
                None => ctx.model_error(format!("dangling param reference '{}'", param)),
            })
        }

        Expr::TokenRef { token, fallback } => match ctx.site.token(token) {
            Some(t) => {
                ctx.metadata.used_tokens.insert(t.uuid.clone());
                Ok(js_string(&ctx.collaborators.style_vars.token_ref(t)))
            }
            None => match fallback {
                Some(fb) => {
                    log::warn!(
                        "Component '{}': stale token reference '{}', using fallback",
                        ctx.component.name,
                        token
                    );
                    serialize_expr(ctx, fb, site)
                }
                None => Err(ctx.model_error(format!("stale token reference '{}'", token))),
            },
        },

        Expr::AssetRef { asset } => {
            let found = ctx.site.image_asset(asset);
            match found {
                Some(a) => {
                    ctx.metadata.used_assets.insert(a.uuid.clone());
                    let link = ctx.collaborators.assets.link(a).unwrap_or_default();
                    Ok(js_string(&link))
                }
                None => {
                    log::warn!(
                        "Component '{}': asset '{}' not found, emitting empty link",
                        ctx.component.name,
                        asset
                    );
                    Ok(js_string(""))
                }
            }
        }

        Expr::StyleClass { node } => {
            let target = ctx.require_node(node)?;
            let name = make_class_name(ctx, target, &[])?;
            Ok(class_ref(ctx, &name))
        }

        Expr::Template { parts } => serialize_template(ctx, parts, site),

        Expr::Render { .. } => Err(CompilerError::unsupported(
            "render expression",
            format!("value position of component '{}'", ctx.component.name),
        )),

        Expr::VariantsRef { variants } => {
            let mut names = Vec::new();
            for uuid in variants {
                let info = ctx.variants.require(uuid, &ctx.component.name)?;
                names.push(js_string(&info.variant_key()));
            }
            Ok(format!("[{}]", names.join(", ")))
        }

        Expr::PageHref { page, params } => serialize_page_href(ctx, page, params),

        Expr::Collection { items } => {
            let mut out = Vec::new();
            for item in items {
                out.push(serialize_expr(ctx, item, &ExprSite::value())?);
            }
            Ok(format!("[{}]", out.join(", ")))
        }

        Expr::Map { entries } => {
            if entries.is_empty() {
                return Ok("{}".to_string());
            }
            let mut out = Vec::new();
            for (key, value) in entries {
                out.push(format!("{}: {}", js_key(key), serialize_expr(ctx, value, &ExprSite::value())?));
            }
            Ok(format!("{{ {} }}", out.join(", ")))
        }

        Expr::Function { arg_names, body } => {
            let args: Vec<String> = arg_names.iter().map(|a| to_var_name(a)).collect();
            let body = serialize_expr(ctx, body, &ExprSite::value())?;
            Ok(format!("({}) => {}", args.join(", "), paren(&body)))
        }
    }
}

fn static_text(ctx: &mut PassContext<'_>, text: &str, site: &ExprSite) -> String {
    let localization = match (&ctx.options.localization, site.localizable) {
        (Some(l), true) if !text.trim().is_empty() => l.clone(),
        _ => return js_string(text),
    };
    let key = localization_key(&localization, text, &site.path);
    ctx.metadata.localized_strings.insert(key.clone(), text.to_string());
    ctx.metadata.use_runtime("useTranslator");
    translation_lookup(&key, text)
}

fn serialize_template(ctx: &mut PassContext<'_>, parts: &[TemplatePart], site: &ExprSite) -> Result<String> {
    let all_static = parts.iter().all(|p| matches!(p, TemplatePart::Text(_)));
    if all_static {
        let text: String = parts
            .iter()
            .filter_map(|p| match p {
                TemplatePart::Text(t) => Some(t.as_str()),
                TemplatePart::Expr(_) => None,
            })
            .collect();
        return Ok(static_text(ctx, &text, site));
    }

    let mut out = String::from("`");
    for part in parts {
        match part {
            TemplatePart::Text(text) => out.push_str(&escape_template_text(text)),
            TemplatePart::Expr(expr) => {
                let value = serialize_expr(ctx, expr, &ExprSite::value())?;
                out.push_str("${");
                out.push_str(&value);
                out.push('}');
            }
        }
    }
    out.push('`');
    Ok(out)
}

fn escape_template_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

fn object_path(ctx: &PassContext<'_>, path: &[serde_json::Value]) -> Result<String> {
    let mut iter = path.iter();
    let mut out = match iter.next() {
        Some(serde_json::Value::String(root)) => root.clone(),
        Some(other) => {
            return Err(ctx.model_error(format!("object path must start with a name, got {}", other)))
        }
        None => return Err(ctx.model_error("empty object path")),
    };
    for segment in iter {
        match segment {
            serde_json::Value::String(key) => out = js_member(&out, key),
            serde_json::Value::Number(n) => out = format!("{}[{}]", out, n),
            other => {
                return Err(ctx.model_error(format!("unsupported object path segment {}", other)))
            }
        }
    }
    Ok(out)
}

/// Evaluates `code`, yielding the fallback when the data isn't there yet.
fn with_fallback(ctx: &mut PassContext<'_>, code: &str, fallback: &Expr, site: &ExprSite) -> Result<String> {
    let fallback = serialize_expr(ctx, fallback, site)?;
    Ok(format!(
        "(() => {{\n  try {{\n    return {};\n  }} catch (e) {{\n    if (e instanceof TypeError || e?.dcType === \"DataLoading\") {{\n      return {};\n    }}\n    throw e;\n  }}\n}})()",
        paren(code),
        fallback
    ))
}

fn serialize_page_href(
    ctx: &mut PassContext<'_>,
    page: &str,
    params: &std::collections::BTreeMap<String, Expr>,
) -> Result<String> {
    let target = ctx
        .site
        .component(page)
        .ok_or_else(|| ctx.model_error(format!("link to unknown page '{}'", page)))?;
    let meta = target
        .page_meta
        .as_ref()
        .ok_or_else(|| ctx.model_error(format!("link target '{}' is not a page", target.name)))?;
    let path = meta.path.clone();

    if params.is_empty() {
        return Ok(js_string(&path));
    }

    let pattern = Regex::new(r"\[(\w+)\]")?;
    let mut out = String::from("`");
    let mut last = 0;
    for caps in pattern.captures_iter(&path) {
        let (whole, name) = match (caps.get(0), caps.get(1)) {
            (Some(w), Some(n)) => (w, n.as_str()),
            _ => continue,
        };
        out.push_str(&escape_template_text(&path[last..whole.start()]));
        match params.get(name) {
            Some(expr) => {
                let value = serialize_expr(ctx, expr, &ExprSite::value())?;
                out.push_str(&format!("${{encodeURIComponent(String({}))}}", value));
            }
            None => out.push_str(&escape_template_text(whole.as_str())),
        }
        last = whole.end();
    }
    out.push_str(&escape_template_text(&path[last..]));
    out.push('`');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{fixture_ctx, fixture_ctx_with};
    use crate::localization::LocalizationOptions;
    use crate::CompilerOptions;
    use serde_json::json;

    fn site() -> Site {
        serde_json::from_value(json!({
            "projectName": "shop",
            "tokens": [{ "uuid": "tok1", "name": "Primary", "value": "#336" }],
            "imageAssets": [
                { "uuid": "img1", "name": "Logo", "dataUri": "data:image/png;base64,AAA" },
                { "uuid": "img2", "name": "Blank" }
            ],
            "components": [
                {
                    "uuid": "card",
                    "name": "Card",
                    "params": [
                        { "uuid": "p-title", "name": "title", "type": "text" },
                        { "uuid": "p-aria", "name": "aria-label", "type": "text" },
                        { "uuid": "p-size", "name": "size", "type": "variant" }
                    ],
                    "variantGroups": [
                        { "uuid": "g-size", "name": "size", "param": "p-size", "variants": [
                            { "uuid": "v-large", "name": "large" }
                        ]}
                    ],
                    "tplTree": { "type": "tag", "uuid": "root000001", "tag": "div", "vsettings": [{ "variants": [] }] }
                },
                {
                    "uuid": "other",
                    "name": "Other",
                    "params": [{ "uuid": "p-other", "name": "label", "type": "text" }],
                    "tplTree": { "type": "tag", "uuid": "oroot00001", "tag": "div", "vsettings": [{ "variants": [] }] }
                },
                {
                    "uuid": "post",
                    "name": "Post Page",
                    "pageMeta": { "path": "/blog/[slug]" },
                    "tplTree": { "type": "tag", "uuid": "proot00001", "tag": "div", "vsettings": [{ "variants": [] }] }
                }
            ]
        }))
        .unwrap()
    }

    fn expr(value: serde_json::Value) -> Expr {
        serde_json::from_value(value).unwrap()
    }

    fn ser(ctx: &mut PassContext<'_>, value: serde_json::Value) -> Result<String> {
        serialize_expr(ctx, &expr(value), &ExprSite::value())
    }

    #[test]
    fn test_literals_and_var_refs() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        assert_eq!(ser(&mut ctx, json!({ "kind": "literal", "value": 42 })).unwrap(), "42");
        assert_eq!(ser(&mut ctx, json!({ "kind": "literal", "value": "hi" })).unwrap(), "\"hi\"");
        assert_eq!(ser(&mut ctx, json!({ "kind": "varRef", "param": "p-title" })).unwrap(), "args.title");
        assert_eq!(ser(&mut ctx, json!({ "kind": "varRef", "param": "p-aria" })).unwrap(), "args.ariaLabel");
    }

    #[test]
    fn test_cross_component_reference_is_rejected() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        let err = ser(&mut ctx, json!({ "kind": "varRef", "param": "p-other" })).unwrap_err();
        assert!(err.to_string().contains("of component 'Other'"));
        let err = ser(&mut ctx, json!({ "kind": "varRef", "param": "missing" })).unwrap_err();
        assert!(err.to_string().contains("dangling"));
    }

    #[test]
    fn test_code_with_fallback() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        assert_eq!(ser(&mut ctx, json!({ "kind": "code", "code": "1 + 1" })).unwrap(), "(1 + 1)");
        let out = ser(
            &mut ctx,
            json!({ "kind": "code", "code": "$queries.items.data", "fallback": { "kind": "literal", "value": [] } }),
        )
        .unwrap();
        assert!(out.starts_with("(() => {\n  try {\n    return ($queries.items.data);"));
        assert!(out.contains("return [];"));
        assert!(out.ends_with("})()"));
    }

    #[test]
    fn test_object_path() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "objectPath", "path": ["currentItem", "tags", 0, "display-name"] })).unwrap(),
            "currentItem.tags[0][\"display-name\"]"
        );
        assert!(ser(&mut ctx, json!({ "kind": "objectPath", "path": [] })).is_err());
    }

    #[test]
    fn test_token_and_asset_refs() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "tokenRef", "token": "tok1" })).unwrap(),
            "\"var(--token-tok1)\""
        );
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "tokenRef", "token": "gone", "fallback": { "kind": "literal", "value": "red" } })).unwrap(),
            "\"red\""
        );
        assert!(ser(&mut ctx, json!({ "kind": "tokenRef", "token": "gone" })).is_err());

        assert_eq!(
            ser(&mut ctx, json!({ "kind": "assetRef", "asset": "img1" })).unwrap(),
            "\"data:image/png;base64,AAA\""
        );
        assert_eq!(ser(&mut ctx, json!({ "kind": "assetRef", "asset": "img2" })).unwrap(), "\"\"");
        assert!(ctx.metadata.used_assets.contains("img1"));
        assert!(ctx.metadata.used_tokens.contains("tok1"));
    }

    #[test]
    fn test_templates() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "template", "parts": ["Hello ", "world"] })).unwrap(),
            "\"Hello world\""
        );
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "template", "parts": ["`Hi` ", { "kind": "varRef", "param": "p-title" }, "!"] })).unwrap(),
            "`\\`Hi\\` ${args.title}!`"
        );
    }

    #[test]
    fn test_localized_static_text() {
        let site = site();
        let mut ctx = fixture_ctx_with(
            &site,
            "card",
            CompilerOptions {
                localization: Some(LocalizationOptions::default()),
                ..Default::default()
            },
        );
        let out = serialize_expr(
            &mut ctx,
            &Expr::string("Buy now"),
            &ExprSite::localizable(vec!["shop".into(), "Card".into()]),
        )
        .unwrap();
        assert_eq!(out, "($translator?.(\"Buy now\") ?? \"Buy now\")");
        assert_eq!(ctx.metadata.localized_strings.get("Buy now").map(|s| s.as_str()), Some("Buy now"));

        // not a localizable position
        assert_eq!(ser(&mut ctx, json!({ "kind": "literal", "value": "id-1" })).unwrap(), "\"id-1\"");
    }

    #[test]
    fn test_structural_kinds() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "collection", "items": [
                { "kind": "literal", "value": 1 }, { "kind": "varRef", "param": "p-title" }
            ] }))
            .unwrap(),
            "[1, args.title]"
        );
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "map", "entries": {
                "b-c": { "kind": "literal", "value": true }, "a": { "kind": "literal", "value": null }
            } }))
            .unwrap(),
            "{ a: null, \"b-c\": true }"
        );
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "function", "argNames": ["event"], "body": { "kind": "code", "code": "event.target.value" } }))
                .unwrap(),
            "(event) => (event.target.value)"
        );
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "variantsRef", "variants": ["v-large"] })).unwrap(),
            "[\"large\"]"
        );
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "styleClass", "node": "root000001" })).unwrap(),
            "\"Card__freeBox__root0\""
        );
    }

    #[test]
    fn test_page_href() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "pageHref", "page": "post" })).unwrap(),
            "\"/blog/[slug]\""
        );
        assert_eq!(
            ser(&mut ctx, json!({ "kind": "pageHref", "page": "post", "params": {
                "slug": { "kind": "varRef", "param": "p-title" }
            } }))
            .unwrap(),
            "`/blog/${encodeURIComponent(String(args.title))}`"
        );
        assert!(ser(&mut ctx, json!({ "kind": "pageHref", "page": "card" })).is_err());
    }

    #[test]
    fn test_render_is_unsupported_as_value() {
        let site = site();
        let mut ctx = fixture_ctx(&site, "card");
        let err = ser(&mut ctx, json!({ "kind": "render", "nodes": [] })).unwrap_err();
        assert!(matches!(err, CompilerError::UnsupportedKind { .. }));
    }
}
