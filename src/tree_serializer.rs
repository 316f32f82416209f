//! Render tree serialization
//!
//! Walks a component's node tree and emits the JSX returned by its render
//! function. Per-combo payloads are folded into conditional expressions with
//! the variant resolver; the only mutable state touched is the pass context.

use crate::class_names::serialize_class_names;
use crate::context::PassContext;
use crate::error::Result;
use crate::expr_serializer::{serialize_expr, ExprSite};
use crate::state_wiring::{helper_registration, state_key_array, states_of_node};
use crate::types::*;
use crate::utils::{indent, js_key, js_member, js_string, jsx_attr, paren, to_class_name, to_var_name};
use crate::variants::{combo_key, explicit_vsettings, is_standalone_group, join_variant_vals, VariantComboChecker};
use std::collections::BTreeSet;

const LOCALIZABLE_ATTRS: &[&str] = &["alt", "aria-label", "label", "placeholder", "title"];

/// Repetition bindings visible at a point of the tree.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Index variables of the enclosing repetitions, outermost first.
    pub rep_indices: Vec<String>,
}

enum Prop {
    Attr(String, String),
    Spread(String),
}

struct Element {
    name: String,
    props: Vec<Prop>,
    children: Vec<String>,
}

impl Element {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            props: Vec::new(),
            children: Vec::new(),
        }
    }

    fn attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.props.push(Prop::Attr(name.into(), value.into()));
    }

    fn render(&self) -> String {
        let props: Vec<String> = self
            .props
            .iter()
            .map(|p| match p {
                Prop::Attr(name, value) => jsx_attr(name, value),
                Prop::Spread(value) => format!("{{...{}}}", value),
            })
            .collect();

        let mut out = format!("<{}", self.name);
        if !props.is_empty() {
            out.push('\n');
            out.push_str(&indent(&props.join("\n"), 2));
            out.push('\n');
        }
        if self.children.is_empty() {
            out.push_str(if props.is_empty() { " />" } else { "/>" });
            return out;
        }
        out.push_str(">\n");
        out.push_str(&indent(&self.children.join("\n"), 2));
        out.push_str(&format!("\n</{}>", self.name));
        out
    }
}

fn as_child(expr: String) -> String {
    if expr.starts_with('<') {
        expr
    } else {
        format!("{{{}}}", expr)
    }
}

fn fragment(children: Vec<String>) -> String {
    match children.len() {
        0 => "null".to_string(),
        1 if children[0].starts_with('<') => children.into_iter().next().unwrap_or_default(),
        _ => {
            let body: Vec<String> = children.into_iter().map(as_child).collect();
            format!("<React.Fragment>\n{}\n</React.Fragment>", indent(&body.join("\n"), 2))
        }
    }
}

fn join_values(ctx: &PassContext<'_>, entries: &[(String, Vec<String>)], default: &str) -> Result<String> {
    let checker = VariantComboChecker::new(ctx);
    Ok(join_variant_vals(entries, &|c| checker.check(c), default)?.value)
}

/// Text of a lone static text node, the shape passed as a bare string.
fn plain_text(nodes: &[Node]) -> Option<&str> {
    match nodes {
        [Node::Tag(tag)] if tag.kind == TagKind::Text && tag.data_rep.is_none() && tag.name.is_none() => {
            match tag.vsettings.as_slice() {
                [vs] if vs.is_base()
                    && vs.attrs.is_empty()
                    && vs.styles.is_empty()
                    && vs.mixins.is_empty()
                    && vs.data_cond.is_none() =>
                {
                    match &vs.text {
                        Some(TextContent::Raw { text }) => Some(text.as_str()),
                        _ => None,
                    }
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn text_path(ctx: &PassContext<'_>, node: &Node, field: &str, combo: &[String]) -> Vec<String> {
    vec![
        ctx.site.project_name.clone(),
        ctx.component.name.clone(),
        ctx.names.display_name(node.uuid()),
        field.to_string(),
        combo_key(combo),
    ]
}

/// JSX for the whole render tree of the pass's component.
pub fn serialize_tree(ctx: &mut PassContext<'_>) -> Result<String> {
    let component = ctx.component;
    if ctx.options.debug_mode {
        log::debug!("Serializing render tree of '{}'", component.name);
    }
    serialize_node(ctx, &component.tpl_tree, &Scope::default())
}

pub fn serialize_node(ctx: &mut PassContext<'_>, node: &Node, scope: &Scope) -> Result<String> {
    let rep = match node.data_rep() {
        Some(rep) => rep,
        None => return serialize_guarded(ctx, node, scope, None),
    };

    let depth = scope.rep_indices.len();
    let item = format!("item_{}", depth);
    let index = format!("index_{}", depth);
    let collection = serialize_expr(ctx, &rep.collection, &ExprSite::value())?;

    let mut inner = scope.clone();
    inner.rep_indices.push(index.clone());
    let body = serialize_guarded(ctx, node, &inner, Some(&index))?;

    let item_alias = rep
        .element_name
        .as_deref()
        .map(to_var_name)
        .unwrap_or_else(|| "currentItem".to_string());
    let index_alias = rep
        .index_name
        .as_deref()
        .map(to_var_name)
        .unwrap_or_else(|| "currentIndex".to_string());

    Ok(format!(
        "((_par) => (!_par ? [] : Array.isArray(_par) ? _par : [_par]))({}).map(({}, {}) => {{\n  const {} = {};\n  const {} = {};\n  return (\n{}\n  );\n}})",
        collection,
        item,
        index,
        item_alias,
        item,
        index_alias,
        index,
        indent(&body, 4)
    ))
}

fn serialize_guarded(ctx: &mut PassContext<'_>, node: &Node, scope: &Scope, key: Option<&str>) -> Result<String> {
    let element = match node {
        Node::Tag(tag) => serialize_tag(ctx, node, tag, scope, key)?,
        Node::Component(inst) => serialize_instance(ctx, node, inst, scope, key)?,
        Node::Slot(slot) => serialize_slot(ctx, node, slot, scope)?,
    };

    let mut conds = Vec::new();
    for vs in explicit_vsettings(ctx, node) {
        if let Some(cond) = &vs.data_cond {
            conds.push((serialize_expr(ctx, cond, &ExprSite::value())?, vs.variants.clone()));
        }
    }
    if conds.is_empty() {
        return Ok(element);
    }
    let cond = join_values(ctx, &conds, "true")?;
    if cond == "true" {
        return Ok(element);
    }
    Ok(format!("{} ? (\n{}\n) : null", paren(&cond), indent(&element, 2)))
}

fn name_props(ctx: &PassContext<'_>, node: &Node, el: &mut Element, key: Option<&str>) {
    if let Some(name) = ctx.names.name(node.uuid()) {
        el.attr("data-dc-name", js_string(name));
        el.attr("data-dc-override", js_member("overrides", name));
    }
    if let Some(key) = key {
        el.attr("key", key);
    }
}

enum IconRender {
    Static(String),
    Conditional(String),
}

fn icon_render(ctx: &mut PassContext<'_>, explicit: &[&VariantSetting]) -> Result<Option<IconRender>> {
    let mut entries = Vec::new();
    for vs in explicit {
        if let Some(Expr::AssetRef { asset }) = vs.attrs.get("src") {
            let found = ctx
                .site
                .image_asset(asset)
                .filter(|a| a.kind == AssetKind::Icon);
            if let Some(icon) = found {
                let name = format!("{}Icon", to_class_name(&icon.name));
                ctx.metadata.used_icons.insert(name.clone(), icon.uuid.clone());
                ctx.metadata.used_assets.insert(icon.uuid.clone());
                entries.push((name, vs.variants.clone()));
            }
        }
    }
    if entries.is_empty() {
        return Ok(None);
    }
    let checker = VariantComboChecker::new(ctx);
    let joined = join_variant_vals(&entries, &|c| checker.check(c), "undefined")?;
    if joined.conditional {
        Ok(Some(IconRender::Conditional(joined.value)))
    } else {
        Ok(Some(IconRender::Static(joined.value)))
    }
}

/// Folds per-combo handlers, plus an optional built-in state update, into one handler.
fn merge_handlers(
    ctx: &PassContext<'_>,
    builtin: Option<String>,
    guard_state_init: bool,
    entries: &[(String, Vec<String>)],
) -> Result<Option<String>> {
    if builtin.is_none() {
        match entries {
            [] => return Ok(None),
            [(handler, combo)] if combo.is_empty() => return Ok(Some(handler.clone())),
            _ => {}
        }
    }

    let checker = VariantComboChecker::new(ctx);
    let mut lines = Vec::new();
    if let Some(builtin) = builtin {
        lines.push(builtin);
        if guard_state_init {
            lines.push("if (eventArgs.length > 1 && eventArgs[1]) {\n  return;\n}".to_string());
        }
    }
    for (handler, combo) in entries {
        let call = format!("await {}?.apply(null, eventArgs);", paren(handler));
        if combo.is_empty() {
            lines.push(call);
        } else {
            lines.push(format!("if ({}) {{\n  {}\n}}", checker.check(combo)?, call));
        }
    }
    Ok(Some(format!("async (...eventArgs) => {{\n{}\n}}", indent(&lines.join("\n"), 2))))
}

fn serialize_tag(
    ctx: &mut PassContext<'_>,
    node: &Node,
    tag: &TagNode,
    scope: &Scope,
    key: Option<&str>,
) -> Result<String> {
    let explicit = explicit_vsettings(ctx, node);
    let mut el = Element::new(tag.tag.clone());
    name_props(ctx, node, &mut el, key);

    let class_names = serialize_class_names(ctx, node)?;
    el.attr("className", class_names);

    let triggers: Vec<String> = ctx
        .hook_triggers()
        .into_iter()
        .filter(|t| t.node_uuid == node.uuid())
        .map(|t| t.props_var)
        .collect();
    if !triggers.is_empty() {
        el.attr("data-dc-trigger-props", format!("[{}]", triggers.join(", ")));
    }

    let mut skip_src = false;
    match (tag.kind, tag.tag.as_str()) {
        (_, "a") => {
            el.name = "DcLink__".to_string();
            ctx.metadata.use_runtime("DcLink__");
            let platform = ctx.options.target_platform;
            el.attr("platform", js_string(platform.as_str()));
            if let Some(import) = platform.link_import() {
                ctx.metadata.platform_imports.insert(import.to_string());
                el.attr("component", "Link");
            }
        }
        (TagKind::Image, "img") if ctx.options.use_optimized_images => {
            el.name = "DcImg__".to_string();
            ctx.metadata.use_runtime("DcImg__");
        }
        (TagKind::Image, "svg") => match icon_render(ctx, &explicit)? {
            Some(IconRender::Static(name)) => {
                el.name = name;
                skip_src = true;
            }
            Some(IconRender::Conditional(value)) => {
                el.name = "DcIcon__".to_string();
                ctx.metadata.use_runtime("DcIcon__");
                el.attr("component", value);
                skip_src = true;
            }
            None => {}
        },
        _ => {}
    }

    // attributes driven by a state owned by this node
    let mut bound_attrs = Vec::new();
    for state in states_of_node(ctx, node.uuid()) {
        if let Some(StateBinding::Attr { attr }) = &state.binding {
            bound_attrs.push((attr.clone(), state));
        }
    }

    let attr_names: BTreeSet<&String> = explicit.iter().flat_map(|vs| vs.attrs.keys()).collect();
    let mut user_on_change = Vec::new();
    for name in attr_names {
        if (skip_src && name == "src") || bound_attrs.iter().any(|(a, _)| a == name) {
            continue;
        }
        let mut entries = Vec::new();
        for vs in &explicit {
            if let Some(expr) = vs.attrs.get(name) {
                let site = if LOCALIZABLE_ATTRS.contains(&name.as_str()) {
                    ExprSite::localizable(text_path(ctx, node, name, &vs.variants))
                } else {
                    ExprSite::value()
                };
                entries.push((serialize_expr(ctx, expr, &site)?, vs.variants.clone()));
            }
        }
        if name == "onChange" && !bound_attrs.is_empty() {
            user_on_change = entries;
            continue;
        }
        let value = join_values(ctx, &entries, "undefined")?;
        el.attr(name.clone(), value);
    }

    for (attr, state) in &bound_attrs {
        let key_array = state_key_array(ctx, state, scope)?;
        ctx.metadata.use_runtime("generateStateValueProp");
        ctx.metadata.use_runtime("generateStateOnChangeProp");
        el.attr(attr.clone(), format!("generateStateValueProp($state, {})", key_array));
        let target_field = if state.variable_type == "boolean" { "checked" } else { "value" };
        let builtin = format!(
            "generateStateOnChangeProp($state, {})(eventArgs[0]?.target?.{});",
            key_array, target_field
        );
        if let Some(handler) = merge_handlers(ctx, Some(builtin), false, &user_on_change)? {
            el.attr("onChange", handler);
        }
    }

    let mut texts = Vec::new();
    if tag.kind == TagKind::Text {
        for vs in &explicit {
            match &vs.text {
                Some(TextContent::Raw { text }) => {
                    let site = ExprSite::localizable(text_path(ctx, node, "text", &vs.variants));
                    texts.push((serialize_expr(ctx, &Expr::string(text.clone()), &site)?, vs.variants.clone()));
                }
                Some(TextContent::Dynamic { expr }) => {
                    texts.push((serialize_expr(ctx, expr, &ExprSite::value())?, vs.variants.clone()));
                }
                None => {}
            }
        }
    }

    if !texts.is_empty() {
        el.children.push(as_child(join_values(ctx, &texts, "\"\"")?));
    } else {
        el.children = serialize_children(ctx, tag, &explicit, scope)?;
    }

    Ok(el.render())
}

fn serialize_children(
    ctx: &mut PassContext<'_>,
    tag: &TagNode,
    explicit: &[&VariantSetting],
    scope: &Scope,
) -> Result<Vec<String>> {
    let mut children = Vec::new();
    for child in &tag.children {
        children.push(serialize_node(ctx, child, scope)?);
    }

    let overridden: Vec<&&VariantSetting> = explicit.iter().filter(|vs| vs.children.is_some()).collect();
    if overridden.is_empty() {
        return Ok(children.into_iter().map(as_child).collect());
    }

    let mut entries = Vec::new();
    if !overridden.iter().any(|vs| vs.is_base()) {
        entries.push((fragment(children), Vec::new()));
    }
    for vs in overridden {
        if let Some(expr) = &vs.children {
            entries.push((serialize_children_expr(ctx, expr, scope)?, vs.variants.clone()));
        }
    }
    Ok(vec![as_child(join_values(ctx, &entries, "null")?)])
}

fn serialize_children_expr(ctx: &mut PassContext<'_>, expr: &Expr, scope: &Scope) -> Result<String> {
    match expr {
        Expr::Render { nodes } => {
            let mut out = Vec::new();
            for node in nodes {
                out.push(serialize_node(ctx, node, scope)?);
            }
            Ok(fragment(out))
        }
        other => serialize_expr(ctx, other, &ExprSite::value()),
    }
}

fn serialize_instance(
    ctx: &mut PassContext<'_>,
    node: &Node,
    inst: &ComponentNode,
    scope: &Scope,
    key: Option<&str>,
) -> Result<String> {
    let target = ctx.components.target(&ctx.component.name, &inst.component)?;
    ctx.metadata.referenced_components.insert(target.uuid.clone());
    let explicit = explicit_vsettings(ctx, node);
    let owned_states = states_of_node(ctx, node.uuid());

    let mut args: Vec<(String, String)> = Vec::new();
    args.push(("className".to_string(), serialize_class_names(ctx, node)?));

    for param in &target.params {
        let value_state = owned_states
            .iter()
            .find(|s| matches!(&s.binding, Some(StateBinding::Arg { param: p, .. }) if p == &param.uuid));
        let change_state = owned_states.iter().find(|s| {
            matches!(&s.binding, Some(StateBinding::Arg { on_change_param: Some(p), .. }) if p == &param.uuid)
        });
        if !ctx.components.is_settable(param) && value_state.is_none() && change_state.is_none() {
            continue;
        }
        let prop = param.prop_name();

        if let Some(state) = value_state {
            ctx.metadata.use_runtime("generateStateValueProp");
            let key_array = state_key_array(ctx, state, scope)?;
            args.push((prop, format!("generateStateValueProp($state, {})", key_array)));
            continue;
        }

        let mut entries = Vec::new();
        for vs in &explicit {
            let arg = match vs.arg(&param.uuid) {
                Some(arg) => arg,
                None => continue,
            };
            let value = match param.param_type {
                ParamType::Variant => serialize_variant_arg(ctx, target, param, &arg.expr)?,
                ParamType::Slot => {
                    let site = ExprSite::localizable(text_path(ctx, node, &param.name, &vs.variants));
                    serialize_slot_arg(ctx, &arg.expr, scope, &site)?
                }
                ParamType::RenderFunc => serialize_render_func(ctx, &arg.expr, scope)?,
                _ if param.is_localizable => {
                    let site = ExprSite::localizable(text_path(ctx, node, &param.name, &vs.variants));
                    serialize_expr(ctx, &arg.expr, &site)?
                }
                _ => serialize_expr(ctx, &arg.expr, &ExprSite::value())?,
            };
            entries.push((value, vs.variants.clone()));
        }

        match param.param_type {
            ParamType::EventHandler | ParamType::StateChange => {
                let builtin = match change_state {
                    Some(state) => {
                        ctx.metadata.use_runtime("generateStateOnChangeProp");
                        Some(format!(
                            "generateStateOnChangeProp($state, {}).apply(null, eventArgs);",
                            state_key_array(ctx, state, scope)?
                        ))
                    }
                    None => None,
                };
                if let Some(handler) = merge_handlers(ctx, builtin, true, &entries)? {
                    args.push((prop, handler));
                }
            }
            _ if entries.is_empty() => {}
            _ => args.push((prop, join_values(ctx, &entries, "undefined")?)),
        }
    }

    let mut el = Element::new(ctx.components.element_name(&target.uuid));
    name_props(ctx, node, &mut el, key);

    match helper_registration(ctx, node, target, scope)? {
        None => {
            for (prop, value) in args {
                el.attr(prop, value);
            }
            Ok(el.render())
        }
        Some(registration) => {
            el.props.push(Prop::Spread("child$Props".to_string()));
            let fields: Vec<String> = args
                .iter()
                .map(|(prop, value)| format!("{}: {}", js_key(prop), value))
                .collect();
            Ok(format!(
                "(() => {{\n  const child$Props = {{\n{}\n  }};\n{}\n  return (\n{}\n  );\n}})()",
                indent(&fields.join(",\n"), 4),
                indent(&registration, 2),
                indent(&el.render(), 4)
            ))
        }
    }
}

/// `true` for a standalone group, a member name, or a list of names for multi groups.
fn serialize_variant_arg(
    ctx: &mut PassContext<'_>,
    target: &Component,
    param: &Param,
    expr: &Expr,
) -> Result<String> {
    let variants = match expr {
        Expr::VariantsRef { variants } => variants,
        other => return serialize_expr(ctx, other, &ExprSite::value()),
    };
    let group = target.variant_group_for_param(&param.uuid).ok_or_else(|| {
        ctx.model_error(format!(
            "variant param '{}' of '{}' has no variant group",
            param.name, target.name
        ))
    })?;

    let mut names = Vec::new();
    for uuid in variants {
        let variant = group.variants.iter().find(|v| &v.uuid == uuid).ok_or_else(|| {
            ctx.model_error(format!(
                "dangling variant reference '{}' in group '{}'",
                uuid, group.name
            ))
        })?;
        names.push(to_var_name(&variant.name));
    }

    if is_standalone_group(group, target) {
        return Ok(if names.is_empty() { "false" } else { "true" }.to_string());
    }
    if group.multi {
        let list: Vec<String> = names.iter().map(|n| js_string(n)).collect();
        return Ok(format!("[{}]", list.join(", ")));
    }
    Ok(names
        .first()
        .map(|n| js_string(n))
        .unwrap_or_else(|| "undefined".to_string()))
}

fn serialize_slot_arg(ctx: &mut PassContext<'_>, expr: &Expr, scope: &Scope, site: &ExprSite) -> Result<String> {
    match expr {
        Expr::Render { nodes } => match plain_text(nodes) {
            Some(text) => serialize_expr(ctx, &Expr::string(text), site),
            None => serialize_children_expr(ctx, expr, scope),
        },
        other => serialize_expr(ctx, other, site),
    }
}

fn serialize_render_func(ctx: &mut PassContext<'_>, expr: &Expr, scope: &Scope) -> Result<String> {
    match expr {
        Expr::Function { arg_names, body } => {
            let args: Vec<String> = arg_names.iter().map(|a| to_var_name(a)).collect();
            let body = serialize_children_expr(ctx, body, scope)?;
            Ok(format!("({}) => (\n{}\n)", args.join(", "), indent(&body, 2)))
        }
        other => serialize_expr(ctx, other, &ExprSite::value()),
    }
}

fn serialize_slot(ctx: &mut PassContext<'_>, node: &Node, slot: &SlotNode, scope: &Scope) -> Result<String> {
    let param = ctx.component.param(&slot.param).ok_or_else(|| {
        ctx.model_error(format!(
            "slot '{}' is bound to unknown param '{}'",
            slot.uuid, slot.param
        ))
    })?;
    ctx.metadata.use_runtime("renderSlot");

    let defaults = match plain_text(&slot.default_contents) {
        Some(text) => {
            let site = ExprSite::localizable(text_path(ctx, node, &param.name, &[]));
            serialize_expr(ctx, &Expr::string(text), &site)?
        }
        None => {
            let mut out = Vec::new();
            for child in &slot.default_contents {
                out.push(serialize_node(ctx, child, scope)?);
            }
            fragment(out)
        }
    };

    let mut fields = vec![
        format!("defaultContents: {}", defaults),
        format!("value: {}", js_member("args", &param.prop_name())),
    ];
    let styled = slot
        .vsettings
        .iter()
        .any(|vs| !vs.styles.is_empty() || !vs.mixins.is_empty());
    if styled {
        fields.push(format!("className: {}", serialize_class_names(ctx, node)?));
    }
    Ok(format!("renderSlot({{\n{}\n}})", indent(&fields.join(",\n"), 2)))
}
