//! Core types and constants for the design compiler
//!
//! The design model is a read-only JSON document produced by the editor. Every
//! type here derives `Deserialize` with camelCase field names so a persisted
//! model can be loaded with `serde_json` directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// Runtime package the generated modules import from
pub const RUNTIME_PACKAGE: &str = "@designc/runtime";

// Identifier constants
pub const UNIQUE_ID_LEN: usize = 5;
pub const SHORT_CLASS_PREFIX: &str = "_c";
pub const ROOT_NODE_NAME: &str = "root";
pub const ROOT_RESET_CLASS: &str = "root_reset";
pub const DEFAULT_TAG_CLASS_PREFIX: &str = "__dc_";

/// A whole design: components plus the shared styling surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub global_variant_groups: Vec<VariantGroup>,
    #[serde(default)]
    pub tokens: Vec<StyleToken>,
    #[serde(default)]
    pub mixins: Vec<Mixin>,
    #[serde(default)]
    pub image_assets: Vec<ImageAsset>,
    #[serde(default)]
    pub theme_rules: Vec<ThemeRule>,
    /// Per-tag default styles applied to every element of that tag.
    #[serde(default)]
    pub default_tag_styles: BTreeMap<String, BTreeMap<String, String>>,
}

impl Site {
    pub fn component(&self, uuid: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.uuid == uuid)
    }

    pub fn component_by_name_or_uuid(&self, key: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|c| c.uuid == key)
            .or_else(|| self.components.iter().find(|c| c.name == key))
    }

    pub fn token(&self, uuid: &str) -> Option<&StyleToken> {
        self.tokens.iter().find(|t| t.uuid == uuid)
    }

    pub fn mixin(&self, uuid: &str) -> Option<&Mixin> {
        self.mixins.iter().find(|m| m.uuid == uuid)
    }

    pub fn image_asset(&self, uuid: &str) -> Option<&ImageAsset> {
        self.image_assets.iter().find(|a| a.uuid == uuid)
    }
}

/// A named render unit: one node tree plus its configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub uuid: String,
    pub name: String,
    pub tpl_tree: Node,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub variant_groups: Vec<VariantGroup>,
    /// Interaction-triggered variants (hover, focus, pressed ...).
    #[serde(default)]
    pub style_variants: Vec<Variant>,
    #[serde(default)]
    pub states: Vec<State>,
    #[serde(default)]
    pub data_queries: Vec<DataQuery>,
    #[serde(default)]
    pub page_meta: Option<PageMeta>,
    #[serde(default)]
    pub helpers: Option<StateHelpers>,
}

impl Component {
    pub fn param(&self, uuid: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.uuid == uuid)
    }

    pub fn is_page(&self) -> bool {
        self.page_meta.is_some()
    }

    pub fn variant_group_for_param(&self, param_uuid: &str) -> Option<&VariantGroup> {
        self.variant_groups
            .iter()
            .find(|g| g.param.as_deref() == Some(param_uuid))
    }
}

/// Imperative helper hooks a component exposes for its states.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateHelpers {
    /// Exported identifier of the helper object, e.g. `TextInputHelpers`.
    pub import_name: String,
    #[serde(default)]
    pub import_path: Option<String>,
}

/// One node of a component's render tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Tag(TagNode),
    Component(ComponentNode),
    Slot(SlotNode),
}

impl Node {
    pub fn uuid(&self) -> &str {
        match self {
            Node::Tag(n) => &n.uuid,
            Node::Component(n) => &n.uuid,
            Node::Slot(n) => &n.uuid,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Tag(n) => n.name.as_deref(),
            Node::Component(n) => n.name.as_deref(),
            Node::Slot(n) => n.name.as_deref(),
        }
    }

    pub fn vsettings(&self) -> &[VariantSetting] {
        match self {
            Node::Tag(n) => &n.vsettings,
            Node::Component(n) => &n.vsettings,
            Node::Slot(n) => &n.vsettings,
        }
    }

    pub fn data_rep(&self) -> Option<&DataRep> {
        match self {
            Node::Tag(n) => n.data_rep.as_ref(),
            Node::Component(n) => n.data_rep.as_ref(),
            Node::Slot(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Tag(_) => "tag",
            Node::Component(_) => "component",
            Node::Slot(_) => "slot",
        }
    }

    /// Direct structural children, including slot arguments and slot defaults.
    pub fn child_nodes(&self) -> Vec<&Node> {
        let mut out: Vec<&Node> = Vec::new();
        match self {
            Node::Tag(n) => out.extend(n.children.iter()),
            Node::Component(_) => {}
            Node::Slot(n) => out.extend(n.default_contents.iter()),
        }
        for vs in self.vsettings() {
            for arg in &vs.args {
                arg.expr.collect_render_nodes(&mut out);
            }
            if let Some(children) = &vs.children {
                children.collect_render_nodes(&mut out);
            }
        }
        out
    }

    /// Pre-order walk of this node and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node)) {
        visit(self);
        for child in self.child_nodes() {
            child.walk(visit);
        }
    }

    pub fn base_setting(&self) -> Option<&VariantSetting> {
        self.vsettings().iter().find(|vs| vs.variants.is_empty())
    }
}

/// Element node: an HTML tag with children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagNode {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    pub tag: String,
    #[serde(default)]
    pub kind: TagKind,
    #[serde(default)]
    pub vsettings: Vec<VariantSetting>,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default)]
    pub data_rep: Option<DataRep>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagKind {
    #[default]
    Element,
    Text,
    Image,
    Column,
    Row,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TagKind::Element => "element",
            TagKind::Text => "text",
            TagKind::Image => "img",
            TagKind::Column => "column",
            TagKind::Row => "row",
        };
        write!(f, "{}", s)
    }
}

/// Instance of another component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Uuid of the instantiated component.
    pub component: String,
    #[serde(default)]
    pub vsettings: Vec<VariantSetting>,
    #[serde(default)]
    pub data_rep: Option<DataRep>,
}

/// Content injection point bound to a slot param.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotNode {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    pub param: String,
    #[serde(default)]
    pub vsettings: Vec<VariantSetting>,
    #[serde(default)]
    pub default_contents: Vec<Node>,
}

/// Render once per item of `collection`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRep {
    pub collection: Expr,
    #[serde(default)]
    pub element_name: Option<String>,
    #[serde(default)]
    pub index_name: Option<String>,
}

/// Payload for one (node, combo) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSetting {
    /// Variant uuids; empty means the base combo.
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, Expr>,
    #[serde(default)]
    pub args: Vec<Arg>,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    #[serde(default)]
    pub mixins: Vec<String>,
    #[serde(default)]
    pub text: Option<TextContent>,
    #[serde(default)]
    pub children: Option<Expr>,
    #[serde(default)]
    pub data_cond: Option<Expr>,
}

impl VariantSetting {
    pub fn is_base(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn arg(&self, param_uuid: &str) -> Option<&Arg> {
        self.args.iter().find(|a| a.param == param_uuid)
    }

    /// Whether this setting carries anything that must be evaluated at runtime.
    pub fn has_runtime_payload(&self) -> bool {
        self.data_cond.is_some()
            || self.text.is_some()
            || !self.args.is_empty()
            || !self.attrs.is_empty()
            || self.children.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arg {
    pub param: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TextContent {
    Raw { text: String },
    Dynamic { expr: Expr },
}

/// Typed configuration value of a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Param {
    pub uuid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub export_type: ExportType,
    #[serde(default)]
    pub default_expr: Option<Expr>,
    #[serde(default)]
    pub is_localizable: bool,
    /// Argument names for event handler params.
    #[serde(default)]
    pub handler_args: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Param {
    /// Key of the param in `args` and in the generated props type.
    pub fn prop_name(&self) -> String {
        crate::utils::to_var_name(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamType {
    Text,
    Number,
    Bool,
    Img,
    Href,
    Any,
    Slot,
    RenderFunc,
    Variant,
    EventHandler,
    StateChange,
}

impl ParamType {
    pub fn ts_type(&self) -> &'static str {
        match self {
            ParamType::Text | ParamType::Href | ParamType::Img => "string",
            ParamType::Number => "number",
            ParamType::Bool => "boolean",
            ParamType::Any => "any",
            ParamType::Slot => "React.ReactNode",
            ParamType::RenderFunc => "(...args: any[]) => React.ReactNode",
            ParamType::Variant => "any",
            ParamType::EventHandler | ParamType::StateChange => "(...args: any[]) => void",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportType {
    Internal,
    #[default]
    External,
    ToolsOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantGroup {
    pub uuid: String,
    pub name: String,
    /// Selector param; required for component groups.
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub group_type: VariantGroupType,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariantGroupType {
    #[default]
    Component,
    GlobalUserDefined,
    GlobalScreen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub media_query: Option<String>,
    /// Node whose interaction triggers a style variant; the root when absent.
    #[serde(default)]
    pub for_node: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub access: StateAccess,
    #[serde(default = "default_variable_type")]
    pub variable_type: String,
    /// Owning node; states without one belong to the component itself.
    #[serde(default)]
    pub tpl_node: Option<String>,
    #[serde(default)]
    pub binding: Option<StateBinding>,
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub on_change_param: Option<String>,
    #[serde(default)]
    pub init_expr: Option<Expr>,
}

fn default_variable_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateAccess {
    ReadOnly,
    Writable,
    #[default]
    Private,
}

impl StateAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateAccess::ReadOnly => "readonly",
            StateAccess::Writable => "writable",
            StateAccess::Private => "private",
        }
    }
}

/// Where a node-owned state reads its value from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StateBinding {
    /// Element attribute, e.g. `value` of an input.
    Attr { attr: String },
    /// Argument of the owning instance; `param` belongs to the instantiated component.
    Arg {
        param: String,
        #[serde(default, rename = "onChangeParam")]
        on_change_param: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    pub uuid: String,
    pub name: String,
    pub op: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub path: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub og_image_src: Option<String>,
    #[serde(default)]
    pub canonical: Option<String>,
    /// Role required to view the page when auth gating is enabled.
    #[serde(default)]
    pub role_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleToken {
    pub uuid: String,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub variant_values: Vec<TokenVariantValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenVariantValue {
    pub variants: Vec<String>,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mixin {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub kind: AssetKind,
    #[serde(default)]
    pub data_uri: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetKind {
    #[default]
    Picture,
    Icon,
}

/// Site-wide styles for a tag, optionally active only under global variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRule {
    pub selector: String,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
}

/// Closed set of expression kinds that can appear in a setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    Literal {
        value: serde_json::Value,
    },
    Code {
        code: String,
        #[serde(default)]
        fallback: Option<Box<Expr>>,
    },
    ObjectPath {
        path: Vec<serde_json::Value>,
        #[serde(default)]
        fallback: Option<Box<Expr>>,
    },
    VarRef {
        param: String,
    },
    TokenRef {
        token: String,
        #[serde(default)]
        fallback: Option<Box<Expr>>,
    },
    AssetRef {
        asset: String,
    },
    StyleClass {
        node: String,
    },
    Template {
        parts: Vec<TemplatePart>,
    },
    Render {
        nodes: Vec<Node>,
    },
    VariantsRef {
        variants: Vec<String>,
    },
    PageHref {
        page: String,
        #[serde(default)]
        params: BTreeMap<String, Expr>,
    },
    Collection {
        items: Vec<Expr>,
    },
    Map {
        entries: BTreeMap<String, Expr>,
    },
    Function {
        #[serde(default, rename = "argNames")]
        arg_names: Vec<String>,
        body: Box<Expr>,
    },
}

impl Expr {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Literal { .. } => "literal",
            Expr::Code { .. } => "code",
            Expr::ObjectPath { .. } => "objectPath",
            Expr::VarRef { .. } => "varRef",
            Expr::TokenRef { .. } => "tokenRef",
            Expr::AssetRef { .. } => "assetRef",
            Expr::StyleClass { .. } => "styleClass",
            Expr::Template { .. } => "template",
            Expr::Render { .. } => "render",
            Expr::VariantsRef { .. } => "variantsRef",
            Expr::PageHref { .. } => "pageHref",
            Expr::Collection { .. } => "collection",
            Expr::Map { .. } => "map",
            Expr::Function { .. } => "function",
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal {
            value: serde_json::Value::String(value.into()),
        }
    }

    pub fn code(code: impl Into<String>) -> Self {
        Expr::Code {
            code: code.into(),
            fallback: None,
        }
    }

    /// Nodes embedded in render expressions, at any depth.
    pub fn collect_render_nodes<'a>(&'a self, out: &mut Vec<&'a Node>) {
        match self {
            Expr::Render { nodes } => out.extend(nodes.iter()),
            Expr::Collection { items } => items.iter().for_each(|e| e.collect_render_nodes(out)),
            Expr::Map { entries } => entries.values().for_each(|e| e.collect_render_nodes(out)),
            Expr::Function { body, .. } => body.collect_render_nodes(out),
            _ => {}
        }
    }

    /// Every param uuid this expression reads directly.
    pub fn referenced_params(&self, out: &mut Vec<String>) {
        match self {
            Expr::VarRef { param } => out.push(param.clone()),
            Expr::Code { fallback, .. }
            | Expr::ObjectPath { fallback, .. }
            | Expr::TokenRef { fallback, .. } => {
                if let Some(fb) = fallback {
                    fb.referenced_params(out);
                }
            }
            Expr::Template { parts } => {
                for part in parts {
                    if let TemplatePart::Expr(e) = part {
                        e.referenced_params(out);
                    }
                }
            }
            Expr::PageHref { params, .. } => params.values().for_each(|e| e.referenced_params(out)),
            Expr::Collection { items } => items.iter().for_each(|e| e.referenced_params(out)),
            Expr::Map { entries } => entries.values().for_each(|e| e.referenced_params(out)),
            Expr::Function { body, .. } => body.referenced_params(out),
            Expr::Literal { .. }
            | Expr::AssetRef { .. }
            | Expr::StyleClass { .. }
            | Expr::Render { .. }
            | Expr::VariantsRef { .. } => {}
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_deserialization() {
        let node: Node = serde_json::from_value(json!({
            "type": "tag",
            "uuid": "abcdef1234",
            "tag": "div",
            "vsettings": [{ "variants": [], "styles": { "color": "blue" } }],
            "children": [
                { "type": "slot", "uuid": "slot000001", "param": "p1" }
            ]
        }))
        .unwrap();

        assert_eq!(node.uuid(), "abcdef1234");
        assert!(node.base_setting().is_some());
        assert_eq!(node.child_nodes().len(), 1);
        assert_eq!(node.child_nodes()[0].kind_name(), "slot");
    }

    #[test]
    fn test_unknown_node_type_is_rejected() {
        let result: std::result::Result<Node, _> = serde_json::from_value(json!({
            "type": "frobnicator",
            "uuid": "x"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_walk_visits_render_args() {
        let node: Node = serde_json::from_value(json!({
            "type": "component",
            "uuid": "inst000001",
            "component": "btn",
            "vsettings": [{
                "variants": [],
                "args": [{
                    "param": "children",
                    "expr": { "kind": "render", "nodes": [
                        { "type": "tag", "uuid": "txt0000001", "tag": "div", "kind": "text" }
                    ]}
                }]
            }]
        }))
        .unwrap();

        let mut seen = Vec::new();
        node.walk(&mut |n| seen.push(n.uuid().to_string()));
        assert_eq!(seen, vec!["inst000001", "txt0000001"]);
    }

    #[test]
    fn test_template_parts_untagged() {
        let expr: Expr = serde_json::from_value(json!({
            "kind": "template",
            "parts": ["Hello ", { "kind": "varRef", "param": "p1" }]
        }))
        .unwrap();

        let mut params = Vec::new();
        expr.referenced_params(&mut params);
        assert_eq!(params, vec!["p1".to_string()]);
    }
    #[test]
    fn test_state_access_spelling() {
        let access: StateAccess = serde_json::from_value(json!("readonly")).unwrap();
        assert_eq!(access, StateAccess::ReadOnly);
        assert_eq!(access.as_str(), "readonly");
        assert!(serde_json::from_value::<StateAccess>(json!("readOnly")).is_err());

        let binding: StateBinding = serde_json::from_value(json!({
            "kind": "arg", "param": "p-value", "onChangeParam": "p-on-value"
        }))
        .unwrap();
        match binding {
            StateBinding::Arg { on_change_param, .. } => {
                assert_eq!(on_change_param.as_deref(), Some("p-on-value"))
            }
            other => panic!("unexpected binding {:?}", other),
        }
    }

    #[test]
    fn test_function_arg_names() {
        let expr: Expr = serde_json::from_value(json!({
            "kind": "function",
            "argNames": ["event", "index"],
            "body": { "kind": "code", "code": "event.target.value" }
        }))
        .unwrap();
        match expr {
            Expr::Function { arg_names, .. } => assert_eq!(arg_names, vec!["event", "index"]),
            other => panic!("unexpected expr {:?}", other),
        }
    }
}
