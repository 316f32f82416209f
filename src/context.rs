//! Per-pass compilation context
//!
//! Everything a pass derives from the model before emitting text lives here:
//! the node-name table, the variant index, component aliases and the metadata
//! accumulator. A context is created for one component, threaded through every
//! emitter by reference and dropped when the pass returns, so independent
//! passes never share mutable state.

use crate::collaborators::Collaborators;
use crate::component_resolver::ComponentResolver;
use crate::error::{CompilerError, Result};
use crate::types::*;
use crate::utils::{short_id, to_class_name, to_var_name, uniquify};
use crate::variants::{explicit_vsettings, trigger_specs, TriggerSpec, VariantIndex, VariantKind};
use crate::CompilerOptions;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Node uuid to the lexical name used everywhere in generated code.
///
/// Built once per pass. Explicitly named nodes keep their (camel-cased) name
/// unless another node claims the same name, in which case none of the
/// claimants get it. The root is always named, `root` by default.
#[derive(Debug, Clone, Default)]
pub struct NodeNamer {
    names: BTreeMap<String, String>,
    summaries: BTreeMap<String, String>,
    order: Vec<String>,
}

impl NodeNamer {
    pub fn build(site: &Site, component: &Component) -> Self {
        let mut order = Vec::new();
        let mut summaries = BTreeMap::new();
        let mut explicit: Vec<(String, String)> = Vec::new();

        component.tpl_tree.walk(&mut |node| {
            order.push(node.uuid().to_string());
            summaries.insert(node.uuid().to_string(), summarize(node, site, component));
            if let Some(name) = node.name() {
                if !name.trim().is_empty() {
                    explicit.push((node.uuid().to_string(), to_var_name(name)));
                }
            }
        });

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (_, name) in &explicit {
            *counts.entry(name.as_str()).or_insert(0) += 1;
        }

        let root_uuid = component.tpl_tree.uuid();
        let mut names = BTreeMap::new();
        for (uuid, name) in &explicit {
            if counts.get(name.as_str()).copied().unwrap_or(0) == 1 || uuid == root_uuid {
                names.insert(uuid.clone(), name.clone());
            } else {
                log::warn!(
                    "Component '{}': node name '{}' is claimed by several nodes, leaving them unnamed",
                    component.name,
                    name
                );
            }
        }

        if !names.contains_key(root_uuid) {
            let taken: BTreeSet<String> = names.values().cloned().collect();
            let root_name = uniquify(ROOT_NODE_NAME, &|c| taken.contains(c));
            names.insert(root_uuid.to_string(), root_name);
        } else if let Some(root_name) = names.get(root_uuid).cloned() {
            // the root wins a contested name
            names.retain(|uuid, name| uuid == root_uuid || *name != root_name);
        }

        Self {
            names,
            summaries,
            order,
        }
    }

    pub fn name(&self, uuid: &str) -> Option<&str> {
        self.names.get(uuid).map(|s| s.as_str())
    }

    pub fn is_named(&self, uuid: &str) -> bool {
        self.names.contains_key(uuid)
    }

    /// Deterministic description of the node's kind, independent of its label.
    pub fn summary(&self, uuid: &str) -> &str {
        self.summaries.get(uuid).map(|s| s.as_str()).unwrap_or("node")
    }

    pub fn display_name(&self, uuid: &str) -> String {
        self.name(uuid)
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.summary(uuid).to_string())
    }

    /// Unique label for trigger flags, also for unnamed nodes.
    pub fn trigger_label(&self, uuid: &str) -> String {
        match self.name(uuid) {
            Some(name) => name.to_string(),
            None => format!("{}{}", self.summary(uuid), to_class_name(&short_id(uuid))),
        }
    }

    /// Named nodes in tree order.
    pub fn named_nodes(&self) -> Vec<(&str, &str)> {
        self.order
            .iter()
            .filter_map(|uuid| self.names.get(uuid).map(|n| (uuid.as_str(), n.as_str())))
            .collect()
    }

    pub fn all_names(&self) -> &BTreeMap<String, String> {
        &self.names
    }
}

fn summarize(node: &Node, site: &Site, component: &Component) -> String {
    match node {
        Node::Tag(tag) => match tag.kind {
            TagKind::Text => "text".to_string(),
            TagKind::Image if tag.tag == "svg" => "svg".to_string(),
            TagKind::Image => "img".to_string(),
            TagKind::Column | TagKind::Row => "freeBox".to_string(),
            TagKind::Element => match tag.tag.as_str() {
                "div" => "freeBox".to_string(),
                "a" => "link".to_string(),
                other => to_var_name(other),
            },
        },
        Node::Component(inst) => site
            .component(&inst.component)
            .map(|c| to_var_name(&c.name))
            .unwrap_or_else(|| "instance".to_string()),
        Node::Slot(slot) => {
            let param = component
                .param(&slot.param)
                .map(|p| p.name.as_str())
                .unwrap_or("slot");
            format!("slotTarget{}", to_class_name(param))
        }
    }
}

/// Introspection output collected while a pass runs.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassMetadata {
    pub node_names: BTreeMap<String, String>,
    /// `nodeUuid` or `nodeUuid:comboKey` to class name.
    pub class_names: BTreeMap<String, String>,
    pub trigger_flags: BTreeSet<String>,
    pub used_fonts: BTreeSet<String>,
    pub referenced_components: BTreeSet<String>,
    pub used_tokens: BTreeSet<String>,
    pub used_assets: BTreeSet<String>,
    /// Icon component name to asset uuid.
    pub used_icons: BTreeMap<String, String>,
    /// Translation key to authored text.
    pub localized_strings: BTreeMap<String, String>,
    pub runtime_imports: BTreeSet<String>,
    pub platform_imports: BTreeSet<String>,
    /// State helper object to the module exporting it.
    pub helper_imports: BTreeMap<String, String>,
}

impl PassMetadata {
    pub fn use_runtime(&mut self, name: &str) {
        if !self.runtime_imports.contains(name) {
            self.runtime_imports.insert(name.to_string());
        }
    }
}

/// State of one compiler pass over one component.
pub struct PassContext<'a> {
    pub site: &'a Site,
    pub component: &'a Component,
    pub options: CompilerOptions,
    pub collaborators: &'a Collaborators,
    pub variants: VariantIndex<'a>,
    pub names: NodeNamer,
    pub components: ComponentResolver<'a>,
    pub metadata: PassMetadata,
    nodes: HashMap<&'a str, &'a Node>,
    rep_depths: HashMap<&'a str, usize>,
}

impl<'a> PassContext<'a> {
    pub fn new(
        site: &'a Site,
        component: &'a Component,
        options: &CompilerOptions,
        collaborators: &'a Collaborators,
    ) -> Self {
        let names = NodeNamer::build(site, component);
        let mut nodes = HashMap::new();
        let mut rep_depths = HashMap::new();
        index_nodes(&component.tpl_tree, 0, &mut nodes, &mut rep_depths);

        let metadata = PassMetadata {
            node_names: names.all_names().clone(),
            ..Default::default()
        };

        Self {
            site,
            component,
            options: options.clone(),
            collaborators,
            variants: VariantIndex::build(site, component),
            names,
            components: ComponentResolver::new(site, component, options),
            metadata,
            nodes,
            rep_depths,
        }
    }

    pub fn node(&self, uuid: &str) -> Option<&'a Node> {
        self.nodes.get(uuid).copied()
    }

    pub fn require_node(&self, uuid: &str) -> Result<&'a Node> {
        self.node(uuid)
            .ok_or_else(|| self.model_error(format!("dangling node reference '{}'", uuid)))
    }

    pub fn model_error(&self, message: impl Into<String>) -> CompilerError {
        CompilerError::model(&self.component.name, message)
    }

    /// Number of repetitions enclosing the node, counting its own.
    pub fn rep_depth(&self, uuid: &str) -> usize {
        self.rep_depths.get(uuid).copied().unwrap_or(0)
    }

    pub fn require_name(&self, uuid: &str) -> Result<String> {
        self.names.name(uuid).map(|s| s.to_string()).ok_or_else(|| {
            self.model_error(format!(
                "node '{}' must have a unique name to own state",
                uuid
            ))
        })
    }

    pub fn is_root(&self, uuid: &str) -> bool {
        self.component.tpl_tree.uuid() == uuid
    }

    /// Trigger hooks the render function must declare, sorted by flag.
    pub fn hook_triggers(&self) -> Vec<TriggerSpec> {
        let root_uuid = self.component.tpl_tree.uuid();
        let mut specs: BTreeMap<String, TriggerSpec> = BTreeMap::new();
        self.component.tpl_tree.walk(&mut |node| {
            for vs in explicit_vsettings(self, node) {
                for uuid in &vs.variants {
                    if let Some(info) = self.variants.get(uuid) {
                        if info.kind == VariantKind::Style {
                            for spec in trigger_specs(info.variant, root_uuid, &self.names) {
                                specs.entry(spec.flag.clone()).or_insert(spec);
                            }
                        }
                    }
                }
            }
        });
        specs.into_values().collect()
    }

    /// Global variant group keys referenced by any setting, sorted.
    pub fn used_global_groups(&self) -> BTreeSet<(String, VariantGroupType)> {
        let mut groups = BTreeSet::new();
        let mut note = |uuid: &str| {
            if let Some(info) = self.variants.get(uuid) {
                if matches!(info.kind, VariantKind::GlobalToggle | VariantKind::Screen) {
                    if let (Some(key), Some(group)) = (&info.group_key, info.group) {
                        groups.insert((key.clone(), group.group_type));
                    }
                }
            }
        };
        self.component.tpl_tree.walk(&mut |node| {
            for vs in node.vsettings() {
                vs.variants.iter().for_each(|v| note(v));
            }
        });
        for token in &self.site.tokens {
            for vv in &token.variant_values {
                vv.variants.iter().for_each(|v| note(v));
            }
        }
        for rule in &self.site.theme_rules {
            rule.variants.iter().for_each(|v| note(v));
        }
        groups
    }
}

impl std::fmt::Debug for PassContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassContext")
            .field("component", &self.component.name)
            .field("options", &self.options)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

fn index_nodes<'a>(
    node: &'a Node,
    parent_depth: usize,
    nodes: &mut HashMap<&'a str, &'a Node>,
    rep_depths: &mut HashMap<&'a str, usize>,
) {
    let depth = parent_depth + usize::from(node.data_rep().is_some());
    nodes.insert(node.uuid(), node);
    rep_depths.insert(node.uuid(), depth);
    for child in node.child_nodes() {
        index_nodes(child, depth, nodes, rep_depths);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Context over `site` with default options; leaks the small fixtures it needs.
    pub(crate) fn fixture_ctx<'a>(site: &'a Site, component_uuid: &str) -> PassContext<'a> {
        fixture_ctx_with(site, component_uuid, CompilerOptions::default())
    }

    pub(crate) fn fixture_ctx_with<'a>(
        site: &'a Site,
        component_uuid: &str,
        options: CompilerOptions,
    ) -> PassContext<'a> {
        let collaborators: &'static Collaborators = Box::leak(Box::new(Collaborators::default()));
        let component = site.component(component_uuid).unwrap();
        PassContext::new(site, component, &options, collaborators)
    }

    fn naming_site() -> Site {
        serde_json::from_value(json!({
            "components": [{
                "uuid": "comp",
                "name": "Panel",
                "tplTree": {
                    "type": "tag", "uuid": "root000001", "tag": "div",
                    "vsettings": [{ "variants": [] }],
                    "children": [
                        { "type": "tag", "uuid": "title00001", "name": "Title", "tag": "h1", "kind": "text",
                          "vsettings": [{ "variants": [] }] },
                        { "type": "tag", "uuid": "dup0000001", "name": "label", "tag": "span",
                          "vsettings": [{ "variants": [] }] },
                        { "type": "tag", "uuid": "dup0000002", "name": "Label", "tag": "span",
                          "vsettings": [{ "variants": [] }] },
                        { "type": "tag", "uuid": "other00001", "name": "root", "tag": "div",
                          "vsettings": [{ "variants": [] }],
                          "dataRep": { "collection": { "kind": "code", "code": "[1, 2]" } },
                          "children": [
                            { "type": "tag", "uuid": "inner00001", "tag": "img", "kind": "image",
                              "vsettings": [{ "variants": [] }] }
                          ]
                        }
                    ]
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_node_namer_resolves_collisions() {
        let site = naming_site();
        let namer = NodeNamer::build(&site, &site.components[0]);

        assert_eq!(namer.name("title00001"), Some("title"));
        // both claim "label", so neither gets it
        assert_eq!(namer.name("dup0000001"), None);
        assert_eq!(namer.name("dup0000002"), None);
        // an explicit "root" wins, the implicit root is uniquified
        assert_eq!(namer.name("other00001"), Some("root"));
        assert_eq!(namer.name("root000001"), Some("root2"));
        assert_eq!(namer.summary("inner00001"), "img");
        assert_eq!(namer.display_name("dup0000001"), "span");
    }

    #[test]
    fn test_node_namer_is_deterministic() {
        let site = naming_site();
        let a = NodeNamer::build(&site, &site.components[0]);
        let b = NodeNamer::build(&site, &site.components[0]);
        assert_eq!(a.all_names(), b.all_names());
        let named: Vec<&str> = a.named_nodes().iter().map(|(_, n)| *n).collect();
        assert_eq!(named, vec!["root2", "title", "root"]);
    }

    #[test]
    fn test_rep_depths() {
        let site = naming_site();
        let ctx = fixture_ctx(&site, "comp");
        assert_eq!(ctx.rep_depth("root000001"), 0);
        assert_eq!(ctx.rep_depth("other00001"), 1);
        assert_eq!(ctx.rep_depth("inner00001"), 1);
        assert!(ctx.require_node("missing").is_err());
        assert!(ctx.metadata.node_names.contains_key("title00001"));
    }
}
