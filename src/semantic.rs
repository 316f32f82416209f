//! Semantic analysis and validation of the design model
//!
//! Runs before any text is emitted so that invariant violations abort the pass
//! with a precise message instead of surfacing halfway through serialization.

use crate::component_resolver::ComponentResolver;
use crate::error::{CompilerError, Result};
use crate::types::*;
use crate::variants::{combo_key, VariantIndex};
use crate::CompilerOptions;
use std::collections::HashSet;

pub struct SemanticAnalyzer {
    errors: Vec<CompilerError>,
    warnings: Vec<String>,
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Validates every component of the site.
    pub fn analyze_site(&mut self, site: &Site) -> Result<()> {
        let mut seen = HashSet::new();
        for component in &site.components {
            if !seen.insert(component.uuid.as_str()) {
                self.errors.push(CompilerError::model(
                    &component.name,
                    format!("component uuid '{}' is used more than once", component.uuid),
                ));
            }
            self.check_component(site, component);
        }
        self.finish()
    }

    pub fn analyze_component(&mut self, site: &Site, component: &Component) -> Result<()> {
        self.check_component(site, component);
        self.finish()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn finish(&mut self) -> Result<()> {
        for warning in &self.warnings {
            log::warn!("{}", warning);
        }

        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        Ok(())
    }

    fn error(&mut self, component: &Component, message: String) {
        self.errors.push(CompilerError::model(&component.name, message));
    }

    fn check_component(&mut self, site: &Site, component: &Component) {
        let index = VariantIndex::build(site, component);

        self.check_variant_groups(component);

        let mut node_uuids = HashSet::new();
        let mut duplicate_nodes = Vec::new();
        component.tpl_tree.walk(&mut |node| {
            if !node_uuids.insert(node.uuid().to_string()) {
                duplicate_nodes.push(node.uuid().to_string());
            }
        });
        for uuid in duplicate_nodes {
            self.error(component, format!("node uuid '{}' appears more than once", uuid));
        }

        let mut nodes = Vec::new();
        component.tpl_tree.walk(&mut |node| nodes.push(node));
        for node in nodes {
            self.check_node(site, component, &index, node);
        }

        for state in &component.states {
            self.check_state(component, &node_uuids, state);
        }
        for param in &component.params {
            if let Some(expr) = &param.default_expr {
                self.check_expr(site, component, expr);
            }
        }
        for query in &component.data_queries {
            self.check_expr(site, component, &query.op);
        }

        let resolver = ComponentResolver::new(site, component, &CompilerOptions::default());
        if let Some(cycle) = resolver.instantiation_cycle(component) {
            self.warnings.push(format!(
                "Component '{}' instantiates itself through {}",
                component.name,
                cycle.join(" -> ")
            ));
        }
    }

    fn check_variant_groups(&mut self, component: &Component) {
        for group in &component.variant_groups {
            if group.group_type != VariantGroupType::Component {
                self.error(
                    component,
                    format!("component variant group '{}' has a global group type", group.name),
                );
                continue;
            }
            let param = group.param.as_deref().and_then(|p| component.param(p));
            match param {
                Some(p) if p.param_type == ParamType::Variant => {}
                Some(p) => self.error(
                    component,
                    format!(
                        "variant group '{}' is selected by param '{}' which is not a variant param",
                        group.name, p.name
                    ),
                ),
                None => self.error(
                    component,
                    format!("variant group '{}' has no valid selector param", group.name),
                ),
            }
            if group.variants.is_empty() {
                self.warnings.push(format!(
                    "Component '{}': variant group '{}' has no variants",
                    component.name, group.name
                ));
            }
        }
    }

    fn check_node(&mut self, site: &Site, component: &Component, index: &VariantIndex<'_>, node: &Node) {
        let settings = node.vsettings();
        if !settings.iter().any(|vs| vs.is_base()) {
            self.error(
                component,
                format!("{} node '{}' has no base variant setting", node.kind_name(), node.uuid()),
            );
        }

        let mut combos = HashSet::new();
        for vs in settings {
            if !combos.insert(combo_key(&vs.variants)) {
                self.error(
                    component,
                    format!(
                        "node '{}' has several settings for the combo [{}]",
                        node.uuid(),
                        combo_key(&vs.variants)
                    ),
                );
            }
            for uuid in &vs.variants {
                if index.get(uuid).is_none() {
                    self.error(
                        component,
                        format!("node '{}' references unknown variant '{}'", node.uuid(), uuid),
                    );
                }
            }
            for expr in vs.attrs.values() {
                self.check_expr(site, component, expr);
            }
            if let Some(TextContent::Dynamic { expr }) = &vs.text {
                self.check_expr(site, component, expr);
            }
            for expr in vs.children.iter().chain(vs.data_cond.iter()) {
                self.check_expr(site, component, expr);
            }
            for arg in &vs.args {
                self.check_expr(site, component, &arg.expr);
            }
        }

        if let Some(rep) = node.data_rep() {
            self.check_expr(site, component, &rep.collection);
        }

        match node {
            Node::Tag(_) => {}
            Node::Component(inst) => self.check_instance(site, component, inst),
            Node::Slot(slot) => match component.param(&slot.param) {
                Some(p) if p.param_type == ParamType::Slot => {}
                Some(p) => self.error(
                    component,
                    format!("slot '{}' is bound to non-slot param '{}'", slot.uuid, p.name),
                ),
                None => self.error(
                    component,
                    format!("slot '{}' is bound to unknown param '{}'", slot.uuid, slot.param),
                ),
            },
        }
    }

    fn check_instance(&mut self, site: &Site, component: &Component, inst: &ComponentNode) {
        let target = match site.component(&inst.component) {
            Some(target) => target,
            None => {
                self.error(
                    component,
                    format!("instance '{}' of unknown component '{}'", inst.uuid, inst.component),
                );
                return;
            }
        };
        for vs in &inst.vsettings {
            for arg in &vs.args {
                if target.param(&arg.param).is_none() {
                    self.error(
                        component,
                        format!(
                            "instance '{}' sets param '{}' that '{}' does not declare",
                            inst.uuid, arg.param, target.name
                        ),
                    );
                }
            }
        }
    }

    fn check_state(&mut self, component: &Component, node_uuids: &HashSet<String>, state: &State) {
        if let Some(node) = &state.tpl_node {
            if !node_uuids.contains(node) {
                self.error(
                    component,
                    format!("state '{}' is owned by unknown node '{}'", state.name, node),
                );
            }
            if state.binding.is_none() {
                self.warnings.push(format!(
                    "Component '{}': node state '{}' has no binding",
                    component.name, state.name
                ));
            }
        }
        for param in state.param.iter().chain(state.on_change_param.iter()) {
            if component.param(param).is_none() {
                self.error(
                    component,
                    format!("state '{}' references unknown param '{}'", state.name, param),
                );
            }
        }
    }

    fn check_expr(&mut self, site: &Site, component: &Component, expr: &Expr) {
        let mut params = Vec::new();
        expr.referenced_params(&mut params);
        for uuid in params {
            if component.param(&uuid).is_some() {
                continue;
            }
            let owner = site.components.iter().find(|c| c.param(&uuid).is_some());
            let message = match owner {
                Some(other) => format!(
                    "expression references param '{}' of component '{}'",
                    uuid, other.name
                ),
                None => format!("dangling param reference '{}'", uuid),
            };
            self.error(component, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn site_with_root(root: serde_json::Value) -> Site {
        serde_json::from_value(json!({
            "components": [
                {
                    "uuid": "card",
                    "name": "Card",
                    "params": [
                        { "uuid": "p-label", "name": "label", "type": "text" },
                        { "uuid": "p-body", "name": "body", "type": "slot" },
                        { "uuid": "p-size", "name": "size", "type": "variant" }
                    ],
                    "variantGroups": [
                        { "uuid": "g-size", "name": "size", "param": "p-size", "variants": [
                            { "uuid": "lrg000001", "name": "large" }
                        ]}
                    ],
                    "tplTree": root
                },
                {
                    "uuid": "other",
                    "name": "Other",
                    "params": [{ "uuid": "p-other", "name": "secret", "type": "text" }],
                    "tplTree": { "type": "tag", "uuid": "oroot00001", "tag": "div", "vsettings": [{ "variants": [] }] }
                }
            ]
        }))
        .unwrap()
    }

    fn analyze(site: &Site) -> Result<()> {
        SemanticAnalyzer::new().analyze_component(site, &site.components[0])
    }

    #[test]
    fn test_valid_component_passes() {
        let site = site_with_root(json!({
            "type": "tag", "uuid": "root000001", "tag": "div",
            "vsettings": [
                { "variants": [], "attrs": { "title": { "kind": "varRef", "param": "p-label" } } },
                { "variants": ["lrg000001"] }
            ],
            "children": [{ "type": "slot", "uuid": "slot000001", "param": "p-body",
                           "vsettings": [{ "variants": [] }] }]
        }));
        assert!(SemanticAnalyzer::new().analyze_site(&site).is_ok());
    }

    #[test]
    fn test_missing_base_setting() {
        let site = site_with_root(json!({
            "type": "tag", "uuid": "root000001", "tag": "div",
            "vsettings": [{ "variants": ["lrg000001"] }]
        }));
        let err = analyze(&site).unwrap_err();
        assert!(err.to_string().contains("has no base variant setting"));
    }

    #[test]
    fn test_duplicate_combo_is_rejected() {
        let site = site_with_root(json!({
            "type": "tag", "uuid": "root000001", "tag": "div",
            "vsettings": [
                { "variants": [] },
                { "variants": ["lrg000001"], "styles": { "color": "red" } },
                { "variants": ["lrg000001"], "styles": { "color": "green" } }
            ]
        }));
        let err = analyze(&site).unwrap_err();
        assert!(err.to_string().contains("several settings for the combo"));
    }

    #[test]
    fn test_cross_component_reference() {
        let site = site_with_root(json!({
            "type": "tag", "uuid": "root000001", "tag": "div",
            "vsettings": [{ "variants": [],
                "attrs": { "title": { "kind": "varRef", "param": "p-other" } } }]
        }));
        let err = analyze(&site).unwrap_err();
        assert!(err.is_model_defect());
        assert!(err.to_string().contains("of component 'Other'"));
    }

    #[test]
    fn test_dangling_variant_and_slot_param() {
        let site = site_with_root(json!({
            "type": "tag", "uuid": "root000001", "tag": "div",
            "vsettings": [{ "variants": [] }, { "variants": ["nope"] }]
        }));
        assert!(analyze(&site).unwrap_err().to_string().contains("unknown variant 'nope'"));

        let site = site_with_root(json!({
            "type": "slot", "uuid": "slot000001", "param": "p-label",
            "vsettings": [{ "variants": [] }]
        }));
        assert!(analyze(&site).unwrap_err().to_string().contains("non-slot param 'label'"));
    }

    #[test]
    fn test_group_without_variant_param() {
        let mut site = site_with_root(json!({
            "type": "tag", "uuid": "root000001", "tag": "div", "vsettings": [{ "variants": [] }]
        }));
        site.components[0].variant_groups[0].param = Some("p-label".to_string());
        let err = analyze(&site).unwrap_err();
        assert!(err.to_string().contains("not a variant param"));
    }

    #[test]
    fn test_self_instantiation_warns() {
        let site = site_with_root(json!({
            "type": "tag", "uuid": "root000001", "tag": "div",
            "vsettings": [{ "variants": [] }],
            "children": [{ "type": "component", "uuid": "inst000001", "component": "card",
                           "vsettings": [{ "variants": [] }] }]
        }));
        let mut analyzer = SemanticAnalyzer::new();
        analyzer.analyze_component(&site, &site.components[0]).unwrap();
        assert_eq!(analyzer.warnings().len(), 1);
        assert!(analyzer.warnings()[0].contains("instantiates itself"));
    }
}
