//! Referenced component resolution
//!
//! Collects the components a render tree instantiates, gives each a unique
//! local identifier, and answers which of a target's params an instance may set.

use crate::assembler::file_names;
use crate::error::{CompilerError, Result};
use crate::types::*;
use crate::utils::{to_class_name, uniquify};
use crate::CompilerOptions;
use std::collections::{BTreeMap, BTreeSet};

pub struct ComponentResolver<'a> {
    site: &'a Site,
    /// Component uuid to local identifier.
    aliases: BTreeMap<String, String>,
    options: CompilerOptions,
}

impl<'a> ComponentResolver<'a> {
    pub fn new(site: &'a Site, component: &'a Component, options: &CompilerOptions) -> Self {
        let mut targets: Vec<&'a Component> = Vec::new();
        let mut seen = BTreeSet::new();
        component.tpl_tree.walk(&mut |node| {
            if let Node::Component(inst) = node {
                if seen.insert(inst.component.clone()) {
                    if let Some(target) = site.component(&inst.component) {
                        targets.push(target);
                    }
                }
            }
        });
        targets.sort_by(|a, b| (&a.name, &a.uuid).cmp(&(&b.name, &b.uuid)));

        let own = to_class_name(&component.name);
        let mut taken: BTreeSet<String> = BTreeSet::new();
        taken.insert(format!("Render{}", own));
        let mut aliases = BTreeMap::new();
        for target in targets {
            // a self-instantiating component keeps its own name
            let candidate = to_class_name(&target.name);
            let alias = if target.uuid == component.uuid {
                candidate
            } else {
                let mut blocked = taken.clone();
                blocked.insert(own.clone());
                uniquify(&candidate, &|c| blocked.contains(c))
            };
            taken.insert(alias.clone());
            aliases.insert(target.uuid.clone(), alias);
        }

        Self {
            site,
            aliases,
            options: options.clone(),
        }
    }

    /// Instantiated components, sorted by local identifier.
    pub fn referenced(&self) -> Vec<&'a Component> {
        let mut out: Vec<(&String, &'a Component)> = self
            .aliases
            .iter()
            .filter_map(|(uuid, alias)| self.site.component(uuid).map(|c| (alias, c)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out.into_iter().map(|(_, c)| c).collect()
    }

    pub fn target(&self, owner: &str, uuid: &str) -> Result<&'a Component> {
        self.site.component(uuid).ok_or_else(|| {
            CompilerError::model(owner, format!("instance of unknown component '{}'", uuid))
        })
    }

    /// Identifier used in JSX for instances of `uuid`.
    pub fn element_name(&self, uuid: &str) -> String {
        self.aliases
            .get(uuid)
            .cloned()
            .unwrap_or_else(|| self.site.component(uuid).map(|c| to_class_name(&c.name)).unwrap_or_default())
    }

    pub fn import_line(&self, target: &Component) -> String {
        let alias = self.element_name(&target.uuid);
        let path = file_names(target, &self.options).skeleton_import_path();
        if self.options.enable_substitution_indirection {
            format!("import {}__Default from \"{}\";", alias, path)
        } else {
            format!("import {} from \"{}\";", alias, path)
        }
    }

    /// Declarations that route instances through the host's substitution table.
    pub fn substitution_decls(&self) -> Vec<String> {
        if !self.options.enable_substitution_indirection {
            return Vec::new();
        }
        self.referenced()
            .into_iter()
            .map(|target| {
                let alias = self.element_name(&target.uuid);
                format!(
                    "const {} = substituteComponent({}__Default, \"{}\");",
                    alias, alias, target.uuid
                )
            })
            .collect()
    }

    /// Whether an instance may set `param` on its target.
    pub fn is_settable(&self, param: &Param) -> bool {
        is_param_visible(param, self.options.force_include_internal_props)
    }

    /// Uuids of components reachable from `start` that instantiate `start` again.
    pub fn instantiation_cycle(&self, start: &Component) -> Option<Vec<String>> {
        let mut stack = vec![start.uuid.clone()];
        self.find_cycle(start, &start.uuid, &mut stack)
    }

    fn find_cycle(&self, current: &Component, start: &str, stack: &mut Vec<String>) -> Option<Vec<String>> {
        let mut children = BTreeSet::new();
        current.tpl_tree.walk(&mut |node| {
            if let Node::Component(inst) = node {
                children.insert(inst.component.clone());
            }
        });
        for child in children {
            if child == start {
                let mut cycle = stack.clone();
                cycle.push(child);
                return Some(cycle);
            }
            if stack.contains(&child) {
                continue;
            }
            if let Some(next) = self.site.component(&child) {
                stack.push(child.clone());
                if let Some(cycle) = self.find_cycle(next, start, stack) {
                    return Some(cycle);
                }
                stack.pop();
            }
        }
        None
    }
}

/// External params are always visible; the rest only when forced.
pub fn is_param_visible(param: &Param, force_include_internal: bool) -> bool {
    param.export_type == ExportType::External || force_include_internal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn site() -> Site {
        serde_json::from_value(json!({
            "components": [
                { "uuid": "page", "name": "Home Page", "tplTree": {
                    "type": "tag", "uuid": "root000001", "tag": "div",
                    "vsettings": [{ "variants": [] }],
                    "children": [
                        { "type": "component", "uuid": "inst000001", "component": "btn-a", "vsettings": [{ "variants": [] }] },
                        { "type": "component", "uuid": "inst000002", "component": "btn-b", "vsettings": [{ "variants": [] }] },
                        { "type": "component", "uuid": "inst000003", "component": "btn-a", "vsettings": [{ "variants": [] }] }
                    ]
                }},
                { "uuid": "btn-a", "name": "Button", "tplTree": {
                    "type": "tag", "uuid": "broot00001", "tag": "button", "vsettings": [{ "variants": [] }]
                }},
                { "uuid": "btn-b", "name": "button", "params": [
                    { "uuid": "p1", "name": "label", "type": "text" },
                    { "uuid": "p2", "name": "secret", "type": "text", "exportType": "internal" }
                ], "tplTree": {
                    "type": "component", "uuid": "broot00002", "component": "btn-b", "vsettings": [{ "variants": [] }]
                }}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_aliases_are_unique_and_sorted() {
        let site = site();
        let resolver = ComponentResolver::new(&site, &site.components[0], &CompilerOptions::default());
        assert_eq!(resolver.element_name("btn-a"), "Button");
        assert_eq!(resolver.element_name("btn-b"), "Button2");
        let names: Vec<&str> = resolver.referenced().iter().map(|c| c.uuid.as_str()).collect();
        assert_eq!(names, vec!["btn-a", "btn-b"]);
    }

    #[test]
    fn test_substitution_indirection() {
        let site = site();
        let options = CompilerOptions {
            enable_substitution_indirection: true,
            ..Default::default()
        };
        let resolver = ComponentResolver::new(&site, &site.components[0], &options);
        assert_eq!(
            resolver.import_line(&site.components[1]),
            "import Button__Default from \"./Button\";"
        );
        assert_eq!(
            resolver.substitution_decls()[0],
            "const Button = substituteComponent(Button__Default, \"btn-a\");"
        );
    }

    #[test]
    fn test_param_visibility() {
        let site = site();
        let resolver = ComponentResolver::new(&site, &site.components[0], &CompilerOptions::default());
        let target = &site.components[2];
        assert!(resolver.is_settable(&target.params[0]));
        assert!(!resolver.is_settable(&target.params[1]));
        assert!(is_param_visible(&target.params[1], true));
    }

    #[test]
    fn test_instantiation_cycle_detection() {
        let site = site();
        let resolver = ComponentResolver::new(&site, &site.components[2], &CompilerOptions::default());
        assert_eq!(
            resolver.instantiation_cycle(&site.components[2]),
            Some(vec!["btn-b".to_string(), "btn-b".to_string()])
        );
        assert_eq!(resolver.instantiation_cycle(&site.components[0]), None);
    }
}
