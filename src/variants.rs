//! Variant resolution: combo predicates and prioritized conditional values
//!
//! A node's payload is spread over several variant settings, each attached to
//! a combo of variants. This module turns those (value, combo) lists into a
//! single conditional expression, most specific combo first.

use crate::context::{NodeNamer, PassContext};
use crate::error::{CompilerError, Result};
use crate::types::*;
use crate::utils::{js_string, to_class_name, to_var_name};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    /// Component-scoped toggle selected through a variant param.
    Toggle,
    /// Site-wide toggle, read from the global variant context.
    GlobalToggle,
    /// Responsive breakpoint; styles go through media queries.
    Screen,
    /// Interaction trigger such as hover or focus.
    Style,
}

#[derive(Debug, Clone)]
pub struct VariantInfo<'a> {
    pub variant: &'a Variant,
    pub group: Option<&'a VariantGroup>,
    pub kind: VariantKind,
    /// Key of the group in the `variants` / `globalVariants` objects.
    pub group_key: Option<String>,
    pub standalone: bool,
}

impl<'a> VariantInfo<'a> {
    pub fn variant_key(&self) -> String {
        to_var_name(&self.variant.name)
    }

    /// Whether the variant is expressed by a base class rule rather than a
    /// selector or media query.
    pub fn is_base_rule(&self) -> bool {
        matches!(self.kind, VariantKind::Toggle | VariantKind::GlobalToggle)
    }
}

/// Variant uuid to kind and group, for one component plus the site globals.
#[derive(Debug, Clone, Default)]
pub struct VariantIndex<'a> {
    infos: HashMap<&'a str, VariantInfo<'a>>,
}

impl<'a> VariantIndex<'a> {
    pub fn build(site: &'a Site, component: &'a Component) -> Self {
        let mut infos = HashMap::new();

        for group in &component.variant_groups {
            let key = component_group_key(group, component);
            let standalone = is_standalone_group(group, component);
            for variant in &group.variants {
                infos.insert(
                    variant.uuid.as_str(),
                    VariantInfo {
                        variant,
                        group: Some(group),
                        kind: kind_for_group(group),
                        group_key: Some(key.clone()),
                        standalone,
                    },
                );
            }
        }

        for variant in &component.style_variants {
            infos.insert(
                variant.uuid.as_str(),
                VariantInfo {
                    variant,
                    group: None,
                    kind: VariantKind::Style,
                    group_key: None,
                    standalone: false,
                },
            );
        }

        for group in &site.global_variant_groups {
            let key = to_var_name(&group.name);
            for variant in &group.variants {
                infos.insert(
                    variant.uuid.as_str(),
                    VariantInfo {
                        variant,
                        group: Some(group),
                        kind: kind_for_group(group),
                        group_key: Some(key.clone()),
                        standalone: false,
                    },
                );
            }
        }

        Self { infos }
    }

    pub fn get(&self, uuid: &str) -> Option<&VariantInfo<'a>> {
        self.infos.get(uuid)
    }

    pub fn require(&self, uuid: &str, component: &str) -> Result<&VariantInfo<'a>> {
        self.get(uuid).ok_or_else(|| {
            CompilerError::model(component, format!("dangling variant reference '{}'", uuid))
        })
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

fn kind_for_group(group: &VariantGroup) -> VariantKind {
    match group.group_type {
        VariantGroupType::Component => VariantKind::Toggle,
        VariantGroupType::GlobalUserDefined => VariantKind::GlobalToggle,
        VariantGroupType::GlobalScreen => VariantKind::Screen,
    }
}

fn component_group_key(group: &VariantGroup, component: &Component) -> String {
    group
        .param
        .as_deref()
        .and_then(|p| component.param(p))
        .map(|p| to_var_name(&p.name))
        .unwrap_or_else(|| to_var_name(&group.name))
}

/// A single-variant, single-choice group named after its own variant, e.g. a
/// `disabled` group containing only `disabled`. Serialized as a boolean.
pub fn is_standalone_group(group: &VariantGroup, component: &Component) -> bool {
    if group.group_type != VariantGroupType::Component || group.multi || group.variants.len() != 1
    {
        return false;
    }
    to_var_name(&group.variants[0].name) == component_group_key(group, component)
}

/// Runtime interaction a style variant selector can be driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Trigger {
    Hover,
    Focus,
    FocusVisible,
    FocusWithin,
    Pressed,
}

impl Trigger {
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector.trim().trim_start_matches(':').to_ascii_lowercase().as_str() {
            "hover" => Some(Trigger::Hover),
            "focus" => Some(Trigger::Focus),
            "focus-visible" => Some(Trigger::FocusVisible),
            "focus-within" => Some(Trigger::FocusWithin),
            "active" | "pressed" => Some(Trigger::Pressed),
            _ => None,
        }
    }

    pub fn flag_suffix(&self) -> &'static str {
        match self {
            Trigger::Hover => "Hovered",
            Trigger::Focus => "Focused",
            Trigger::FocusVisible => "FocusVisible",
            Trigger::FocusWithin => "FocusedWithin",
            Trigger::Pressed => "Pressed",
        }
    }

    pub fn hook_name(&self) -> &'static str {
        match self {
            Trigger::Hover => "useHover",
            Trigger::Focus => "useFocused",
            Trigger::FocusVisible => "useFocusVisible",
            Trigger::FocusWithin => "useFocusedWithin",
            Trigger::Pressed => "usePressed",
        }
    }
}

/// Css pseudo-class for a selector as authored (`hover`, `:hover`, `pressed`).
pub fn css_pseudo(selector: &str) -> String {
    let bare = selector.trim().trim_start_matches(':');
    if bare.eq_ignore_ascii_case("pressed") {
        ":active".to_string()
    } else {
        format!(":{}", bare)
    }
}

/// One runtime trigger flag and the props that feed it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TriggerSpec {
    pub node_uuid: String,
    pub trigger: Trigger,
    pub flag: String,
    pub props_var: String,
}

pub fn triggerable_selectors(variant: &Variant) -> Vec<Trigger> {
    variant
        .selectors
        .iter()
        .filter_map(|s| Trigger::from_selector(s))
        .collect()
}

/// Flags for `variant`; the root trigger gets the bare `isHovered` form.
pub fn trigger_specs(variant: &Variant, root_uuid: &str, names: &NodeNamer) -> Vec<TriggerSpec> {
    let node_uuid = variant.for_node.as_deref().unwrap_or(root_uuid);
    let node_part = if node_uuid == root_uuid {
        String::new()
    } else {
        to_class_name(&names.trigger_label(node_uuid))
    };

    triggerable_selectors(variant)
        .into_iter()
        .map(|trigger| TriggerSpec {
            node_uuid: node_uuid.to_string(),
            trigger,
            flag: format!("is{}{}", node_part, trigger.flag_suffix()),
            props_var: format!("trigger{}{}Props", node_part, trigger.flag_suffix()),
        })
        .collect()
}

/// Style-variant settings need a hook only when they carry runtime payload.
pub fn needs_trigger_hook(vs: &VariantSetting, index: &VariantIndex<'_>) -> bool {
    let has_triggerable = vs.variants.iter().any(|uuid| {
        index
            .get(uuid)
            .map(|info| info.kind == VariantKind::Style && !triggerable_selectors(info.variant).is_empty())
            .unwrap_or(false)
    });
    has_triggerable && vs.has_runtime_payload()
}

pub fn has_style_variant(vs: &VariantSetting, index: &VariantIndex<'_>) -> bool {
    vs.variants
        .iter()
        .any(|uuid| index.get(uuid).map(|i| i.kind == VariantKind::Style).unwrap_or(false))
}

/// Settings whose variants all belong to exportable groups.
pub fn should_gen_variant_setting(
    vs: &VariantSetting,
    index: &VariantIndex<'_>,
    component: &Component,
    force_all: bool,
) -> bool {
    force_all
        || vs.variants.iter().all(|uuid| {
            let group_param = index
                .get(uuid)
                .and_then(|info| info.group)
                .and_then(|g| g.param.as_deref())
                .and_then(|p| component.param(p));
            match group_param {
                Some(param) => param.export_type != ExportType::ToolsOnly,
                None => true,
            }
        })
}

pub fn is_base_combo(combo: &[String]) -> bool {
    combo.is_empty()
}

/// Order-insensitive identity of a combo.
pub fn combo_key(combo: &[String]) -> String {
    let mut sorted: Vec<&str> = combo.iter().map(|s| s.as_str()).collect();
    sorted.sort_unstable();
    sorted.join(",")
}

/// Settings ordered general to specific: base first, then by combo size.
/// Declaration order is kept within equal sizes.
pub fn sorted_vsettings(node: &Node) -> Vec<&VariantSetting> {
    let mut settings: Vec<&VariantSetting> = node.vsettings().iter().collect();
    settings.sort_by_key(|vs| vs.variants.len());
    settings
}

/// Settings that must be checked at runtime by the combo checker.
pub fn explicit_vsettings<'n>(ctx: &PassContext<'_>, node: &'n Node) -> Vec<&'n VariantSetting> {
    let force = ctx.options.force_include_internal_props;
    sorted_vsettings(node)
        .into_iter()
        .filter(|vs| {
            should_gen_variant_setting(vs, &ctx.variants, ctx.component, force)
                && (!has_style_variant(vs, &ctx.variants) || needs_trigger_hook(vs, &ctx.variants))
        })
        .collect()
}

/// Builds "is this combo active" predicates.
pub struct VariantComboChecker<'p, 'a> {
    index: &'p VariantIndex<'a>,
    names: &'p NodeNamer,
    root_uuid: &'p str,
    component: &'p str,
    ignore_screen: bool,
}

impl<'p, 'a> VariantComboChecker<'p, 'a> {
    pub fn new(ctx: &'p PassContext<'a>) -> Self {
        Self {
            index: &ctx.variants,
            names: &ctx.names,
            root_uuid: ctx.component.tpl_tree.uuid(),
            component: &ctx.component.name,
            ignore_screen: false,
        }
    }

    /// Leave screen variants to media queries.
    pub fn ignoring_screen(mut self) -> Self {
        self.ignore_screen = true;
        self
    }

    pub fn check(&self, combo: &[String]) -> Result<String> {
        let mut sorted: Vec<&String> = combo.iter().collect();
        sorted.sort();

        let mut parts = Vec::new();
        for uuid in sorted {
            let info = self.index.require(uuid, self.component)?;
            let group_key = info.group_key.as_deref().unwrap_or_default();
            match info.kind {
                VariantKind::Toggle => parts.push(format!(
                    "hasVariant(variants, {}, {})",
                    js_string(group_key),
                    js_string(&info.variant_key())
                )),
                VariantKind::GlobalToggle => parts.push(format!(
                    "hasVariant(globalVariants, {}, {})",
                    js_string(group_key),
                    js_string(&info.variant_key())
                )),
                VariantKind::Screen => {
                    if !self.ignore_screen {
                        parts.push(format!(
                            "hasVariant(globalVariants, {}, {})",
                            js_string(group_key),
                            js_string(&info.variant_key())
                        ));
                    }
                }
                VariantKind::Style => {
                    for spec in trigger_specs(info.variant, self.root_uuid, self.names) {
                        parts.push(spec.flag);
                    }
                }
            }
        }

        if parts.is_empty() {
            Ok("true".to_string())
        } else {
            Ok(parts.join(" && "))
        }
    }
}

/// Result of composing per-combo values into one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedValue {
    pub value: String,
    pub conditional: bool,
    /// Index of the entry used as the unconditional default, if any.
    pub index_of_uncond_value: Option<usize>,
}

/// `check(cN) ? vN : ... : check(c1) ? v1 : default`.
///
/// `entries` is ordered general to specific. The most general entry becomes the
/// default when it is the base combo, so no `true ? x :` tail is emitted.
pub fn join_variant_vals(
    entries: &[(String, Vec<String>)],
    check: &dyn Fn(&[String]) -> Result<String>,
    default: &str,
) -> Result<JoinedValue> {
    let mut reversed: Vec<&(String, Vec<String>)> = entries.iter().rev().collect();
    let mut default = default.to_string();
    let mut index_of_uncond_value = None;

    if let Some(last) = reversed.last() {
        if is_base_combo(&last.1) {
            default = last.0.clone();
            index_of_uncond_value = Some(0);
            reversed.pop();
        }
    }

    if reversed.is_empty() {
        return Ok(JoinedValue {
            value: default,
            conditional: false,
            index_of_uncond_value,
        });
    }

    let mut out = String::new();
    for (value, combo) in &reversed {
        out.push_str(&format!("{} ? {} : ", check(combo)?, value));
    }
    out.push_str(&default);

    Ok(JoinedValue {
        value: out,
        conditional: true,
        index_of_uncond_value,
    })
}
