//! State, query and helper wiring for the render function
//!
//! Every declared state becomes one spec consumed by `useDollarState`. States
//! owned by a node are addressed by the node's stable name; repetitions add
//! one index level each.

use crate::assembler::file_names;
use crate::context::PassContext;
use crate::error::Result;
use crate::expr_serializer::{serialize_expr, ExprSite};
use crate::tree_serializer::Scope;
use crate::types::*;
use crate::utils::{indent, js_key, js_string, paren, to_var_name};
use crate::variants::{explicit_vsettings, join_variant_vals, VariantComboChecker};

/// States whose owner is the node `node_uuid`.
pub fn states_of_node<'a>(ctx: &PassContext<'a>, node_uuid: &str) -> Vec<&'a State> {
    let component: &'a Component = ctx.component;
    component
        .states
        .iter()
        .filter(|s| s.tpl_node.as_deref() == Some(node_uuid))
        .collect()
}

pub fn state_name(state: &State) -> String {
    to_var_name(&state.name)
}

/// `count`, `input.value`, or `row[].checked` inside a repetition.
pub fn state_spec_path(ctx: &PassContext<'_>, state: &State) -> Result<String> {
    match &state.tpl_node {
        None => Ok(state_name(state)),
        Some(uuid) => {
            let owner = ctx.require_name(uuid)?;
            Ok(format!(
                "{}{}.{}",
                owner,
                "[]".repeat(ctx.rep_depth(uuid)),
                state_name(state)
            ))
        }
    }
}

/// Runtime key of a state at the current point of the tree.
pub fn state_key_array(ctx: &PassContext<'_>, state: &State, scope: &Scope) -> Result<String> {
    let mut parts = Vec::new();
    if let Some(uuid) = &state.tpl_node {
        parts.push(js_string(&ctx.require_name(uuid)?));
        parts.extend(scope.rep_indices.iter().cloned());
    }
    parts.push(js_string(&state_name(state)));
    Ok(format!("[{}]", parts.join(", ")))
}

/// Initial value used when nothing is authored for the base combo.
fn virtual_initial_value(state: &State) -> &'static str {
    if state.access != StateAccess::Writable {
        return "undefined";
    }
    match state.variable_type.as_str() {
        "text" => "\"\"",
        "number" => "0",
        "boolean" => "false",
        "array" => "[]",
        "object" => "{}",
        _ => "undefined",
    }
}

fn bound_values(ctx: &mut PassContext<'_>, state: &State) -> Result<(Vec<(String, Vec<String>)>, Option<String>)> {
    let (owner_uuid, binding) = match (&state.tpl_node, &state.binding) {
        (Some(uuid), Some(binding)) => (uuid, binding),
        _ => return Ok((Vec::new(), None)),
    };
    let owner = ctx.require_node(owner_uuid)?;
    let site: &Site = ctx.site;
    let component: &Component = ctx.component;

    let mut entries = Vec::new();
    let default_expr = match binding {
        StateBinding::Attr { attr } => {
            for vs in explicit_vsettings(ctx, owner) {
                if let Some(expr) = vs.attrs.get(attr) {
                    entries.push((serialize_expr(ctx, expr, &ExprSite::value())?, vs.variants.clone()));
                }
            }
            state
                .param
                .as_deref()
                .and_then(|p| component.param(p))
                .and_then(|p| p.default_expr.as_ref())
        }
        StateBinding::Arg { param, .. } => {
            for vs in explicit_vsettings(ctx, owner) {
                if let Some(arg) = vs.arg(param) {
                    entries.push((serialize_expr(ctx, &arg.expr, &ExprSite::value())?, vs.variants.clone()));
                }
            }
            match owner {
                Node::Component(inst) => site
                    .component(&inst.component)
                    .and_then(|target| target.param(param))
                    .and_then(|p| p.default_expr.as_ref()),
                _ => None,
            }
        }
    };

    let default = match default_expr {
        Some(expr) => Some(serialize_expr(ctx, expr, &ExprSite::value())?),
        None => None,
    };
    Ok((entries, default))
}

fn init_value(ctx: &mut PassContext<'_>, state: &State) -> Result<String> {
    let (entries, bound_default) = bound_values(ctx, state)?;
    let default = match (&state.init_expr, bound_default) {
        (Some(expr), _) => serialize_expr(ctx, expr, &ExprSite::value())?,
        (None, Some(default)) => default,
        (None, None) => virtual_initial_value(state).to_string(),
    };
    let checker = VariantComboChecker::new(ctx);
    Ok(join_variant_vals(&entries, &|c| checker.check(c), &default)?.value)
}

fn exposed_param<'a>(ctx: &PassContext<'a>, uuid: Option<&str>) -> Option<&'a Param> {
    let component: &'a Component = ctx.component;
    uuid.and_then(|p| component.param(p))
        .filter(|p| p.export_type != ExportType::ToolsOnly || ctx.options.force_include_internal_props)
}

fn serialize_state_spec(ctx: &mut PassContext<'_>, state: &State) -> Result<String> {
    let mut fields = vec![
        format!("path: {}", js_string(&state_spec_path(ctx, state)?)),
        format!("type: {}", js_string(state.access.as_str())),
        format!("variableType: {}", js_string(&state.variable_type)),
    ];

    let value_param = match (&state.tpl_node, state.access) {
        (None, StateAccess::Writable | StateAccess::ReadOnly) => exposed_param(ctx, state.param.as_deref()),
        _ => None,
    };
    match value_param {
        Some(param) => fields.push(format!("valueProp: {}", js_string(&param.prop_name()))),
        None => {
            let value = init_value(ctx, state)?;
            fields.push(format!(
                "initFunc: ({{ $props, $state, $queries }}) => {}",
                paren(&value)
            ));
        }
    }

    if let Some(param) = exposed_param(ctx, state.on_change_param.as_deref()) {
        fields.push(format!("onChangeProp: {}", js_string(&param.prop_name())));
    }

    Ok(format!("{{\n{}\n}}", indent(&fields.join(",\n"), 2)))
}

/// `stateSpecs` plus the `$state` hook, or nothing for stateless components.
pub fn serialize_state_specs(ctx: &mut PassContext<'_>) -> Result<Option<String>> {
    let component = ctx.component;
    if component.states.is_empty() {
        return Ok(None);
    }

    let mut states: Vec<(String, &State)> = Vec::new();
    for state in &component.states {
        states.push((state_spec_path(ctx, state)?, state));
    }
    states.sort_by(|a, b| a.0.cmp(&b.0));

    let mut specs = Vec::new();
    for (_, state) in states {
        specs.push(serialize_state_spec(ctx, state)?);
    }
    ctx.metadata.use_runtime("useDollarState");

    Ok(Some(format!(
        "const stateSpecs: Parameters<typeof useDollarState>[0] = [\n{}\n];\nconst $state = useDollarState(stateSpecs, {{\n  $props: args,\n  $queries: $queries\n}});",
        indent(&specs.join(",\n"), 2)
    )))
}

/// `const $queries = {...}`, backed by `useDataOp` when queries are integrated.
pub fn serialize_queries(ctx: &mut PassContext<'_>) -> Result<String> {
    let component = ctx.component;
    if !ctx.options.enable_query_integration || component.data_queries.is_empty() {
        return Ok("const $queries = {};".to_string());
    }

    let mut queries: Vec<&DataQuery> = component.data_queries.iter().collect();
    queries.sort_by(|a, b| to_var_name(&a.name).cmp(&to_var_name(&b.name)));

    let mut fields = Vec::new();
    for query in queries {
        let op = serialize_expr(ctx, &query.op, &ExprSite::value())?;
        fields.push(format!("{}: useDataOp({})", js_key(&to_var_name(&query.name)), op));
    }
    ctx.metadata.use_runtime("useDataOp");
    Ok(format!("const $queries = {{\n{}\n}};", indent(&fields.join(",\n"), 2)))
}

/// Registers the target's state helpers for an instance that owns states.
pub fn helper_registration(
    ctx: &mut PassContext<'_>,
    node: &Node,
    target: &Component,
    scope: &Scope,
) -> Result<Option<String>> {
    let helpers = match &target.helpers {
        Some(h) => h,
        None => return Ok(None),
    };
    let owned = states_of_node(ctx, node.uuid());
    if owned.is_empty() {
        return Ok(None);
    }

    let path = helpers
        .import_path
        .clone()
        .unwrap_or_else(|| file_names(target, &ctx.options).skeleton_import_path());
    ctx.metadata
        .helper_imports
        .insert(helpers.import_name.clone(), path);
    ctx.metadata.use_runtime("initializeStateHelpers");

    let mut entries = Vec::new();
    for state in owned {
        entries.push(format!(
            "{{ name: {}, stateName: {} }}",
            js_string(&state_name(state)),
            js_string(&state_spec_path(ctx, state)?)
        ));
    }
    Ok(Some(format!(
        "initializeStateHelpers($state, [{}], [{}], {} ?? {{}}, child$Props);",
        entries.join(", "),
        scope.rep_indices.join(", "),
        helpers.import_name
    )))
}
