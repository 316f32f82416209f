//! Module assembly: render module, skeleton module and stylesheet
//!
//! The assembler runs last. It serializes the render tree first so that every
//! runtime name, icon, helper and translation the tree needs is recorded in
//! the pass metadata, then builds the declarations around it and finally the
//! import block.

use crate::component_resolver::is_param_visible;
use crate::context::{PassContext, PassMetadata};
use crate::error::Result;
use crate::expr_serializer::{serialize_expr, ExprSite};
use crate::state_wiring::{serialize_queries, serialize_state_specs};
use crate::style_resolver::StyleResolver;
use crate::tree_serializer::serialize_tree;
use crate::types::*;
use crate::utils::{indent, js_key, js_string, to_class_name, to_var_name};
use crate::variants::is_standalone_group;
use crate::{CompilerOptions, FileNamingScheme, StyleScheme, TargetPlatform};
use serde::Serialize;
use std::collections::BTreeMap;

/// File names of the artifacts generated for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFileNames {
    pub render_module: String,
    pub skeleton_module: String,
    pub stylesheet: String,
}

impl GeneratedFileNames {
    /// Specifier other modules use to import the component.
    pub fn skeleton_import_path(&self) -> String {
        format!("./{}", strip_tsx(&self.skeleton_module))
    }

    /// Specifier the skeleton uses to import the render module.
    pub fn render_import_path_from_skeleton(&self) -> String {
        let depth = self.skeleton_module.matches('/').count();
        let prefix = if depth == 0 {
            "./".to_string()
        } else {
            "../".repeat(depth)
        };
        format!("{}{}", prefix, strip_tsx(&self.render_module))
    }

    pub fn stylesheet_import_path(&self) -> String {
        format!("./{}", self.stylesheet)
    }
}

fn strip_tsx(file: &str) -> &str {
    file.strip_suffix(".tsx").unwrap_or(file)
}

pub fn file_names(component: &Component, options: &CompilerOptions) -> GeneratedFileNames {
    let class = to_class_name(&component.name);
    let css_ext = match options.style_scheme {
        StyleScheme::Plain => "css",
        StyleScheme::Scoped => "module.css",
    };

    let (render_module, component_file, stylesheet) = match options.file_naming {
        FileNamingScheme::Readable => (
            format!("Render{}.tsx", class),
            format!("{}.tsx", class),
            match options.style_scheme {
                StyleScheme::Plain => format!("css__{}.css", class),
                StyleScheme::Scoped => format!("Render{}.module.css", class),
            },
        ),
        FileNamingScheme::OpaqueId => (
            format!("render__{}.tsx", component.uuid),
            format!("comp__{}.tsx", component.uuid),
            format!("css__{}.{}", component.uuid, css_ext),
        ),
    };

    let skeleton_module = match &component.page_meta {
        Some(page) if options.target_platform.is_page_aware() => page_file(&page.path),
        _ => component_file,
    };

    GeneratedFileNames {
        render_module,
        skeleton_module,
        stylesheet,
    }
}

/// `/` -> `index.tsx`, `/blog/[slug]` -> `blog/[slug].tsx`
fn page_file(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "index.tsx".to_string()
    } else {
        format!("{}.tsx", trimmed)
    }
}

/// Page metadata passed through to the build orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadataOutput {
    pub path: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub og_image_src: Option<String>,
    pub canonical: Option<String>,
    pub params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub role_id: Option<String>,
}

impl From<&PageMeta> for PageMetadataOutput {
    fn from(page: &PageMeta) -> Self {
        Self {
            path: page.path.clone(),
            title: page.title.clone(),
            description: page.description.clone(),
            og_image_src: page.og_image_src.clone(),
            canonical: page.canonical.clone(),
            params: page.params.clone(),
            query: page.query.clone(),
            role_id: page.role_id.clone(),
        }
    }
}

/// Everything one pass produces for one component.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentOutput {
    pub component_uuid: String,
    pub component_name: String,
    pub render_module: String,
    pub skeleton_module: Option<String>,
    pub stylesheet: String,
    pub file_names: GeneratedFileNames,
    pub page_metadata: Option<PageMetadataOutput>,
    pub pass_metadata: PassMetadata,
}

/// Type and value names derived from the component name.
struct ModuleNames {
    class: String,
    render_component: String,
    render_func: String,
    variant_members: String,
    variants_args: String,
    variant_props: String,
    args_type: String,
    arg_props: String,
    overrides: String,
    descendants: String,
    default_props: String,
}

impl ModuleNames {
    fn new(component: &Component) -> Self {
        let class = to_class_name(&component.name);
        Self {
            render_component: format!("Render{}", class),
            render_func: format!("Render{}__", class),
            variant_members: format!("{}__VariantMembers", class),
            variants_args: format!("{}__VariantsArgs", class),
            variant_props: format!("{}__VariantProps", class),
            args_type: format!("{}__ArgsType", class),
            arg_props: format!("{}__ArgProps", class),
            overrides: format!("{}__OverridesType", class),
            descendants: format!("{}__Descendants", class),
            default_props: format!("Default{}Props", class),
            class,
        }
    }
}

pub fn assemble(ctx: &mut PassContext<'_>) -> Result<ComponentOutput> {
    let component = ctx.component;
    if ctx.options.debug_mode {
        log::debug!("Assembling modules for '{}' ({})", component.name, component.uuid);
    }

    let files = file_names(component, &ctx.options);
    let names = ModuleNames::new(component);

    let body = serialize_tree(ctx)?;
    let body = wrap_page_body(ctx, &names, body);
    let render_func = serialize_render_func(ctx, &names, &body)?;

    let mut stylesheet_builder = StyleResolver::new()?;
    let stylesheet = stylesheet_builder.build_stylesheet(ctx)?;

    let mut sections = vec![
        serialize_variant_types(ctx, &names),
        serialize_arg_types(ctx, &names),
        serialize_overrides_type(ctx, &names),
        serialize_default_props(ctx, &names),
    ];
    if let Some(head) = serialize_head_export(ctx, &names) {
        sections.push(head);
    }
    sections.push(render_func);
    sections.push(serialize_descendants(ctx, &names));
    sections.push(serialize_node_components(ctx, &names));
    sections.push(format!("export default {};", names.render_component));

    let header = serialize_header(ctx);
    let imports = serialize_imports(ctx, &files);
    let render_module = format!(
        "{}\n\n{}\n\n{}\n/* prettier-ignore-end */\n",
        header,
        imports,
        sections.join("\n\n")
    );

    let skeleton_module = if ctx.options.emit_skeleton {
        Some(serialize_skeleton(ctx, &names, &files))
    } else {
        None
    };

    if ctx.options.debug_mode {
        log::debug!(
            "Assembled '{}': render {} bytes, stylesheet {} bytes",
            component.name,
            render_module.len(),
            stylesheet.len()
        );
    }

    Ok(ComponentOutput {
        component_uuid: component.uuid.clone(),
        component_name: names.class,
        render_module,
        skeleton_module,
        stylesheet,
        file_names: files,
        page_metadata: component.page_meta.as_ref().map(PageMetadataOutput::from),
        pass_metadata: ctx.metadata.clone(),
    })
}

fn serialize_header(ctx: &PassContext<'_>) -> String {
    format!(
        "// @ts-nocheck\n/* eslint-disable */\n/* prettier-ignore-start */\n// Generated by designc {}; do not edit.\n// Project: {}\n// Component: {}",
        crate::VERSION,
        ctx.site.project_id,
        ctx.component.uuid
    )
}

fn serialize_imports(ctx: &PassContext<'_>, files: &GeneratedFileNames) -> String {
    let mut lines = vec!["import * as React from \"react\";".to_string()];
    lines.extend(ctx.metadata.platform_imports.iter().cloned());

    if !ctx.metadata.runtime_imports.is_empty() {
        let names: Vec<&str> = ctx.metadata.runtime_imports.iter().map(|s| s.as_str()).collect();
        lines.push(format!(
            "import {{\n{}\n}} from {};",
            indent(&names.join(",\n"), 2),
            js_string(RUNTIME_PACKAGE)
        ));
    }

    for target in ctx.components.referenced() {
        lines.push(ctx.components.import_line(target));
    }
    for (name, path) in &ctx.metadata.helper_imports {
        lines.push(format!("import {{ {} }} from {};", name, js_string(path)));
    }
    for (name, asset_uuid) in &ctx.metadata.used_icons {
        let path = match ctx.options.file_naming {
            FileNamingScheme::Readable => format!("./icons/{}", name),
            FileNamingScheme::OpaqueId => format!("./icons/icon__{}", asset_uuid),
        };
        lines.push(format!("import {} from {};", name, js_string(&path)));
    }

    match ctx.options.style_scheme {
        StyleScheme::Plain => lines.push(format!(
            "import {};",
            js_string(&files.stylesheet_import_path())
        )),
        StyleScheme::Scoped => lines.push(format!(
            "import sty from {};",
            js_string(&files.stylesheet_import_path())
        )),
    }
    lines.join("\n")
}

/// `{}` or a multi-line object type with one field per line.
fn object_type(fields: &[String]) -> String {
    if fields.is_empty() {
        return "{}".to_string();
    }
    let lines: Vec<String> = fields.iter().map(|f| format!("{};", f)).collect();
    format!("{{\n{}\n}}", indent(&lines.join("\n"), 2))
}

fn union_of(names: &[String]) -> String {
    if names.is_empty() {
        return "never".to_string();
    }
    names.iter().map(|n| js_string(n)).collect::<Vec<_>>().join(" | ")
}

/// Variant groups with their selector param, in declaration order.
fn variant_group_params<'a>(ctx: &PassContext<'a>) -> Vec<(&'a VariantGroup, &'a Param)> {
    let component: &'a Component = ctx.component;
    component
        .variant_groups
        .iter()
        .filter_map(|g| g.param.as_deref().and_then(|p| component.param(p)).map(|p| (g, p)))
        .collect()
}

/// Params on the generated surface; tools-only ones only when forced.
fn on_surface(ctx: &PassContext<'_>, param: &Param) -> bool {
    param.export_type != ExportType::ToolsOnly || ctx.options.force_include_internal_props
}

fn variant_arg_type(ctx: &mut PassContext<'_>, group: &VariantGroup) -> String {
    let members: Vec<String> = group.variants.iter().map(|v| to_var_name(&v.name)).collect();
    let runtime_type = if is_standalone_group(group, ctx.component) {
        "SingleBooleanChoiceArg"
    } else if group.multi {
        "MultiChoiceArg"
    } else {
        "SingleChoiceArg"
    };
    ctx.metadata.use_runtime(runtime_type);
    format!("{}<{}>", runtime_type, union_of(&members))
}

fn serialize_variant_types(ctx: &mut PassContext<'_>, names: &ModuleNames) -> String {
    let groups: Vec<(&VariantGroup, &Param)> = variant_group_params(ctx)
        .into_iter()
        .filter(|(_, p)| on_surface(ctx, p))
        .collect();

    let mut members = Vec::new();
    let mut args = Vec::new();
    let mut props = Vec::new();
    for (group, param) in groups {
        let key = param.prop_name();
        let choices: Vec<String> = group.variants.iter().map(|v| to_var_name(&v.name)).collect();
        members.push(format!("{}: {}", js_key(&key), union_of(&choices)));
        args.push(format!("{}?: {}", js_key(&key), variant_arg_type(ctx, group)));
        props.push(js_string(&key));
    }

    format!(
        "export type {} = {};\nexport type {} = {};\ntype VariantPropType = keyof {};\nexport const {} = [{}] as const;",
        names.variant_members,
        object_type(&members),
        names.variants_args,
        object_type(&args),
        names.variants_args,
        names.variant_props,
        props.join(", ")
    )
}

fn param_ts_type(param: &Param) -> String {
    match param.param_type {
        ParamType::EventHandler | ParamType::StateChange if !param.handler_args.is_empty() => {
            let args: Vec<String> = param
                .handler_args
                .iter()
                .map(|a| format!("{}: any", to_var_name(a)))
                .collect();
            format!("({}) => void", args.join(", "))
        }
        other => other.ts_type().to_string(),
    }
}

fn serialize_arg_types(ctx: &PassContext<'_>, names: &ModuleNames) -> String {
    let mut fields = Vec::new();
    let mut props = Vec::new();
    for param in &ctx.component.params {
        if param.param_type == ParamType::Variant || !on_surface(ctx, param) {
            continue;
        }
        let key = param.prop_name();
        fields.push(format!("{}?: {}", js_key(&key), param_ts_type(param)));
        props.push(js_string(&key));
    }
    format!(
        "export type {} = {};\ntype ArgPropType = keyof {};\nexport const {} = [{}] as const;",
        names.args_type,
        object_type(&fields),
        names.args_type,
        names.arg_props,
        props.join(", ")
    )
}

/// Named element and instance nodes under `from`, itself included, in tree order.
fn named_element_nodes<'a>(ctx: &PassContext<'_>, from: &'a Node) -> Vec<(&'a Node, String)> {
    let mut out = Vec::new();
    from.walk(&mut |node| {
        if matches!(node, Node::Slot(_)) {
            return;
        }
        if let Some(name) = ctx.names.name(node.uuid()) {
            out.push((node, name.to_string()));
        }
    });
    out
}

/// Type of the element a named node renders by default.
fn default_element_type(ctx: &mut PassContext<'_>, node: &Node) -> String {
    match node {
        Node::Tag(tag) if tag.tag == "a" => {
            ctx.metadata.use_runtime("DcLink__");
            "typeof DcLink__".to_string()
        }
        Node::Tag(tag) if tag.kind == TagKind::Image && tag.tag == "img" && ctx.options.use_optimized_images => {
            ctx.metadata.use_runtime("DcImg__");
            "typeof DcImg__".to_string()
        }
        Node::Tag(tag) => js_string(&tag.tag),
        Node::Component(inst) => format!("typeof {}", ctx.components.element_name(&inst.component)),
        Node::Slot(_) => "\"div\"".to_string(),
    }
}

fn serialize_overrides_type(ctx: &mut PassContext<'_>, names: &ModuleNames) -> String {
    let component = ctx.component;
    let root: &Node = &component.tpl_tree;
    let mut fields = Vec::new();
    for (node, name) in named_element_nodes(ctx, root) {
        ctx.metadata.use_runtime("Flex__");
        let element = default_element_type(ctx, node);
        fields.push(format!("{}?: Flex__<{}>", js_key(&name), element));
    }
    format!("export type {} = {};", names.overrides, object_type(&fields))
}

fn serialize_default_props(ctx: &mut PassContext<'_>, names: &ModuleNames) -> String {
    let component = ctx.component;
    if component.is_page() && ctx.options.target_platform == TargetPlatform::NextJs {
        return format!("export interface {} {{}}", names.default_props);
    }

    let force = ctx.options.force_include_internal_props;
    let mut fields = Vec::new();
    for (group, param) in variant_group_params(ctx) {
        if is_param_visible(param, force) {
            let ty = variant_arg_type(ctx, group);
            fields.push(format!("{}?: {};", js_key(&param.prop_name()), ty));
        }
    }
    for param in &component.params {
        if param.param_type != ParamType::Variant && is_param_visible(param, force) {
            fields.push(format!("{}?: {};", js_key(&param.prop_name()), param_ts_type(param)));
        }
    }
    fields.push("className?: string;".to_string());
    format!(
        "export interface {} {{\n{}\n}}",
        names.default_props,
        indent(&fields.join("\n"), 2)
    )
}

/// Default values for params, merged under the caller's args.
fn serialize_arg_defaults(ctx: &mut PassContext<'_>) -> Result<String> {
    let component = ctx.component;
    let mut fields = Vec::new();
    for param in &component.params {
        if matches!(param.param_type, ParamType::Variant | ParamType::Slot) {
            continue;
        }
        if let Some(expr) = &param.default_expr {
            let value = serialize_expr(ctx, expr, &ExprSite::value())?;
            fields.push(format!("{}: {}", js_key(&param.prop_name()), value));
        }
    }
    if fields.is_empty() {
        return Ok("{}".to_string());
    }
    Ok(format!("{{\n{}\n}}", indent(&fields.join(",\n"), 2)))
}

fn serialize_global_variants(ctx: &mut PassContext<'_>) -> Option<String> {
    let groups = ctx.used_global_groups();
    if groups.is_empty() {
        return None;
    }
    ctx.metadata.use_runtime("ensureGlobalVariants");
    ctx.metadata.use_runtime("useGlobalVariant");
    let fields: Vec<String> = groups
        .iter()
        .map(|(key, _)| format!("{}: useGlobalVariant({})", js_key(key), js_string(key)))
        .collect();
    Some(format!(
        "const globalVariants = ensureGlobalVariants({{\n{}\n}});",
        indent(&fields.join(",\n"), 2)
    ))
}

fn serialize_triggers(ctx: &mut PassContext<'_>) -> Vec<String> {
    let specs = ctx.hook_triggers();
    if !specs.is_empty() {
        ctx.metadata.use_runtime("useTrigger");
    }
    specs
        .into_iter()
        .map(|spec| {
            ctx.metadata.trigger_flags.insert(spec.flag.clone());
            format!(
                "const [{}, {}] = useTrigger({}, {{}});",
                spec.flag,
                spec.props_var,
                js_string(spec.trigger.hook_name())
            )
        })
        .collect()
}

fn serialize_render_func(ctx: &mut PassContext<'_>, names: &ModuleNames, body: &str) -> Result<String> {
    let mut decls = ctx.components.substitution_decls();
    if !decls.is_empty() {
        ctx.metadata.use_runtime("substituteComponent");
    }
    decls.push("const { variants, overrides, forNode } = props;".to_string());

    let defaults = serialize_arg_defaults(ctx)?;
    decls.push(format!(
        "const args = React.useMemo(\n  () =>\n    Object.assign(\n      {},\n      Object.fromEntries(\n        Object.entries(props.args).filter(([_, v]) => v !== undefined)\n      )\n    ),\n  [props.args]\n);",
        indent(&defaults, 6).trim_start()
    ));
    decls.push("const $props = {\n  ...args,\n  ...variants\n};".to_string());

    if let Some(globals) = serialize_global_variants(ctx) {
        decls.push(globals);
    }
    decls.extend(serialize_triggers(ctx));
    decls.push(serialize_queries(ctx)?);
    if let Some(states) = serialize_state_specs(ctx)? {
        decls.push(states);
    }
    if !ctx.metadata.localized_strings.is_empty() {
        ctx.metadata.use_runtime("useTranslator");
        decls.push("const $translator = useTranslator?.();".to_string());
    }

    Ok(format!(
        "function {}(props: {{\n  variants: {};\n  args: {};\n  overrides: {};\n  forNode?: string;\n}}) {{\n{}\n\n  return (\n{}\n  ) as React.ReactElement | null;\n}}",
        names.render_func,
        names.variants_args,
        names.args_type,
        names.overrides,
        indent(&decls.join("\n"), 2),
        indent(body, 4)
    ))
}

fn jsx_child(expr: &str) -> String {
    if expr.starts_with('<') {
        expr.to_string()
    } else {
        format!("{{{}}}", expr)
    }
}

fn wrap_page_body(ctx: &mut PassContext<'_>, names: &ModuleNames, body: String) -> String {
    let component = ctx.component;
    let page = match &component.page_meta {
        Some(page) => page,
        None => return body,
    };

    let mut body = body;
    if ctx.options.enable_auth_gating {
        if let Some(role) = &page.role_id {
            ctx.metadata.use_runtime("PageGuard__");
            body = format!(
                "<PageGuard__ roleId={{{}}}>\n{}\n</PageGuard__>",
                js_string(role),
                indent(&jsx_child(&body), 2)
            );
        }
    }

    if ctx.options.target_platform == TargetPlatform::NextJs {
        ctx.metadata
            .platform_imports
            .insert("import Head from \"next/head\";".to_string());
        let head = head_tags(page, names);
        body = format!(
            "<React.Fragment>\n  <Head>\n{}\n  </Head>\n{}\n</React.Fragment>",
            indent(&head.join("\n"), 4),
            indent(&jsx_child(&body), 2)
        );
    }
    body
}

fn head_tags(page: &PageMeta, names: &ModuleNames) -> Vec<String> {
    let meta = format!("{}.pageMetadata", names.render_component);
    let mut tags = vec!["<meta name=\"twitter:card\" content=\"summary\" />".to_string()];
    if page.title.is_some() {
        tags.push(format!("<title key=\"title\">{{{}.title}}</title>", meta));
        tags.push(format!("<meta key=\"og:title\" property=\"og:title\" content={{{}.title}} />", meta));
        tags.push(format!("<meta key=\"twitter:title\" name=\"twitter:title\" content={{{}.title}} />", meta));
    }
    if page.description.is_some() {
        tags.push(format!("<meta key=\"description\" name=\"description\" content={{{}.description}} />", meta));
        tags.push(format!("<meta key=\"og:description\" property=\"og:description\" content={{{}.description}} />", meta));
        tags.push(format!("<meta key=\"twitter:description\" name=\"twitter:description\" content={{{}.description}} />", meta));
    }
    if page.og_image_src.is_some() {
        tags.push(format!("<meta key=\"og:image\" property=\"og:image\" content={{{}.ogImageSrc}} />", meta));
        tags.push(format!("<meta key=\"twitter:image\" name=\"twitter:image\" content={{{}.ogImageSrc}} />", meta));
    }
    if page.canonical.is_some() {
        tags.push(format!("<link rel=\"canonical\" href={{{}.canonical}} />", meta));
    }
    tags
}

/// Head export for platforms that read page metadata from the module.
fn serialize_head_export(ctx: &PassContext<'_>, names: &ModuleNames) -> Option<String> {
    let page = ctx.component.page_meta.as_ref()?;
    let meta = format!("{}.pageMetadata", names.render_component);
    match ctx.options.target_platform {
        TargetPlatform::Gatsby => Some(format!(
            "export function Head() {{\n  return (\n    <>\n{}\n    </>\n  );\n}}",
            indent(&head_tags(page, names).join("\n"), 6)
        )),
        TargetPlatform::Tanstack => {
            let mut entries = Vec::new();
            if page.title.is_some() {
                entries.push(format!("{{ title: {}.title }}", meta));
            }
            if page.description.is_some() {
                entries.push(format!("{{ name: \"description\", content: {}.description }}", meta));
            }
            if page.og_image_src.is_some() {
                entries.push(format!("{{ property: \"og:image\", content: {}.ogImageSrc }}", meta));
            }
            let links = if page.canonical.is_some() {
                format!("[{{ rel: \"canonical\", href: {}.canonical }}]", meta)
            } else {
                "[]".to_string()
            };
            Some(format!(
                "export function head() {{\n  return {{\n    meta: [{}],\n    links: {}\n  }};\n}}",
                entries.join(", "),
                links
            ))
        }
        TargetPlatform::React | TargetPlatform::NextJs => None,
    }
}

fn serialize_descendants(ctx: &mut PassContext<'_>, names: &ModuleNames) -> String {
    let component = ctx.component;
    let root: &Node = &component.tpl_tree;
    let named = named_element_nodes(ctx, root);

    let mut table = Vec::new();
    let mut element_types = Vec::new();
    for (node, name) in &named {
        let below: Vec<String> = named_element_nodes(ctx, node)
            .iter()
            .map(|(_, n)| js_string(n))
            .collect();
        table.push(format!("{}: [{}]", js_key(name), below.join(", ")));
        let element = default_element_type(ctx, node);
        element_types.push(format!("{}: {}", js_key(name), element));
    }

    format!(
        "const {d} = {{\n{}\n}} as const;\ntype NodeNameType = keyof typeof {d};\ntype DescendantsType<T extends NodeNameType> = (typeof {d})[T][number];\ntype NodeDefaultElementType = {};",
        indent(&table.join(",\n"), 2),
        object_type(&element_types),
        d = names.descendants
    )
}

fn serialize_page_metadata(page: &PageMeta) -> String {
    let field = |value: &Option<String>| js_string(value.as_deref().unwrap_or_default());
    format!(
        "pageMetadata: {{\n  title: {},\n  description: {},\n  ogImageSrc: {},\n  canonical: {}\n}}",
        field(&page.title),
        field(&page.description),
        field(&page.og_image_src),
        field(&page.canonical)
    )
}

fn serialize_node_components(ctx: &mut PassContext<'_>, names: &ModuleNames) -> String {
    ctx.metadata.use_runtime("deriveRenderOpts");
    ctx.metadata.use_runtime("StrictProps");
    let component = ctx.component;
    let root_uuid = component.tpl_tree.uuid();
    let root_name = ctx.names.name(root_uuid).unwrap_or(ROOT_NODE_NAME).to_string();

    let prelude = format!(
        "type ReservedPropsType = \"variants\" | \"args\" | \"overrides\";
type NodeOverridesType<T extends NodeNameType> = Pick<{o}, DescendantsType<T>>;
type NodeComponentProps<T extends NodeNameType> =
  // Explicitly specify variants, args, and overrides as objects
  {{
    variants?: {v};
    args?: {a};
    overrides?: NodeOverridesType<T>;
  }} &
  // Specify variants and args directly as props
  Omit<{v}, ReservedPropsType> &
  Omit<{a}, ReservedPropsType> &
  // Specify overrides for each element directly as props
  Omit<NodeOverridesType<T>, ReservedPropsType | VariantPropType | ArgPropType> &
  // Specify props for the root element
  Omit<
    Partial<React.ComponentProps<NodeDefaultElementType[T]>>,
    ReservedPropsType | VariantPropType | ArgPropType | DescendantsType<T>
  >;

function makeNodeComponent<NodeName extends NodeNameType>(nodeName: NodeName) {{
  type PropsType = NodeComponentProps<NodeName> & {{ key?: React.Key }};
  const func = function <T extends PropsType>(props: T & StrictProps<T, PropsType>) {{
    const {{ variants, args, overrides }} = React.useMemo(
      () =>
        deriveRenderOpts(props, {{
          name: nodeName,
          descendantNames: {d}[nodeName],
          internalArgPropNames: {ap},
          internalVariantPropNames: {vp}
        }}),
      [props, nodeName]
    );
    return {f}({{ variants, args, overrides, forNode: nodeName }});
  }};
  if (nodeName === {root}) {{
    func.displayName = {display};
  }} else {{
    func.displayName = `{rc}.${{nodeName}}`;
  }}
  return func;
}}",
        o = names.overrides,
        v = names.variants_args,
        a = names.args_type,
        d = names.descendants,
        ap = names.arg_props,
        vp = names.variant_props,
        f = names.render_func,
        root = js_string(&root_name),
        display = js_string(&names.render_component),
        rc = names.render_component,
    );

    let root: &Node = &component.tpl_tree;
    let mut blocks = Vec::new();
    let helpers: Vec<String> = named_element_nodes(ctx, root)
        .into_iter()
        .filter(|(node, _)| node.uuid() != root_uuid)
        .map(|(_, name)| format!("{}: makeNodeComponent({}),", js_key(&name), js_string(&name)))
        .collect();
    if !helpers.is_empty() {
        blocks.push(format!("// Helper components rendering sub-elements\n{}", helpers.join("\n")));
    }
    let mut props_meta = format!(
        "// Metadata about props expected for {}\ninternalVariantProps: {},\ninternalArgProps: {}",
        names.render_component, names.variant_props, names.arg_props
    );
    if let Some(page) = &component.page_meta {
        props_meta.push(',');
        blocks.push(props_meta);
        blocks.push(format!("// Page metadata\n{}", serialize_page_metadata(page)));
    } else {
        blocks.push(props_meta);
    }
    let members = blocks.join("\n\n");

    format!(
        "{}\n\nexport const {} = Object.assign(\n  // Top-level {} renders the root element\n  makeNodeComponent({}),\n  {{\n{}\n  }}\n);",
        prelude,
        names.render_component,
        names.render_component,
        js_string(&root_name),
        indent(&members, 4)
    )
}

fn serialize_skeleton(ctx: &PassContext<'_>, names: &ModuleNames, files: &GeneratedFileNames) -> String {
    let component = ctx.component;
    let render_path = js_string(&files.render_import_path_from_skeleton());
    let platform = ctx.options.target_platform;

    if component.is_page() && platform.is_page_aware() {
        return serialize_page_skeleton(names, &render_path, platform);
    }

    let props_name = format!("{}Props", names.class);
    let header = format!(
        "// Entry point for {}. This file is yours to edit; regenerating the\n// design only replaces {}.\nimport * as React from \"react\";\nimport {{ {}, {} }} from {};",
        component.name,
        strip_tsx(&files.render_module),
        names.render_component,
        names.default_props,
        render_path
    );
    let props_decl = format!("export interface {} extends {} {{}}", props_name, names.default_props);

    match &component.tpl_tree {
        Node::Tag(root) => {
            let root_name = ctx.names.name(&root.uuid).unwrap_or(ROOT_NODE_NAME);
            format!(
                "{}\nimport {{ HTMLElementRefOf }} from {};\n\n{}\n\nfunction {c}_(props: {p}, ref: HTMLElementRefOf<{tag}>) {{\n  return <{r} {root}={{{{ ref }}}} {{...props}} />;\n}}\n\nconst {c} = React.forwardRef({c}_);\nexport default {c};\n",
                header,
                js_string(RUNTIME_PACKAGE),
                props_decl,
                c = names.class,
                p = props_name,
                tag = js_string(&root.tag),
                r = names.render_component,
                root = root_name,
            )
        }
        _ => format!(
            "{}\n\n{}\n\nfunction {c}(props: {p}) {{\n  return <{r} {{...props}} />;\n}}\n\nexport default {c};\n",
            header,
            props_decl,
            c = names.class,
            p = props_name,
            r = names.render_component,
        ),
    }
}

fn serialize_page_skeleton(names: &ModuleNames, render_path: &str, platform: TargetPlatform) -> String {
    let mut imports = vec![
        "import * as React from \"react\";".to_string(),
        format!("import {{ PageParamsProvider__ }} from {};", js_string(RUNTIME_PACKAGE)),
    ];
    let (signature, route, params, query) = match platform {
        TargetPlatform::NextJs => {
            imports.push(format!("import {{ {} }} from {};", names.render_component, render_path));
            imports.push("import { useRouter } from \"next/router\";".to_string());
            (
                String::new(),
                "useRouter()?.pathname",
                "useRouter()?.query",
                "useRouter()?.query".to_string(),
            )
        }
        TargetPlatform::Gatsby => {
            imports.push(format!("import {{ {}, Head }} from {};", names.render_component, render_path));
            imports.push("import type { PageProps } from \"gatsby\";".to_string());
            imports.push("export { Head };".to_string());
            (
                "{ location, path, params }: PageProps".to_string(),
                "path",
                "params",
                "Object.fromEntries(new URLSearchParams(location.search))".to_string(),
            )
        }
        TargetPlatform::Tanstack | TargetPlatform::React => {
            imports.push(format!("import {{ {}, head }} from {};", names.render_component, render_path));
            imports.push("import { useLocation, useParams } from \"@tanstack/react-router\";".to_string());
            imports.push("export { head };".to_string());
            (
                String::new(),
                "useLocation().pathname",
                "useParams({ strict: false })",
                "useLocation().search".to_string(),
            )
        }
    };

    format!(
        "// Entry point for the {c} page. This file is yours to edit.\n{}\n\nfunction {c}({}) {{\n  return (\n    <PageParamsProvider__\n      route={{{}}}\n      params={{{}}}\n      query={{{}}}\n    >\n      <{r} />\n    </PageParamsProvider__>\n  );\n}}\n\nexport default {c};\n",
        imports.join("\n"),
        signature,
        route,
        params,
        query,
        c = names.class,
        r = names.render_component,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{fixture_ctx, fixture_ctx_with};
    use serde_json::json;

    fn card_site() -> Site {
        serde_json::from_value(json!({
            "projectId": "proj1",
            "projectName": "Shop",
            "components": [{
                "uuid": "card",
                "name": "Card",
                "params": [
                    { "uuid": "p-size", "name": "size", "type": "variant" },
                    { "uuid": "p-theme", "name": "internalTheme", "type": "variant", "exportType": "toolsOnly" },
                    { "uuid": "p-title", "name": "title", "type": "text",
                      "defaultExpr": { "kind": "literal", "value": "Untitled" } },
                    { "uuid": "p-click", "name": "onSelect", "type": "eventHandler", "handlerArgs": ["event"] }
                ],
                "variantGroups": [
                    { "uuid": "g-size", "name": "size", "param": "p-size", "variants": [
                        { "uuid": "sml000001", "name": "small" },
                        { "uuid": "lrg000001", "name": "large" }
                    ]},
                    { "uuid": "g-theme", "name": "internalTheme", "param": "p-theme", "variants": [
                        { "uuid": "drk000001", "name": "dark" }
                    ]}
                ],
                "tplTree": {
                    "type": "tag", "uuid": "root000001", "tag": "div",
                    "vsettings": [
                        { "variants": [], "styles": { "color": "blue" } },
                        { "variants": ["lrg000001"], "styles": { "padding": "24px" } }
                    ],
                    "children": [
                        { "type": "tag", "uuid": "title00001", "name": "Title", "tag": "h1", "kind": "text",
                          "vsettings": [{ "variants": [], "text": { "kind": "dynamic",
                            "expr": { "kind": "varRef", "param": "p-title" } } }] }
                    ]
                }
            }]
        }))
        .unwrap()
    }

    fn page_site() -> Site {
        serde_json::from_value(json!({
            "components": [{
                "uuid": "home",
                "name": "Blog Post",
                "pageMeta": { "path": "/blog/[slug]", "title": "Blog", "roleId": "member" },
                "tplTree": {
                    "type": "tag", "uuid": "root000001", "tag": "main",
                    "vsettings": [{ "variants": [] }]
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_readable_and_opaque_file_names() {
        let site = card_site();
        let card = &site.components[0];
        let readable = file_names(card, &CompilerOptions::default());
        assert_eq!(readable.render_module, "RenderCard.tsx");
        assert_eq!(readable.skeleton_module, "Card.tsx");
        assert_eq!(readable.stylesheet, "css__Card.css");
        assert_eq!(readable.skeleton_import_path(), "./Card");
        assert_eq!(readable.render_import_path_from_skeleton(), "./RenderCard");

        let opaque = file_names(
            card,
            &CompilerOptions {
                file_naming: FileNamingScheme::OpaqueId,
                style_scheme: StyleScheme::Scoped,
                ..Default::default()
            },
        );
        assert_eq!(opaque.render_module, "render__card.tsx");
        assert_eq!(opaque.skeleton_module, "comp__card.tsx");
        assert_eq!(opaque.stylesheet, "css__card.module.css");
    }

    #[test]
    fn test_page_skeleton_file_follows_route() {
        let site = page_site();
        let page = &site.components[0];
        let next = CompilerOptions {
            target_platform: TargetPlatform::NextJs,
            ..Default::default()
        };
        let files = file_names(page, &next);
        assert_eq!(files.skeleton_module, "blog/[slug].tsx");
        assert_eq!(files.render_import_path_from_skeleton(), "../RenderBlogPost");
        assert_eq!(page_file("/"), "index.tsx");

        // plain react has no routing, the page is an ordinary component
        assert_eq!(file_names(page, &CompilerOptions::default()).skeleton_module, "BlogPost.tsx");
    }

    #[test]
    fn test_tools_only_group_hidden_from_public_surface() {
        let site = card_site();
        let mut ctx = fixture_ctx(&site, "card");
        let out = assemble(&mut ctx).unwrap();
        let render = &out.render_module;

        assert!(render.contains("size?: SingleChoiceArg<\"small\" | \"large\">;"));
        assert!(!render.contains("internalTheme"));
        assert!(render.contains("export const Card__VariantProps = [\"size\"] as const;"));
        assert!(render.contains("onSelect?: (event: any) => void;"));
        assert!(render.contains("export interface DefaultCardProps {"));

        let mut forced = fixture_ctx_with(
            &site,
            "card",
            CompilerOptions {
                force_include_internal_props: true,
                ..Default::default()
            },
        );
        let out = assemble(&mut forced).unwrap();
        assert!(out.render_module.contains("internalTheme?: SingleChoiceArg<\"dark\">;"));
    }

    #[test]
    fn test_render_module_layout() {
        let site = card_site();
        let mut ctx = fixture_ctx(&site, "card");
        let out = assemble(&mut ctx).unwrap();
        let render = &out.render_module;

        assert!(render.starts_with("// @ts-nocheck"));
        assert!(render.contains("// Component: card"));
        assert!(render.contains("} from \"@designc/runtime\";"));
        assert!(render.contains("import \"./css__Card.css\";"));
        assert!(render.contains("function RenderCard__(props: {"));
        assert!(render.contains("title: \"Untitled\""));
        assert!(render.contains("const Card__Descendants = {\n  root: [\"root\", \"title\"],\n  title: [\"title\"]\n} as const;"));
        assert!(render.contains("title: makeNodeComponent(\"title\"),"));
        assert!(render.ends_with("export default RenderCard;\n/* prettier-ignore-end */\n"));

        let imports_at = render.find("import * as React").unwrap();
        let func_at = render.find("function RenderCard__").unwrap();
        assert!(imports_at < func_at);

        let skeleton = out.skeleton_module.unwrap();
        assert!(skeleton.contains("import { RenderCard, DefaultCardProps } from \"./RenderCard\";"));
        assert!(skeleton.contains("return <RenderCard root={{ ref }} {...props} />;"));
        assert!(skeleton.contains("HTMLElementRefOf<\"div\">"));

        assert!(out.stylesheet.contains("/* Styles for component Card (card) */"));
        assert_eq!(out.page_metadata, None);
        assert!(out.pass_metadata.runtime_imports.contains("classNames"));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let site = card_site();
        let mut a = fixture_ctx(&site, "card");
        let mut b = fixture_ctx(&site, "card");
        let out_a = assemble(&mut a).unwrap();
        let out_b = assemble(&mut b).unwrap();
        assert_eq!(out_a.render_module, out_b.render_module);
        assert_eq!(out_a.skeleton_module, out_b.skeleton_module);
        assert_eq!(out_a.stylesheet, out_b.stylesheet);
    }

    #[test]
    fn test_nextjs_page_plumbing() {
        let site = page_site();
        let mut ctx = fixture_ctx_with(
            &site,
            "home",
            CompilerOptions {
                target_platform: TargetPlatform::NextJs,
                enable_auth_gating: true,
                ..Default::default()
            },
        );
        let out = assemble(&mut ctx).unwrap();
        let render = &out.render_module;

        assert!(render.contains("import Head from \"next/head\";"));
        assert!(render.contains("<title key=\"title\">{RenderBlogPost.pageMetadata.title}</title>"));
        assert!(render.contains("<PageGuard__ roleId={\"member\"}>"));
        assert!(render.contains("title: \"Blog\","));
        assert!(render.contains("export interface DefaultBlogPostProps {}"));

        let skeleton = out.skeleton_module.unwrap();
        assert!(skeleton.contains("import { RenderBlogPost } from \"../RenderBlogPost\";"));
        assert!(skeleton.contains("route={useRouter()?.pathname}"));
        assert!(skeleton.contains("<PageParamsProvider__"));

        let meta = out.page_metadata.unwrap();
        assert_eq!(meta.path, "/blog/[slug]");
        assert_eq!(meta.role_id.as_deref(), Some("member"));
    }

    #[test]
    fn test_page_on_plain_react_has_no_route_plumbing() {
        let site = page_site();
        let mut ctx = fixture_ctx(&site, "home");
        let out = assemble(&mut ctx).unwrap();
        assert!(!out.render_module.contains("<Head>"));
        assert!(!out.render_module.contains("PageGuard__"));
        let skeleton = out.skeleton_module.unwrap();
        assert!(!skeleton.contains("PageParamsProvider__"));
        assert!(skeleton.contains("React.forwardRef(BlogPost_)"));
    }

    #[test]
    fn test_skeleton_can_be_skipped() {
        let site = card_site();
        let mut ctx = fixture_ctx_with(
            &site,
            "card",
            CompilerOptions {
                emit_skeleton: false,
                ..Default::default()
            },
        );
        assert!(assemble(&mut ctx).unwrap().skeleton_module.is_none());
    }
}
