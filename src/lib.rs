#![recursion_limit = "256"]
//! Design Component Compiler
//!
//! Compiles the component graph of a visual design model into React render
//! modules, stylesheets and thin skeleton modules.
//!
//! # Features
//!
//! - Variant-aware styling with base-combo collapse and interaction triggers
//! - Slots, repetition and conditional rendering
//! - Controlled/uncontrolled state wiring and data queries
//! - Localized text through translator lookups
//! - Page metadata, route params and auth gating for page components
//! - Plain or scoped stylesheets, readable or opaque-id file names
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use designc::{compile_file, CompilerOptions, Result};
//!
//! fn main() -> Result<()> {
//!     let (outputs, stats) = compile_file("site.json", &CompilerOptions::default())?;
//!     println!("{} modules, {} bytes", outputs.len(), stats.output_size);
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! Each component goes through one pass:
//!
//! 1. **Semantic analysis** - Reject models that break structural invariants
//! 2. **Context** - Index variants, name nodes, resolve referenced components
//! 3. **Tree serialization** - Emit the JSX tree with variant-dependent values
//! 4. **State wiring** - Emit state specs, helpers and data queries
//! 5. **Style resolution** - Emit the stylesheet for every class in use
//! 6. **Assembly** - Emit the render module, skeleton and metadata

pub mod types;
pub mod error;
pub mod utils;
pub mod context;
pub mod collaborators;

pub mod variants;
pub mod class_names;
pub mod localization;
pub mod expr_serializer;
pub mod tree_serializer;
pub mod state_wiring;
pub mod style_resolver;
pub mod component_resolver;
pub mod assembler;
pub mod semantic;
pub mod cli;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

// Re-export commonly used types and functions
pub use error::{CompilerError, Result};
pub use types::*;
pub use assembler::{ComponentOutput, GeneratedFileNames, PageMetadataOutput};
pub use collaborators::{
    AssetLinkResolver, Collaborators, FontUsageExtractor, StyleVarResolver,
};
pub use context::{PassContext, PassMetadata};
pub use localization::{KeyScheme, LocalizationOptions};
pub use semantic::SemanticAnalyzer;
pub use style_resolver::StyleResolver;
pub use component_resolver::ComponentResolver;
pub use cli::EnhancedCli;

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Compiler build information
pub const BUILD_INFO: CompilerInfo = CompilerInfo {
    version: VERSION,
    name: NAME,
    description: DESCRIPTION,
    runtime_package: RUNTIME_PACKAGE,
    supported_features: &[
        "variants",
        "slots",
        "repetition",
        "state",
        "queries",
        "localization",
        "pages",
        "substitution",
    ],
};

/// Compiler information structure
#[derive(Debug, Clone)]
pub struct CompilerInfo {
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub runtime_package: &'static str,
    pub supported_features: &'static [&'static str],
}

/// Compilation options and settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    /// Enable debug mode with phase logging
    pub debug_mode: bool,

    /// Framework the generated modules are written for
    pub target_platform: TargetPlatform,

    /// Global class names or css-module scoped ones
    pub style_scheme: StyleScheme,

    /// How generated files are named
    pub file_naming: FileNamingScheme,

    /// Expose internal and tools-only params and variant groups
    pub force_include_internal_props: bool,

    /// Short hashed class names instead of readable ones
    pub use_short_identifiers: bool,

    /// Route localizable text through the translator when set
    pub localization: Option<LocalizationOptions>,

    pub enable_query_integration: bool,

    /// Instantiate components through the host's substitution table
    pub enable_substitution_indirection: bool,

    /// Wrap page bodies in the role guard
    pub enable_auth_gating: bool,

    pub use_optimized_images: bool,

    /// Emit the skeleton module alongside the render module
    pub emit_skeleton: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            target_platform: TargetPlatform::React,
            style_scheme: StyleScheme::Plain,
            file_naming: FileNamingScheme::Readable,
            force_include_internal_props: false,
            use_short_identifiers: false,
            localization: None,
            enable_query_integration: false,
            enable_substitution_indirection: false,
            enable_auth_gating: false,
            use_optimized_images: false,
            emit_skeleton: true,
        }
    }
}

/// Target platform for compilation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetPlatform {
    #[default]
    React,
    NextJs,
    Gatsby,
    Tanstack,
}

impl TargetPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetPlatform::React => "react",
            TargetPlatform::NextJs => "nextjs",
            TargetPlatform::Gatsby => "gatsby",
            TargetPlatform::Tanstack => "tanstack",
        }
    }

    /// Platforms with file-based routing and a head API.
    pub fn is_page_aware(&self) -> bool {
        !matches!(self, TargetPlatform::React)
    }

    /// Import of the platform's link component, if it has one.
    pub fn link_import(&self) -> Option<&'static str> {
        match self {
            TargetPlatform::React => None,
            TargetPlatform::NextJs => Some("import Link from \"next/link\";"),
            TargetPlatform::Gatsby => Some("import { Link } from \"gatsby\";"),
            TargetPlatform::Tanstack => Some("import { Link } from \"@tanstack/react-router\";"),
        }
    }
}

impl std::str::FromStr for TargetPlatform {
    type Err = CompilerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "react" => Ok(TargetPlatform::React),
            "nextjs" | "next" => Ok(TargetPlatform::NextJs),
            "gatsby" => Ok(TargetPlatform::Gatsby),
            "tanstack" => Ok(TargetPlatform::Tanstack),
            other => Err(CompilerError::config(format!("Unknown target platform '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleScheme {
    /// Global class names in a side-effect stylesheet import.
    #[default]
    Plain,
    /// Class names looked up through a css module object.
    Scoped,
}

impl std::str::FromStr for StyleScheme {
    type Err = CompilerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plain" => Ok(StyleScheme::Plain),
            "scoped" | "css-modules" => Ok(StyleScheme::Scoped),
            other => Err(CompilerError::config(format!("Unknown style scheme '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileNamingScheme {
    #[default]
    Readable,
    OpaqueId,
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationStats {
    /// Number of components compiled
    pub component_count: usize,

    /// Number of template nodes across all compiled components
    pub node_count: usize,

    /// Number of class names allocated
    pub class_name_count: usize,

    /// Number of localized strings collected
    pub localized_string_count: usize,

    /// Total size of emitted modules and stylesheets in bytes
    pub output_size: u64,

    /// Compilation time in milliseconds
    pub compile_time_ms: u64,
}

impl CompilationStats {
    pub(crate) fn record(&mut self, component: &Component, output: &ComponentOutput) {
        self.component_count += 1;
        component.tpl_tree.walk(&mut |_| self.node_count += 1);
        self.class_name_count += output.pass_metadata.class_names.len();
        self.localized_string_count += output.pass_metadata.localized_strings.len();
        self.output_size += (output.render_module.len()
            + output.stylesheet.len()
            + output.skeleton_module.as_ref().map_or(0, |s| s.len())) as u64;
    }
}

/// Compile one component with the default collaborators
pub fn compile_component(
    site: &Site,
    component_uuid: &str,
    options: &CompilerOptions,
) -> Result<ComponentOutput> {
    compile_component_with(site, component_uuid, options, &Collaborators::default())
}

/// Compile one component, looked up by uuid or name, with custom collaborators
pub fn compile_component_with(
    site: &Site,
    component_uuid: &str,
    options: &CompilerOptions,
    collaborators: &Collaborators,
) -> Result<ComponentOutput> {
    let component = site.component_by_name_or_uuid(component_uuid).ok_or_else(|| {
        CompilerError::config(format!(
            "Component '{}' not found in project '{}'",
            component_uuid, site.project_name
        ))
    })?;

    let mut analyzer = SemanticAnalyzer::new();
    if let Err(e) = analyzer.analyze_component(site, component) {
        log::error!(
            "Component '{}' ({}) of project '{}' failed validation",
            component.name, component.uuid, site.project_name
        );
        return Err(e);
    }

    run_pass(site, component, options, collaborators)
}

/// Compile every component of a site, sorted by name then uuid
pub fn compile_site(
    site: &Site,
    options: &CompilerOptions,
) -> Result<(Vec<ComponentOutput>, CompilationStats)> {
    let start_time = Instant::now();

    if options.debug_mode {
        log::info!("{} v{}", NAME, VERSION);
        log::info!(
            "Compiling {} components of project '{}' for {}...",
            site.components.len(),
            site.project_name,
            options.target_platform.as_str()
        );
        log::debug!("Compiler options: {:?}", options);
    }

    SemanticAnalyzer::new().analyze_site(site)?;

    let collaborators = Collaborators::default();
    let mut components: Vec<&Component> = site.components.iter().collect();
    components.sort_by(|a, b| (&a.name, &a.uuid).cmp(&(&b.name, &b.uuid)));

    let mut stats = CompilationStats::default();
    let mut outputs = Vec::with_capacity(components.len());
    for component in components {
        let output = run_pass(site, component, options, &collaborators)?;
        stats.record(component, &output);
        outputs.push(output);
    }
    stats.compile_time_ms = start_time.elapsed().as_millis() as u64;

    if options.debug_mode {
        log::info!("Compilation successful!");
        log::info!("Components: {}", stats.component_count);
        log::info!("Output size: {} bytes", stats.output_size);
        log::info!("Compile time: {}ms", stats.compile_time_ms);
        log::debug!("Full stats: {:?}", stats);
    }

    Ok((outputs, stats))
}

/// Load a design model from a JSON file
pub fn load_site(path: impl AsRef<Path>) -> Result<Site> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", path.display(), e),
    })?;
    let site: Site = serde_json::from_str(&source)?;
    Ok(site)
}

/// Load a design model and compile every component in it
pub fn compile_file(
    path: impl AsRef<Path>,
    options: &CompilerOptions,
) -> Result<(Vec<ComponentOutput>, CompilationStats)> {
    let site = load_site(path)?;
    compile_site(&site, options)
}

/// Check if the compiler can handle a specific feature
pub fn supports_feature(feature: &str) -> bool {
    BUILD_INFO.supported_features.contains(&feature)
}

/// Get compiler build information
pub fn build_info() -> &'static CompilerInfo {
    &BUILD_INFO
}

fn run_pass(
    site: &Site,
    component: &Component,
    options: &CompilerOptions,
    collaborators: &Collaborators,
) -> Result<ComponentOutput> {
    if options.debug_mode {
        log::debug!("Starting pass for component '{}' ({})", component.name, component.uuid);
    }

    let mut ctx = PassContext::new(site, component, options, collaborators);
    let result = assembler::assemble(&mut ctx);

    match &result {
        Ok(output) if options.debug_mode => {
            log::debug!(
                "Pass complete for '{}': {} named nodes, {} classes",
                component.name,
                output.pass_metadata.node_names.len(),
                output.pass_metadata.class_names.len()
            );
        }
        Ok(_) => {}
        Err(e) => log::error!(
            "Failed to compile component '{}' ({}) of project '{}': {}",
            component.name, component.uuid, site.project_name, e
        ),
    }
    result
}
