// FILE: src/cli/handlers.rs
use crate::{
    compile_component, compile_site, load_site, CompilationStats, CompilerError, ComponentOutput,
    Result, SemanticAnalyzer, Site,
};

use std::fs;
use std::path::Path;
use std::time::Instant;

// --- COMPILE ---
pub fn handle_compile_command(cli: &super::EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = required(matches, "input")?;
    let options = cli.build_compiler_options(matches)?;
    let site = load_site(input_path)?;

    let compile_start = Instant::now();
    let (outputs, stats) = match matches.get_one::<String>("component") {
        Some(component) if !matches.get_flag("all") => {
            let output = compile_component(&site, component, &options)?;
            let stats = single_component_stats(&site, component, &output, compile_start);
            (vec![output], stats)
        }
        _ => compile_site(&site, &options)?,
    };

    let json = if outputs.len() == 1 && matches.get_one::<String>("component").is_some() {
        serde_json::to_string_pretty(&outputs[0])?
    } else {
        serde_json::to_string_pretty(&outputs)?
    };

    match matches.get_one::<String>("output") {
        Some(output_path) => {
            fs::write(output_path, json)?;
            eprintln!("✅ Wrote {} component(s) to {}", outputs.len(), output_path);
        }
        None => println!("{}", json),
    }

    let out_dir = matches
        .get_one::<String>("out-dir")
        .map(|s| s.as_str())
        .or_else(|| cli.output_directory());
    if let Some(dir) = out_dir {
        let written = write_outputs(Path::new(dir), &outputs)?;
        eprintln!("✅ Wrote {} files under {}", written, dir);
    }

    if matches.get_flag("stats") {
        print_detailed_stats(&stats)?;
    }

    Ok(())
}

/// Writes each generated file at its relative path under `dir`.
fn write_outputs(dir: &Path, outputs: &[ComponentOutput]) -> Result<usize> {
    let mut written = 0;
    for output in outputs {
        let mut files = vec![
            (&output.file_names.render_module, &output.render_module),
            (&output.file_names.stylesheet, &output.stylesheet),
        ];
        if let Some(skeleton) = &output.skeleton_module {
            files.push((&output.file_names.skeleton_module, skeleton));
        }
        for (name, contents) in files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, contents)?;
            log::debug!("Wrote {}", path.display());
            written += 1;
        }
    }
    Ok(written)
}

fn single_component_stats(
    site: &Site,
    component: &str,
    output: &ComponentOutput,
    started: Instant,
) -> CompilationStats {
    let mut stats = CompilationStats::default();
    if let Some(component) = site.component_by_name_or_uuid(component) {
        stats.record(component, output);
    }
    stats.compile_time_ms = started.elapsed().as_millis() as u64;
    stats
}

// --- CHECK ---
pub fn handle_check_command(matches: &clap::ArgMatches) -> Result<()> {
    let input_path = required(matches, "input")?;
    let recursive = matches.get_flag("recursive");

    if recursive && Path::new(input_path).is_dir() {
        check_directory_recursive(input_path)
    } else {
        check_single_file(Path::new(input_path))
    }
}

fn check_single_file(input_path: &Path) -> Result<()> {
    println!("🔍 Checking {}", input_path.display());
    let result = load_site(input_path).and_then(|site| {
        let mut analyzer = SemanticAnalyzer::new();
        analyzer.analyze_site(&site)?;
        Ok(analyzer.warnings().len())
    });
    match result {
        Ok(0) => {
            println!("✅ {} - No issues found", input_path.display());
            Ok(())
        }
        Ok(warnings) => {
            println!("⚠️  {} - {} warning(s)", input_path.display(), warnings);
            Ok(())
        }
        Err(e) => {
            println!("❌ {} - {}", input_path.display(), e);
            Err(e)
        }
    }
}

fn check_directory_recursive(dir_path: &str) -> Result<()> {
    let mut total_files = 0;
    let mut error_files = 0;

    for entry in walkdir::WalkDir::new(dir_path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CompilerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        if entry.file_type().is_file() && entry.path().extension().map_or(false, |ext| ext == "json") {
            total_files += 1;
            if check_single_file(entry.path()).is_err() {
                error_files += 1;
            }
        }
    }

    println!("\n📊 Check Summary:");
    println!("   Total files: {}", total_files);
    println!("   Files with errors: {}", error_files);
    if total_files > 0 {
        println!(
            "   Success rate: {:.1}%",
            (total_files - error_files) as f64 / total_files as f64 * 100.0
        );
    }

    if error_files > 0 {
        Err(CompilerError::invalid_format(format!("{} files have errors", error_files)))
    } else {
        Ok(())
    }
}

// --- HELPERS ---
fn required<'m>(matches: &'m clap::ArgMatches, name: &str) -> Result<&'m str> {
    matches
        .get_one::<String>(name)
        .map(|s| s.as_str())
        .ok_or_else(|| CompilerError::config(format!("Missing required argument '{}'", name)))
}

fn print_detailed_stats(stats: &CompilationStats) -> Result<()> {
    eprintln!("\n📊 Compilation Statistics:");
    eprintln!("   Components: {}", stats.component_count);
    eprintln!("   Nodes: {}", stats.node_count);
    eprintln!("   Class names: {}", stats.class_name_count);
    if stats.localized_string_count > 0 {
        eprintln!("   Localized strings: {}", stats.localized_string_count);
    }
    eprintln!("   Output size: {} bytes", stats.output_size);
    eprintln!("   Compile time: {}ms", stats.compile_time_ms);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompilerOptions;
    use serde_json::json;
    use tempfile::TempDir;

    fn page_model() -> serde_json::Value {
        json!({
            "components": [{
                "uuid": "post",
                "name": "Post",
                "pageMeta": { "path": "/blog/[slug]" },
                "tplTree": { "type": "tag", "uuid": "root000001", "tag": "main",
                             "vsettings": [{ "variants": [] }] }
            }]
        })
    }

    fn page_site() -> Site {
        serde_json::from_value(page_model()).unwrap()
    }

    #[test]
    fn test_write_outputs_creates_route_directories() {
        let temp_dir = TempDir::new().unwrap();
        let options = CompilerOptions {
            target_platform: crate::TargetPlatform::NextJs,
            ..Default::default()
        };
        let (outputs, _) = compile_site(&page_site(), &options).unwrap();

        let written = write_outputs(temp_dir.path(), &outputs).unwrap();
        assert_eq!(written, 3);
        assert!(temp_dir.path().join("RenderPost.tsx").exists());
        assert!(temp_dir.path().join("css__Post.css").exists());
        assert!(temp_dir.path().join("blog").join("[slug].tsx").exists());
    }

    #[test]
    fn test_single_component_stats_count_nodes_and_size() {
        let site = page_site();
        let output = compile_component(&site, "Post", &CompilerOptions::default()).unwrap();
        let stats = single_component_stats(&site, "Post", &output, Instant::now());

        assert_eq!(stats.component_count, 1);
        assert_eq!(stats.node_count, 1);
        let expected = output.render_module.len()
            + output.stylesheet.len()
            + output.skeleton_module.as_ref().map_or(0, |s| s.len());
        assert_eq!(stats.output_size, expected as u64);
        assert!(stats.output_size > 0);
    }

    #[test]
    fn test_check_directory_counts_bad_models() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            temp_dir.path().join("good.json"),
            page_model().to_string(),
        )
        .unwrap();
        fs::write(nested.join("bad.json"), "{ not json").unwrap();
        fs::write(nested.join("notes.txt"), "ignored").unwrap();

        let err = check_directory_recursive(temp_dir.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid format: 1 files have errors");
    }
}
