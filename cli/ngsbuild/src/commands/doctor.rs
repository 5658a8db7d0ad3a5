//! `ngsbuild doctor`: toolchain diagnostics.

use std::path::Path;

use anyhow::Result;
use ngsbuild_engine::CommandRunner;
use ngsbuild_targets::{classify, host_platform_tag};

use crate::manifest::NgsbuildManifest;

/// Print toolchain and project diagnostics for `plat_name` (default: host).
pub fn run(project_dir: &Path, plat_name: Option<&str>, runner: &dyn CommandRunner) -> Result<()> {
    println!("=== ngsbuild doctor ===");
    println!();
    println!("ngsbuild version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    let host = host_platform_tag();
    let tag = plat_name.map_or_else(|| host.clone(), str::to_string);
    println!("--- Platform ---");
    println!("  Host:   {host} -> {}", classify(&host));
    if tag != host {
        println!("  Target: {tag} -> {}", classify(&tag));
    }
    println!();

    let manifest = NgsbuildManifest::find_and_load(project_dir);
    let translator = match &manifest {
        Ok(Some((m, _))) => m.translator.program.clone(),
        _ => "cython".to_string(),
    };

    println!("--- System Tools ---");
    for tool in ["cc", "c++", "ar", translator.as_str()] {
        print_tool_status(runner, project_dir, tool);
    }
    println!();

    println!("--- Project Status ---");
    match manifest {
        Ok(Some((manifest, dir))) => {
            println!("  ngsbuild.toml: found at {}", dir.display());
            println!("  Package:   {} {}", manifest.package.name, manifest.package.version);
            println!("  Runtime:   {} {}", manifest.runtime.name, manifest.runtime.version);
            println!("  Native:    {} ({} sources)", manifest.native.name, manifest.native.sources.len());
            println!("  Extensions: {}", manifest.extensions.len());
            println!(
                "  Bindings:  {}",
                if manifest.bindings.is_some() { "configured" } else { "missing" }
            );
        }
        Ok(None) => println!("  ngsbuild.toml: not found"),
        Err(e) => println!("  ngsbuild.toml: error: {e:#}"),
    }

    Ok(())
}

fn print_tool_status(runner: &dyn CommandRunner, cwd: &Path, name: &str) {
    if !runner.is_available(name) {
        println!("  {name}: not found");
        return;
    }
    match runner.run(&[name.to_string(), "--version".to_string()], cwd) {
        Ok(output) => {
            let first_line = output.stdout.lines().next().unwrap_or("(unknown version)");
            println!("  {name}: {first_line}");
        }
        Err(_) => println!("  {name}: found, version unknown"),
    }
}
