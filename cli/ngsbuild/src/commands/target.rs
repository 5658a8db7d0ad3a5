//! `ngsbuild target`: describe how a platform tag is classified.

use anyhow::{bail, Result};
use ngsbuild_targets::{classify, ToolchainCommands, ToolchainFamily};

/// Print the classification of `tag` and the toolchain it selects.
pub fn describe(tag: &str, format: Option<&str>) -> Result<()> {
    let triple = classify(tag);
    let family = ToolchainFamily::default_for(triple.os_family);
    let commands = ToolchainCommands::for_target(family, triple.os_family);

    match format {
        None | Some("human") => {
            println!("=== Platform: {tag} ===");
            println!("  Machine:    {}", triple.machine);
            println!("  CPU family: {}", triple.cpu_family);
            println!("  OS family:  {}", triple.os_family);
            println!("  Toolchain:  {family}");
            println!("  Compiler:   {}", commands.compiler_so.join(" "));
            println!("  Linker:     {}", commands.linker_so.join(" "));
            println!("  Archiver:   {}", commands.archiver.join(" "));
        }
        Some("json") => {
            let value = serde_json::json!({
                "tag": tag,
                "triple": triple,
                "toolchain": family,
                "commands": commands,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Some(other) => bail!("unknown format: '{other}' (expected human or json)"),
    }
    Ok(())
}
