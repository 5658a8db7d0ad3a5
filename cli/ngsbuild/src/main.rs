//! ngsbuild: build driver for packages pairing a vendored native library with
//! translated extension modules.

mod commands;
mod logger;
mod manifest;

use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ngsbuild_engine::{CommandRunner, SystemRunner};

use commands::BuildOptions;

#[derive(Parser)]
#[command(name = "ngsbuild", version, about = "Native extension build driver")]
struct Cli {
    /// More output (repeat for trace output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an ngsbuild.toml in the current directory
    Init {
        /// Package name
        name: String,
    },
    /// Build the vendored native static library
    BuildClib {
        #[command(flatten)]
        opts: BuildOptions,
    },
    /// Translate, compile and link the extension modules
    BuildExt {
        #[command(flatten)]
        opts: BuildOptions,
    },
    /// Remove generated files
    Clean {
        /// Also remove translated sources and compiled modules
        #[arg(long, short = 'a')]
        all: bool,
        /// Platform tag whose build directories to remove
        #[arg(long = "plat-name")]
        plat_name: Option<String>,
    },
    /// Write the packaging descriptor and build a source distribution
    Sdist,
    /// Check toolchain and project status
    Doctor {
        /// Platform tag to classify in addition to the host
        #[arg(long = "plat-name")]
        plat_name: Option<String>,
    },
    /// Show how a platform tag is classified
    Target {
        /// Platform tag (e.g. macosx-11.0-arm64)
        tag: String,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    logger::init(logger::level_for(cli.verbose, cli.quiet));

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);

    match cli.command {
        Commands::Init { name } => commands::init::run(&cwd, &name),

        Commands::BuildClib { opts } => {
            let (manifest, project_dir) = commands::require_manifest(&cwd)?;
            let report = commands::build_clib::run(&project_dir, &manifest, &opts, runner)?;
            commands::print_report(&report, opts.report.as_deref())
        }

        Commands::BuildExt { opts } => {
            let (manifest, project_dir) = commands::require_manifest(&cwd)?;
            let report = commands::build_ext::run(&project_dir, &manifest, &opts, runner)?;
            commands::print_report(&report, opts.report.as_deref())
        }

        Commands::Clean { all, plat_name } => {
            let (manifest, project_dir) = commands::require_manifest(&cwd)?;
            let opts = BuildOptions {
                plat_name,
                ..BuildOptions::default()
            };
            commands::clean::run(&project_dir, &manifest, &opts, all).map(|_| ())
        }

        Commands::Sdist => {
            let (manifest, project_dir) = commands::require_manifest(&cwd)?;
            commands::sdist::run(&project_dir, &manifest, runner.as_ref()).map(|_| ())
        }

        Commands::Doctor { plat_name } => commands::doctor::run(&cwd, plat_name.as_deref(), runner.as_ref()),

        Commands::Target { tag, format } => commands::target::describe(&tag, format.as_deref()),
    }
}
