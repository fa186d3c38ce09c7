#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use nuget_core::Config;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nuget")]
#[command(author, version, about = "Inspect NuGet dependency paths, lock files and the global packages folder", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Global packages folder (defaults to NUGET_PACKAGES or ~/.nuget/packages)
    #[arg(long, global = true, value_name = "PATH")]
    packages: Option<PathBuf>,

    /// Fallback packages folder, consulted after the global folder (repeatable)
    #[arg(long = "fallback", global = true, value_name = "PATH")]
    fallback: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Show the dependency paths that bring a package into a project
    Why {
        /// [PROJECT|SOLUTION] PACKAGE; the path defaults to the working directory
        #[arg(value_name = "ARGS", num_args = 1..=2, required = true)]
        args: Vec<String>,

        /// Only inspect these target frameworks (repeatable)
        #[arg(short = 'f', long = "framework", value_name = "FRAMEWORK")]
        frameworks: Vec<String>,
    },

    /// Inspect the global packages folder
    Cache {
        #[command(subcommand)]
        cache_cmd: CacheCommands,
    },

    /// Inspect packages.lock.json files
    Lock {
        #[command(subcommand)]
        lock_cmd: LockCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum CacheCommands {
    /// Find an installed package across the global and fallback folders
    Find {
        /// Package id
        id: String,

        /// Exact version; omit to list every installed version
        version: Option<String>,
    },

    /// List installed versions of a package in the global folder
    Versions {
        /// Package id
        id: String,
    },
}

#[derive(clap::Subcommand, Debug)]
enum LockCommands {
    /// Summarise a lock file
    Show {
        /// Lock file or directory containing one (defaults to the working directory)
        path: Option<PathBuf>,

        /// Compare with another lock file, ignoring content hashes
        #[arg(long, value_name = "OTHER")]
        compare: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json)
        .with_packages_folder(cli.packages)
        .with_fallback_folders(cli.fallback);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Why { args, frameworks }) => {
            let span = tracing::info_span!("why", cmd = "why", cwd = %cwd.display());
            let _guard = span.enter();
            commands::why::run(&config, &args, &frameworks, cli.json)
        }
        Some(Commands::Cache { cache_cmd }) => {
            let span = tracing::info_span!("cache", cmd = "cache", cwd = %cwd.display());
            let _guard = span.enter();
            match cache_cmd {
                CacheCommands::Find { id, version } => {
                    commands::cache::find(&config, &id, version.as_deref(), cli.json)
                }
                CacheCommands::Versions { id } => commands::cache::versions(&config, &id, cli.json),
            }
        }
        Some(Commands::Lock { lock_cmd }) => match lock_cmd {
            LockCommands::Show { path, compare } => {
                commands::lock::show(&config, path.as_deref(), compare.as_deref(), cli.json)
            }
        },
    }
}
