//! dirwatch CLI - watch a directory and journal its changes

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_lib::cmd;
use cli_lib::cmd::watch::{ClassifyArg, PolicyPreset, WatchArgs};
use std::path::PathBuf;

/// dirwatch - Report and journal changes in a directory tree
#[derive(Parser)]
#[command(name = "dirwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Write diagnostics to this file instead of stderr
    #[arg(long, global = true)]
    diag_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory until Ctrl-C
    Watch {
        /// Directory to watch
        path: PathBuf,

        /// Journal file (default: from config, else log.txt in the current directory)
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Only watch the top level of the directory
        #[arg(long)]
        no_recursive: bool,

        /// Which events to report
        #[arg(long, value_enum)]
        policy: Option<PolicyPreset>,

        /// How created entries are classified as file or folder
        #[arg(long, value_enum)]
        classify: Option<ClassifyArg>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// View or edit the system configuration
    Config {
        /// List all values
        #[arg(long)]
        list: bool,

        /// Print one value
        #[arg(long, value_name = "KEY")]
        get: Option<String>,

        /// Set one value
        #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
        set: Option<Vec<String>>,

        /// Print the config file path
        #[arg(long)]
        path: bool,

        /// With --path, create the file if it does not exist
        #[arg(long, requires = "path")]
        create: bool,

        /// Print an example config
        #[arg(long)]
        example: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let _guard = cli_lib::logging::init(cli.diag_log.as_deref())?;

    match cli.command {
        Commands::Watch { path, log_file, no_recursive, policy, classify, json } => {
            cmd::watch::run(WatchArgs {
                path,
                log_file,
                no_recursive,
                policy,
                classify,
                json,
            })
            .await
        }
        Commands::Config { list: _, get, set, path, create, example } => {
            if let Some(key) = get {
                cmd::config::run_get(&key).await
            } else if let Some(pair) = set {
                cmd::config::run_set(&pair[0], &pair[1]).await
            } else if path {
                cmd::config::run_path(create).await
            } else if example {
                cmd::config::run_example().await
            } else {
                // --list is also the default
                cmd::config::run_list().await
            }
        }
    }
}
