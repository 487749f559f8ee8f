mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_MANIFEST_ERROR, EXIT_STORE_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "bootrpm",
    version,
    about = "Build and publish versioned bootstrap packages with a stable 'latest' alias"
)]
struct Cli {
    /// Path to the bootrpm manifest.
    #[arg(short, long, default_value = "bootrpm.toml", global = true)]
    manifest: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check whether the published 'latest' build matches the manifest (exit 4 if not).
    Probe,
    /// Build and publish a new release if the manifest changed.
    Apply,
    /// List the builds in the destination directory.
    List,
    /// Show the record embedded in a build.
    Inspect {
        /// 'latest', a release number, or <base>-<release>.
        #[arg(default_value = "latest")]
        build: String,
    },
    /// Check the alias and the embedded record of every build.
    Verify,
    /// Remove old builds, never the one 'latest' points at.
    Prune {
        /// Number of newest builds to keep.
        #[arg(long, default_value_t = 5)]
        keep: usize,
        /// Only report what would be removed.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BOOTRPM_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let manifest = cli.manifest.as_path();
    let json_output = cli.json;

    let result = match cli.command {
        Commands::Probe => commands::probe::run(manifest, json_output),
        Commands::Apply => commands::apply::run(manifest, json_output),
        Commands::List => commands::list::run(manifest, json_output),
        Commands::Inspect { build } => commands::inspect::run(manifest, &build, json_output),
        Commands::Verify => commands::verify::run(manifest, json_output),
        Commands::Prune { keep, dry_run } => {
            commands::prune::run(manifest, keep, dry_run, json_output)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("manifest error:")
        || msg.starts_with("failed to parse manifest")
        || msg.starts_with("failed to read manifest")
        || msg.starts_with("unsupported manifest_version")
    {
        EXIT_MANIFEST_ERROR
    } else if msg.starts_with("ledger corrupt:") || msg.starts_with("store error:") {
        EXIT_STORE_ERROR
    } else {
        EXIT_FAILURE
    }
}
