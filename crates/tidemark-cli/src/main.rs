mod commands;
mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tidemark_config::{ConfigLoader, MigrateConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tidemark", version, about = "Apply versioned migrations to a SQLite database")]
struct Cli {
    /// Config file (YAML or TOML). Defaults to ./tidemark.yml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long, global = true, env = "TIDEMARK_DATABASE")]
    database: Option<PathBuf>,

    /// Directory holding the migration files.
    #[arg(long, global = true, env = "TIDEMARK_DIR")]
    dir: Option<PathBuf>,

    /// Table that records the current version.
    #[arg(long, global = true)]
    table: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Migrate to a version, or to the newest migration when none is given.
    Migrate {
        #[arg(long, allow_negative_numbers = true)]
        target: Option<i64>,
    },
    /// Show the steps `migrate` would run, without running them.
    Plan {
        #[arg(long, allow_negative_numbers = true)]
        target: Option<i64>,
        #[arg(long)]
        json: bool,
    },
    /// Show the current version and pending migrations.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Create the next migration file from a template.
    New { name: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Migrate { target } => commands::migrate(&config, target),
        Command::Plan { target, json } => commands::plan(&config, target, json),
        Command::Status { json } => commands::status(&config, json),
        Command::New { name } => commands::new_migration(&config, &name).map(|path| {
            println!("Created {}", path.display());
        }),
    }
}

fn init_tracing(format: LogFormat, verbose: u8) {
    let default = match verbose {
        0 => "tidemark=info",
        1 => "tidemark=debug",
        _ => "tidemark=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Config file first, then command-line flags on top.
fn resolve_config(cli: &Cli) -> Result<MigrateConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConfigLoader::discover(Path::new(".")).context("failed to load config")?,
    };

    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(dir) = &cli.dir {
        config.migrations_dir = dir.clone();
    }
    if let Some(table) = &cli.table {
        config.table = table.clone();
    }
    Ok(config)
}
