//! burrow - browse CockroachDB catalogs from the terminal.

mod commands;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use burrow_core::logging::{init_logging, LogConfig};
use burrow_core::services::storage;
use burrow_core::{BurrowError, BurrowState};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "burrow", version)]
#[command(about = "Browse schemas, reconstruct DDL and run SQL against CockroachDB", long_about = None)]
struct Cli {
    /// Directory holding saved profiles and logs
    #[arg(long, global = true, env = "BURROW_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Password for every connection this invocation makes. Never saved.
    #[arg(long, global = true, env = "BURROW_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log filter, e.g. `burrow_core=debug`
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage saved connection profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Check that a profile can connect
    Test {
        /// Saved profile name
        profile: String,
    },

    /// Walk the object tree: <profile> [database] [schema] [folder] [object]
    ///
    /// Containers list their children; tables show their details; other objects
    /// print their definition.
    Browse {
        /// Saved profile name
        profile: String,
        /// Labels to descend through, e.g. `shop public Tables orders`
        path: Vec<String>,
    },

    /// Print the definition of one object
    Ddl {
        #[command(flatten)]
        target: Target,
        /// table, view, index, function, sequence or type
        kind: String,
        /// `schema.name`, or `name` in `public`
        object: String,
        /// Owning table, required for indexes
        #[arg(long)]
        table: Option<String>,
        /// Compose a table's DDL from catalog metadata instead of SHOW CREATE
        #[arg(long)]
        reconstruct: bool,
    },

    /// Show a table's columns, indexes, foreign keys, DDL and first rows
    Describe {
        #[command(flatten)]
        target: Target,
        /// `schema.table`, or `table` in `public`
        table: String,
    },

    /// Run one SQL statement. Reads stdin when SQL is `-`.
    Run {
        #[command(flatten)]
        target: Target,
        sql: String,
        /// Positional parameter for `$1`, `$2`, ... (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,
        /// Print the result envelope as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a table from column specs
    CreateTable {
        #[command(flatten)]
        target: Target,
        /// `schema.table`, or `table` in `public`
        table: String,
        /// `name:TYPE[:pk][:not-null][:unique][:default=EXPR]` (repeatable)
        #[arg(long = "column", required = true)]
        columns: Vec<String>,
        /// Print the statement without running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Create a view over a SELECT
    CreateView {
        #[command(flatten)]
        target: Target,
        /// `schema.view`, or `view` in `public`
        view: String,
        /// The SELECT the view wraps
        #[arg(long)]
        query: String,
        /// Print the statement without running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Drop a table, view or sequence
    Drop {
        #[command(flatten)]
        target: Target,
        /// table, view or sequence
        kind: String,
        /// `schema.name`, or `name` in `public`
        object: String,
        /// Execute the statement; without this it is only printed
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Save a profile, replacing one with the same name
    Add(ProfileArgs),
    /// List saved profiles, most recently used first
    List,
    /// Delete a saved profile
    Remove {
        /// Saved profile name
        name: String,
    },
}

#[derive(Args)]
pub struct ProfileArgs {
    /// Profile name
    pub name: String,
    #[arg(long, default_value = "localhost")]
    pub host: String,
    #[arg(long, default_value_t = 26257)]
    pub port: u16,
    #[arg(long, default_value = "defaultdb")]
    pub database: String,
    #[arg(long, default_value = "root")]
    pub user: String,
    /// disable or prefer; TLS-only modes are refused at connect time
    #[arg(long, default_value = "disable")]
    pub sslmode: String,
    /// Seconds
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u32,
    /// Seconds; server default when omitted
    #[arg(long)]
    pub statement_timeout: Option<u32>,
}

/// Which connection a command runs on.
#[derive(Args)]
pub struct Target {
    /// Saved profile name
    pub profile: String,
    /// Database to connect to instead of the profile's
    #[arg(long, short)]
    pub database: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(storage::default_data_dir);
    let mut log_config = LogConfig::new(data_dir.join("logs"));
    if let Some(filter) = &cli.log {
        log_config = log_config.with_filter(filter.clone());
    }
    let _logging_guard = init_logging(log_config);

    match run(cli, data_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, data_dir: PathBuf) -> anyhow::Result<()> {
    let state = BurrowState::with_data_dir(data_dir)?;
    tracing::debug!(data_dir = %state.data_dir().display(), "Starting burrow");
    state.block_on(commands::dispatch(&state, cli.command, cli.password.as_deref()))
}

fn report(err: &anyhow::Error) {
    eprintln!("error: {err:#}");
    if let Some(hint) = err.downcast_ref::<BurrowError>().and_then(|e| e.hint()) {
        eprintln!("hint: {hint}");
    }
}
