use std::process;

use clap::{Parser, Subcommand};
use state_store::JournalMode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// statemig: inspect and migrate local client state stores.
///
/// Works on the SQLite file a client keeps its flat key-value state in.
#[derive(Parser)]
#[command(name = "statemig", version, about, long_about = None)]
struct Cli {
    /// SQLite journal mode used when opening the store (wal, delete, memory).
    #[arg(long, global = true, default_value = "wal")]
    journal_mode: JournalMode,

    /// Log every migration decision and write to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored schema version and the steps still pending.
    Status {
        /// Path to the SQLite database file.
        db: String,
    },

    /// Upgrade the store to the current schema version.
    Migrate {
        /// Path to the SQLite database file.
        db: String,

        /// Only report what would run.
        #[arg(long)]
        dry_run: bool,
    },

    /// Downgrade the store to an older schema version.
    Rollback {
        /// Path to the SQLite database file.
        db: String,

        /// Target schema version.
        #[arg(long)]
        to: u32,
    },

    /// Export stored values as JSON for debugging.
    Export {
        /// Path to the SQLite database file.
        db: String,

        /// Key to export. If omitted, exports every key.
        key: Option<String>,
    },

    /// List the migration chain shipped with this build.
    Chain,
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Route the engine's `log` records to stderr. `RUST_LOG` overrides the
/// level picked by `--verbose`.
fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let journal_mode = cli.journal_mode;
    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Status { db } => commands::status(&db, journal_mode).await,
        Commands::Migrate { db, dry_run } => commands::migrate(&db, journal_mode, dry_run).await,
        Commands::Rollback { db, to } => commands::rollback(&db, journal_mode, to).await,
        Commands::Export { db, key } => commands::export(&db, journal_mode, key.as_deref()).await,
        Commands::Chain => commands::chain(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
