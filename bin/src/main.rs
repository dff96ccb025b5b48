//! candela CLI - keeps candle files up to date from tick data.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use candela_lib::{Shard, Symbol, Timeframe};
use clap::{CommandFactory, Parser, Subcommand};

mod commands;
mod logging;
mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "candela")]
#[command(about = "Crash-safe incremental tick-to-candle ETL", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file. Defaults to the platform config directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured target directory
    #[arg(long, global = true)]
    target_dir: Option<PathBuf>,

    /// Override the configured worker count
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Hidden: run one cycle for a shard (internal use only)
    #[arg(long, hide = true, value_name = "K/N")]
    worker_run: Option<Shard>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run update cycles on the configured interval until interrupted
    Run,

    /// Run a single update cycle and exit
    Once {
        /// Run workers as tasks in this process instead of child processes
        #[arg(long)]
        inline: bool,
    },

    /// Show checkpoints and candle counts
    Status {
        /// Only show this symbol
        #[arg(short, long)]
        symbol: Option<Symbol>,
    },

    /// Forget a series' checkpoint so it is rebuilt from history_start
    Reset {
        /// Symbol (e.g., EURUSD)
        symbol: Symbol,

        /// Timeframe (e.g., m1, h1, d1). Omit for every configured timeframe.
        timeframe: Option<Timeframe>,

        /// Also delete the candle file
        #[arg(long)]
        candles: bool,
    },

    /// Export committed candles as a partitioned Parquet dataset
    Export {
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Symbols to export (repeatable). Defaults to every stored symbol.
        #[arg(short, long)]
        symbol: Vec<Symbol>,

        /// Timeframes to export (repeatable). Defaults to every stored timeframe.
        #[arg(short, long)]
        timeframe: Vec<Timeframe>,

        /// Only candles starting at or after this instant (RFC 3339)
        #[arg(long)]
        after: Option<chrono::DateTime<chrono::Utc>>,

        /// Only candles starting before this instant (RFC 3339)
        #[arg(long)]
        until: Option<chrono::DateTime<chrono::Utc>>,

        /// Compression: zstd, snappy or none
        #[arg(long, default_value = "zstd")]
        compression: String,

        /// Skip the last candle of every series
        #[arg(long)]
        omit_last: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let settings = Settings {
        config: cli.config,
        target_dir: cli.target_dir,
        workers: cli.workers,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    // Worker processes spawned by `run` and `once`
    if let Some(shard) = cli.worker_run {
        return commands::worker::worker_run(&settings, shard).await;
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Run => commands::run::run(&settings).await,
        Commands::Once { inline } => commands::run::once(&settings, inline).await,
        Commands::Status { symbol } => commands::status::status(&settings, symbol.as_ref()),
        Commands::Reset {
            symbol,
            timeframe,
            candles,
        } => commands::reset::reset(&settings, &symbol, timeframe, candles),
        Commands::Export {
            output,
            symbol,
            timeframe,
            after,
            until,
            compression,
            omit_last,
        } => commands::export::export(
            &settings,
            commands::export::ExportArgs {
                output,
                symbols: symbol,
                timeframes: timeframe,
                after,
                until,
                compression,
                omit_last,
            },
        ),
    }
}
