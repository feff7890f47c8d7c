//! `trade-monitor` - polls a trade logging program and maintains the event cache.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use trade_event_monitor::telemetry::{init_telemetry, TelemetryConfig};
use trade_event_monitor::utils::logging;
use trade_event_monitor::{
    AddressQuery, CacheFile, CommitmentLevel, EventQuery, Fetcher, LogScanner, MonitorConfig,
    MonitorConfigBuilder, Result, StatusReport, StoreSnapshot, SyncEngine,
};

#[derive(Parser, Debug)]
#[command(name = "trade-monitor")]
#[command(about = "Discover and cache TradeEvent logs of a Solana program")]
struct Args {
    /// RPC endpoint (overrides MONITOR_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Program address to watch (overrides MONITOR_PROGRAM_ADDRESS)
    #[arg(long, global = true)]
    program: Option<String>,

    /// Cache directory (overrides MONITOR_CACHE_DIR)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// processed | confirmed | finalized (overrides MONITOR_COMMITMENT)
    #[arg(long, global = true)]
    commitment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the program on an interval until Ctrl+C
    Run {
        /// Seconds between cycles
        #[arg(long)]
        interval: Option<u64>,

        /// Signatures per page
        #[arg(long)]
        batch_size: Option<usize>,

        /// Concurrent transaction fetches
        #[arg(long)]
        concurrency: Option<usize>,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Print a summary of the cache file
    Status,

    /// List cached events, or live events for an account with --live
    Query {
        /// Only events whose user or fund is this address
        #[arg(long)]
        address: Option<String>,

        /// Signature of the last record of the previous page
        #[arg(long)]
        cursor: Option<String>,

        #[arg(long, default_value = "10")]
        page_size: usize,

        /// Query the chain for --address instead of the cache
        #[arg(long, requires = "address")]
        live: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut builder = MonitorConfigBuilder::from_env()?;
    if let Some(url) = args.rpc_url {
        builder = builder.with_rpc(url);
    }
    if let Some(program) = args.program {
        builder = builder.program_id(program);
    }
    if let Some(dir) = args.cache_dir {
        builder = builder.with_cache_dir(dir);
    }
    if let Some(level) = args.commitment {
        builder = builder.with_commitment(level.parse::<CommitmentLevel>()?);
    }
    if let Commands::Run {
        interval,
        batch_size,
        concurrency,
        ..
    } = &args.command
    {
        if let Some(secs) = interval {
            builder = builder.with_poll_interval(*secs);
        }
        if let Some(size) = batch_size {
            builder = builder.with_batch_size(*size);
        }
        if let Some(limit) = concurrency {
            builder = builder.with_concurrency_limit(*limit);
        }
    }
    let config = builder.build()?;

    let _telemetry = init_telemetry(TelemetryConfig::from_monitor(&config));

    match args.command {
        Commands::Run { once, .. } => run(&config, once).await,
        Commands::Status => {
            status(&config);
            Ok(())
        }
        Commands::Query {
            address,
            cursor,
            page_size,
            live,
        } => query(&config, address, cursor, page_size, live).await,
    }
}

async fn run(config: &MonitorConfig, once: bool) -> Result<()> {
    logging::log_startup(config);
    let mut engine = SyncEngine::new(config)?;

    if once {
        let report = engine.run_cycle().await?;
        println!("{report:#?}");
        return Ok(());
    }

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logging::log(logging::LogLevel::Info, "Received Ctrl+C, shutting down...");
            signal_token.cancel();
        }
    });

    engine.run(token).await
}

fn status(config: &MonitorConfig) {
    let path = config.cache_path();
    match CacheFile::read(&path) {
        Ok(file) => {
            let report =
                StatusReport::from_snapshot(file.into(), chrono::Utc::now().timestamp_millis());
            print!("{}", report.render());
        }
        Err(e) => {
            println!("No readable cache at {}: {e}", path.display());
            println!("Start the monitor with `trade-monitor run`.");
        }
    }
}

async fn query(
    config: &MonitorConfig,
    address: Option<String>,
    cursor: Option<String>,
    page_size: usize,
    live: bool,
) -> Result<()> {
    let page = if live {
        let fetcher = Fetcher::new(config.rpc_url.clone(), config.commitment_level.into());
        let scanner = LogScanner::new(Default::default(), config.timestamp_policy);
        let address = address.unwrap_or_default();
        AddressQuery::new(fetcher, scanner)
            .page(&address, cursor.as_deref(), page_size)
            .await?
    } else {
        let snapshot = match CacheFile::read(&config.cache_path()) {
            Ok(file) => StoreSnapshot::from(file),
            Err(e) => {
                tracing::warn!(error = %e, "Cache not readable, showing empty result");
                StoreSnapshot::empty()
            }
        };
        let query = EventQuery::from_snapshot(snapshot);
        match address {
            Some(address) => query.address_page(&address, cursor.as_deref(), page_size)?,
            None => query.cursor_page(cursor.as_deref(), page_size)?,
        }
    };

    println!("{}", serde_json::to_string_pretty(&page.records)?);
    if let Some(next) = page.next_cursor.filter(|_| page.has_more) {
        println!("next cursor: {next}");
    }
    Ok(())
}
