//! lag-bot: latency-arbitrage engine for short-dated up/down markets.
//!
//! Configuration comes from the environment (a `.env` file is honored),
//! with a few CLI overrides. Dry-run mode runs the full pipeline against
//! the simulated exchange client; live mode expects the deployment to
//! wire a real CLOB client through the library API.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use lag_bot::config::BotConfig;
use lag_bot::data_source::ChannelDataSource;
use lag_bot::engine::Engine;
use lag_bot::executor::Executor;
use lag_bot::risk::RiskManager;
use lag_bot::sim::SimClient;
use lag_bot::state_store::{AuditLog, PersistedState, StateStore};
use lag_bot::Alerter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "lag-bot")]
#[command(about = "Latency-arbitrage engine for short-dated up/down markets")]
#[command(version)]
struct Args {
    /// Trade with real orders (default is dry-run).
    #[arg(long)]
    live: bool,

    /// Comma-separated assets to trade (e.g., "BTC,ETH,SOL").
    #[arg(long, value_delimiter = ',')]
    assets: Option<Vec<String>>,

    /// Comma-separated contract windows (e.g., "5m,15m").
    #[arg(long, value_delimiter = ',')]
    windows: Option<Vec<String>>,

    /// Starting bankroll in USD (ignored when saved state exists).
    #[arg(long)]
    bankroll: Option<Decimal>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();
    let mut config = BotConfig::from_env();

    // CLI overrides.
    if args.live {
        config.dry_run = false;
        config.execution.dry_run = false;
    }
    if let Some(assets) = args.assets {
        config.assets = parse_all(&assets).context("invalid --assets")?;
    }
    if let Some(windows) = args.windows {
        config.windows = parse_all(&windows).context("invalid --windows")?;
    }
    if let Some(bankroll) = args.bankroll {
        config.bankroll = bankroll;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set global tracing subscriber")?;

    info!("starting lag-bot");
    info!(dry_run = config.dry_run, assets = ?config.assets, windows = ?config.windows, "configuration");

    // Live mode refuses to start on an unsafe configuration.
    config.validate().context("configuration validation failed")?;

    if !config.dry_run {
        // The venue protocol client (signing, auth, rate limits) is a
        // deployment concern; embed the engine through the library and
        // supply a BookClient implementation.
        bail!("live mode requires an exchange client wired via lag_bot::engine; run without --live for dry-run");
    }

    let store = StateStore::new(config.state_path.clone());
    let audit = Arc::new(
        AuditLog::open(config.trade_log_path.clone()).context("failed to open trade log")?,
    );
    let alerter = Alerter::new(config.alert_webhook_url.clone());

    // Risk state restores from disk; the bankroll flag only seeds a fresh
    // start. The session peak always recomputes from the live bankroll.
    let mut risk = RiskManager::new(config.risk.clone(), config.bankroll);
    let saved = store.load();
    if let Some(state) = &saved {
        risk.restore(state.risk_snapshot());
    }
    let risk = Arc::new(Mutex::new(risk));

    let client = Arc::new(SimClient::new());
    let (executor, mut events) =
        Executor::new(config.execution.clone(), client.clone(), risk.clone(), alerter);

    // Audit log consumer.
    let audit_task = {
        let audit = audit.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                audit.record(&event);
            }
        })
    };

    // Open positions from the previous run resume their monitors.
    if let Some(state) = saved {
        executor.restore_positions(state.open_snapshot);
    }

    let pairs: Vec<_> = {
        let cfg = &config;
        cfg.assets
            .iter()
            .flat_map(|&asset| {
                cfg.windows
                    .iter()
                    .map(move |&window| (asset, window, cfg.strategy_config(asset, window)))
            })
            .collect()
    };
    let engine = Arc::new(Engine::new(risk.clone(), executor.clone(), pairs));

    // Feed plumbing: protocol clients hold the sender ends. In dry-run the
    // simulated client mirrors book updates so monitor polls see marks.
    let (feed_tx, source) = ChannelDataSource::new(1024);
    let _feed_handle = feed_tx;

    // Periodic state persistence.
    let persist_task = {
        let risk = risk.clone();
        let executor = executor.clone();
        let store = store.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                ticker.tick().await;
                let state = PersistedState::capture(&risk.lock(), executor.open_snapshot());
                store.save(&state);
            }
        })
    };

    // Run until the feed ends or a shutdown signal arrives.
    let run_engine = {
        let engine = engine.clone();
        async move { engine.run(source).await }
    };
    tokio::select! {
        _ = run_engine => {
            info!("market data stream ended");
        }
        result = wait_for_shutdown() => {
            if let Err(e) = result {
                error!("shutdown signal handler error: {}", e);
            }
        }
    }

    engine.shutdown(&store).await;
    persist_task.abort();
    audit_task.abort();
    info!("lag-bot stopped");
    Ok(())
}

fn parse_all<T>(items: &[String]) -> Result<Vec<T>>
where
    T: std::str::FromStr<Err = String>,
{
    items
        .iter()
        .map(|s| s.parse::<T>().map_err(|e| anyhow::anyhow!(e)))
        .collect()
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await?;
        info!("received Ctrl+C");
    }

    Ok(())
}
