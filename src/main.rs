// CLI entry point for the spot grid trading bot

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spot_grid::bot::TradingBot;
use spot_grid::config::{Config, TradingMode};
use spot_grid::error::{EngineError, EngineResult};
use spot_grid::gateway::simulated::{PricePath, SimulatedExchange};
use spot_grid::gateway::{OrderGateway, PriceFeed};

#[derive(Parser, Debug)]
#[command(
    name = "spot-grid",
    about = "Spot grid trading bot with paper-trading simulation"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Run in simulation (paper trading) mode
    #[arg(short, long)]
    simulation: bool,

    /// Run in live trading mode
    #[arg(short, long, conflicts_with = "simulation")]
    live: bool,

    /// Trading pair, e.g. BTC/EUR
    #[arg(short, long)]
    pair: Option<String>,

    /// Investment amount in quote currency
    #[arg(short, long)]
    investment: Option<f64>,

    /// Number of grid levels
    #[arg(short, long)]
    grids: Option<usize>,

    /// Grid range percentage
    #[arg(short, long)]
    range: Option<f64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "spot_grid=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if let Err(e) = run(cli).await {
        error!(error = %e, category = e.category(), "fatal error");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> EngineResult<()> {
    let mut config = Config::load_or_create(&cli.config)?;

    if cli.simulation {
        config.trading.mode = TradingMode::Simulation;
    }
    if cli.live {
        config.trading.mode = TradingMode::Live;
    }
    if let Some(pair) = cli.pair {
        config.trading.pair = pair;
    }
    if let Some(investment) = cli.investment {
        config.trading.investment = investment;
    }
    if let Some(grids) = cli.grids {
        config.trading.grid_count = grids;
    }
    if let Some(range) = cli.range {
        config.trading.range_percent = range;
    }
    config.validate()?;

    info!(
        pair = %config.trading.pair,
        mode = ?config.trading.mode,
        investment = config.trading.investment,
        grid_count = config.trading.grid_count,
        range_percent = config.trading.range_percent,
        stop_loss_percent = config.risk.stop_loss_percent,
        "starting grid trading bot"
    );

    match config.trading.mode {
        TradingMode::Simulation => {
            let path = PricePath::random_walk(
                config.simulation.walk_step_pct,
                config.simulation.seed,
            );
            let exchange = Arc::new(SimulatedExchange::new(config.simulation.start_price, path));
            let gateway: Arc<dyn OrderGateway> = exchange.clone();
            let feed: Arc<dyn PriceFeed> = exchange.clone();

            let mut bot = TradingBot::new(&config, gateway, feed).await?;
            let result = bot.run().await;

            info!(summary = %exchange.summary().await, "simulation finished");
            let status = bot.status();
            match serde_json::to_string_pretty(&status) {
                Ok(json) => println!("{}", json),
                Err(e) => error!(error = %e, "failed to serialize final snapshot"),
            }

            result
        }
        TradingMode::Live => Err(EngineError::InvalidConfiguration(
            "live trading requires an exchange gateway; none is configured in this build"
                .to_string(),
        )),
    }
}
