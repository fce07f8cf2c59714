use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gexbot_alerts::Notifier;
use gexbot_broker::{PaperGateway, RestClient};
use gexbot_core::config::AppConfig;
use gexbot_core::market::MarketCode;
use gexbot_core::traits::{MarketData, OrderGateway};
use gexbot_core::ConfigLoader;
use gexbot_entry::{CycleOutcome, EntryEvaluator};
use gexbot_monitor::ExitMonitor;

#[derive(Parser)]
#[command(name = "gexbot")]
#[command(about = "0DTE index-options credit-spread bot driven by GEX pins", long_about = None)]
struct Cli {
    /// Config profile overlay (config/Config.<profile>.toml)
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one entry evaluation cycle and exit (externally scheduled)
    Evaluate {
        /// Market to evaluate (spx, rut)
        #[arg(long)]
        market: String,
        /// Place real orders; default is paper fills
        #[arg(long)]
        live: bool,
    },
    /// Run the exit monitor poll loop until ctrl-c
    Monitor {
        /// Close positions with real orders; default is paper fills
        #[arg(long)]
        live: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.profile {
        Some(profile) => ConfigLoader::load_with_profile(profile)?,
        None => ConfigLoader::load()?,
    };
    let config = Arc::new(config);

    match cli.command {
        Commands::Evaluate { market, live } => {
            // Unknown market codes die here, before any state is touched.
            let market: MarketCode = market.parse()?;
            evaluate(config, market, live).await
        }
        Commands::Monitor { live } => monitor(config, live).await,
    }
}

async fn evaluate(config: Arc<AppConfig>, market: MarketCode, live: bool) -> Result<()> {
    let client = Arc::new(RestClient::new(config.broker.clone())?);
    let data: Arc<dyn MarketData> = client.clone();
    let gateway: Arc<dyn OrderGateway> = if live {
        client
    } else {
        Arc::new(PaperGateway::new())
    };
    let notifier = Notifier::new(&config.alerts);

    let evaluator = EntryEvaluator::new(
        market,
        config,
        data,
        gateway,
        notifier.clone(),
        live,
    );
    match evaluator.run_cycle().await {
        Ok(CycleOutcome::Entered(position)) => {
            info!(
                order_id = position.id,
                strikes = position.strikes_display(),
                "entry cycle finished with a fill"
            );
            Ok(())
        }
        Ok(CycleOutcome::Rejected { reason }) => {
            info!(reason, "entry cycle finished without a trade");
            Ok(())
        }
        Ok(CycleOutcome::NoSignal { reason }) => {
            info!(reason, "entry cycle skipped");
            Ok(())
        }
        Err(err) => {
            // An aborted cycle still reports its reason outward.
            warn!(error = %err, "entry cycle aborted");
            notifier.send(format!("ABORTED {market} entry cycle: {err:#}"));
            Err(err)
        }
    }
}

async fn monitor(config: Arc<AppConfig>, live: bool) -> Result<()> {
    let client = Arc::new(RestClient::new(config.broker.clone())?);
    let data: Arc<dyn MarketData> = client.clone();
    let gateway: Arc<dyn OrderGateway> = if live {
        client
    } else {
        Arc::new(PaperGateway::new())
    };
    let notifier = Notifier::new(&config.alerts);

    ExitMonitor::new(config, data, gateway, notifier).run().await
}
