//! Faucet service entry point.

use std::sync::Arc;
use std::time::Instant;

use faucet::chain::ChainClient;
use faucet::config::Config;
use faucet::dispatcher::{DispatcherSettings, FaucetDispatcher};
use faucet::server::{self, Metrics, StatusInfo};
use tracing::{error, info, warn};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting faucet service");

    let config = Config::load()?;
    info!(
        chain_id = %config.chain.chain_id,
        lcd_url = %config.chain.lcd_url,
        amount = %config.faucet.amount,
        symbol = %config.faucet.symbol,
        cooldown_hours = config.faucet.cooldown_hours,
        "Configuration loaded"
    );

    let chain = Arc::new(ChainClient::new(&config.chain, &config.faucet)?);

    // Connection banner; the node being briefly down must not abort startup.
    match chain.node_info().await {
        Ok(node) => info!(
            "Connected to chain {} using {} v{}",
            node.network, node.app_name, node.version
        ),
        Err(err) => warn!(error = %err, "Could not query node info at startup, continuing"),
    }

    let faucet_address = chain.address_str();
    let dispatcher = Arc::new(FaucetDispatcher::new(
        chain,
        DispatcherSettings {
            amount: config.faucet.amount.clone(),
            symbol: config.faucet.symbol.clone(),
            network: config.faucet.network.clone(),
            address_prefix: config.chain.address_prefix.clone(),
            cooldown: config.faucet.cooldown(),
        },
    ));

    let metrics = Arc::new(Metrics::new());
    let status = Arc::new(StatusInfo {
        chain_id: config.chain.chain_id.clone(),
        faucet_address,
        symbol: config.faucet.symbol.clone(),
        command_prefix: config.faucet.command_prefix.clone(),
        started_at: Instant::now(),
    });

    info!("Faucet started");

    tokio::select! {
        result = server::start_server(
            &config.server.bind_address,
            config.server.port,
            dispatcher,
            metrics,
            status,
        ) => {
            if let Err(err) = result {
                error!(error = %err, "HTTP server error");
            }
        }
        _ = wait_for_shutdown_signal() => {}
    }

    info!("Faucet stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,faucet=debug,terra_faucet=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
