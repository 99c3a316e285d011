use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smart_clock::clock::spawn_clock_broadcaster;
use smart_clock::config::{self, AppConfig};
use smart_clock::state::AppState;
use smart_clock::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Smart Clock command line arguments
#[derive(Parser, Debug)]
#[command(name = "smart-clock")]
#[command(version, about = "Audio relay and display sync server for the smart clock", long_about = None)]
struct CliArgs {
    /// JSON configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address (overrides config file)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// HTTP port (overrides config file)
    #[arg(short = 'p', long, env = "PORT", value_name = "PORT")]
    port: Option<u16>,

    /// Directory with the display frontend
    #[arg(long, value_name = "DIR")]
    static_dir: Option<String>,

    /// Capture source device name
    #[arg(long, value_name = "DEVICE")]
    capture_device: Option<String>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting Smart Clock v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load(args.config.as_deref()).await?;
    apply_overrides(&mut config, &args);

    let ip: IpAddr = config.web.bind_address.parse().map_err(|e| {
        anyhow::anyhow!("Invalid listen address {}: {}", config.web.bind_address, e)
    })?;
    let addr = SocketAddr::new(ip, config.web.http_port);

    tracing::info!(
        "Capture source: {} (device {})",
        config.capture.program,
        config.capture.device
    );
    tracing::info!("Serving static files from {}", config.web.static_dir);

    let state = AppState::new(config);

    let clock = spawn_clock_broadcaster(
        state.hub.clone(),
        Duration::from_millis(state.config.session.clock_interval_ms),
        state.shutdown.clone(),
    );

    let app = web::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    tracing::info!("Smart Clock server listening on http://{}", addr);

    let shutdown = state.shutdown.clone();
    let shutdown_signal = async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            }
            _ = shutdown.cancelled() => {}
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    state.shutdown.cancel();
    let _ = clock.await;

    tracing::info!("Smart Clock stopped");
    Ok(())
}

fn apply_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(addr) = &args.address {
        config.web.bind_address = addr.clone();
    }
    if let Some(port) = args.port {
        config.web.http_port = port;
    }
    if let Some(dir) = &args.static_dir {
        config.web.static_dir = dir.clone();
    }
    if let Some(device) = &args.capture_device {
        config.capture.device = device.clone();
    }
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "smart_clock=error,tower_http=error",
        LogLevel::Warn => "smart_clock=warn,tower_http=warn",
        LogLevel::Info => "smart_clock=info,tower_http=info",
        LogLevel::Verbose => "smart_clock=debug,tower_http=info",
        LogLevel::Debug => "smart_clock=debug,tower_http=debug",
        LogLevel::Trace => "smart_clock=trace,tower_http=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
