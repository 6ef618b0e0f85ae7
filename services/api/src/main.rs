//! Pool API service entry point

use anyhow::{Context, Result};
use clap::Parser;
use engine_config::{EventsConfig, LogFormat, LoggingConfig, ServiceConfig};
use pool_api::{ApiServer, ApiState};
use pool_engine::{write_event_log, ChannelSink, EventSink, FanoutSink, SystemClock, TracingSink};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/services.toml")]
    config: PathBuf,

    /// Environment overlay (config/environments/<name>.toml)
    #[arg(short, long)]
    environment: Option<String>,

    /// Bind address, overrides the configuration file
    #[arg(long)]
    bind_address: Option<String>,

    /// Port, overrides the configuration file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServiceConfig::load(Some(args.config.as_path()), args.environment.as_deref())
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    if let Some(bind_address) = args.bind_address {
        config.server.bind_address = bind_address;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.logging);
    info!("Starting pool API");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let (sink, event_log) = event_sink(&config.events)?;
    let state = ApiState::from_config(&config, Arc::new(SystemClock), sink)?;
    info!(
        pools = state.engine().list_pools().len(),
        tokens = state.tokens().len(),
        "engine ready"
    );
    let server = ApiServer::new(config.server.clone(), Arc::new(state));

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = server.start() => {
            if let Err(e) = result {
                error!("Pool API error: {:#}", e);
                return Err(e);
            }
        }
        _ = shutdown_signal => {
            info!("Shutting down pool API");
        }
    }

    if let Some(path) = &config.state_file {
        server.state().save_snapshot(path)?;
    }
    if let Some(channel) = event_log {
        if channel.dropped() > 0 {
            warn!(dropped = channel.dropped(), "event log missed events");
        }
    }
    Ok(())
}

/// Tracing sink, fanned out to a JSON-lines event log when one is configured.
///
/// The returned channel handle reports how many events the log missed.
fn event_sink(events: &EventsConfig) -> Result<(Arc<dyn EventSink>, Option<ChannelSink>)> {
    let Some(path) = &events.log_file else {
        return Ok((Arc::new(TracingSink), None));
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open event log {}", path.display()))?;
    let (channel, receiver) = ChannelSink::bounded(events.queue_size);
    let log_path = path.clone();
    thread::Builder::new()
        .name("event-log".to_string())
        .spawn(move || match write_event_log(&receiver, file) {
            Ok(written) => info!(written, path = %log_path.display(), "event log closed"),
            Err(e) => error!("Event log write failed: {}", e),
        })
        .context("failed to start event log writer")?;

    info!(path = %path.display(), queue_size = events.queue_size, "writing engine events");
    let sink = FanoutSink::new().with(TracingSink).with(channel.clone());
    Ok((Arc::new(sink), Some(channel)))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},warp=warn", logging.level)));
    let json = logging.format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}
