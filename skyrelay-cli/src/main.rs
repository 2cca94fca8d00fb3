// Skyrelay command line: flight relay, GPS monitor, marker watch and bench tools

mod fly;
mod gps;
mod relay;
mod vision;

use anyhow::Context;
use clap::{Parser, Subcommand};
use skyrelay_core::config::{CameraSource, SkyrelayConfig};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skyrelay")]
#[command(
    about = "Drone ground tools: flight command relay, GPS monitor, ArUco marker watch",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or YAML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the flight command relay HTTP service
    Serve {
        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// HTTP port
        #[arg(long, short)]
        port: Option<u16>,

        /// MAVLink connection string, e.g. udpin:0.0.0.0:14540
        #[arg(long)]
        endpoint: Option<String>,

        /// Fly a simulated vehicle instead of opening a MAVLink link
        #[arg(long)]
        simulate: bool,
    },

    /// Run the GPS monitor (NMEA over UDP to a browser map)
    Gps {
        /// UDP port NMEA sentences arrive on
        #[arg(long)]
        udp_port: Option<u16>,

        /// HTTP/WebSocket port
        #[arg(long)]
        http_port: Option<u16>,

        /// Directory of static files to serve
        #[arg(long)]
        static_dir: Option<String>,
    },

    /// Watch a camera for the target ArUco marker
    Watch {
        /// Camera device index
        #[arg(long, conflicts_with = "gstreamer")]
        camera: Option<i32>,

        /// Use the Pi camera through GStreamer
        #[arg(long)]
        gstreamer: bool,

        /// Marker identifier to look for
        #[arg(long)]
        target_id: Option<i32>,

        /// Resize frames to the configured resolution before detection
        #[arg(long)]
        resize: bool,

        /// Run without a window
        #[arg(long)]
        headless: bool,
    },

    /// Probe camera device indices
    Cameras {
        /// Number of indices to try, starting at 0
        #[arg(long, default_value = "5")]
        max: i32,
    },

    /// Write a printable marker image
    Marker {
        #[arg(long, default_value = "42")]
        id: i32,

        /// Side length in pixels
        #[arg(long, default_value = "200")]
        size: i32,

        /// Image path, `marker_<id>.png` when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Bench flight: connect, arm, take off, hover, land
    Fly {
        /// Seconds to hover before landing
        #[arg(long, default_value = "5")]
        hover_secs: u64,

        /// MAVLink connection string
        #[arg(long)]
        endpoint: Option<String>,

        /// Fly a simulated vehicle
        #[arg(long)]
        simulate: bool,
    },
}

fn default_marker_path(id: i32) -> PathBuf {
    PathBuf::from(format!("marker_{}.png", id))
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = SkyrelayConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(level) = &cli.log_level {
        config.log_level = Some(level.clone());
    }
    init_logging(config.log_level.as_deref().unwrap_or("info"), cli.json_logs);

    match cli.command {
        Commands::Serve { bind, port, endpoint, simulate } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(endpoint) = endpoint {
                config.link.endpoint = endpoint;
            }
            config.validate()?;
            relay::serve(&config, simulate).await?;
        }
        Commands::Gps { udp_port, http_port, static_dir } => {
            if let Some(port) = udp_port {
                config.gps.udp_port = port;
            }
            if let Some(port) = http_port {
                config.gps.http_port = port;
            }
            if let Some(dir) = static_dir {
                config.gps.static_dir = dir;
            }
            config.validate()?;
            gps::serve(&config.gps).await?;
        }
        Commands::Watch { camera, gstreamer, target_id, resize, headless } => {
            if let Some(index) = camera {
                config.vision.camera = CameraSource::Device { index };
            }
            if gstreamer {
                config.vision.camera = CameraSource::Gstreamer;
            }
            if let Some(id) = target_id {
                config.vision.target_id = id;
            }
            config.vision.resize_frames |= resize;
            config.vision.validate()?;
            vision::watch(config.vision, headless).await?;
        }
        Commands::Cameras { max } => {
            vision::cameras(max)?;
        }
        Commands::Marker { id, size, output } => {
            let output = output.unwrap_or_else(|| default_marker_path(id));
            vision::marker(config.vision.dictionary, id, size, &output)?;
        }
        Commands::Fly { hover_secs, endpoint, simulate } => {
            if let Some(endpoint) = endpoint {
                config.link.endpoint = endpoint;
            }
            config.validate()?;
            fly::run(&config, hover_secs, simulate).await?;
        }
    }

    Ok(())
}
