// GPS monitor service

use anyhow::Context;
use skyrelay_core::config::GpsConfig;
use skyrelay_server::{create_gps_router, GpsHubState, GpsMonitor};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::wait_for_shutdown;

pub async fn serve(config: &GpsConfig) -> anyhow::Result<()> {
    let udp_addr: SocketAddr = format!("{}:{}", config.bind_address, config.udp_port)
        .parse()
        .with_context(|| format!("invalid GPS bind address {}", config.bind_address))?;
    let monitor = GpsMonitor::bind(udp_addr)
        .await
        .with_context(|| format!("binding UDP {}", udp_addr))?;
    let state = GpsHubState { fixes: monitor.sender() };

    let http_addr = format!("{}:{}", config.bind_address, config.http_port);
    let listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("binding {}", http_addr))?;
    let app = create_gps_router(state, &config.static_dir);
    info!("Web server running at http://localhost:{}", config.http_port);

    let mut monitor_task = tokio::spawn(monitor.run());
    let server = axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown());

    tokio::select! {
        result = server => result.context("HTTP server failed")?,
        result = &mut monitor_task => {
            result.context("GPS listener panicked")?.context("GPS listener failed")?;
        }
    }
    monitor_task.abort();

    info!("GPS monitor stopped");
    Ok(())
}
