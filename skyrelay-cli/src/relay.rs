// Flight relay service

use anyhow::Context;
use skyrelay_core::config::{LinkConfig, SkyrelayConfig};
use skyrelay_link::{Autopilot, FlightSession, MavlinkAutopilot, SimulatedAutopilot};
use skyrelay_server::http::{create_router, ApiState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::wait_for_shutdown;

pub fn autopilot(link: &LinkConfig, simulate: bool) -> Arc<dyn Autopilot> {
    if simulate {
        info!("Using simulated vehicle");
        Arc::new(SimulatedAutopilot::new())
    } else {
        Arc::new(MavlinkAutopilot::new(link.clone()))
    }
}

pub async fn serve(config: &SkyrelayConfig, simulate: bool) -> anyhow::Result<()> {
    let session = Arc::new(FlightSession::new(
        autopilot(&config.link, simulate),
        config.link.require_connection,
    ));
    let app = create_router(ApiState::new(session.clone()), &config.server.allowed_origins);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Flight relay listening on http://{}", listener.local_addr()?);
    info!("Autopilot endpoint: {}", config.link.endpoint);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("HTTP server failed")?;

    if let Err(e) = session.disconnect().await {
        warn!("Failed to close autopilot session: {}", e);
    }
    info!("Flight relay stopped");
    Ok(())
}
