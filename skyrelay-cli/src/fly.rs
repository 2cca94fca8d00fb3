// Scripted bench flight

use skyrelay_core::config::SkyrelayConfig;
use skyrelay_link::{run_flight_test, FlightSession};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::relay::autopilot;

pub async fn run(config: &SkyrelayConfig, hover_secs: u64, simulate: bool) -> anyhow::Result<()> {
    // the bench script is the one caller that wants the ordering enforced
    let session = FlightSession::new(autopilot(&config.link, simulate), true);
    info!("Flight test against {}", config.link.endpoint);

    let outcome = run_flight_test(&session, Duration::from_secs(hover_secs)).await;

    if let Err(e) = session.disconnect().await {
        warn!("Failed to close autopilot session: {}", e);
    }

    match outcome {
        Ok(reports) => {
            for report in reports {
                println!("{}", report.status);
            }
            Ok(())
        }
        Err(e) => {
            error!("Flight test aborted: {}", e);
            Err(e.into())
        }
    }
}
