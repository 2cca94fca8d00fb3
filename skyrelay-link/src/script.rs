//! Scripted bench flight: connect, arm, take off, hover, land

use std::time::Duration;
use tracing::info;

use crate::action::CommandReport;
use crate::error::LinkError;
use crate::session::FlightSession;

/// Fly the bench sequence once and return every report in order.
///
/// Stops at the first failing step. The session is left as it was after that
/// step; closing it is up to the caller.
pub async fn run_flight_test(
    session: &FlightSession,
    hover: Duration,
) -> Result<Vec<CommandReport>, LinkError> {
    let mut reports = Vec::with_capacity(4);

    info!("Waiting for drone to connect...");
    reports.push(session.connect().await?);

    info!("Arming...");
    reports.push(session.arm().await?);

    info!("Taking off...");
    reports.push(session.takeoff().await?);

    tokio::time::sleep(hover).await;

    info!("Landing...");
    reports.push(session.land().await?);

    Ok(reports)
}
