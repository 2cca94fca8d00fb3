//! MAVLink autopilot over UDP/TCP/serial
//!
//! The relay plays the ground station: it opens the configured connection,
//! waits for the first vehicle heartbeat, then keeps a 1 Hz GCS heartbeat
//! going while commands are exchanged as COMMAND_LONG / COMMAND_ACK pairs.
//!
//! The `mavlink` connection API is blocking, so a dedicated reader thread
//! pulls messages off the wire and fans them out through a broadcast channel
//! that the async side subscribes to.
//!
//! A connect that times out waiting for the vehicle keeps the opened port and
//! its reader as a pending link. The next `connect` listens on that link again
//! instead of binding the endpoint a second time.

pub mod messages;

use async_trait::async_trait;
use mavlink::common::{MavCmd, MavMessage, MavResult};
use mavlink::error::MessageReadError;
use mavlink::{MavConnection, MavHeader};
use parking_lot::{Mutex, RwLock};
use skyrelay_core::config::LinkConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::action::FlightAction;
use crate::autopilot::{Autopilot, VehicleIdentity};
use crate::error::LinkError;

type Connection = Arc<dyn MavConnection<MavMessage> + Send + Sync>;
type Received = (MavHeader, MavMessage);

const MESSAGE_BUFFER_SIZE: usize = 256;

/// Opened transport whose reader is running but no vehicle has answered yet
struct PendingLink {
    conn: Connection,
    messages: broadcast::Sender<Received>,
    running: Arc<AtomicBool>,
}

impl PendingLink {
    fn is_alive(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// An open link to one vehicle
struct ActiveLink {
    conn: Connection,
    vehicle: VehicleIdentity,
    messages: broadcast::Sender<Received>,
    running: Arc<AtomicBool>,
    heartbeat: JoinHandle<()>,
}

impl ActiveLink {
    fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.heartbeat.abort();
    }
}

/// Autopilot reached through a MAVLink connection string
pub struct MavlinkAutopilot {
    config: LinkConfig,
    link: RwLock<Option<Arc<ActiveLink>>>,
    pending: Mutex<Option<PendingLink>>,
}

impl MavlinkAutopilot {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            link: RwLock::new(None),
            pending: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn gcs_header(&self) -> MavHeader {
        MavHeader {
            system_id: self.config.gcs_system_id,
            component_id: self.config.gcs_component_id,
            sequence: 0,
        }
    }

    fn active(&self) -> Result<Arc<ActiveLink>, LinkError> {
        self.link.read().clone().ok_or(LinkError::NotConnected)
    }

    async fn open(&self) -> Result<PendingLink, LinkError> {
        let endpoint = self.config.endpoint.clone();
        info!("Opening MAVLink connection {}", endpoint);

        let conn = tokio::task::spawn_blocking(move || mavlink::connect::<MavMessage>(&endpoint))
            .await
            .map_err(|e| LinkError::Transport(format!("connect task failed: {}", e)))?
            .map_err(|e| LinkError::Transport(format!("{}: {}", self.config.endpoint, e)))?;
        let conn: Connection = Arc::from(conn);

        let (messages, _) = broadcast::channel(MESSAGE_BUFFER_SIZE);
        let running = Arc::new(AtomicBool::new(true));
        spawn_reader(conn.clone(), messages.clone(), running.clone());

        Ok(PendingLink {
            conn,
            messages,
            running,
        })
    }

    /// Reuse the link left open by an earlier timed-out connect, or open one
    async fn pending_or_open(&self) -> Result<PendingLink, LinkError> {
        let previous = self.pending.lock().take();
        match previous {
            Some(pending) if pending.is_alive() => {
                debug!("Reusing open MAVLink connection {}", self.config.endpoint);
                return Ok(pending);
            }
            Some(_) => debug!("Discarding stopped MAVLink connection"),
            None => {}
        }
        self.open().await
    }

    /// Wait for a heartbeat from something that is not a ground station
    async fn await_vehicle(
        &self,
        rx: &mut broadcast::Receiver<Received>,
    ) -> Result<VehicleIdentity, LinkError> {
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok((header, MavMessage::HEARTBEAT(heartbeat))) => {
                        if let Some(vehicle) = messages::vehicle_identity(&header, &heartbeat) {
                            return Ok(vehicle);
                        }
                        debug!("Ignoring heartbeat from system {}", header.system_id);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Skipped {} messages while waiting for heartbeat", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(LinkError::Transport("link closed".to_string()));
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| LinkError::Timeout("vehicle heartbeat".to_string()))?
    }

    /// Wait for the COMMAND_ACK answering `command`.
    ///
    /// Returns `Ok(None)` when nothing conclusive arrived in time.
    /// `MAV_RESULT_IN_PROGRESS` restarts the wait.
    async fn await_ack(
        &self,
        rx: &mut broadcast::Receiver<Received>,
        command: MavCmd,
        vehicle: &VehicleIdentity,
    ) -> Result<Option<MavResult>, LinkError> {
        let timeout = Duration::from_millis(self.config.ack_timeout_ms);
        loop {
            let received = match tokio::time::timeout(timeout, rx.recv()).await {
                Err(_) => return Ok(None),
                Ok(received) => received,
            };

            match received {
                Ok((header, MavMessage::COMMAND_ACK(ack))) => {
                    match messages::ack_result(&header, &ack, command, vehicle) {
                        Some(MavResult::MAV_RESULT_IN_PROGRESS) => {
                            debug!("{:?} in progress", command);
                        }
                        Some(result) => return Ok(Some(result)),
                        None => {}
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} messages while waiting for ack", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(LinkError::Transport("link closed".to_string()));
                }
            }
        }
    }
}

/// Pull messages off the blocking connection until `running` is cleared.
fn spawn_reader(conn: Connection, tx: broadcast::Sender<Received>, running: Arc<AtomicBool>) {
    std::thread::Builder::new()
        .name("mavlink-reader".to_string())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                match conn.recv() {
                    Ok(received) => {
                        // no subscribers is fine, nobody is waiting right now
                        let _ = tx.send(received);
                    }
                    Err(MessageReadError::Io(e)) => {
                        if matches!(
                            e.kind(),
                            std::io::ErrorKind::WouldBlock
                                | std::io::ErrorKind::TimedOut
                                | std::io::ErrorKind::Interrupted
                        ) {
                            continue;
                        }
                        error!("MAVLink read error: {}", e);
                        break;
                    }
                    Err(e) => {
                        debug!("Dropping malformed MAVLink frame: {:?}", e);
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
            info!("MAVLink reader stopped");
        })
        .map(|_| ())
        .unwrap_or_else(|e| error!("Failed to spawn MAVLink reader: {}", e));
}

fn spawn_heartbeat(
    conn: Connection,
    header: MavHeader,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let heartbeat = messages::gcs_heartbeat();
        while running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if let Err(e) = conn.send(&header, &heartbeat) {
                warn!("Failed to send GCS heartbeat: {:?}", e);
            }
        }
    })
}

#[async_trait]
impl Autopilot for MavlinkAutopilot {
    async fn connect(&self) -> Result<VehicleIdentity, LinkError> {
        let existing = self.link.read().as_ref().map(|link| link.vehicle.clone());
        if let Some(vehicle) = existing {
            return Ok(vehicle);
        }

        let pending = self.pending_or_open().await?;
        let mut rx = pending.messages.subscribe();

        let vehicle = match self.await_vehicle(&mut rx).await {
            Ok(vehicle) => vehicle,
            Err(e) => {
                // keep the port bound and the reader running for the next attempt
                *self.pending.lock() = Some(pending);
                return Err(e);
            }
        };
        let PendingLink {
            conn,
            messages: tx,
            running,
        } = pending;
        info!(
            "Vehicle found: system {} component {} on {}",
            vehicle.system_id, vehicle.component_id, self.config.endpoint
        );

        let heartbeat = spawn_heartbeat(
            conn.clone(),
            self.gcs_header(),
            Duration::from_millis(self.config.heartbeat_interval_ms),
            running.clone(),
        );

        let link = Arc::new(ActiveLink {
            conn,
            vehicle: vehicle.clone(),
            messages: tx,
            running,
            heartbeat,
        });

        let mut slot = self.link.write();
        if let Some(existing) = slot.as_ref() {
            // lost a race against a concurrent connect; keep the first link
            link.shutdown();
            return Ok(existing.vehicle.clone());
        }
        *slot = Some(link);
        Ok(vehicle)
    }

    async fn execute(&self, action: FlightAction) -> Result<(), LinkError> {
        let link = self.active()?;
        if !link.running.load(Ordering::SeqCst) {
            return Err(LinkError::Transport("MAVLink reader stopped".to_string()));
        }

        let command = messages::command_for(action);
        let header = self.gcs_header();
        let mut rx = link.messages.subscribe();

        for attempt in 0..self.config.command_retries {
            let message = messages::command_long(
                action,
                &link.vehicle,
                self.config.takeoff_altitude_m,
                attempt.min(u8::MAX as u32) as u8,
            );
            link.conn
                .send(&header, &message)
                .map_err(|e| LinkError::Transport(format!("send {}: {:?}", action, e)))?;
            debug!("Sent {:?} (attempt {})", command, attempt + 1);

            match self.await_ack(&mut rx, command, &link.vehicle).await? {
                Some(MavResult::MAV_RESULT_ACCEPTED) => return Ok(()),
                Some(result) => {
                    return Err(LinkError::Rejected {
                        action,
                        result: format!("{:?}", result),
                    })
                }
                None => warn!("No ack for {} (attempt {})", action, attempt + 1),
            }
        }

        Err(LinkError::Timeout(format!("{} acknowledgement", action)))
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        if let Some(pending) = self.pending.lock().take() {
            pending.shutdown();
        }
        if let Some(link) = self.link.write().take() {
            link.shutdown();
            info!("MAVLink connection {} closed", self.config.endpoint);
        }
        Ok(())
    }
}

impl Drop for MavlinkAutopilot {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.get_mut().take() {
            pending.shutdown();
        }
        if let Some(link) = self.link.get_mut().take() {
            link.shutdown();
        }
    }
}
