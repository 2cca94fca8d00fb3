//! MAVLink round trips against a fake vehicle on the loopback interface

use mavlink::common::{
    MavAutopilot, MavCmd, MavMessage, MavModeFlag, MavResult, MavState, MavType, COMMAND_ACK_DATA,
    HEARTBEAT_DATA,
};
use mavlink::{MavConnection, MavHeader};
use skyrelay_core::config::LinkConfig;
use skyrelay_link::{Autopilot, FlightAction, FlightSession, LinkError, MavlinkAutopilot};
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

type Vehicle = Arc<dyn MavConnection<MavMessage> + Send + Sync>;

fn free_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

fn link_config(port: u16) -> LinkConfig {
    LinkConfig {
        endpoint: format!("udpin:127.0.0.1:{}", port),
        connect_timeout_secs: 5,
        ack_timeout_ms: 300,
        command_retries: 2,
        heartbeat_interval_ms: 100,
        ..LinkConfig::default()
    }
}

fn vehicle_header() -> MavHeader {
    MavHeader {
        system_id: 1,
        component_id: 1,
        sequence: 0,
    }
}

/// Quadrotor that heartbeats every 100 ms and acks commands with
/// `verdict(command)`. `None` means stay silent.
fn spawn_vehicle<F>(port: u16, verdict: F) -> Arc<AtomicBool>
where
    F: Fn(MavCmd) -> Option<MavResult> + Send + 'static,
{
    let conn: Vehicle = Arc::from(
        mavlink::connect::<MavMessage>(&format!("udpout:127.0.0.1:{}", port)).unwrap(),
    );
    let running = Arc::new(AtomicBool::new(true));

    let beat_conn = conn.clone();
    let beat_running = running.clone();
    thread::spawn(move || {
        let heartbeat = MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_QUADROTOR,
            autopilot: MavAutopilot::MAV_AUTOPILOT_PX4,
            base_mode: MavModeFlag::empty(),
            system_status: MavState::MAV_STATE_STANDBY,
            mavlink_version: 3,
        });
        while beat_running.load(Ordering::SeqCst) {
            let _ = beat_conn.send(&vehicle_header(), &heartbeat);
            thread::sleep(Duration::from_millis(100));
        }
    });

    thread::spawn(move || loop {
        let Ok((_, message)) = conn.recv() else {
            continue;
        };
        if let MavMessage::COMMAND_LONG(command) = message {
            if let Some(result) = verdict(command.command) {
                let ack = MavMessage::COMMAND_ACK(COMMAND_ACK_DATA {
                    command: command.command,
                    result,
                    ..Default::default()
                });
                let _ = conn.send(&vehicle_header(), &ack);
            }
        }
    });

    running
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_and_fly() {
    let port = free_port();
    let autopilot = MavlinkAutopilot::new(link_config(port));
    let vehicle = spawn_vehicle(port, |_| Some(MavResult::MAV_RESULT_ACCEPTED));

    let identity = autopilot.connect().await.unwrap();
    assert_eq!(identity.system_id, 1);
    assert_eq!(identity.autopilot, "MAV_AUTOPILOT_PX4");

    autopilot.execute(FlightAction::Arm).await.unwrap();
    autopilot.execute(FlightAction::Takeoff).await.unwrap();
    autopilot.execute(FlightAction::Land).await.unwrap();

    autopilot.disconnect().await.unwrap();
    assert_eq!(
        autopilot.execute(FlightAction::Arm).await,
        Err(LinkError::NotConnected)
    );
    vehicle.store(false, Ordering::SeqCst);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_command() {
    let port = free_port();
    let autopilot = MavlinkAutopilot::new(link_config(port));
    let vehicle = spawn_vehicle(port, |command| match command {
        MavCmd::MAV_CMD_NAV_TAKEOFF => Some(MavResult::MAV_RESULT_DENIED),
        _ => Some(MavResult::MAV_RESULT_ACCEPTED),
    });

    autopilot.connect().await.unwrap();
    let err = autopilot.execute(FlightAction::Takeoff).await.unwrap_err();
    assert_eq!(
        err,
        LinkError::Rejected {
            action: FlightAction::Takeoff,
            result: "MAV_RESULT_DENIED".to_string(),
        }
    );
    vehicle.store(false, Ordering::SeqCst);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_silent_vehicle_times_out() {
    let port = free_port();
    let autopilot = MavlinkAutopilot::new(link_config(port));
    let vehicle = spawn_vehicle(port, |_| None);

    autopilot.connect().await.unwrap();
    let err = autopilot.execute(FlightAction::Arm).await.unwrap_err();
    assert_eq!(err.code(), "AUTOPILOT_TIMEOUT");
    vehicle.store(false, Ordering::SeqCst);
}

#[tokio::test]
async fn test_connect_without_vehicle_times_out() {
    let port = free_port();
    let autopilot = MavlinkAutopilot::new(LinkConfig {
        connect_timeout_secs: 1,
        ..link_config(port)
    });

    let err = autopilot.connect().await.unwrap_err();
    assert_eq!(err, LinkError::Timeout("vehicle heartbeat".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_retry_reuses_endpoint() {
    let port = free_port();
    let autopilot = Arc::new(MavlinkAutopilot::new(LinkConfig {
        connect_timeout_secs: 1,
        ..link_config(port)
    }));
    let session = FlightSession::new(autopilot, true);

    let timeout = LinkError::Timeout("vehicle heartbeat".to_string());
    assert_eq!(session.connect().await, Err(timeout.clone()));
    // the port is still ours, so the second attempt waits again instead of failing to bind
    assert_eq!(session.connect().await, Err(timeout));

    let vehicle = spawn_vehicle(port, |_| Some(MavResult::MAV_RESULT_ACCEPTED));
    let report = session.connect().await.unwrap();
    assert_eq!(report.status, "connected");
    assert_eq!(session.arm().await.unwrap().status, "armed");
    vehicle.store(false, Ordering::SeqCst);
}
