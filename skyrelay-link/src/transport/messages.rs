//! MAVLink message builders and matchers

use mavlink::common::{
    MavAutopilot, MavCmd, MavMessage, MavModeFlag, MavResult, MavState, MavType, COMMAND_ACK_DATA,
    COMMAND_LONG_DATA, HEARTBEAT_DATA,
};
use mavlink::MavHeader;

use crate::action::FlightAction;
use crate::autopilot::VehicleIdentity;

/// Heartbeat announcing the relay as a ground control station
pub fn gcs_heartbeat() -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_GCS,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3,
    })
}

/// MAVLink command that carries `action`
pub fn command_for(action: FlightAction) -> MavCmd {
    match action {
        FlightAction::Arm => MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
        FlightAction::Takeoff => MavCmd::MAV_CMD_NAV_TAKEOFF,
        FlightAction::Land => MavCmd::MAV_CMD_NAV_LAND,
    }
}

/// COMMAND_LONG for `action` addressed at `target`.
///
/// `confirmation` is the resend counter (0 on first transmission).
pub fn command_long(
    action: FlightAction,
    target: &VehicleIdentity,
    takeoff_altitude_m: f32,
    confirmation: u8,
) -> MavMessage {
    let mut data = COMMAND_LONG_DATA {
        target_system: target.system_id,
        target_component: target.component_id,
        command: command_for(action),
        confirmation,
        param1: 0.0,
        param2: 0.0,
        param3: 0.0,
        param4: 0.0,
        param5: 0.0,
        param6: 0.0,
        param7: 0.0,
    };

    match action {
        FlightAction::Arm => {
            data.param1 = 1.0;
        }
        FlightAction::Takeoff => {
            // keep current yaw and position, climb to the requested height
            data.param4 = f32::NAN;
            data.param5 = f32::NAN;
            data.param6 = f32::NAN;
            data.param7 = takeoff_altitude_m;
        }
        FlightAction::Land => {
            data.param4 = f32::NAN;
            data.param5 = f32::NAN;
            data.param6 = f32::NAN;
            data.param7 = f32::NAN;
        }
    }

    MavMessage::COMMAND_LONG(data)
}

/// Identity of the vehicle that sent `heartbeat`, or `None` when the sender
/// is another ground station.
pub fn vehicle_identity(header: &MavHeader, heartbeat: &HEARTBEAT_DATA) -> Option<VehicleIdentity> {
    if heartbeat.mavtype == MavType::MAV_TYPE_GCS
        || heartbeat.autopilot == MavAutopilot::MAV_AUTOPILOT_INVALID
    {
        return None;
    }

    Some(VehicleIdentity {
        system_id: header.system_id,
        component_id: header.component_id,
        autopilot: format!("{:?}", heartbeat.autopilot),
        vehicle_type: format!("{:?}", heartbeat.mavtype),
    })
}

/// Verdict carried by `ack` if it answers `command` from `target`
pub fn ack_result(
    header: &MavHeader,
    ack: &COMMAND_ACK_DATA,
    command: MavCmd,
    target: &VehicleIdentity,
) -> Option<MavResult> {
    if header.system_id != target.system_id || ack.command != command {
        return None;
    }
    Some(ack.result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> VehicleIdentity {
        VehicleIdentity {
            system_id: 1,
            component_id: 1,
            autopilot: "MAV_AUTOPILOT_PX4".to_string(),
            vehicle_type: "MAV_TYPE_QUADROTOR".to_string(),
        }
    }

    fn header(system_id: u8) -> MavHeader {
        MavHeader { system_id, component_id: 1, sequence: 0 }
    }

    #[test]
    fn test_arm_command() {
        match command_long(FlightAction::Arm, &target(), 2.5, 0) {
            MavMessage::COMMAND_LONG(data) => {
                assert_eq!(data.command, MavCmd::MAV_CMD_COMPONENT_ARM_DISARM);
                assert_eq!(data.param1, 1.0);
                assert_eq!(data.target_system, 1);
                assert_eq!(data.target_component, 1);
                assert_eq!(data.confirmation, 0);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_takeoff_command_carries_altitude() {
        match command_long(FlightAction::Takeoff, &target(), 5.0, 2) {
            MavMessage::COMMAND_LONG(data) => {
                assert_eq!(data.command, MavCmd::MAV_CMD_NAV_TAKEOFF);
                assert_eq!(data.param7, 5.0);
                assert!(data.param5.is_nan() && data.param6.is_nan());
                assert_eq!(data.confirmation, 2);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_land_command() {
        match command_long(FlightAction::Land, &target(), 2.5, 0) {
            MavMessage::COMMAND_LONG(data) => {
                assert_eq!(data.command, MavCmd::MAV_CMD_NAV_LAND);
                assert!(data.param7.is_nan());
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_vehicle_identity_from_heartbeat() {
        let heartbeat = HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_QUADROTOR,
            autopilot: MavAutopilot::MAV_AUTOPILOT_PX4,
            base_mode: MavModeFlag::empty(),
            system_status: MavState::MAV_STATE_STANDBY,
            mavlink_version: 3,
        };
        let identity = vehicle_identity(&header(1), &heartbeat).unwrap();
        assert_eq!(identity, target());
    }

    #[test]
    fn test_ground_station_heartbeat_ignored() {
        let heartbeat = match gcs_heartbeat() {
            MavMessage::HEARTBEAT(data) => data,
            other => panic!("unexpected message {:?}", other),
        };
        assert!(vehicle_identity(&header(245), &heartbeat).is_none());
    }

    #[test]
    fn test_ack_matching() {
        let ack = COMMAND_ACK_DATA {
            command: MavCmd::MAV_CMD_NAV_TAKEOFF,
            result: MavResult::MAV_RESULT_DENIED,
            ..Default::default()
        };

        assert_eq!(
            ack_result(&header(1), &ack, MavCmd::MAV_CMD_NAV_TAKEOFF, &target()),
            Some(MavResult::MAV_RESULT_DENIED)
        );
        // wrong command
        assert_eq!(ack_result(&header(1), &ack, MavCmd::MAV_CMD_NAV_LAND, &target()), None);
        // wrong vehicle
        assert_eq!(ack_result(&header(7), &ack, MavCmd::MAV_CMD_NAV_TAKEOFF, &target()), None);
    }
}
