//! JSON payloads exchanged with the simulator bridge.

use serde::{Deserialize, Serialize};

use super::types::{Transform, Velocity};
use super::ActorId;

/// Periodic vehicle state report published by the bridge.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct VehicleState {
    pub transform: Transform,
    pub velocity: Velocity,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub blueprint: String,
    pub spawn_index: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SpawnReply {
    pub actor_id: ActorId,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub actor_id: ActorId,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TickRequest {
    pub seq: u64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TickReply {
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::{Location, Rotation};

    #[test]
    fn test_vehicle_state_round_trip() {
        let state = VehicleState {
            transform: Transform {
                location: Location {
                    x: 1.5,
                    y: -2.0,
                    z: 0.3,
                },
                rotation: Rotation {
                    pitch: 0.0,
                    yaw: 90.0,
                    roll: 0.0,
                },
            },
            velocity: Velocity {
                x: 3.0,
                y: 0.0,
                z: 0.0,
            },
        };

        let json = serde_json::to_string(&state).expect("serialize");
        let back: VehicleState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.transform, state.transform);
        assert_eq!(back.velocity, state.velocity);
    }

    #[test]
    fn test_handshake_field_names() {
        let json = serde_json::to_value(SpawnRequest {
            blueprint: "vehicle.tesla.model3".to_string(),
            spawn_index: 22,
        })
        .expect("serialize");
        assert_eq!(json["blueprint"], "vehicle.tesla.model3");
        assert_eq!(json["spawn_index"], 22);

        let reply: TickReply = serde_json::from_str(r#"{"seq": 7}"#).expect("deserialize");
        assert_eq!(reply.seq, 7);
    }
}
