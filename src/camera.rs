//! Follow-camera smoothing
//!
//! Computes a target observer pose behind-and-above the vehicle and blends
//! the live observer pose toward it with a first-order exponential filter,
//! so the viewpoint trails the vehicle without snapping when it turns
//! sharply.

use crate::config::CameraConfig;
use crate::sim::types::{Location, Rotation, Transform};

#[derive(Debug)]
pub struct FollowCamera {
    behind_distance: f64,
    height_offset: f64,
    blend: f64,
}

impl FollowCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            behind_distance: config.behind_distance,
            height_offset: config.height_offset,
            blend: config.blend,
        }
    }

    /// The ideal observer pose for the given vehicle pose: behind it along
    /// its yaw, above it, oriented to look back at the vehicle.
    pub fn target(&self, vehicle: &Transform) -> Transform {
        let yaw_rad = vehicle.rotation.yaw.to_radians();
        let location = Location {
            x: vehicle.location.x - self.behind_distance * yaw_rad.cos(),
            y: vehicle.location.y - self.behind_distance * yaw_rad.sin(),
            z: vehicle.location.z + self.height_offset,
        };

        let dx = vehicle.location.x - location.x;
        let dy = vehicle.location.y - location.y;
        let dz = vehicle.location.z - location.z;
        let dist_xy = (dx * dx + dy * dy).sqrt();

        let rotation = Rotation {
            pitch: -dz.atan2(dist_xy).to_degrees(),
            yaw: dy.atan2(dx).to_degrees(),
            roll: 0.0,
        };

        Transform { location, rotation }
    }

    /// One smoothing step: blends `current` toward the target pose by the
    /// configured factor, per component. When the current observer pose is
    /// unreadable the camera jumps straight to the target for this tick;
    /// no other smoothing state exists to reset.
    pub fn update(&self, current: Option<Transform>, vehicle: &Transform) -> Transform {
        let target = self.target(vehicle);
        let Some(cur) = current else {
            return target;
        };

        let lerp = |from: f64, to: f64| from + (to - from) * self.blend;
        Transform {
            location: Location {
                x: lerp(cur.location.x, target.location.x),
                y: lerp(cur.location.y, target.location.y),
                z: lerp(cur.location.z, target.location.z),
            },
            rotation: Rotation {
                pitch: lerp(cur.rotation.pitch, target.rotation.pitch),
                yaw: lerp(cur.rotation.yaw, target.rotation.yaw),
                roll: lerp(cur.rotation.roll, target.rotation.roll),
            },
        }
    }
}
