//! Startup configuration
//!
//! Axis/button indices and behavior flags are resolved once at startup and
//! immutable afterwards. The config file is read from
//! `<config_dir>/simdrive/config.toml` when present; otherwise the built-in
//! defaults apply. Nothing is ever written back.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct ControlConfig {
    pub bridge: BridgeConfig,
    pub mapping: AxisMapping,
    pub policy: PolicyConfig,
    pub camera: CameraConfig,
}

/// Fixed channel indices and per-axis polarity flags.
///
/// The clutch index is not configured directly: it is auto-mapped to the
/// device's last available axis (commonly a slider) once the device is up.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct AxisMapping {
    pub steer_axis: usize,
    pub throttle_axis: usize,
    pub brake_axis: usize,
    #[serde(skip)]
    pub clutch_axis: Option<usize>,
    pub reverse_button: usize,
    pub hand_brake_button: usize,
    pub debug_button: usize,
    pub detect_button: usize,
    pub invert_throttle: bool,
    pub invert_brake: bool,
    pub invert_clutch: bool,
}

impl Default for AxisMapping {
    fn default() -> Self {
        Self {
            steer_axis: 0,
            throttle_axis: 2,
            brake_axis: 5,
            clutch_axis: None,
            reverse_button: 5,
            hand_brake_button: 4,
            debug_button: 1,
            detect_button: 2,
            invert_throttle: false,
            invert_brake: false,
            invert_clutch: false,
        }
    }
}

impl AxisMapping {
    /// Auto-maps the clutch to the last available axis, if the device
    /// exposes any axes at all.
    pub fn resolve_clutch(&mut self, axis_count: usize) {
        self.clutch_axis = axis_count.checked_sub(1);
        match self.clutch_axis {
            Some(axis) => info!("Auto-mapped clutch to axis {} (slider)", axis),
            None => info!("No axes available, clutch left unmapped"),
        }
        info!(
            "Final mapping: steer={} throttle={} brake={} clutch={:?}",
            self.steer_axis, self.throttle_axis, self.brake_axis, self.clutch_axis
        );
    }
}

/// Session-wide behavior flags and state-machine thresholds.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct PolicyConfig {
    /// Hand brake mirrors the live button state (hold) instead of toggling
    /// on press edges.
    pub hand_brake_momentary: bool,
    /// Pressing the throttle cancels an *engaged* reverse. A pending
    /// reverse request is always cancelable by throttle.
    pub throttle_cancels_reverse: bool,
    /// Speed magnitude below which a pending reverse engages.
    pub stop_threshold: f32,
    /// Normalized throttle above which a reverse request is canceled.
    pub cancel_threshold: f32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            hand_brake_momentary: false,
            throttle_cancels_reverse: false,
            stop_threshold: 0.5,
            cancel_threshold: 0.1,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct CameraConfig {
    pub behind_distance: f64,
    pub height_offset: f64,
    /// First-order blend factor applied per tick to each pose component.
    pub blend: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            behind_distance: 8.0,
            height_offset: 3.0,
            blend: 0.2,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic_prefix: String,
    pub blueprint: String,
    pub spawn_index: u32,
    pub keep_alive_secs: u64,
    /// Timeout for the spawn and tick-advance handshakes.
    pub ack_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "simdrive".to_string(),
            topic_prefix: "simdrive".to_string(),
            blueprint: "vehicle.tesla.model3".to_string(),
            spawn_index: 22,
            keep_alive_secs: 5,
            ack_timeout_ms: 10_000,
        }
    }
}

impl ControlConfig {
    /// Reads the config file once, falling back to defaults when it is
    /// missing or unreadable. Runtime state is never persisted back.
    pub fn load() -> Self {
        let Some(path) = dirs::config_dir().map(|d| d.join("simdrive").join("config.toml")) else {
            warn!("No config directory on this platform, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file at {}, using defaults", path.display());
                Self::default()
            }
        }
    }
}
