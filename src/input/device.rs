//! Input device abstraction over gilrs
//!
//! Exposes the wheel/gamepad as indexed axis, button and hat channels plus a
//! drained queue of button-down events, behind the [`InputDevice`] trait so
//! the tick loop can run against a fake device in tests.
//!
//! The gilrs-backed collector uses a statum typestate lifecycle:
//!
//! ```text
//! Initializing ──► Sampling
//! ```

use chrono::{DateTime, Local};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use tracing::{debug, info, warn};

/// Fixed index order for the axis channels a wheel rig exposes.
///
/// Index 0 is the steering axis; the pedal and slider axes follow. The
/// defaults in [`crate::config::AxisMapping`] refer to these positions.
const AXIS_ORDER: [Axis; 6] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
];

/// Fixed index order for button channels. The d-pad is not listed here, it
/// surfaces as the single hat instead.
const BUTTON_ORDER: [Button; 13] = [
    Button::South,
    Button::East,
    Button::North,
    Button::West,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
];

/// Indexed, pollable view of a human interface device.
///
/// An unattached device reports zero counts and `None` for every read; the
/// control loop then runs on neutral input. `pump` drains the button-down
/// events seen since the previous pump, so each physical press surfaces
/// exactly once per tick regardless of polling rate.
pub trait InputDevice {
    fn attached(&self) -> bool;
    fn axis_count(&self) -> usize;
    /// Current axis value in [-1, 1]. `None` when the device is absent, the
    /// index is out of range, or the axis has not reported yet.
    fn axis(&self, index: usize) -> Option<f32>;
    fn button_count(&self) -> usize;
    fn button(&self, index: usize) -> Option<bool>;
    fn hat_count(&self) -> usize;
    fn hat(&self, index: usize) -> Option<(i32, i32)>;
    /// Processes pending device events and drains the queue of button
    /// indices pressed since the previous call.
    fn pump(&mut self) -> Vec<usize>;
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to initialize input backend: {0}")]
    InitializationError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum DeviceState {
    Initializing,
    Sampling,
}

#[machine]
#[derive(Debug)]
pub struct DeviceCollector<S: DeviceState> {
    // Gilrs context
    gilrs: Gilrs,

    // Active gamepad, if any is connected
    active_gamepad: Option<GamepadId>,

    // Button-down events queued since the last pump drain
    pressed_queue: Vec<usize>,

    // Pump statistics
    event_count: u64,
    last_stats_time: DateTime<Local>,
}

impl DeviceCollector<Initializing> {
    pub fn create() -> Result<Self, DeviceError> {
        info!("Initializing gilrs input backend");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                return Err(DeviceError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, None, Vec::new(), 0, Local::now()))
    }

    /// Selects a gamepad and transitions to the Sampling state.
    pub fn initialize(mut self) -> Result<DeviceCollector<Sampling>, DeviceError> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No input device connected, running with neutral input");
        } else {
            info!("Found {} input devices:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!(
                    "  [{}] ID: {}, Name: {}, UUID: {:?}",
                    idx,
                    id,
                    gamepad.name(),
                    gamepad.uuid()
                );
            }
            let (id, gamepad) = &gamepads[0];
            self.active_gamepad = Some(*id);
            info!("Selected device: {} ({})", gamepad.name(), id);
            info!(
                "Device channels: axes={} buttons={} hats={}",
                AXIS_ORDER.len(),
                BUTTON_ORDER.len(),
                1
            );
        }

        Ok(self.transition())
    }
}

impl DeviceCollector<Sampling> {
    fn gamepad(&self) -> Option<Gamepad<'_>> {
        self.active_gamepad.map(|id| self.gilrs.gamepad(id))
    }

    fn handle_event(&mut self, id: GamepadId, event: EventType) {
        if let Some(active_id) = self.active_gamepad {
            if id != active_id {
                debug!("Skipping event from non-active device: {:?}", id);
                return;
            }
        }

        match event {
            EventType::ButtonPressed(button, _) => {
                if let Some(index) = button_index(button) {
                    info!("Button down: device={} button={}", id, index);
                    self.pressed_queue.push(index);
                } else {
                    debug!("Ignoring unmapped button: {:?}", button);
                }
            }
            EventType::Disconnected => {
                warn!("Input device disconnected: {:?}", id);
                if self.active_gamepad == Some(id) {
                    self.active_gamepad = None;
                }
            }
            EventType::Connected => {
                info!("Input device connected: {:?}", id);
                if self.active_gamepad.is_none() {
                    self.active_gamepad = Some(id);
                }
            }
            _ => {
                debug!("Unhandled device event: {:?}", event);
            }
        }
    }
}

impl InputDevice for DeviceCollector<Sampling> {
    fn attached(&self) -> bool {
        self.active_gamepad.is_some()
    }

    fn axis_count(&self) -> usize {
        if self.attached() {
            AXIS_ORDER.len()
        } else {
            0
        }
    }

    fn axis(&self, index: usize) -> Option<f32> {
        let gamepad = self.gamepad()?;
        let axis = AXIS_ORDER.get(index)?;
        // An axis that has never reported stays None: an unread pedal must
        // read as released, not as centered.
        gamepad.axis_data(*axis).map(|data| data.value())
    }

    fn button_count(&self) -> usize {
        if self.attached() {
            BUTTON_ORDER.len()
        } else {
            0
        }
    }

    fn button(&self, index: usize) -> Option<bool> {
        let gamepad = self.gamepad()?;
        let button = BUTTON_ORDER.get(index)?;
        Some(gamepad.is_pressed(*button))
    }

    fn hat_count(&self) -> usize {
        if self.attached() {
            1
        } else {
            0
        }
    }

    fn hat(&self, index: usize) -> Option<(i32, i32)> {
        if index != 0 {
            return None;
        }
        let gamepad = self.gamepad()?;
        Some(hat_from_dpad(
            gamepad.is_pressed(Button::DPadUp),
            gamepad.is_pressed(Button::DPadDown),
            gamepad.is_pressed(Button::DPadLeft),
            gamepad.is_pressed(Button::DPadRight),
        ))
    }

    fn pump(&mut self) -> Vec<usize> {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            debug!("Processing gilrs event: {:?}", event);
            self.event_count += 1;
            self.handle_event(id, event);
        }

        // Log pump stats periodically
        let now = Local::now();
        let stats_interval = chrono::Duration::seconds(30);
        if now - self.last_stats_time > stats_interval {
            info!(
                "Device pump stats: {} events in last {} seconds ({:.2}/sec)",
                self.event_count,
                stats_interval.num_seconds(),
                self.event_count as f64 / stats_interval.num_seconds() as f64
            );
            self.event_count = 0;
            self.last_stats_time = now;
        }

        std::mem::take(&mut self.pressed_queue)
    }
}

fn button_index(button: Button) -> Option<usize> {
    BUTTON_ORDER.iter().position(|b| *b == button)
}

fn hat_from_dpad(up: bool, down: bool, left: bool, right: bool) -> (i32, i32) {
    (right as i32 - left as i32, up as i32 - down as i32)
}
