//! Per-tick input snapshot
//!
//! One [`InputSample`] is built per tick from the device's current readings
//! plus the drained button-down events. The sample is immutable and lives
//! for one tick only.

use std::collections::HashSet;

use crate::config::AxisMapping;
use crate::input::device::InputDevice;

/// Immutable snapshot of the device state for one tick.
#[derive(Clone, Debug, Default)]
pub struct InputSample {
    /// Signed steering value in [-1, 1].
    pub steer: f32,
    /// Raw pedal readings in [-1, 1]; `None` means the axis could not be
    /// read and the pedal is treated as released.
    pub raw_throttle: Option<f32>,
    pub raw_brake: Option<f32>,
    pub raw_clutch: Option<f32>,
    /// Level state of every button channel.
    pub buttons: Vec<bool>,
    /// State of every hat channel.
    pub hats: Vec<(i32, i32)>,
    /// Button indices that transitioned released -> pressed since the
    /// previous sample. Each physical press appears exactly once.
    pub pressed: HashSet<usize>,
}

impl InputSample {
    /// Rising-edge check for a button index.
    pub fn pressed_this_tick(&self, button: usize) -> bool {
        self.pressed.contains(&button)
    }

    /// Current level of a button index; out-of-range reads as released.
    pub fn button_level(&self, button: usize) -> bool {
        self.buttons.get(button).copied().unwrap_or(false)
    }
}

/// Drains the device's pending events and snapshots its current readings.
///
/// With no device attached every axis reads neutral, the button and hat
/// vectors are empty, and no presses are reported.
pub fn sample<D: InputDevice>(device: &mut D, mapping: &AxisMapping) -> InputSample {
    let pressed: HashSet<usize> = device.pump().into_iter().collect();

    let steer = device.axis(mapping.steer_axis).unwrap_or(0.0);
    let raw_throttle = device.axis(mapping.throttle_axis);
    let raw_brake = device.axis(mapping.brake_axis);
    let raw_clutch = mapping.clutch_axis.and_then(|axis| device.axis(axis));

    let buttons = (0..device.button_count())
        .map(|i| device.button(i).unwrap_or(false))
        .collect();
    let hats = (0..device.hat_count())
        .map(|i| device.hat(i).unwrap_or((0, 0)))
        .collect();

    InputSample {
        steer,
        raw_throttle,
        raw_brake,
        raw_clutch,
        buttons,
        hats,
        pressed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::fake::FakeDevice;

    #[test]
    fn test_absent_device_reads_neutral() {
        let mut device = FakeDevice::detached();
        let mapping = AxisMapping::default();

        let sample = sample(&mut device, &mapping);

        assert_eq!(sample.steer, 0.0);
        assert_eq!(sample.raw_throttle, None);
        assert_eq!(sample.raw_brake, None);
        assert_eq!(sample.raw_clutch, None);
        assert!(sample.buttons.is_empty());
        assert!(sample.hats.is_empty());
        assert!(sample.pressed.is_empty());
    }

    #[test]
    fn test_snapshot_reads_mapped_axes() {
        let mut device = FakeDevice::new(6, 13);
        device.set_axis(0, -0.25);
        device.set_axis(2, 1.0);
        device.set_axis(5, -1.0);

        let mut mapping = AxisMapping::default();
        mapping.resolve_clutch(device.axis_count());

        let sample = sample(&mut device, &mapping);

        assert_eq!(sample.steer, -0.25);
        assert_eq!(sample.raw_throttle, Some(1.0));
        assert_eq!(sample.raw_brake, Some(-1.0));
        // Clutch auto-mapped to the last axis, which is also the brake here
        assert_eq!(sample.raw_clutch, Some(-1.0));
        assert_eq!(sample.buttons.len(), 13);
    }

    #[test]
    fn test_press_surfaces_exactly_once() {
        let mut device = FakeDevice::new(6, 13);
        device.queue_press(5);
        device.queue_press(5);
        device.queue_press(4);

        let first = sample(&mut device, &AxisMapping::default());
        assert!(first.pressed_this_tick(5));
        assert!(first.pressed_this_tick(4));

        // The queue was drained; the next tick sees no stale presses.
        let second = sample(&mut device, &AxisMapping::default());
        assert!(second.pressed.is_empty());
    }
}
