//! Actuation command composition
//!
//! Combines the per-tick input sample, the directional intent and the
//! session toggle flags into one [`ActuationCommand`]. Degenerate input has
//! already been neutralized upstream (absent axes read as released pedals),
//! so composition never fails.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{AxisMapping, PolicyConfig};
use crate::control::direction::DirectionalIntent;
use crate::input::pedals::normalize;
use crate::input::sampler::InputSample;

/// Brake level forced while a reverse request is pending.
const PENDING_BRAKE: f32 = 0.8;

/// One tick's actuation request, in the sink's conventions: unipolar
/// throttle/brake, signed steer, direction conveyed via the reverse flag
/// with a sign-consistent gear. Always an automatic-transmission request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActuationCommand {
    pub steer: f32,
    pub throttle: f32,
    pub brake: f32,
    pub hand_brake: bool,
    pub reverse: bool,
    pub gear: i32,
    pub manual_gear_shift: bool,
}

/// Persistent session booleans, mutated only by the per-tick edge step.
///
/// `hand_brake_momentary` and `throttle_cancels_reverse` are fixed policy;
/// the rest change on button-press edges.
#[derive(Clone, Debug)]
pub struct ToggleFlags {
    pub hand_brake_engaged: bool,
    pub hand_brake_momentary: bool,
    pub debug_enabled: bool,
    pub detect_enabled: bool,
    pub throttle_cancels_reverse: bool,
}

impl ToggleFlags {
    pub fn new(policy: &PolicyConfig) -> Self {
        Self {
            hand_brake_engaged: false,
            hand_brake_momentary: policy.hand_brake_momentary,
            debug_enabled: false,
            detect_enabled: false,
            throttle_cancels_reverse: policy.throttle_cancels_reverse,
        }
    }

    /// Applies this tick's button edges (and, in momentary mode, the live
    /// hand-brake level) to the persistent flags.
    pub fn apply_sample(&mut self, sample: &InputSample, mapping: &AxisMapping) {
        if self.hand_brake_momentary {
            self.hand_brake_engaged = sample.button_level(mapping.hand_brake_button);
        } else if sample.pressed_this_tick(mapping.hand_brake_button) {
            self.hand_brake_engaged = !self.hand_brake_engaged;
            info!("Hand brake toggled -> {}", self.hand_brake_engaged);
        }

        if sample.pressed_this_tick(mapping.debug_button) {
            self.debug_enabled = !self.debug_enabled;
            info!("Debug reporting toggled -> {}", self.debug_enabled);
        }

        if sample.pressed_this_tick(mapping.detect_button) {
            self.detect_enabled = !self.detect_enabled;
            info!("Detect reporting toggled -> {}", self.detect_enabled);
        }
    }
}

/// The pedal-polarity normalized throttle, before any reverse inversion.
/// This is the value the reverse gate compares against its cancel
/// threshold.
pub fn throttle_norm(sample: &InputSample, mapping: &AxisMapping) -> f32 {
    normalize(sample.raw_throttle, mapping.invert_throttle)
}

/// Composes the actuation command for one tick.
pub fn compose(
    sample: &InputSample,
    intent: DirectionalIntent,
    flags: &ToggleFlags,
    mapping: &AxisMapping,
) -> ActuationCommand {
    // Reverse inversion applies on top of the static pedal polarity: the
    // same pedal travel drives forward throttle in Forward and reverse
    // throttle in Reverse.
    let norm = throttle_norm(sample, mapping);
    let mut throttle = if intent.is_reverse() { 1.0 - norm } else { norm };
    let mut brake = normalize(sample.raw_brake, mapping.invert_brake);

    if intent.is_pending() {
        // Forced deceleration: bring the vehicle to a stop before the
        // reverse flag may flip, regardless of pedal input.
        brake = brake.max(PENDING_BRAKE);
        throttle = 0.0;
    }

    let reverse = intent.is_reverse();

    ActuationCommand {
        steer: sample.steer,
        throttle,
        brake,
        hand_brake: flags.hand_brake_engaged,
        reverse,
        gear: if reverse { -1 } else { 1 },
        manual_gear_shift: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample_with_pedals(throttle: Option<f32>, brake: Option<f32>) -> InputSample {
        InputSample {
            raw_throttle: throttle,
            raw_brake: brake,
            buttons: vec![false; 13],
            ..InputSample::default()
        }
    }

    fn flags() -> ToggleFlags {
        ToggleFlags::new(&PolicyConfig::default())
    }

    #[test]
    fn test_forward_full_throttle_no_brake() {
        let sample = sample_with_pedals(Some(1.0), Some(-1.0));
        let cmd = compose(
            &sample,
            DirectionalIntent::Forward,
            &flags(),
            &AxisMapping::default(),
        );

        assert!((cmd.throttle - 1.0).abs() < 1e-6);
        assert!(cmd.brake.abs() < 1e-6);
        assert!(!cmd.reverse);
        assert_eq!(cmd.gear, 1);
        assert!(!cmd.manual_gear_shift);
    }

    #[test]
    fn test_reverse_inverts_throttle() {
        let sample = sample_with_pedals(Some(1.0), Some(-1.0));
        let cmd = compose(
            &sample,
            DirectionalIntent::Reverse,
            &flags(),
            &AxisMapping::default(),
        );

        assert!(cmd.throttle.abs() < 1e-6);
        assert!(cmd.reverse);
        assert_eq!(cmd.gear, -1);
    }

    #[test]
    fn test_pending_overrides_pedals() {
        let sample = sample_with_pedals(Some(1.0), Some(-1.0));
        let cmd = compose(
            &sample,
            DirectionalIntent::PendingReverse,
            &flags(),
            &AxisMapping::default(),
        );

        assert_eq!(cmd.throttle, 0.0);
        assert!(cmd.brake >= 0.8);
        assert!(!cmd.reverse);
        assert_eq!(cmd.gear, 1);
    }

    #[test]
    fn test_pending_keeps_stronger_pedal_brake() {
        let sample = sample_with_pedals(Some(1.0), Some(0.9));
        let cmd = compose(
            &sample,
            DirectionalIntent::PendingReverse,
            &flags(),
            &AxisMapping::default(),
        );
        // Driver braking harder than the override keeps their value
        assert!(cmd.brake > 0.9);
    }

    #[test]
    fn test_absent_pedals_compose_released() {
        let sample = sample_with_pedals(None, None);
        let cmd = compose(
            &sample,
            DirectionalIntent::Forward,
            &flags(),
            &AxisMapping::default(),
        );

        assert_eq!(cmd.throttle, 0.0);
        assert_eq!(cmd.brake, 0.0);
    }

    #[test]
    fn test_steer_passes_through() {
        let mut sample = sample_with_pedals(None, None);
        sample.steer = -0.7;
        let cmd = compose(
            &sample,
            DirectionalIntent::Forward,
            &flags(),
            &AxisMapping::default(),
        );
        assert_eq!(cmd.steer, -0.7);
    }

    #[test]
    fn test_throttle_norm_ignores_reverse_inversion() {
        let sample = sample_with_pedals(Some(1.0), None);
        let mapping = AxisMapping::default();
        // The gate's cancel comparison sees the pedal value regardless of
        // which direction is engaged.
        assert!((throttle_norm(&sample, &mapping) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hand_brake_toggle_mode_edges_only() {
        let mapping = AxisMapping::default();
        let mut flags = flags();

        let mut sample = sample_with_pedals(None, None);
        sample.buttons[mapping.hand_brake_button] = true;
        sample.pressed = HashSet::from([mapping.hand_brake_button]);
        flags.apply_sample(&sample, &mapping);
        assert!(flags.hand_brake_engaged);

        // Held without a new edge: no change
        sample.pressed.clear();
        flags.apply_sample(&sample, &mapping);
        assert!(flags.hand_brake_engaged);

        // Released: still no change in toggle mode
        sample.buttons[mapping.hand_brake_button] = false;
        flags.apply_sample(&sample, &mapping);
        assert!(flags.hand_brake_engaged);

        // Second edge flips it back off
        sample.pressed = HashSet::from([mapping.hand_brake_button]);
        flags.apply_sample(&sample, &mapping);
        assert!(!flags.hand_brake_engaged);
    }

    #[test]
    fn test_hand_brake_momentary_mirrors_level() {
        let mapping = AxisMapping::default();
        let mut flags = ToggleFlags::new(&PolicyConfig {
            hand_brake_momentary: true,
            ..PolicyConfig::default()
        });

        let mut sample = sample_with_pedals(None, None);
        sample.buttons[mapping.hand_brake_button] = true;
        flags.apply_sample(&sample, &mapping);
        assert!(flags.hand_brake_engaged);

        sample.buttons[mapping.hand_brake_button] = false;
        flags.apply_sample(&sample, &mapping);
        assert!(!flags.hand_brake_engaged);
    }

    #[test]
    fn test_debug_detect_toggle_on_edges() {
        let mapping = AxisMapping::default();
        let mut flags = flags();

        let mut sample = sample_with_pedals(None, None);
        sample.pressed = HashSet::from([mapping.debug_button, mapping.detect_button]);
        flags.apply_sample(&sample, &mapping);
        assert!(flags.debug_enabled);
        assert!(flags.detect_enabled);

        flags.apply_sample(&sample, &mapping);
        assert!(!flags.debug_enabled);
        assert!(!flags.detect_enabled);
    }
}
