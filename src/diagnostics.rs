//! Per-tick diagnostics reporting
//!
//! Purely observational: taps the composed command, the directional intent
//! and the raw input deltas, and emits them through `tracing`. Nothing here
//! feeds back into control, and reporting is best-effort by construction.

use tracing::info;

use crate::control::composer::{ActuationCommand, ToggleFlags};
use crate::control::direction::DirectionalIntent;
use crate::input::sampler::InputSample;

/// Axis movement below this is not worth a detect line.
const AXIS_EPSILON: f32 = 0.01;

#[derive(Debug, Default)]
pub struct Reporter {
    prev: Option<InputSample>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits this tick's diagnostics according to the debug/detect flags
    /// and caches the sample for the next tick's delta comparison.
    pub fn report(
        &mut self,
        sample: &InputSample,
        intent: DirectionalIntent,
        command: &ActuationCommand,
        speed: f32,
        flags: &ToggleFlags,
    ) {
        if flags.debug_enabled {
            info!(
                "CONTROL-> steer={:.3} throttle={:.3} brake={:.3} hand_brake={} reverse={} gear={} manual_shift={}",
                command.steer,
                command.throttle,
                command.brake,
                command.hand_brake,
                command.reverse,
                command.gear,
                command.manual_gear_shift
            );
            info!("STATE-> intent={:?} speed={:.3}", intent, speed);
            info!(
                "FLAGS-> hand_brake={} momentary={} throttle_cancels_reverse={}",
                flags.hand_brake_engaged, flags.hand_brake_momentary, flags.throttle_cancels_reverse
            );
        }

        if flags.detect_enabled {
            if let Some(prev) = &self.prev {
                for change in detect_changes(prev, sample) {
                    info!("DETECT-> {}", change);
                }
            }
        }

        self.prev = Some(sample.clone());
    }
}

/// Lists the raw input channels that changed between two samples, one entry
/// per changed channel.
fn detect_changes(prev: &InputSample, current: &InputSample) -> Vec<String> {
    let mut changes = Vec::new();

    let axes = [
        ("steer", Some(prev.steer), Some(current.steer)),
        ("throttle", prev.raw_throttle, current.raw_throttle),
        ("brake", prev.raw_brake, current.raw_brake),
        ("clutch", prev.raw_clutch, current.raw_clutch),
    ];
    for (name, before, after) in axes {
        match (before, after) {
            (Some(b), Some(a)) if (a - b).abs() > AXIS_EPSILON => {
                changes.push(format!("axis {name}: {b:.3} -> {a:.3}"));
            }
            (None, Some(a)) => changes.push(format!("axis {name}: unread -> {a:.3}")),
            (Some(b), None) => changes.push(format!("axis {name}: {b:.3} -> unread")),
            _ => {}
        }
    }

    let button_count = prev.buttons.len().max(current.buttons.len());
    for i in 0..button_count {
        let before = prev.buttons.get(i).copied().unwrap_or(false);
        let after = current.buttons.get(i).copied().unwrap_or(false);
        if before != after {
            changes.push(format!("button {i}: {before} -> {after}"));
        }
    }

    let hat_count = prev.hats.len().max(current.hats.len());
    for i in 0..hat_count {
        let before = prev.hats.get(i).copied().unwrap_or((0, 0));
        let after = current.hats.get(i).copied().unwrap_or((0, 0));
        if before != after {
            changes.push(format!("hat {i}: {before:?} -> {after:?}"));
        }
    }

    changes
}
