//! Reverse engagement state machine
//!
//! A simulated vehicle cannot flip its velocity instantaneously, and the
//! actuation sink expects the reverse flag to change only while the vehicle
//! is near-stationary. A reverse request therefore passes through a forced
//! stop: while the request is pending the composer overrides the pedals
//! (full-ish brake, zero throttle) until the speed drops below the stop
//! threshold, and only then does the gate engage reverse.
//!
//! ```text
//!              press                speed < stop
//! Forward ──────────► PendingReverse ──────────► Reverse
//!    ▲                      │                       │
//!    │   throttle > cancel  │        press, or      │
//!    └──────────────────────┘  throttle > cancel ───┘
//!                              (policy-gated)
//! ```

use tracing::{debug, info};

use crate::config::PolicyConfig;

/// The vehicle's longitudinal direction state. Exactly one variant is
/// active at any time; `PendingReverse` always resolves within the ticks
/// it takes the forced braking to stop the vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DirectionalIntent {
    #[default]
    Forward,
    PendingReverse,
    Reverse,
}

impl DirectionalIntent {
    pub fn is_reverse(&self) -> bool {
        matches!(self, DirectionalIntent::Reverse)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, DirectionalIntent::PendingReverse)
    }
}

/// Owns the [`DirectionalIntent`] and arbitrates it against button presses,
/// pedal input and vehicle speed once per tick.
#[derive(Debug)]
pub struct ReverseGate {
    intent: DirectionalIntent,
    stop_threshold: f32,
    cancel_threshold: f32,
    throttle_cancels_engaged: bool,
}

impl ReverseGate {
    pub fn new(policy: &PolicyConfig) -> Self {
        Self {
            intent: DirectionalIntent::Forward,
            stop_threshold: policy.stop_threshold,
            cancel_threshold: policy.cancel_threshold,
            throttle_cancels_engaged: policy.throttle_cancels_reverse,
        }
    }

    /// Advances the state machine by one tick.
    ///
    /// `throttle_norm` is the pedal-polarity normalized throttle, not the
    /// reverse-inverted final value, so cancellation is independent of the
    /// active inversion. A failed speed read must be passed in as 0.0,
    /// which biases toward completing the engagement rather than stalling
    /// in `PendingReverse`.
    pub fn step(
        &mut self,
        reverse_pressed: bool,
        throttle_norm: f32,
        speed: f32,
    ) -> DirectionalIntent {
        use DirectionalIntent::*;

        if reverse_pressed {
            match self.intent {
                Forward => {
                    info!("Reverse requested, braking until stop then engaging");
                    self.intent = PendingReverse;
                }
                PendingReverse | Reverse => {
                    info!("Reverse toggled off");
                    self.intent = Forward;
                }
            }
        }

        match self.intent {
            PendingReverse if speed < self.stop_threshold => {
                info!("Reverse engaged (vehicle stopped, speed={:.2})", speed);
                self.intent = Reverse;
            }
            PendingReverse if throttle_norm > self.cancel_threshold => {
                info!("Reverse request cancelled (throttle pressed)");
                self.intent = Forward;
            }
            Reverse
                if self.throttle_cancels_engaged && throttle_norm > self.cancel_threshold =>
            {
                info!("Throttle exited reverse");
                self.intent = Forward;
            }
            _ => {
                debug!(
                    "Intent stable: {:?} (speed={:.2}, throttle={:.2})",
                    self.intent, speed, throttle_norm
                );
            }
        }

        self.intent
    }
}
