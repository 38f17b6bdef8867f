//! Simulator boundary
//!
//! The simulation is an external collaborator: this module only defines the
//! interface the control loop talks to, plus the MQTT implementation of it.
//! Pose/velocity queries are cached reads that may come up empty (transient,
//! substitute a default and carry on); command submission and the tick
//! handshake are fallible and fatal to the session when they fail.

pub mod bridge;
pub mod messages;
pub mod types;

use crate::control::composer::ActuationCommand;
use types::{Transform, Velocity};

pub type ActorId = u64;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Bridge connection failed: {0}")]
    Connection(String),

    #[error("Timed out waiting for {0}")]
    AckTimeout(&'static str),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No vehicle actor acquired")]
    NoActor,
}

/// One controllable vehicle plus observer in an external simulation.
///
/// Queries return the last-known value and `None` before the first report;
/// the caller substitutes safe defaults. Commands and the tick advance
/// propagate their failures, which end the session.
#[allow(async_fn_in_trait)]
pub trait SimulatorLink {
    /// Acquires one controllable vehicle actor for the session.
    async fn acquire_vehicle(&mut self) -> Result<ActorId, SinkError>;

    /// Releases the acquired actor. Must be called on every exit path.
    async fn release_vehicle(&mut self) -> Result<(), SinkError>;

    fn vehicle_transform(&self) -> Option<Transform>;
    fn vehicle_velocity(&self) -> Option<Velocity>;
    fn observer_transform(&self) -> Option<Transform>;

    /// Submits one actuation command for this tick.
    async fn apply_control(&mut self, command: &ActuationCommand) -> Result<(), SinkError>;

    /// Submits the updated observer pose for this tick.
    async fn set_observer(&mut self, transform: &Transform) -> Result<(), SinkError>;

    /// Advances the simulation by one tick, blocking until acknowledged.
    async fn tick(&mut self) -> Result<(), SinkError>;
}
