//! The control session tick loop
//!
//! One pass per tick: drain device events and snapshot input, apply button
//! edges to the toggle flags, arbitrate the directional intent, compose and
//! submit the actuation command, update the follow camera, report
//! diagnostics, then advance the simulation. Generic over the device and
//! simulator link so the whole loop runs against fakes in tests.

use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::camera::FollowCamera;
use crate::config::{AxisMapping, ControlConfig};
use crate::control::composer::{self, ToggleFlags};
use crate::control::direction::ReverseGate;
use crate::diagnostics::Reporter;
use crate::input::device::InputDevice;
use crate::input::sampler;
use crate::sim::{SimulatorLink, SinkError};

pub struct TickPilot<D, L> {
    device: D,
    link: L,
    mapping: AxisMapping,
    gate: ReverseGate,
    flags: ToggleFlags,
    camera: FollowCamera,
    reporter: Reporter,
}

impl<D: InputDevice, L: SimulatorLink> TickPilot<D, L> {
    /// The mapping in `config` must already have its clutch axis resolved
    /// against the device.
    pub fn new(device: D, link: L, config: &ControlConfig) -> Self {
        Self {
            device,
            link,
            mapping: config.mapping.clone(),
            gate: ReverseGate::new(&config.policy),
            flags: ToggleFlags::new(&config.policy),
            camera: FollowCamera::new(&config.camera),
            reporter: Reporter::new(),
        }
    }

    /// Acquires the vehicle, drives until shutdown or a sink failure, and
    /// releases the vehicle on every exit path.
    pub async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) -> Result<(), SinkError> {
        self.link.acquire_vehicle().await?;
        info!("Control session started");

        let result = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received, ending session");
                    break Ok(());
                }

                tick = self.step() => {
                    if let Err(e) = tick {
                        error!("Sink failure, ending session: {}", e);
                        break Err(e);
                    }
                }
            }
        };

        // Teardown runs on normal exit, interrupt and sink failure alike.
        if let Err(e) = self.link.release_vehicle().await {
            error!("Failed to release vehicle actor: {}", e);
        }
        info!("Control session ended");

        result
    }

    /// One full control pass. Read failures are substituted locally; only
    /// sink submission and the tick advance can fail.
    async fn step(&mut self) -> Result<(), SinkError> {
        let sample = sampler::sample(&mut self.device, &self.mapping);
        self.flags.apply_sample(&sample, &self.mapping);

        // A failed speed read counts as stopped, which lets a pending
        // reverse complete instead of stalling.
        let speed = self
            .link
            .vehicle_velocity()
            .map(|v| v.speed())
            .unwrap_or(0.0);

        let throttle_norm = composer::throttle_norm(&sample, &self.mapping);
        let intent = self.gate.step(
            sample.pressed_this_tick(self.mapping.reverse_button),
            throttle_norm,
            speed,
        );

        let command = composer::compose(&sample, intent, &self.flags, &self.mapping);
        self.link.apply_control(&command).await?;

        match self.link.vehicle_transform() {
            Some(vehicle) => {
                let observer = self.camera.update(self.link.observer_transform(), &vehicle);
                self.link.set_observer(&observer).await?;
            }
            None => debug!("Vehicle pose unavailable, observer update skipped this tick"),
        }

        self.reporter
            .report(&sample, intent, &command, speed, &self.flags);

        self.link.tick().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::composer::ActuationCommand;
    use crate::input::fake::FakeDevice;
    use crate::sim::types::{Transform, Velocity};
    use crate::sim::ActorId;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Shared {
        velocity: Option<Velocity>,
        vehicle: Option<Transform>,
        observer: Option<Transform>,
        commands: Vec<ActuationCommand>,
        observer_sets: Vec<Transform>,
        ticks: u64,
        acquired: bool,
        released: bool,
        fail_tick: bool,
    }

    #[derive(Clone)]
    struct FakeLink(Arc<Mutex<Shared>>);

    impl FakeLink {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Shared::default())))
        }

        fn state(&self) -> std::sync::MutexGuard<'_, Shared> {
            self.0.lock().expect("shared state poisoned")
        }
    }

    impl SimulatorLink for FakeLink {
        async fn acquire_vehicle(&mut self) -> Result<ActorId, SinkError> {
            self.state().acquired = true;
            Ok(1)
        }

        async fn release_vehicle(&mut self) -> Result<(), SinkError> {
            self.state().released = true;
            Ok(())
        }

        fn vehicle_transform(&self) -> Option<Transform> {
            self.state().vehicle
        }

        fn vehicle_velocity(&self) -> Option<Velocity> {
            self.state().velocity
        }

        fn observer_transform(&self) -> Option<Transform> {
            self.state().observer
        }

        async fn apply_control(&mut self, command: &ActuationCommand) -> Result<(), SinkError> {
            self.state().commands.push(command.clone());
            Ok(())
        }

        async fn set_observer(&mut self, transform: &Transform) -> Result<(), SinkError> {
            let mut state = self.state();
            state.observer_sets.push(*transform);
            state.observer = Some(*transform);
            Ok(())
        }

        async fn tick(&mut self) -> Result<(), SinkError> {
            let mut state = self.state();
            if state.fail_tick {
                return Err(SinkError::AckTimeout("tick acknowledgement"));
            }
            state.ticks += 1;
            Ok(())
        }
    }

    fn pilot(device: FakeDevice, link: FakeLink) -> TickPilot<FakeDevice, FakeLink> {
        let mut config = ControlConfig::default();
        config.mapping.resolve_clutch(device.axis_count());
        TickPilot::new(device, link, &config)
    }

    fn moving(speed: f64) -> Option<Velocity> {
        Some(Velocity {
            x: speed,
            y: 0.0,
            z: 0.0,
        })
    }

    #[tokio::test]
    async fn test_stop_then_reverse_maneuver() {
        let link = FakeLink::new();
        link.state().velocity = moving(3.0);

        let mut device = FakeDevice::new(6, 13);
        device.set_axis(2, -1.0); // pedals released
        device.set_axis(5, -1.0);
        device.queue_press(5); // reverse request

        let mut pilot = pilot(device, link.clone());

        // Tick 1: request lands while moving; forced deceleration
        pilot.step().await.expect("tick");
        {
            let state = link.state();
            let cmd = state.commands.last().expect("command submitted");
            assert_eq!(cmd.throttle, 0.0);
            assert!(cmd.brake >= 0.8);
            assert!(!cmd.reverse);
        }

        // Tick 2: still too fast, still braking
        link.state().velocity = moving(1.0);
        pilot.step().await.expect("tick");
        assert!(!link.state().commands.last().unwrap().reverse);

        // Tick 3: below the stop threshold, reverse engages
        link.state().velocity = moving(0.2);
        pilot.step().await.expect("tick");
        {
            let state = link.state();
            let cmd = state.commands.last().unwrap();
            assert!(cmd.reverse);
            assert_eq!(cmd.gear, -1);
            // Released pedal, inverted for reverse: full reverse throttle
            assert!((cmd.throttle - 1.0).abs() < 1e-6);
        }
        assert_eq!(link.state().ticks, 3);
    }

    #[tokio::test]
    async fn test_throttle_cancels_pending_request() {
        let link = FakeLink::new();
        link.state().velocity = moving(3.0);

        let mut device = FakeDevice::new(6, 13);
        device.set_axis(2, -1.0);
        device.queue_press(5);

        let mut pilot = pilot(device, link.clone());
        pilot.step().await.expect("tick");
        assert!(link.state().commands.last().unwrap().brake >= 0.8);

        // Driver steps on the throttle before the vehicle has stopped:
        // the pending request cancels and forward mapping resumes without
        // inversion.
        pilot.device.set_axis(2, 1.0);
        pilot.step().await.expect("tick");
        {
            let state = link.state();
            let cmd = state.commands.last().unwrap();
            assert!(!cmd.reverse);
            assert!((cmd.throttle - 1.0).abs() < 1e-6);
            assert!(cmd.brake < 0.8);
        }
    }

    #[tokio::test]
    async fn test_unreadable_speed_engages_reverse_immediately() {
        let link = FakeLink::new(); // velocity stays None
        let mut device = FakeDevice::new(6, 13);
        device.queue_press(5);

        let mut pilot = pilot(device, link.clone());
        pilot.step().await.expect("tick");
        assert!(link.state().commands.last().unwrap().reverse);
    }

    #[tokio::test]
    async fn test_observer_follows_once_vehicle_pose_known() {
        let link = FakeLink::new();
        let mut pilot = pilot(FakeDevice::new(6, 13), link.clone());

        // No vehicle pose yet: no observer submission, but the tick runs
        pilot.step().await.expect("tick");
        assert!(link.state().observer_sets.is_empty());

        link.state().vehicle = Some(Transform::default());
        pilot.step().await.expect("tick");
        // No prior observer pose: jumped straight to the target
        let first = *link.state().observer_sets.last().unwrap();
        assert!((first.location.x - -8.0).abs() < 1e-9);
        assert!((first.location.z - 3.0).abs() < 1e-9);

        // Subsequent updates blend from the submitted pose
        pilot.step().await.expect("tick");
        assert_eq!(link.state().observer_sets.len(), 2);
    }

    #[tokio::test]
    async fn test_detached_device_still_drives_neutral() {
        let link = FakeLink::new();
        let mut pilot = pilot(FakeDevice::detached(), link.clone());

        pilot.step().await.expect("tick");
        let state = link.state();
        let cmd = state.commands.last().unwrap();
        assert_eq!(cmd.steer, 0.0);
        assert_eq!(cmd.throttle, 0.0);
        assert_eq!(cmd.brake, 0.0);
        assert!(!cmd.reverse);
    }

    #[tokio::test]
    async fn test_shutdown_releases_vehicle() {
        let link = FakeLink::new();
        let pilot = pilot(FakeDevice::new(6, 13), link.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        shutdown_tx.send(()).expect("send shutdown");

        pilot.run(shutdown_rx).await.expect("clean shutdown");
        assert!(link.state().acquired);
        assert!(link.state().released);
    }

    #[tokio::test]
    async fn test_sink_failure_is_fatal_but_still_releases() {
        let link = FakeLink::new();
        link.state().fail_tick = true;

        let pilot = pilot(FakeDevice::new(6, 13), link.clone());
        let (_shutdown_tx, shutdown_rx) = oneshot::channel();

        let result = pilot.run(shutdown_rx).await;
        assert!(matches!(result, Err(SinkError::AckTimeout(_))));
        assert!(link.state().released);
    }
}
