//! MQTT implementation of the simulator link
//!
//! The simulator side runs a bridge process that mirrors vehicle and
//! observer state onto retained-style state topics and answers spawn and
//! tick-advance requests on acknowledgement topics. State reports feed a
//! local cache so the control loop's queries never block; the spawn and
//! tick handshakes block with a timeout and fail the session when the
//! bridge stops answering.
//!
//! Topic layout under the configured prefix:
//!
//! ```text
//! <prefix>/vehicle/state     <- VehicleState reports
//! <prefix>/observer/state    <- observer Transform reports
//! <prefix>/vehicle/control   -> ActuationCommand per tick
//! <prefix>/observer/set      -> observer Transform per tick
//! <prefix>/session/spawn     -> SpawnRequest    /session/spawned <- SpawnReply
//! <prefix>/session/release   -> ReleaseRequest
//! <prefix>/clock/tick        -> TickRequest     /clock/tock      <- TickReply
//! ```

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::control::composer::ActuationCommand;
use crate::sim::messages::{
    ReleaseRequest, SpawnReply, SpawnRequest, TickReply, TickRequest, VehicleState,
};
use crate::sim::types::{Transform, Velocity};
use crate::sim::{ActorId, SimulatorLink, SinkError};

const STATE_TOPICS: [&str; 4] = [
    "vehicle/state",
    "observer/state",
    "session/spawned",
    "clock/tock",
];

/// Acknowledgements surfaced while draining the event loop.
#[derive(Debug)]
enum Ack {
    Spawned(ActorId),
    Tick(u64),
    Delivered,
}

pub struct MqttBridge {
    client: AsyncClient,
    eventloop: EventLoop,
    config: BridgeConfig,
    tick_seq: u64,
    actor_id: Option<ActorId>,
    vehicle: Option<VehicleState>,
    observer: Option<Transform>,
}

impl MqttBridge {
    pub async fn connect(config: BridgeConfig) -> Result<Self, SinkError> {
        info!(
            "Connecting to simulator bridge at {}:{} as {}",
            config.host, config.port, config.client_id
        );
        let mut options =
            MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, eventloop) = AsyncClient::new(options, 100);

        for suffix in STATE_TOPICS {
            let topic = format!("{}/{}", config.topic_prefix, suffix);
            client
                .subscribe(topic, QoS::AtMostOnce)
                .await
                .map_err(|e| SinkError::Connection(e.to_string()))?;
        }

        Ok(Self {
            client,
            eventloop,
            config,
            tick_seq: 0,
            actor_id: None,
            vehicle: None,
            observer: None,
        })
    }

    fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.config.topic_prefix, suffix)
    }

    async fn publish<T: Serialize>(
        &self,
        suffix: &str,
        qos: QoS,
        message: &T,
    ) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(message)?;
        self.client
            .publish(self.topic(suffix), qos, false, payload)
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))
    }

    /// Routes an incoming publish into the state cache, surfacing
    /// handshake acknowledgements to the caller. Malformed reports are a
    /// transient read failure: logged and dropped, never fatal.
    fn handle_publish(&mut self, topic: &str, payload: &[u8]) -> Option<Ack> {
        let suffix = topic_suffix(topic, &self.config.topic_prefix)?;
        match suffix {
            "vehicle/state" => match serde_json::from_slice::<VehicleState>(payload) {
                Ok(state) => self.vehicle = Some(state),
                Err(e) => warn!("Dropping malformed vehicle state: {}", e),
            },
            "observer/state" => match serde_json::from_slice::<Transform>(payload) {
                Ok(transform) => self.observer = Some(transform),
                Err(e) => warn!("Dropping malformed observer state: {}", e),
            },
            "session/spawned" => match serde_json::from_slice::<SpawnReply>(payload) {
                Ok(reply) => return Some(Ack::Spawned(reply.actor_id)),
                Err(e) => warn!("Dropping malformed spawn reply: {}", e),
            },
            "clock/tock" => match serde_json::from_slice::<TickReply>(payload) {
                Ok(reply) => return Some(Ack::Tick(reply.seq)),
                Err(e) => warn!("Dropping malformed tick reply: {}", e),
            },
            other => debug!("Ignoring publish on unknown topic: {}", other),
        }
        None
    }

    /// Drives the event loop until the wanted acknowledgement arrives.
    ///
    /// Polling here is also what flushes the publishes queued earlier in
    /// the tick onto the wire. State reports received along the way update
    /// the cache as a side effect.
    async fn await_ack(
        &mut self,
        what: &'static str,
        wanted: impl Fn(&Ack) -> bool,
    ) -> Result<Ack, SinkError> {
        let deadline = Instant::now() + Duration::from_millis(self.config.ack_timeout_ms);
        loop {
            let event = tokio::time::timeout_at(deadline, self.eventloop.poll())
                .await
                .map_err(|_| SinkError::AckTimeout(what))?
                .map_err(|e| SinkError::Connection(e.to_string()))?;

            match event {
                Event::Incoming(Packet::Publish(publish)) => {
                    let topic = publish.topic.clone();
                    if let Some(ack) = self.handle_publish(&topic, &publish.payload) {
                        if wanted(&ack) {
                            return Ok(ack);
                        }
                        debug!("Skipping unrelated ack: {:?}", ack);
                    }
                }
                Event::Incoming(Packet::PubAck(_)) => {
                    if wanted(&Ack::Delivered) {
                        return Ok(Ack::Delivered);
                    }
                }
                other => debug!("Bridge event: {:?}", other),
            }
        }
    }
}

impl SimulatorLink for MqttBridge {
    async fn acquire_vehicle(&mut self) -> Result<ActorId, SinkError> {
        let request = SpawnRequest {
            blueprint: self.config.blueprint.clone(),
            spawn_index: self.config.spawn_index,
        };
        info!(
            "Requesting vehicle actor: {} at spawn point {}",
            request.blueprint, request.spawn_index
        );
        self.publish("session/spawn", QoS::AtLeastOnce, &request)
            .await?;

        let ack = self
            .await_ack("spawn acknowledgement", |ack| {
                matches!(ack, Ack::Spawned(_))
            })
            .await?;
        let Ack::Spawned(actor_id) = ack else {
            unreachable!("await_ack only returns the wanted ack");
        };

        info!("Acquired vehicle actor {}", actor_id);
        self.actor_id = Some(actor_id);
        Ok(actor_id)
    }

    async fn release_vehicle(&mut self) -> Result<(), SinkError> {
        let Some(actor_id) = self.actor_id.take() else {
            debug!("No vehicle actor to release");
            return Ok(());
        };

        info!("Releasing vehicle actor {}", actor_id);
        self.publish("session/release", QoS::AtLeastOnce, &ReleaseRequest { actor_id })
            .await?;
        // Wait for broker delivery so the release is not lost in a local
        // queue when the process exits right after.
        self.await_ack("release delivery", |ack| matches!(ack, Ack::Delivered))
            .await?;
        Ok(())
    }

    fn vehicle_transform(&self) -> Option<Transform> {
        self.vehicle.map(|state| state.transform)
    }

    fn vehicle_velocity(&self) -> Option<Velocity> {
        self.vehicle.map(|state| state.velocity)
    }

    fn observer_transform(&self) -> Option<Transform> {
        self.observer
    }

    async fn apply_control(&mut self, command: &ActuationCommand) -> Result<(), SinkError> {
        if self.actor_id.is_none() {
            return Err(SinkError::NoActor);
        }
        self.publish("vehicle/control", QoS::AtMostOnce, command)
            .await
    }

    async fn set_observer(&mut self, transform: &Transform) -> Result<(), SinkError> {
        self.publish("observer/set", QoS::AtMostOnce, transform)
            .await
    }

    async fn tick(&mut self) -> Result<(), SinkError> {
        self.tick_seq += 1;
        let seq = self.tick_seq;
        self.publish("clock/tick", QoS::AtLeastOnce, &TickRequest { seq })
            .await?;
        self.await_ack("tick acknowledgement", move |ack| {
            matches!(ack, Ack::Tick(got) if *got == seq)
        })
        .await?;
        Ok(())
    }
}

fn topic_suffix<'a>(topic: &'a str, prefix: &str) -> Option<&'a str> {
    topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
}
