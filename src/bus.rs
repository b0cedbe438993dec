//! Message-bus connection handling
//!
//! Wraps the MQTT client with the bridge's connection policy: the initial
//! connect is driven to the broker's acknowledgement and fails fatally,
//! while later transport drops are surfaced as observational events on a
//! channel. The underlying client re-dials on its own as long as the event
//! loop keeps being polled, so no supervisory reconnect layer sits on top.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::{Result, error::BridgeError};

/// Keep-alive interval advertised to the broker
const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Port assumed when the messaging address does not name one
const DEFAULT_MQTT_PORT: u16 = 1883;

/// Pause between event-loop polls after a transport error
const REDIAL_PAUSE: Duration = Duration::from_secs(1);

const EVENT_CHANNEL_CAPACITY: usize = 8;
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Connection lifecycle notifications emitted by the event-loop task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// The broker acknowledged a (re)connection
    Connected,
    /// The transport dropped; the client re-dials on its own
    ConnectionLost(String),
}

/// Destination for serialized fix reports
///
/// Abstracts the publish seam so the forwarding loop can run against an
/// in-memory sink in tests.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Publishes `payload` to `topic` with at-most-once semantics
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// Cloneable publish handle over the message-bus connection
///
/// Safe for concurrent publishes from multiple tasks.
#[derive(Debug, Clone)]
pub struct BusHandle {
    client: AsyncClient,
}

#[async_trait]
impl ReportSink for BusHandle {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(BridgeError::Publish)
    }
}

/// Establishes the message-bus connection
///
/// Drives the MQTT event loop until the broker acknowledges the session; a
/// failure before that point is returned as a fatal error. On success the
/// event loop keeps running in a background task and the returned channel
/// reports its lifecycle, starting with [`BusEvent::Connected`].
pub async fn connect(
    messaging_url: &str,
    client_id: &str,
) -> Result<(BusHandle, mpsc::Receiver<BusEvent>)> {
    let (host, port) = split_host_port(messaging_url)?;
    debug!("connecting to message bus at {host}:{port} as {client_id:?}");

    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(KEEP_ALIVE);
    let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => break,
            Ok(_) => continue,
            Err(err) => return Err(BridgeError::Connect(err)),
        }
    }

    let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let _ = events.try_send(BusEvent::Connected);
    tokio::spawn(drive(event_loop, events));

    Ok((BusHandle { client }, receiver))
}

/// Keeps the event loop polled for the life of the connection
///
/// Polling is what lets the client re-dial after a drop; the events sent
/// here exist for observability only.
async fn drive(mut event_loop: EventLoop, events: mpsc::Sender<BusEvent>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                let _ = events.try_send(BusEvent::Connected);
            }
            Ok(_) => {}
            Err(err) => {
                error!("message bus connection lost: {err}");
                let _ = events.try_send(BusEvent::ConnectionLost(err.to_string()));
                // Pace the re-dial so an unreachable broker does not spin.
                tokio::time::sleep(REDIAL_PAUSE).await;
            }
        }
    }
}

/// Splits a `host:port` messaging address, tolerating a scheme prefix
fn split_host_port(address: &str) -> Result<(String, u16)> {
    let address = address
        .split_once("://")
        .map_or(address, |(_, rest)| rest);

    match address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().map_err(|_| {
                BridgeError::Address(format!("invalid messaging port in {address:?}"))
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((address.to_string(), DEFAULT_MQTT_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(
            split_host_port("localhost:1883").unwrap(),
            ("localhost".to_string(), 1883)
        );
    }

    #[test]
    fn defaults_port_when_absent() {
        assert_eq!(
            split_host_port("broker.example.com").unwrap(),
            ("broker.example.com".to_string(), DEFAULT_MQTT_PORT)
        );
    }

    #[test]
    fn strips_scheme_prefix() {
        assert_eq!(
            split_host_port("tcp://broker:8883").unwrap(),
            ("broker".to_string(), 8883)
        );
    }

    #[test]
    fn rejects_unparseable_port() {
        assert!(matches!(
            split_host_port("broker:notaport"),
            Err(BridgeError::Address(_))
        ));
    }
}
