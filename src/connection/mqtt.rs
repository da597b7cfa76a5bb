use super::broker::{Broker, BrokerError, BrokerEvent, QoS};
use crate::config::{parse_endpoint, MqttConfig};
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, NetworkOptions, Packet,
    Publish, SubscribeReasonCode,
};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

const REQUEST_CAPACITY: usize = 10;

/// Broker session over rumqttc's async client.
///
/// The event loop is only driven from inside these methods, so nothing happens
/// on the socket between polls. Publishes that show up while waiting for an
/// acknowledgement are parked and handed out by the next `poll`.
pub struct MqttBroker {
    client: AsyncClient,
    eventloop: EventLoop,
    connected: bool,
    ack_timeout: Duration,
    pending: VecDeque<BrokerEvent>,
}

impl MqttBroker {
    pub fn new(config: &MqttConfig) -> Result<Self, BrokerError> {
        let (host, port) =
            parse_endpoint(&config.url).ok_or_else(|| BrokerError::InvalidAddress(config.url.clone()))?;

        let mut options = MqttOptions::new(config.client_id.clone(), host, port);
        options
            .set_keep_alive(Duration::from_secs(config.keep_alive_secs))
            .set_clean_session(true);
        if !config.username.is_empty() {
            options.set_credentials(config.username.clone(), config.password.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let mut network = NetworkOptions::new();
        network.set_connection_timeout(config.connect_timeout_secs);
        eventloop.set_network_options(network);

        Ok(Self {
            client,
            eventloop,
            connected: false,
            ack_timeout: Duration::from_secs(config.connect_timeout_secs),
            pending: VecDeque::new(),
        })
    }

    fn park(&mut self, publish: Publish) {
        self.pending.push_back(message_event(publish));
    }

    /// Drives the event loop until CONNACK.
    async fn establish(&mut self) -> Result<(), BrokerError> {
        if self.connected {
            return Ok(());
        }

        let deadline = Instant::now() + self.ack_timeout;
        loop {
            let event = timeout_at(deadline, self.eventloop.poll())
                .await
                .map_err(|_| BrokerError::Timeout(self.ack_timeout))??;
            match event {
                Event::Incoming(Packet::ConnAck(ack)) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(BrokerError::Refused(ack.code));
                    }
                    self.connected = true;
                    info!("Broker session established");
                    return Ok(());
                }
                Event::Incoming(Packet::Publish(publish)) => self.park(publish),
                other => trace!("Ignoring {:?} while connecting", other),
            }
        }
    }
}

fn message_event(publish: Publish) -> BrokerEvent {
    BrokerEvent::Message {
        topic: publish.topic,
        payload: String::from_utf8_lossy(&publish.payload).into_owned(),
    }
}

#[async_trait]
impl Broker for MqttBroker {
    async fn connect(&mut self) -> Result<(), BrokerError> {
        let result = self.establish().await;
        if let Err(e) = &result {
            warn!("Broker connect failed: {}", e);
        }
        result
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), BrokerError> {
        self.client.subscribe(topic, qos).await?;

        let deadline = Instant::now() + self.ack_timeout;
        loop {
            let event = match timeout_at(deadline, self.eventloop.poll()).await {
                Err(_) => return Err(BrokerError::Timeout(self.ack_timeout)),
                Ok(Err(e)) => {
                    self.connected = false;
                    return Err(e.into());
                }
                Ok(Ok(event)) => event,
            };
            match event {
                Event::Incoming(Packet::SubAck(ack)) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(BrokerError::SubscriptionRejected(topic.to_string()));
                    }
                    info!("Subscribed to {} at {:?}", topic, qos);
                    return Ok(());
                }
                Event::Incoming(Packet::Publish(publish)) => self.park(publish),
                other => trace!("Ignoring {:?} while subscribing", other),
            }
        }
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Vec<BrokerEvent>, BrokerError> {
        let mut events: Vec<BrokerEvent> = self.pending.drain(..).collect();
        let deadline = Instant::now() + timeout;

        while events.is_empty() {
            match timeout_at(deadline, self.eventloop.poll()).await {
                Err(_) => break,
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    debug!("Publish on {} ({} bytes)", publish.topic, publish.payload.len());
                    events.push(message_event(publish));
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    self.connected = false;
                    events.push(BrokerEvent::Disconnected);
                }
                Ok(Ok(other)) => trace!("Event {:?}", other),
                Ok(Err(e)) => {
                    self.connected = false;
                    // Keep what already arrived for after the reconnect.
                    self.pending.extend(events);
                    return Err(e.into());
                }
            }
        }
        Ok(events)
    }

    async fn reconnect(&mut self) -> Result<(), BrokerError> {
        if self.connected {
            return Ok(());
        }
        info!("Re-establishing broker session");
        self.establish().await
    }
}
