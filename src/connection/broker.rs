//! Broker session collaborator.

use async_trait::async_trait;
use rumqttc::{ConnectReturnCode, ConnectionError};
use std::time::Duration;
use thiserror::Error;

pub use rumqttc::QoS;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connection(String),

    #[error("broker refused the session: {0:?}")]
    Refused(ConnectReturnCode),

    #[error("broker request failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("subscription to {0:?} rejected")]
    SubscriptionRejected(String),

    #[error("no answer from broker within {0:?}")]
    Timeout(Duration),

    #[error("broker closed the session")]
    Disconnected,

    #[error("invalid broker address {0:?}")]
    InvalidAddress(String),
}

impl BrokerError {
    /// Errors that point at bad credentials or addresses rather than a flaky network.
    pub fn is_fatal(&self) -> bool {
        match self {
            BrokerError::Refused(code) => matches!(
                code,
                ConnectReturnCode::BadUserNamePassword
                    | ConnectReturnCode::NotAuthorized
                    | ConnectReturnCode::BadClientId
                    | ConnectReturnCode::RefusedProtocolVersion
            ),
            BrokerError::InvalidAddress(_) | BrokerError::SubscriptionRejected(_) => true,
            _ => false,
        }
    }
}

impl From<ConnectionError> for BrokerError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::ConnectionRefused(code) => BrokerError::Refused(code),
            other => BrokerError::Connection(other.to_string()),
        }
    }
}

/// Something that happened on the session during a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Message { topic: String, payload: String },
    Disconnected,
}

/// Narrow interface to the publish/subscribe session.
///
/// Every async call must complete within a bounded time. `connect` and
/// `reconnect` report success immediately when the session is already up.
#[async_trait]
pub trait Broker: Send {
    async fn connect(&mut self) -> Result<(), BrokerError>;

    fn is_connected(&self) -> bool;

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), BrokerError>;

    /// Services the session for at most `timeout` and returns what arrived.
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<BrokerEvent>, BrokerError>;

    async fn reconnect(&mut self) -> Result<(), BrokerError>;
}
