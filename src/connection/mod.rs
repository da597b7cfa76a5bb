//! Connection supervision
//!
//! The wireless link and the broker session are reached through the narrow
//! [`NetworkLink`] and [`Broker`] traits. [`ConnectionStateMachine`] is the only
//! writer of [`ConnectionState`] and decides when to retry.

pub mod broker;
pub mod link;
pub mod machine;
pub mod mqtt;
pub mod state;

pub use broker::{Broker, BrokerError, BrokerEvent, QoS};
pub use link::{LinkError, NetworkLink, NmcliLink, StaticLink};
pub use machine::{ConnectionError, ConnectionStateMachine, SessionSettings};
pub use mqtt::MqttBroker;
pub use state::{ConnectionEvent, ConnectionState};
