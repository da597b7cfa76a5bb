//! In-memory collaborators for unit tests.
//!
//! Each fake is cheap to clone; clones share one log so a test can keep a handle
//! after moving the fake into the code under test.

use crate::color::Rgb;
use crate::connection::{Broker, BrokerError, BrokerEvent, LinkError, NetworkLink, QoS};
use crate::display::{Display, DisplayError, FontCell};
use crate::indicator::{Indicator, IndicatorError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCall {
    Clear,
    Text {
        text: String,
        x: i32,
        y: i32,
        scale: u32,
        color: Rgb,
    },
}

#[derive(Debug, Default)]
struct DisplayLog {
    calls: Vec<DrawCall>,
    fail_next: bool,
}

#[derive(Debug, Clone)]
pub struct RecordingDisplay {
    width: u32,
    height: u32,
    cell: FontCell,
    log: Arc<Mutex<DisplayLog>>,
}

impl RecordingDisplay {
    pub fn panel_64x32() -> Self {
        Self {
            width: 64,
            height: 32,
            cell: FontCell {
                width: 6,
                height: 8,
            },
            log: Arc::default(),
        }
    }

    pub fn take_calls(&self) -> Vec<DrawCall> {
        std::mem::take(&mut self.log.lock().unwrap().calls)
    }

    /// The next `draw_text` fails and is not recorded.
    pub fn fail_next_draw(&self) {
        self.log.lock().unwrap().fail_next = true;
    }
}

impl Display for RecordingDisplay {
    fn clear(&mut self) -> Result<(), DisplayError> {
        self.log.lock().unwrap().calls.push(DrawCall::Clear);
        Ok(())
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: i32,
        y: i32,
        scale: u32,
        color: Rgb,
    ) -> Result<(), DisplayError> {
        let mut log = self.log.lock().unwrap();
        if std::mem::take(&mut log.fail_next) {
            return Err(DisplayError::Rejected("panel unplugged".into()));
        }
        log.calls.push(DrawCall::Text {
            text: text.to_string(),
            x,
            y,
            scale,
            color,
        });
        Ok(())
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn font_cell(&self) -> FontCell {
        self.cell
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorLog(Arc<Mutex<Vec<Rgb>>>);

impl IndicatorLog {
    pub fn colors(&self) -> Vec<Rgb> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Rgb> {
        self.0.lock().unwrap().last().copied()
    }
}

pub struct RecordingIndicator {
    log: IndicatorLog,
}

impl RecordingIndicator {
    pub fn new() -> (Self, IndicatorLog) {
        let log = IndicatorLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl Indicator for RecordingIndicator {
    fn set_color(&mut self, color: Rgb) -> Result<(), IndicatorError> {
        self.log.0.lock().unwrap().push(color);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LinkState {
    up: bool,
    connect_calls: usize,
    fail_next: Option<LinkError>,
}

#[derive(Debug, Clone)]
pub struct FakeLink(Arc<Mutex<LinkState>>);

impl FakeLink {
    pub fn down() -> Self {
        Self(Arc::default())
    }

    pub fn up() -> Self {
        let link = Self::down();
        link.set_up(true);
        link
    }

    pub fn set_up(&self, up: bool) {
        self.0.lock().unwrap().up = up;
    }

    pub fn fail_next_connect(&self, error: LinkError) {
        self.0.lock().unwrap().fail_next = Some(error);
    }

    pub fn connect_calls(&self) -> usize {
        self.0.lock().unwrap().connect_calls
    }
}

#[async_trait]
impl NetworkLink for FakeLink {
    async fn connect(&mut self, _ssid: &str, _password: &str) -> Result<(), LinkError> {
        let mut state = self.0.lock().unwrap();
        state.connect_calls += 1;
        if let Some(e) = state.fail_next.take() {
            return Err(e);
        }
        state.up = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.0.lock().unwrap().up
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    connected: bool,
    connect_calls: usize,
    reconnect_calls: usize,
    poll_timeouts: Vec<Duration>,
    subscriptions: Vec<(String, QoS)>,
    fail_next_connect: Option<BrokerError>,
    script: VecDeque<Result<Vec<BrokerEvent>, BrokerError>>,
}

/// Broker whose poll results are scripted up front.
///
/// Once the script runs dry `poll` waits out its timeout and returns nothing,
/// like a quiet topic.
#[derive(Debug, Clone)]
pub struct FakeBroker(Arc<Mutex<BrokerState>>);

impl FakeBroker {
    pub fn new() -> Self {
        Self(Arc::default())
    }

    pub fn fail_next_connect(&self, error: BrokerError) {
        self.0.lock().unwrap().fail_next_connect = Some(error);
    }

    pub fn drop_session(&self) {
        self.0.lock().unwrap().connected = false;
    }

    pub fn push_poll(&self, result: Result<Vec<BrokerEvent>, BrokerError>) {
        self.0.lock().unwrap().script.push_back(result);
    }

    pub fn push_message(&self, topic: &str, payload: &str) {
        self.push_poll(Ok(vec![BrokerEvent::Message {
            topic: topic.to_string(),
            payload: payload.to_string(),
        }]));
    }

    pub fn connect_calls(&self) -> usize {
        self.0.lock().unwrap().connect_calls
    }

    pub fn reconnect_calls(&self) -> usize {
        self.0.lock().unwrap().reconnect_calls
    }

    pub fn poll_calls(&self) -> usize {
        self.0.lock().unwrap().poll_timeouts.len()
    }

    pub fn poll_timeouts(&self) -> Vec<Duration> {
        self.0.lock().unwrap().poll_timeouts.clone()
    }

    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.0.lock().unwrap().subscriptions.clone()
    }

    fn open(&self) -> Result<(), BrokerError> {
        let mut state = self.0.lock().unwrap();
        if let Some(e) = state.fail_next_connect.take() {
            return Err(e);
        }
        state.connected = true;
        Ok(())
    }
}

#[async_trait]
impl Broker for FakeBroker {
    async fn connect(&mut self) -> Result<(), BrokerError> {
        self.0.lock().unwrap().connect_calls += 1;
        self.open()
    }

    fn is_connected(&self) -> bool {
        self.0.lock().unwrap().connected
    }

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), BrokerError> {
        self.0
            .lock()
            .unwrap()
            .subscriptions
            .push((topic.to_string(), qos));
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Vec<BrokerEvent>, BrokerError> {
        let next = {
            let mut state = self.0.lock().unwrap();
            state.poll_timeouts.push(timeout);
            state.script.pop_front()
        };
        match next {
            Some(Err(e)) => {
                self.0.lock().unwrap().connected = false;
                Err(e)
            }
            Some(Ok(events)) => Ok(events),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(Vec::new())
            }
        }
    }

    async fn reconnect(&mut self) -> Result<(), BrokerError> {
        self.0.lock().unwrap().reconnect_calls += 1;
        if self.is_connected() {
            return Ok(());
        }
        self.open()
    }
}
