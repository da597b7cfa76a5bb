//! Wireless link collaborator.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

const SYSFS_NET: &str = "/sys/class/net";

#[derive(Debug, Error)]
pub enum LinkError {
    /// The tool used to manage the link cannot be run at all.
    #[error("link manager unavailable: {0}")]
    Unavailable(#[source] std::io::Error),

    #[error("failed to join {ssid:?}: {reason}")]
    Association { ssid: String, reason: String },

    #[error("joining the network timed out after {0:?}")]
    Timeout(Duration),

    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Whether retrying can never succeed without a configuration change.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::Unavailable(_))
    }
}

/// Narrow interface to the wireless radio.
///
/// `connect` must return within a bounded time; the main loop has no way to
/// cancel it.
#[async_trait]
pub trait NetworkLink: Send {
    async fn connect(&mut self, ssid: &str, password: &str) -> Result<(), LinkError>;

    fn is_connected(&self) -> bool;
}

/// Reads `<root>/<iface>/operstate`.
fn interface_up(root: &std::path::Path, interface: &str) -> bool {
    std::fs::read_to_string(root.join(interface).join("operstate"))
        .map(|state| state.trim() == "up")
        .unwrap_or(false)
}

/// Joins Wi-Fi networks through NetworkManager's `nmcli`.
pub struct NmcliLink {
    interface: String,
    timeout: Duration,
    sysfs: PathBuf,
}

impl NmcliLink {
    pub fn new(interface: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interface: interface.into(),
            timeout,
            sysfs: PathBuf::from(SYSFS_NET),
        }
    }
}

#[async_trait]
impl NetworkLink for NmcliLink {
    async fn connect(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        if self.is_connected() {
            debug!("{} already up", self.interface);
            return Ok(());
        }

        info!("Joining {:?} on {}", ssid, self.interface);
        let mut cmd = Command::new("nmcli");
        cmd.args(["device", "wifi", "connect", ssid]);
        if !password.is_empty() {
            cmd.args(["password", password]);
        }
        cmd.args(["ifname", self.interface.as_str()]).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => return Err(LinkError::Timeout(self.timeout)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LinkError::Unavailable(e))
            }
            Ok(result) => result?,
        };

        if output.status.success() {
            info!("Joined {:?}", ssid);
            Ok(())
        } else {
            Err(LinkError::Association {
                ssid: ssid.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn is_connected(&self) -> bool {
        interface_up(&self.sysfs, &self.interface)
    }
}

/// Link managed by the host (wired, or Wi-Fi configured elsewhere).
///
/// Never joins anything itself, it only reports the interface state.
pub struct StaticLink {
    interface: String,
    sysfs: PathBuf,
}

impl StaticLink {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            sysfs: PathBuf::from(SYSFS_NET),
        }
    }
}

#[async_trait]
impl NetworkLink for StaticLink {
    async fn connect(&mut self, _ssid: &str, _password: &str) -> Result<(), LinkError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(LinkError::Association {
                ssid: self.interface.clone(),
                reason: "interface is down".to_string(),
            })
        }
    }

    fn is_connected(&self) -> bool {
        interface_up(&self.sysfs, &self.interface)
    }
}
