//! Channel adapter trait and shared adapter plumbing

use super::message::{InboundEvent, OutboundResponse};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc;

/// Adapter lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl AdapterStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Events emitted by channel adapters
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Adapter connected to its platform
    Connected { channel: String },
    /// Adapter lost its connection
    Disconnected { channel: String, reason: String },
    /// A user event arrived
    Event(InboundEvent),
    /// A non-fatal adapter error
    Error { channel: String, error: String },
}

/// Common state shared by all adapters
pub struct AdapterBase {
    name: String,
    status: AtomicU8,
}

impl AdapterBase {
    /// Create base state for a named adapter
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: AtomicU8::new(AdapterStatus::Stopped as u8),
        }
    }

    /// Adapter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current status
    pub fn status(&self) -> AdapterStatus {
        AdapterStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Set status
    pub fn set_status(&self, status: AdapterStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    /// Whether the adapter is running
    pub fn is_running(&self) -> bool {
        self.status() == AdapterStatus::Running
    }
}

/// A messaging platform adapter
///
/// Adapters deliver user input as `ChannelEvent::Event`s over the mpsc
/// sender handed to `start`, and render engine responses back out.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Adapter name, used as the channel key
    fn name(&self) -> &str;

    /// Start delivering events; returns once the adapter is running
    async fn start(&self, event_tx: mpsc::Sender<ChannelEvent>) -> Result<()>;

    /// Stop the adapter
    async fn stop(&self) -> Result<()>;

    /// Send a response to a chat; returns a platform message id
    async fn send_response(&self, chat_id: &str, response: &OutboundResponse) -> Result<String>;

    /// Whether the adapter is currently connected
    fn is_connected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_base_status_transitions() {
        let base = AdapterBase::new("test");
        assert_eq!(base.status(), AdapterStatus::Stopped);
        assert!(!base.is_running());

        base.set_status(AdapterStatus::Starting);
        assert_eq!(base.status(), AdapterStatus::Starting);

        base.set_status(AdapterStatus::Running);
        assert!(base.is_running());

        base.set_status(AdapterStatus::Stopped);
        assert!(!base.is_running());
    }

    #[test]
    fn test_adapter_base_name() {
        let base = AdapterBase::new("telegram");
        assert_eq!(base.name(), "telegram");
    }
}
