//! Event system for UI decoupling.
//!
//! Allows a CLI or GUI to follow a provisioning attempt without tight
//! coupling to the core logic.

use std::fmt;

use crate::state::ProvisionState;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
}

/// Events emitted by a provisioning session.
#[derive(Debug, Clone)]
pub enum ProvisionEvent {
    /// Transport session opened.
    TransportOpened { port: String },
    /// Transport session closed.
    TransportClosed { port: String },
    /// State changed.
    StateChanged {
        from: ProvisionState,
        to: ProvisionState,
    },
    /// The dumped document is complete.
    PayloadAssembled { len: usize },
    /// Write-back progress.
    Progress {
        operation: String,
        current: u64,
        total: u64,
    },
    /// Log message.
    Log { level: LogLevel, message: String },
    /// Bytes sent/received on the transport.
    Packet {
        direction: PacketDirection,
        length: usize,
        data: Option<Vec<u8>>,
    },
    /// The attempt failed.
    Failed { message: String },
    /// The attempt completed successfully.
    Complete,
}

/// Serial data direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Host -> Device
    Rx, // Device -> Host
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Observer trait for receiving provisioning events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait ProvisionObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &ProvisionEvent);
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl ProvisionObserver for TracingObserver {
    fn on_event(&self, event: &ProvisionEvent) {
        match event {
            ProvisionEvent::TransportOpened { port } => {
                tracing::info!(port = %port, "Transport opened");
            }
            ProvisionEvent::TransportClosed { port } => {
                tracing::debug!(port = %port, "Transport closed");
            }
            ProvisionEvent::StateChanged { from, to } => {
                tracing::debug!(from = %from, to = %to, "State changed");
            }
            ProvisionEvent::PayloadAssembled { len } => {
                tracing::info!(len, "Config dump received");
            }
            ProvisionEvent::Progress {
                operation,
                current,
                total,
            } => {
                let pct = if *total > 0 {
                    (*current * 100) / *total
                } else {
                    100
                };
                tracing::debug!(operation = %operation, progress = %format!("{}%", pct), "Progress");
            }
            ProvisionEvent::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
            },
            ProvisionEvent::Packet {
                direction, length, ..
            } => {
                tracing::trace!(dir = %direction, len = length, "Serial data");
            }
            ProvisionEvent::Failed { message } => {
                tracing::error!("Provisioning failed: {}", message);
            }
            ProvisionEvent::Complete => {
                tracing::info!("Provisioning complete");
            }
        }
    }
}

/// Observer that keeps every event, for tests and simple front ends.
#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<ProvisionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProvisionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// States entered, in order.
    pub fn states(&self) -> Vec<ProvisionState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProvisionEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }
}

impl ProvisionObserver for RecordingObserver {
    fn on_event(&self, event: &ProvisionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
