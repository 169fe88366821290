//! wifiprov-core: Wi-Fi provisioning over a device's serial REPL.
//!
//! The device keeps its settings in a JSON file and exposes nothing but an
//! interactive interpreter on its serial port. This crate interrupts the
//! running program, has the interpreter dump the file, reassembles the dump
//! from the unframed output, patches the document and writes it back one
//! paced statement at a time.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Transport**: serial byte channel abstraction (serialport, mock)
//! - **Protocol**: interpreter dialect, command emitter, chunked writer
//! - **Assembler**: payload extraction from REPL output
//! - **Payload**: config document patching and write plans
//! - **State**: state machine and phase handlers
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: High-level orchestrator
//!
//! # Example
//!
//! ```no_run
//! use wifiprov_core::session::{ProvisionConfig, ProvisionSession};
//!
//! let session = ProvisionSession::new(ProvisionConfig::default());
//! session
//!     .provision("/dev/ttyUSB0", "office", "secret")
//!     .expect("provisioning failed");
//! ```

pub mod assembler;
pub mod error;
pub mod events;
pub mod payload;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use assembler::{AssemblyBuffer, AssemblyResult, StreamAssembler};
pub use error::ProvisioningError;
pub use events::{LogLevel, ProvisionEvent, ProvisionObserver, RecordingObserver, TracingObserver};
pub use payload::{ConfigDocument, ConfigEdit, PatchError, WritePlan, patch};
pub use protocol::{ChunkedWriter, CommandEmitter};
pub use session::{ProvisionConfig, ProvisionSession};
pub use state::{ProvisionMachine, ProvisionState, Query};
pub use transport::{MockTransport, SerialPortTransport, Transport, TransportError};

/// Provision one network on the device behind `port` with default settings.
pub fn provision(port: &str, network: &str, credential: &str) -> Result<(), ProvisioningError> {
    ProvisionSession::new(ProvisionConfig::default()).provision(port, network, credential)
}
