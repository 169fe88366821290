//! Phase handlers - the work done in each state of an attempt.
//!
//! This module is split into submodules by phase:
//! - `dump`: break sequence, dump program, frame handling
//! - `write`: patching and paced write-back
//! - `control`: closing the session on success or failure

mod control;
mod dump;
mod write;

use crate::error::ProvisioningError;
use crate::events::{LogLevel, ProvisionEvent, ProvisionObserver};
use crate::protocol::CommandEmitter;
use crate::session::ProvisionConfig;
use crate::state::machine::{ProvisionMachine, ProvisionState};
use crate::transport::Transport;

pub use control::{handle_close, handle_failure};
pub use dump::{handle_frame, handle_start};
pub use write::{handle_patch, handle_write};

/// Result of handling a frame.
#[derive(Debug)]
pub enum HandleResult {
    /// Keep reading.
    Continue,
    /// Dump complete, frame delivery paused. Holds the raw payload.
    PayloadReady(Vec<u8>),
}

/// Handler context containing all resources of one attempt.
pub struct HandlerContext<'a, T: Transport + ?Sized, O: ProvisionObserver + ?Sized> {
    pub transport: &'a T,
    pub observer: &'a O,
    pub machine: &'a mut ProvisionMachine,
    pub config: &'a ProvisionConfig,
}

impl<'a, T: Transport + ?Sized, O: ProvisionObserver + ?Sized> HandlerContext<'a, T, O> {
    pub(crate) fn emit(&self, event: ProvisionEvent) {
        self.observer.on_event(&event);
    }

    pub(crate) fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(ProvisionEvent::Log {
            level,
            message: message.into(),
        });
    }

    /// Transition the machine and report it.
    pub(crate) fn goto(&mut self, to: ProvisionState) -> Result<(), ProvisioningError> {
        let from = self.machine.state();
        self.machine.goto_state(to)?;
        self.emit(ProvisionEvent::StateChanged { from, to });
        Ok(())
    }

    pub(crate) fn emitter(&self) -> CommandEmitter<'a, T> {
        let config: &'a ProvisionConfig = self.config;
        CommandEmitter::new(self.transport, config.remote_path.as_str())
    }
}
