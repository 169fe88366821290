//! State machine implementation for the provisioning flow.

use std::fmt;

use crate::assembler::{AssemblyResult, StreamAssembler};
use crate::error::ProvisioningError;
use crate::payload::ConfigEdit;

/// Phase of a provisioning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvisionState {
    /// Nothing started yet.
    #[default]
    Idle,
    /// Transport open, waiting out boot output before the break sequence.
    Interrupting,
    /// Dump program sent, no document bytes seen yet.
    AwaitingDump,
    /// Document bytes are being accumulated.
    Receiving,
    /// Payload complete, frame delivery paused, document being edited.
    Patching,
    /// Fragments are being written back.
    Writing,
    /// Remote file closed, waiting for the last statement to run.
    Closing,
    /// Attempt succeeded.
    Done,
    /// Attempt failed.
    Failed,
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionState::Idle => write!(f, "IDLE"),
            ProvisionState::Interrupting => write!(f, "INTERRUPTING"),
            ProvisionState::AwaitingDump => write!(f, "AWAITING_DUMP"),
            ProvisionState::Receiving => write!(f, "RECEIVING"),
            ProvisionState::Patching => write!(f, "PATCHING"),
            ProvisionState::Writing => write!(f, "WRITING"),
            ProvisionState::Closing => write!(f, "CLOSING"),
            ProvisionState::Done => write!(f, "DONE"),
            ProvisionState::Failed => write!(f, "FAILED"),
        }
    }
}

impl ProvisionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisionState::Done | ProvisionState::Failed)
    }

    /// Whether frames from the transport are consumed in this state.
    pub fn accepts_frames(&self) -> bool {
        matches!(self, ProvisionState::AwaitingDump | ProvisionState::Receiving)
    }

    pub fn can_transition_to(&self, to: ProvisionState) -> bool {
        use ProvisionState::*;
        match (self, to) {
            (Idle, Interrupting)
            | (Interrupting, AwaitingDump)
            | (AwaitingDump, Receiving)
            | (Receiving, Patching)
            | (Patching, Writing)
            | (Patching, Closing)
            | (Writing, Closing)
            | (Closing, Done) => true,
            (from, Failed) => *from != Idle && !from.is_terminal(),
            _ => false,
        }
    }
}

/// What the device is asked to print once interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Query {
    /// The stored config file.
    #[default]
    ConfigFile,
    /// SSIDs of the access points in range.
    NetworkScan,
}

/// Result of feeding a frame to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStep {
    /// Keep delivering frames.
    Continue,
    /// Dump complete; the machine is now in `Patching`.
    PayloadReady(Vec<u8>),
}

/// Per-attempt machine state.
///
/// Owns the assembler for the single dump of this attempt. Transitions are
/// synchronous and free of I/O so the flow can be driven by feeding frames
/// directly.
#[derive(Debug, Default)]
pub struct ProvisionMachine {
    state: ProvisionState,
    assembler: StreamAssembler,
    query: Query,
    edit: Option<ConfigEdit>,
}

impl ProvisionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProvisionState {
        self.state
    }

    pub fn query(&self) -> Query {
        self.query
    }

    /// The edit recorded by `begin`; `None` for a read-only attempt.
    pub fn edit(&self) -> Option<&ConfigEdit> {
        self.edit.as_ref()
    }

    pub fn assembler(&self) -> &StreamAssembler {
        &self.assembler
    }

    /// Transition to a new state.
    pub fn goto_state(&mut self, to: ProvisionState) -> Result<(), ProvisioningError> {
        if !self.state.can_transition_to(to) {
            return Err(ProvisioningError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::info!(from = %self.state, to = %to, "State transition");
        self.state = to;
        Ok(())
    }

    /// Move to `Failed` unless the attempt already ended.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            tracing::info!(from = %self.state, to = %ProvisionState::Failed, "State transition");
            self.state = ProvisionState::Failed;
        }
    }

    /// `Idle -> Interrupting` for a config dump, with an optional edit.
    pub fn begin(&mut self, edit: Option<ConfigEdit>) -> Result<(), ProvisioningError> {
        self.begin_query(Query::ConfigFile, edit)
    }

    /// `Idle -> Interrupting`: record the request and start a fresh dump buffer.
    ///
    /// A network scan never writes anything back, so its edit is dropped.
    pub fn begin_query(
        &mut self,
        query: Query,
        edit: Option<ConfigEdit>,
    ) -> Result<(), ProvisioningError> {
        self.goto_state(ProvisionState::Interrupting)?;
        self.query = query;
        self.edit = match query {
            Query::ConfigFile => edit,
            Query::NetworkScan => None,
        };
        self.assembler.reset();
        Ok(())
    }

    /// Feed one frame while waiting for or receiving the dump.
    pub fn on_frame(&mut self, frame: &[u8]) -> Result<FrameStep, ProvisioningError> {
        if !self.state.accepts_frames() {
            return Err(ProvisioningError::InvalidTransition {
                from: self.state,
                to: ProvisionState::Receiving,
            });
        }

        match self.assembler.on_frame(frame) {
            AssemblyResult::Pending => {
                if self.state == ProvisionState::AwaitingDump && !self.assembler.buffer().is_empty()
                {
                    self.goto_state(ProvisionState::Receiving)?;
                }
                Ok(FrameStep::Continue)
            }
            AssemblyResult::Complete(payload) => {
                if self.state == ProvisionState::AwaitingDump {
                    self.goto_state(ProvisionState::Receiving)?;
                }
                self.goto_state(ProvisionState::Patching)?;
                Ok(FrameStep::PayloadReady(payload))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn awaiting_dump() -> ProvisionMachine {
        let mut machine = ProvisionMachine::new();
        machine
            .begin(Some(ConfigEdit::upsert_wifi("home", "pw")))
            .unwrap();
        machine.goto_state(ProvisionState::AwaitingDump).unwrap();
        machine
    }

    #[test]
    fn test_initial_state() {
        let machine = ProvisionMachine::new();
        assert_eq!(machine.state(), ProvisionState::Idle);
        assert!(machine.edit().is_none());
    }

    #[test]
    fn test_noise_keeps_awaiting_dump() {
        let mut machine = awaiting_dump();
        assert_eq!(machine.on_frame(b">>> ").unwrap(), FrameStep::Continue);
        assert_eq!(machine.state(), ProvisionState::AwaitingDump);
    }

    #[test]
    fn test_first_document_bytes_enter_receiving() {
        let mut machine = awaiting_dump();
        assert_eq!(machine.on_frame(b"{\"wifis\"").unwrap(), FrameStep::Continue);
        assert_eq!(machine.state(), ProvisionState::Receiving);

        let step = machine.on_frame(b":{}}\r\n>>> ").unwrap();
        assert_eq!(step, FrameStep::PayloadReady(b"{\"wifis\":{}}\r\n".to_vec()));
        assert_eq!(machine.state(), ProvisionState::Patching);
    }

    #[test]
    fn test_single_frame_dump_passes_through_receiving() {
        let mut machine = awaiting_dump();
        let step = machine.on_frame(b"{}>").unwrap();
        assert_eq!(step, FrameStep::PayloadReady(b"{}".to_vec()));
        assert_eq!(machine.state(), ProvisionState::Patching);
    }

    #[test]
    fn test_frames_rejected_outside_dump() {
        let mut machine = ProvisionMachine::new();
        assert!(matches!(
            machine.on_frame(b"{}"),
            Err(ProvisioningError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_scan_query_is_read_only() {
        let mut machine = ProvisionMachine::new();
        machine
            .begin_query(Query::NetworkScan, Some(ConfigEdit::upsert_wifi("a", "b")))
            .unwrap();
        assert_eq!(machine.query(), Query::NetworkScan);
        assert!(machine.edit().is_none());
        assert_eq!(machine.state(), ProvisionState::Interrupting);
    }

    #[test]
    fn test_second_begin_rejected() {
        let mut machine = awaiting_dump();
        assert!(machine.begin(None).is_err());
    }

    #[test]
    fn test_transition_table() {
        use ProvisionState::*;
        assert!(Idle.can_transition_to(Interrupting));
        assert!(!Idle.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Writing));
        assert!(Writing.can_transition_to(Failed));
        assert!(Patching.can_transition_to(Closing));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Idle));
    }

    #[test]
    fn test_fail_is_sticky() {
        let mut machine = awaiting_dump();
        machine.fail();
        assert_eq!(machine.state(), ProvisionState::Failed);
        machine.fail();
        assert_eq!(machine.state(), ProvisionState::Failed);
        assert!(machine.goto_state(ProvisionState::Done).is_err());
    }
}
