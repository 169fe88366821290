//! Dump phase: interrupt the device, request the config and collect it.

use tracing::{debug, info};

use super::{HandleResult, HandlerContext};
use crate::error::ProvisioningError;
use crate::events::{LogLevel, ProvisionEvent, ProvisionObserver};
use crate::protocol::writer::suspend;
use crate::state::machine::{FrameStep, ProvisionState, Query};
use crate::transport::Transport;

/// Interrupting -> AwaitingDump.
///
/// Waits for boot output to settle, stops the running program and sends the
/// program for the attempt's query. Does not wait for any answer.
pub fn handle_start<T: Transport + ?Sized, O: ProvisionObserver + ?Sized>(
    ctx: &mut HandlerContext<'_, T, O>,
) -> Result<(), ProvisioningError> {
    let warmup = ctx.config.warmup();
    info!(warmup_ms = warmup.as_millis() as u64, "Waiting for boot output to settle");
    suspend(warmup);

    let emitter = ctx.emitter();
    emitter
        .send_interrupt()
        .map_err(ProvisioningError::TransportWrite)?;
    match ctx.machine.query() {
        Query::ConfigFile => {
            emitter
                .send_dump_program()
                .map_err(ProvisioningError::TransportWrite)?;
            ctx.log(
                LogLevel::Debug,
                format!("Requested dump of {}", ctx.config.remote_path),
            );
        }
        Query::NetworkScan => {
            emitter
                .send_scan_program()
                .map_err(ProvisioningError::TransportWrite)?;
            ctx.log(LogLevel::Debug, "Requested network scan");
        }
    }

    ctx.goto(ProvisionState::AwaitingDump)
}

/// Feed one received frame to the machine.
///
/// On completion the transport is paused before the payload is handed back,
/// so nothing read later can mix with the write-back traffic.
pub fn handle_frame<T: Transport + ?Sized, O: ProvisionObserver + ?Sized>(
    ctx: &mut HandlerContext<'_, T, O>,
    frame: &[u8],
) -> Result<HandleResult, ProvisioningError> {
    let before = ctx.machine.state();
    let step = ctx.machine.on_frame(frame)?;
    let after = ctx.machine.state();

    if before == ProvisionState::AwaitingDump && after == ProvisionState::Patching {
        ctx.emit(ProvisionEvent::StateChanged {
            from: before,
            to: ProvisionState::Receiving,
        });
        ctx.emit(ProvisionEvent::StateChanged {
            from: ProvisionState::Receiving,
            to: after,
        });
    } else if before != after {
        ctx.emit(ProvisionEvent::StateChanged {
            from: before,
            to: after,
        });
    }

    match step {
        FrameStep::Continue => {
            debug!(
                buffered = ctx.machine.assembler().buffer().len(),
                "Waiting for end of dump"
            );
            Ok(HandleResult::Continue)
        }
        FrameStep::PayloadReady(payload) => {
            ctx.transport.pause();
            info!(len = payload.len(), "Config dump complete");
            ctx.emit(ProvisionEvent::PayloadAssembled { len: payload.len() });
            Ok(HandleResult::PayloadReady(payload))
        }
    }
}
