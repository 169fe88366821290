//! Patch and write-back phase.

use tracing::{debug, info};

use super::HandlerContext;
use crate::error::ProvisioningError;
use crate::events::{LogLevel, ProvisionEvent, ProvisionObserver};
use crate::payload::ConfigDocument;
use crate::protocol::ChunkedWriter;
use crate::state::machine::ProvisionState;
use crate::transport::Transport;

/// Parse the payload and apply the attempt's edit, if any.
pub fn handle_patch<T: Transport + ?Sized, O: ProvisionObserver + ?Sized>(
    ctx: &mut HandlerContext<'_, T, O>,
    payload: &[u8],
) -> Result<ConfigDocument, ProvisioningError> {
    let mut doc = ConfigDocument::parse_bytes(payload)?;
    debug!(keys = doc.keys().count(), networks = doc.wifis().len(), "Parsed device config");

    if let Some(edit) = ctx.machine.edit() {
        doc.apply(edit)?;
        ctx.log(LogLevel::Info, format!("Applied edit: {edit}"));
    }
    Ok(doc)
}

/// Patching -> Writing -> Closing.
///
/// Opens the remote file for writing and streams the document through the
/// chunked writer, which also closes the remote file.
pub fn handle_write<T: Transport + ?Sized, O: ProvisionObserver + ?Sized>(
    ctx: &mut HandlerContext<'_, T, O>,
    doc: &ConfigDocument,
) -> Result<usize, ProvisioningError> {
    let serialized = doc.to_json_string()?;
    ctx.goto(ProvisionState::Writing)?;

    let emitter = ctx.emitter();
    emitter
        .send_open_for_write()
        .map_err(ProvisioningError::TransportWrite)?;

    let writer = ChunkedWriter::new(
        &emitter,
        ctx.config.fragment_size,
        ctx.config.fragment_delay(),
    );
    let observer = ctx.observer;
    let fragments = writer
        .write(&serialized, |current, total| {
            observer.on_event(&ProvisionEvent::Progress {
                operation: "Write config".to_string(),
                current: current as u64,
                total: total as u64,
            });
        })
        .map_err(ProvisioningError::TransportWrite)?;

    info!(fragments, bytes = serialized.len(), "Config written back");
    ctx.goto(ProvisionState::Closing)?;
    Ok(fragments)
}
