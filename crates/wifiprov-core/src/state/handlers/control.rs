//! Control flow handlers (close, done, failure).

use tracing::{info, warn};

use super::HandlerContext;
use crate::error::ProvisioningError;
use crate::events::{ProvisionEvent, ProvisionObserver};
use crate::state::machine::ProvisionState;
use crate::transport::Transport;

fn close_transport<T: Transport + ?Sized, O: ProvisionObserver + ?Sized>(
    ctx: &HandlerContext<'_, T, O>,
) {
    if let Err(e) = ctx.transport.close() {
        warn!(error = %e, "Closing transport failed");
    }
    ctx.emit(ProvisionEvent::TransportClosed {
        port: ctx.transport.name().to_string(),
    });
}

/// Closing -> Done. A read-only attempt arrives here from `Patching`.
pub fn handle_close<T: Transport + ?Sized, O: ProvisionObserver + ?Sized>(
    ctx: &mut HandlerContext<'_, T, O>,
) -> Result<(), ProvisioningError> {
    if ctx.machine.state() == ProvisionState::Patching {
        ctx.goto(ProvisionState::Closing)?;
    }
    close_transport(ctx);
    ctx.goto(ProvisionState::Done)?;
    info!("Provisioning attempt finished");
    ctx.emit(ProvisionEvent::Complete);
    Ok(())
}

/// Any state -> Failed. Always releases the transport.
pub fn handle_failure<T: Transport + ?Sized, O: ProvisionObserver + ?Sized>(
    ctx: &mut HandlerContext<'_, T, O>,
    err: &ProvisioningError,
) {
    let from = ctx.machine.state();
    ctx.machine.fail();
    if from != ProvisionState::Failed {
        ctx.emit(ProvisionEvent::StateChanged {
            from,
            to: ProvisionState::Failed,
        });
    }
    close_transport(ctx);
    ctx.emit(ProvisionEvent::Failed {
        message: err.to_string(),
    });
}
