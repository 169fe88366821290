//! State machine module.

pub mod handlers;
pub mod machine;

pub use handlers::{HandleResult, HandlerContext};
pub use machine::{FrameStep, ProvisionMachine, ProvisionState, Query};
