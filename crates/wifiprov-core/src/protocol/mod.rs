//! Protocol module - the remote interpreter dialect.

pub mod commands;
pub mod constants;
pub mod writer;

pub use commands::{CommandEmitter, escape_literal};
pub use constants::*;
pub use writer::ChunkedWriter;
