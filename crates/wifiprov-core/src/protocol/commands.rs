//! Remote command emitter.
//!
//! Formats interpreter statements and writes each one to the transport as a
//! single write. Nothing here waits for the device to answer.

use std::borrow::Cow;

use tracing::{debug, trace};

use super::constants::{BREAK_SEQUENCE, DUMP_READ_SIZE, LINE_ENDING, QUOTE, SSIDS_KEY};
use crate::transport::{Transport, TransportError};

/// Escape a fragment for use inside a single-quoted literal.
///
/// The device must end up with the fragment's exact bytes, so backslashes and
/// the delimiter are escaped. Fragments never contain raw line breaks since
/// the document is serialized compactly.
pub fn escape_literal(fragment: &str) -> Cow<'_, str> {
    if !fragment.contains(['\\', QUOTE]) {
        return Cow::Borrowed(fragment);
    }
    let mut escaped = String::with_capacity(fragment.len() + 8);
    for c in fragment.chars() {
        if c == '\\' || c == QUOTE {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Program that streams `path` to stdout in `DUMP_READ_SIZE` increments.
///
/// The REPL auto-indents after a line ending in `:`, so the lines carry no
/// indentation of their own. The trailing empty lines close the blocks and
/// run the program.
pub fn dump_program(path: &str) -> String {
    let lines = [
        "import sys".to_string(),
        format!("with open({QUOTE}{}{QUOTE}, 'rb') as infile:", escape_literal(path)),
        "while True:".to_string(),
        format!("result = infile.read({DUMP_READ_SIZE})"),
        "len = sys.stdout.write(result)".to_string(),
        "if len == 0:".to_string(),
        "break".to_string(),
        String::new(),
        String::new(),
        String::new(),
    ];
    let mut program = lines.join(LINE_ENDING);
    program.push_str(LINE_ENDING);
    program
}

/// Program that scans for access points and prints their SSIDs as a JSON
/// object under `SSIDS_KEY`.
///
/// The REPL echoes every line, so the program text avoids both payload
/// markers; `dict(...)` stands in for a brace literal.
pub fn scan_program() -> String {
    let lines = [
        "import network".to_string(),
        "import json".to_string(),
        "wlan = network.WLAN(network.STA_IF)".to_string(),
        "wlan.active(True)".to_string(),
        format!("print(json.dumps(dict({SSIDS_KEY}=[n[0].decode() for n in wlan.scan()])))"),
    ];
    let mut program = lines.join(LINE_ENDING);
    program.push_str(LINE_ENDING);
    program
}

pub fn open_for_write_statement(path: &str) -> String {
    format!(
        "f = open({QUOTE}{}{QUOTE}, 'w'){LINE_ENDING}",
        escape_literal(path)
    )
}

pub fn write_statement(fragment: &str) -> String {
    format!(
        "f.write({QUOTE}{}{QUOTE}){LINE_ENDING}",
        escape_literal(fragment)
    )
}

pub fn close_statement() -> String {
    format!("f.close(){LINE_ENDING}")
}

/// Sends interpreter commands over a borrowed transport.
pub struct CommandEmitter<'a, T: Transport + ?Sized> {
    transport: &'a T,
    remote_path: &'a str,
}

impl<'a, T: Transport + ?Sized> CommandEmitter<'a, T> {
    pub fn new(transport: &'a T, remote_path: &'a str) -> Self {
        Self {
            transport,
            remote_path,
        }
    }

    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.transport.write(bytes)?;
        Ok(())
    }

    /// Interrupt the running program.
    pub fn send_interrupt(&self) -> Result<(), TransportError> {
        debug!("Sending break sequence");
        self.send(BREAK_SEQUENCE)
    }

    pub fn send_dump_program(&self) -> Result<(), TransportError> {
        debug!(path = %self.remote_path, "Sending dump program");
        self.send(dump_program(self.remote_path).as_bytes())
    }

    pub fn send_scan_program(&self) -> Result<(), TransportError> {
        debug!("Sending network scan program");
        self.send(scan_program().as_bytes())
    }

    pub fn send_open_for_write(&self) -> Result<(), TransportError> {
        debug!(path = %self.remote_path, "Opening remote file for write");
        self.send(open_for_write_statement(self.remote_path).as_bytes())
    }

    pub fn send_write_statement(&self, fragment: &str) -> Result<(), TransportError> {
        trace!(len = fragment.len(), "Sending write statement");
        self.send(write_statement(fragment).as_bytes())
    }

    pub fn send_close_statement(&self) -> Result<(), TransportError> {
        debug!("Closing remote file");
        self.send(close_statement().as_bytes())
    }
}
