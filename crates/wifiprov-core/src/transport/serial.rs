//! serialport-based transport implementation.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info, instrument};

use super::traits::{Transport, TransportError};

/// Serial port transport.
///
/// The port handle lives behind a mutex so the transport can be shared by
/// reference; `close` drops the handle and later calls report `Closed`.
pub struct SerialPortTransport {
    port: Mutex<Option<Box<dyn SerialPort>>>,
    name: String,
    read_timeout: Duration,
    paused: AtomicBool,
}

impl SerialPortTransport {
    /// Open `port_name` at `baud_rate`, 8N1 without flow control.
    #[instrument(level = "info", fields(read_timeout_ms = read_timeout.as_millis() as u64))]
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(|e| TransportError::OpenFailed {
                port: port_name.to_string(),
                message: e.to_string(),
            })?;

        info!(port = %port_name, baud_rate, "Serial port opened");

        Ok(Self {
            port: Mutex::new(Some(port)),
            name: port_name.to_string(),
            read_timeout,
            paused: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn SerialPort>>> {
        self.port.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for SerialPortTransport {
    #[instrument(skip(self, data), fields(len = data.len()))]
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let mut guard = self.lock();
        let port = guard.as_mut().ok_or(TransportError::Closed)?;

        port.write_all(data)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        port.flush()
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        debug!(bytes_written = data.len(), "Write complete");
        Ok(data.len())
    }

    #[instrument(level = "trace", skip(self))]
    fn read(&self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        if self.is_paused() {
            std::thread::sleep(self.read_timeout);
            return Ok(Vec::new());
        }

        let mut guard = self.lock();
        let port = guard.as_mut().ok_or(TransportError::Closed)?;
        let mut buf = vec![0u8; max_len];

        match port.read(&mut buf) {
            Ok(0) => Ok(Vec::new()),
            Ok(n) => {
                buf.truncate(n);
                debug!(bytes_read = n, "Read complete");
                Ok(buf)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(TransportError::Timeout {
                timeout_ms: self.read_timeout.as_millis() as u64,
            }),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Err(TransportError::Disconnected),
            Err(e) => Err(TransportError::ReadFailed(e.to_string())),
        }
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn close(&self) -> Result<(), TransportError> {
        if let Some(port) = self.lock().take() {
            drop(port);
            info!(port = %self.name, "Serial port closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
