//! Mock serial transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::traits::{Transport, TransportError};

#[derive(Debug, Default)]
struct MockState {
    /// Frames handed out by `read`, in order.
    frames: VecDeque<Vec<u8>>,
    /// Captured writes.
    writes: Vec<Vec<u8>>,
    /// When each captured write arrived.
    write_times: Vec<Instant>,
    /// Writes accepted before the link drops.
    writes_before_disconnect: Option<usize>,
    /// Whether the device is "connected".
    connected: bool,
    /// Whether `close` was called.
    closed: bool,
    paused: bool,
    close_calls: usize,
}

impl MockState {
    /// Drop the link once the write budget is used up.
    fn check_link(&mut self) {
        if let Some(limit) = self.writes_before_disconnect
            && self.writes.len() >= limit
        {
            self.connected = false;
        }
    }
}

/// Mock transport for unit testing the provisioning flow.
///
/// Clones share state, so a test can keep a handle for inspection while the
/// session owns another.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    name: String,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                connected: true,
                ..Default::default()
            })),
            name: "mock".to_string(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a frame to be returned on a later read.
    pub fn queue_frame(&self, frame: impl AsRef<[u8]>) {
        self.lock().frames.push_back(frame.as_ref().to_vec());
    }

    /// Queue every frame from an iterator.
    pub fn queue_frames<I, F>(&self, frames: I)
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        let mut state = self.lock();
        for frame in frames {
            state.frames.push_back(frame.as_ref().to_vec());
        }
    }

    /// Frames not yet delivered.
    pub fn pending_frames(&self) -> usize {
        self.lock().frames.len()
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Arrival time of each captured write.
    pub fn write_times(&self) -> Vec<Instant> {
        self.lock().write_times.clone()
    }

    /// All captured writes as text, one entry per write.
    pub fn written_lines(&self) -> Vec<String> {
        self.lock()
            .writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// Simulate the device going away.
    pub fn disconnect(&self) {
        self.lock().connected = false;
    }

    /// Drop the link once `count` further writes have been accepted.
    pub fn disconnect_after_writes(&self, count: usize) {
        let mut state = self.lock();
        state.writes_before_disconnect = Some(state.writes.len() + count);
    }

    /// Whether `close` has been called at least once.
    pub fn was_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of `close` calls made.
    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.check_link();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        state.writes.push(data.to_vec());
        state.write_times.push(Instant::now());
        Ok(data.len())
    }

    fn read(&self, _max_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.check_link();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        if state.paused {
            return Ok(Vec::new());
        }
        state
            .frames
            .pop_front()
            .ok_or(TransportError::Timeout { timeout_ms: 0 })
    }

    fn pause(&self) {
        self.lock().paused = true;
    }

    fn resume(&self) {
        self.lock().paused = false;
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn close(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.close_calls += 1;
        state.closed = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        let state = self.lock();
        !state.closed && state.connected
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_frame_queue() {
        let mock = MockTransport::new();
        mock.queue_frame(b"abc");
        mock.queue_frame(b"def");

        assert_eq!(mock.read(64).unwrap(), b"abc");
        assert_eq!(mock.read(64).unwrap(), b"def");

        // Queue is empty now
        assert!(matches!(
            mock.read(64),
            Err(TransportError::Timeout { .. })
        ));
    }

    #[test]
    fn test_mock_write_capture() {
        let mock = MockTransport::new();
        mock.write(b"Hello").unwrap();
        mock.write(b"World").unwrap();

        let writes = mock.get_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], b"Hello");
        assert_eq!(writes[1], b"World");
    }

    #[test]
    fn test_mock_pause_holds_frames() {
        let mock = MockTransport::new();
        mock.queue_frame(b"held");
        mock.pause();
        assert!(mock.read(64).unwrap().is_empty());
        assert_eq!(mock.pending_frames(), 1);

        mock.resume();
        assert_eq!(mock.read(64).unwrap(), b"held");
    }

    #[test]
    fn test_mock_disconnect_after_writes() {
        let mock = MockTransport::new();
        mock.disconnect_after_writes(1);
        assert!(mock.write(b"one").is_ok());
        assert!(matches!(
            mock.write(b"two"),
            Err(TransportError::Disconnected)
        ));
        assert!(!mock.is_open());
    }

    #[test]
    fn test_mock_close_is_idempotent() {
        let mock = MockTransport::new();
        assert!(mock.close().is_ok());
        assert!(mock.close().is_ok());
        assert_eq!(mock.close_calls(), 2);
        assert!(mock.write(b"late").is_err());
    }
}
