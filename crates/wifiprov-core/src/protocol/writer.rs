//! Paced, fragment-by-fragment write-back.
//!
//! The remote interpreter executes and echoes one statement before it reads
//! the next and there is no flow control, so every statement is followed by a
//! fixed delay.

use std::thread;
use std::time::Duration;

use tracing::{debug, instrument};

use super::commands::CommandEmitter;
use crate::payload::WritePlan;
use crate::transport::{Transport, TransportError};

/// Sleep for `delay`; zero returns immediately.
pub(crate) fn suspend(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// Writes a serialized document through `f.write(...)` statements.
pub struct ChunkedWriter<'e, 'a, T: Transport + ?Sized> {
    emitter: &'e CommandEmitter<'a, T>,
    fragment_size: usize,
    delay: Duration,
}

impl<'e, 'a, T: Transport + ?Sized> ChunkedWriter<'e, 'a, T> {
    pub fn new(emitter: &'e CommandEmitter<'a, T>, fragment_size: usize, delay: Duration) -> Self {
        Self {
            emitter,
            fragment_size,
            delay,
        }
    }

    /// Send every fragment of `text` in order, then the close statement.
    ///
    /// `on_fragment` is called with `(sent, total)` after each fragment.
    /// Returns the number of fragments sent.
    #[instrument(skip(self, text, on_fragment), fields(len = text.len(), fragment_size = self.fragment_size))]
    pub fn write(
        &self,
        text: &str,
        mut on_fragment: impl FnMut(usize, usize),
    ) -> Result<usize, TransportError> {
        let plan = WritePlan::new(text, self.fragment_size);
        let total = plan.len();

        for (index, fragment) in plan.iter().enumerate() {
            self.emitter.send_write_statement(fragment)?;
            on_fragment(index + 1, total);
            suspend(self.delay);
        }

        self.emitter.send_close_statement()?;
        suspend(self.delay);

        debug!(fragments = total, "Write-back complete");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn writer_lines(text: &str, fragment_size: usize) -> Vec<String> {
        let mock = MockTransport::new();
        let emitter = CommandEmitter::new(&mock, "config.json");
        let writer = ChunkedWriter::new(&emitter, fragment_size, Duration::ZERO);
        writer.write(text, |_, _| {}).unwrap();
        mock.written_lines()
    }

    #[test]
    fn test_fragments_then_close() {
        let lines = writer_lines("0123456789", 4);
        assert_eq!(
            lines,
            vec![
                "f.write('0123')\r\n",
                "f.write('4567')\r\n",
                "f.write('89')\r\n",
                "f.close()\r\n",
            ]
        );
    }

    #[test]
    fn test_empty_text_only_closes() {
        let lines = writer_lines("", 32);
        assert_eq!(lines, vec!["f.close()\r\n"]);
    }

    #[test]
    fn test_progress_callback() {
        let mock = MockTransport::new();
        let emitter = CommandEmitter::new(&mock, "config.json");
        let writer = ChunkedWriter::new(&emitter, 3, Duration::ZERO);
        let mut seen = Vec::new();
        let sent = writer.write("abcdefg", |n, total| seen.push((n, total))).unwrap();
        assert_eq!(sent, 3);
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_stops_on_write_failure() {
        let mock = MockTransport::new();
        mock.disconnect_after_writes(2);
        let emitter = CommandEmitter::new(&mock, "config.json");
        let writer = ChunkedWriter::new(&emitter, 2, Duration::ZERO);
        let result = writer.write("aabbccdd", |_, _| {});
        assert!(matches!(result, Err(TransportError::Disconnected)));
        assert_eq!(mock.get_writes().len(), 2);
    }

    #[test]
    fn test_pacing_delay_applied() {
        let mock = MockTransport::new();
        let emitter = CommandEmitter::new(&mock, "config.json");
        let writer = ChunkedWriter::new(&emitter, 4, Duration::from_millis(5));
        let start = std::time::Instant::now();
        writer.write("0123456789", |_, _| {}).unwrap();
        // three fragments plus the trailing delay after close
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
