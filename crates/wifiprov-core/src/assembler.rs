//! Reassembly of the dumped config from unframed REPL output.
//!
//! The device echoes the dump program and prints prompts around the file
//! contents, and the transport splits or merges that output arbitrarily. The
//! payload starts at the first `{` and ends before the first `>` after it,
//! which is the next prompt.
//!
//! Known limitation: a `>` inside the document (for example in a credential)
//! ends the payload early, and a `{` in noise before the dump starts it early.
//! The remote dialect offers no better delimiter, so the rule is kept as is.
//!
//! Matching is done on bytes. Both markers are ASCII and never occur inside a
//! multi-byte UTF-8 sequence, so a character split across frames is decoded
//! intact once the payload is complete.

use crate::protocol::constants::{END_MARKER, START_MARKER};

/// Outcome of feeding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyResult {
    /// More frames are needed.
    Pending,
    /// The payload is complete. Holds the raw bytes before the end marker.
    Complete(Vec<u8>),
}

/// Accumulated output of one dump operation.
#[derive(Debug, Default, Clone)]
pub struct AssemblyBuffer {
    bytes: Vec<u8>,
}

impl AssemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn extend(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }
}

/// Stream assembler for a single dump.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    buffer: AssemblyBuffer,
    /// Offset up to which the buffer has been searched for the end marker.
    scanned: usize,
    complete: bool,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new dump operation.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.complete = false;
    }

    pub fn buffer(&self) -> &AssemblyBuffer {
        &self.buffer
    }

    /// True once a payload has been returned.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Feed one frame as delivered by the transport.
    ///
    /// Frames arriving after completion are ignored; the caller is expected
    /// to stop delivery before acting on the payload.
    pub fn on_frame(&mut self, frame: &[u8]) -> AssemblyResult {
        if self.complete {
            return AssemblyResult::Pending;
        }

        if self.buffer.is_empty() {
            // Noise before the document is dropped.
            match frame.iter().position(|&b| b == START_MARKER) {
                Some(start) => self.buffer.extend(&frame[start..]),
                None => return AssemblyResult::Pending,
            }
        } else {
            self.buffer.extend(frame);
        }

        let unscanned = &self.buffer.as_bytes()[self.scanned..];
        match unscanned.iter().position(|&b| b == END_MARKER) {
            Some(offset) => {
                let end = self.scanned + offset;
                self.complete = true;
                AssemblyResult::Complete(self.buffer.as_bytes()[..end].to_vec())
            }
            None => {
                self.scanned = self.buffer.len();
                AssemblyResult::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all<'a>(frames: impl IntoIterator<Item = &'a [u8]>) -> Option<Vec<u8>> {
        let mut assembler = StreamAssembler::new();
        for frame in frames {
            if let AssemblyResult::Complete(payload) = assembler.on_frame(frame) {
                return Some(payload);
            }
        }
        None
    }

    #[test]
    fn test_noise_only_is_discarded() {
        let mut assembler = StreamAssembler::new();
        assert_eq!(
            assembler.on_frame(b">>> import sys\r\n"),
            AssemblyResult::Pending
        );
        assert!(assembler.buffer().is_empty());
    }

    #[test]
    fn test_single_frame_payload() {
        let payload = feed_all([&b"boot..\r\n{\"wifis\":{}}\r\n>>> "[..]]);
        assert_eq!(payload.as_deref(), Some(&b"{\"wifis\":{}}\r\n"[..]));
    }

    #[test]
    fn test_split_payload() {
        let payload = feed_all([&b"boot..\r\n{\"wif"[..], &b"is\":{}}"[..], &b">>>"[..]]);
        assert_eq!(payload.as_deref(), Some(&b"{\"wifis\":{}}"[..]));
    }

    #[test]
    fn test_first_end_marker_wins() {
        let payload = feed_all([&b"{\"a\":1}>x>"[..]]);
        assert_eq!(payload.as_deref(), Some(&b"{\"a\":1}"[..]));
    }

    #[test]
    fn test_echo_prompt_before_document_is_ignored() {
        let payload = feed_all([
            &b">>> if len == 0:\r\n... break\r\n"[..],
            &b"{}"[..],
            &b"\r\n>>> "[..],
        ]);
        assert_eq!(payload.as_deref(), Some(&b"{}\r\n"[..]));
    }

    #[test]
    fn test_frames_after_complete_are_ignored() {
        let mut assembler = StreamAssembler::new();
        assert!(matches!(
            assembler.on_frame(b"{}>"),
            AssemblyResult::Complete(_)
        ));
        assert_eq!(assembler.on_frame(b"{more}>"), AssemblyResult::Pending);
        assert!(assembler.is_complete());
    }

    #[test]
    fn test_reset_clears_buffer() {
        let mut assembler = StreamAssembler::new();
        assembler.on_frame(b"{\"partial\"");
        assert!(!assembler.buffer().is_empty());
        assembler.reset();
        assert!(assembler.buffer().is_empty());
        assert!(!assembler.is_complete());
    }

    #[test]
    fn test_multibyte_split_across_frames() {
        let text = "{\"wifis\":{\"café\":\"pw\"}}>".as_bytes();
        let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let payload = feed_all([&text[..split], &text[split..]]).unwrap();
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            "{\"wifis\":{\"café\":\"pw\"}}"
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn assemble(frames: &[&[u8]]) -> Option<Vec<u8>> {
        let mut assembler = StreamAssembler::new();
        frames.iter().find_map(|frame| match assembler.on_frame(frame) {
            AssemblyResult::Complete(payload) => Some(payload),
            AssemblyResult::Pending => None,
        })
    }

    fn arb_stream() -> impl Strategy<Value = Vec<u8>> {
        (
            "[a-z. \r\n]{0,20}",
            "[a-z0-9\":,]{0,40}",
            "[a-z0-9 ]{0,10}",
        )
            .prop_map(|(noise, body, tail)| {
                format!("{noise}{{{body}}}>>> {tail}").into_bytes()
            })
    }

    proptest! {
        #[test]
        fn rechunking_does_not_change_payload(
            stream in arb_stream(),
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..8),
        ) {
            let whole = assemble(&[stream.as_slice()]);
            prop_assert!(whole.is_some());

            let mut offsets: Vec<usize> = cuts.iter().map(|i| i.index(stream.len() + 1)).collect();
            offsets.sort_unstable();
            offsets.dedup();
            let mut frames = Vec::new();
            let mut last = 0;
            for offset in offsets {
                frames.push(&stream[last..offset]);
                last = offset;
            }
            frames.push(&stream[last..]);

            prop_assert_eq!(assemble(&frames), whole);
        }

        #[test]
        fn every_two_way_split_agrees(stream in arb_stream()) {
            let whole = assemble(&[stream.as_slice()]);
            for cut in 0..=stream.len() {
                let (head, tail) = stream.split_at(cut);
                prop_assert_eq!(assemble(&[head, tail]), whole.clone());
            }
        }
    }
}
