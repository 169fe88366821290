//! Wire constants for the device's line-oriented REPL.

/// Serial bit rate used by the device's REPL.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Config file on the device filesystem.
pub const DEFAULT_REMOTE_PATH: &str = "config.json";

/// Top-level key holding network name -> credential.
pub const WIFIS_KEY: &str = "wifis";

/// Key of the SSID list printed by the scan program.
pub const SSIDS_KEY: &str = "ssids";

/// First byte of the dumped JSON document.
pub const START_MARKER: u8 = b'{';

/// First byte of the prompt that follows the dump output.
pub const END_MARKER: u8 = b'>';

/// CR then Ctrl-C twice: stop whatever program is running.
pub const BREAK_SEQUENCE: &[u8] = &[0x0D, 0x03, 0x03];

/// Statement terminator understood by the REPL.
pub const LINE_ENDING: &str = "\r\n";

/// Delimiter of string literals in emitted statements.
pub const QUOTE: char = '\'';

/// Bytes read per iteration by the remote dump loop.
pub const DUMP_READ_SIZE: usize = 32;

// Write-back pacing
pub const DEFAULT_FRAGMENT_SIZE: usize = 32;
pub const DEFAULT_FRAGMENT_DELAY_MS: u64 = 100;

/// Time the device needs to finish printing its boot log.
pub const DEFAULT_WARMUP_MS: u64 = 1000;

// Host-side read loop
pub const DEFAULT_READ_CHUNK: usize = 256;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
