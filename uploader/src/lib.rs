/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Serial device programming for the tcore test flow. Owns the UART
    transport and the length-framed upload handshake that loads an
    instruction stream into the target's memory.

--*/

mod protocol;
mod tty;

use std::time::Duration;

pub use protocol::{Uploader, UploadError, UploadState, DONE_MARKER, TRIGGER_SEQUENCE};
pub use tty::SerialPort;

/// Transport settings for one upload session, injected by the caller.
#[derive(Clone, Copy, Debug)]
pub struct UploadConfig {
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            read_timeout: Duration::from_secs(1),
        }
    }
}
