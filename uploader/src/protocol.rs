// Licensed under the Apache-2.0 license

use std::fmt;
use std::io::{self, Write};

/// ASCII sequence the target's boot monitor waits for before accepting
/// a program frame.
pub const TRIGGER_SEQUENCE: &[u8] = b"TCORETEST";

/// ASCII sequence marking the end of the frame.
pub const DONE_MARKER: &[u8] = b"done";

const INSTR_DIGITS: usize = 8;

/// Position of the upload state machine. A transport error from any
/// state moves to `Failed`; there is no partial resume, the whole frame
/// must be restarted with a fresh [`Uploader`] after a target reset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UploadState {
    Idle,
    HandshakeSent,
    LengthSent,
    Streaming,
    DoneSent,
    Complete,
    Failed,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadState::Idle => "idle",
            UploadState::HandshakeSent => "handshake sent",
            UploadState::LengthSent => "length sent",
            UploadState::Streaming => "streaming",
            UploadState::DoneSent => "done sent",
            UploadState::Complete => "complete",
            UploadState::Failed => "failed",
        })
    }
}

#[derive(Debug)]
pub enum UploadError {
    /// The transport failed; `state` is where the machine was when the
    /// write was attempted.
    Transport {
        state: UploadState,
        source: io::Error,
    },

    /// A full-width line was not a 32-bit hex value.
    MalformedInstruction { line_no: usize, token: String },

    /// A raw image's length must be a whole number of 32-bit words.
    OddLengthImage { len: usize },
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Transport { state, source } => {
                write!(f, "transport error while {state}: {source}")
            }
            UploadError::MalformedInstruction { line_no, token } => {
                write!(f, "line {line_no}: malformed instruction {token:?}")
            }
            UploadError::OddLengthImage { len } => {
                write!(f, "image length {len} is not a multiple of 4 bytes")
            }
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UploadError::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Streams one program frame over an exclusively owned transport:
/// trigger sequence, 4-byte big-endian instruction count, the
/// instruction words most-significant byte first, then the done marker.
pub struct Uploader<W> {
    transport: W,
    state: UploadState,
}

impl<W: Write> Uploader<W> {
    pub fn new(transport: W) -> Self {
        Self {
            transport,
            state: UploadState::Idle,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    fn send(&mut self, bytes: &[u8], next: UploadState) -> Result<(), UploadError> {
        match self.transport.write_all(bytes) {
            Ok(()) => {
                self.state = next;
                Ok(())
            }
            Err(source) => {
                let state = self.state;
                self.state = UploadState::Failed;
                Err(UploadError::Transport { state, source })
            }
        }
    }

    /// Uploads an instruction hex file (one 8-digit hex word per line).
    ///
    /// Lines shorter than a full instruction are length markers or
    /// noise: they are skipped outright and excluded from the
    /// transmitted count, never substituted with previously sent data.
    /// The stream is validated in full before the first byte goes out,
    /// so a malformed line aborts with the target untouched. Returns
    /// the number of instructions sent.
    pub fn upload_hex_lines<I, S>(&mut self, lines: I) -> Result<u32, UploadError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.upload_hex_lines_with(lines, |_| ())
    }

    /// Like [`Uploader::upload_hex_lines`], invoking `on_word` for each
    /// instruction as it is transmitted.
    pub fn upload_hex_lines_with<I, S>(
        &mut self,
        lines: I,
        mut on_word: impl FnMut(u32),
    ) -> Result<u32, UploadError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = parse_hex_lines(lines)?;
        assert_eq!(self.state, UploadState::Idle, "uploader is single-use");
        let count = words.len() as u32;
        self.send(TRIGGER_SEQUENCE, UploadState::HandshakeSent)?;
        self.send(&count.to_be_bytes(), UploadState::LengthSent)?;
        for word in words {
            // The wire is always most-significant byte first, whatever
            // the host byte order.
            self.send(&word.to_be_bytes(), UploadState::Streaming)?;
            on_word(word);
        }
        self.send(DONE_MARKER, UploadState::DoneSent)?;
        self.state = UploadState::Complete;
        Ok(count)
    }

    /// Uploads a raw little-endian binary image. The frame's count
    /// field carries the image's byte length and each 4-byte word is
    /// streamed byte-reversed to put the most significant byte first.
    pub fn upload_binary(&mut self, data: &[u8]) -> Result<u32, UploadError> {
        if data.len() % 4 != 0 {
            return Err(UploadError::OddLengthImage { len: data.len() });
        }
        assert_eq!(self.state, UploadState::Idle, "uploader is single-use");
        let count = data.len() as u32;
        self.send(TRIGGER_SEQUENCE, UploadState::HandshakeSent)?;
        self.send(&count.to_be_bytes(), UploadState::LengthSent)?;
        for block in data.chunks_exact(4) {
            let word = [block[3], block[2], block[1], block[0]];
            self.send(&word, UploadState::Streaming)?;
        }
        self.send(DONE_MARKER, UploadState::DoneSent)?;
        self.state = UploadState::Complete;
        Ok(count)
    }
}

fn parse_hex_lines<I, S>(lines: I) -> Result<Vec<u32>, UploadError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut words = Vec::new();
    for (idx, line) in lines.into_iter().enumerate() {
        let token = line.as_ref().trim();
        if token.len() < INSTR_DIGITS {
            continue;
        }
        let word = u32::from_str_radix(token, 16).map_err(|_| {
            UploadError::MalformedInstruction {
                line_no: idx + 1,
                token: token.to_string(),
            }
        })?;
        words.push(word);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe {
        remaining: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining < buf.len() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "target gone"));
            }
            self.remaining -= buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_frame_layout() {
        let mut wire = Vec::new();
        let mut uploader = Uploader::new(&mut wire);
        let count = uploader
            .upload_hex_lines(["12345678", "deadbeef"])
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(uploader.state(), UploadState::Complete);

        let mut expected = Vec::new();
        expected.extend_from_slice(b"TCORETEST");
        expected.extend_from_slice(&2u32.to_be_bytes());
        expected.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        expected.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        expected.extend_from_slice(b"done");
        assert_eq!(wire, expected);
    }

    #[test]
    fn test_wire_is_big_endian() {
        let mut wire = Vec::new();
        Uploader::new(&mut wire)
            .upload_hex_lines(["12345678"])
            .unwrap();
        assert_eq!(&wire[13..17], &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_short_lines_skipped_and_not_counted() {
        let mut wire = Vec::new();
        let count = Uploader::new(&mut wire)
            .upload_hex_lines(["00000013", "4", "", "00000093"])
            .unwrap();
        assert_eq!(count, 2);
        // count field
        assert_eq!(&wire[9..13], &2u32.to_be_bytes());
        // exactly two instruction words between count and marker
        assert_eq!(wire.len(), 9 + 4 + 2 * 4 + 4);
        assert_eq!(&wire[13..17], &[0x00, 0x00, 0x00, 0x13]);
        assert_eq!(&wire[17..21], &[0x00, 0x00, 0x00, 0x93]);
    }

    #[test]
    fn test_malformed_line_aborts_before_handshake() {
        let mut wire = Vec::new();
        let err = Uploader::new(&mut wire)
            .upload_hex_lines(["00000013", "notahex!"])
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::MalformedInstruction { line_no: 2, .. }
        ));
        assert!(wire.is_empty());
    }

    #[test]
    fn test_transport_failure_during_streaming() {
        // Enough budget for trigger + count + one word, not two.
        let pipe = BrokenPipe {
            remaining: TRIGGER_SEQUENCE.len() + 4 + 4,
        };
        let mut uploader = Uploader::new(pipe);
        let err = uploader
            .upload_hex_lines(["00000013", "00000093"])
            .unwrap_err();
        match err {
            UploadError::Transport { state, .. } => {
                assert_eq!(state, UploadState::Streaming)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(uploader.state(), UploadState::Failed);
    }

    #[test]
    fn test_transport_failure_on_handshake() {
        let mut uploader = Uploader::new(BrokenPipe { remaining: 0 });
        let err = uploader.upload_hex_lines(["00000013"]).unwrap_err();
        match err {
            UploadError::Transport { state, .. } => assert_eq!(state, UploadState::Idle),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(uploader.state(), UploadState::Failed);
    }

    #[test]
    fn test_empty_program_still_frames() {
        let mut wire = Vec::new();
        let count = Uploader::new(&mut wire)
            .upload_hex_lines(Vec::<String>::new())
            .unwrap();
        assert_eq!(count, 0);
        let mut expected = Vec::new();
        expected.extend_from_slice(b"TCORETEST");
        expected.extend_from_slice(&0u32.to_be_bytes());
        expected.extend_from_slice(b"done");
        assert_eq!(wire, expected);
    }

    #[test]
    fn test_binary_upload_reverses_each_word() {
        let mut wire = Vec::new();
        let count = Uploader::new(&mut wire)
            .upload_binary(&[0x13, 0x00, 0x00, 0x00, 0xef, 0xbe, 0xad, 0xde])
            .unwrap();
        assert_eq!(count, 8);
        assert_eq!(&wire[9..13], &8u32.to_be_bytes());
        assert_eq!(&wire[13..17], &[0x00, 0x00, 0x00, 0x13]);
        assert_eq!(&wire[17..21], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_binary_upload_rejects_ragged_image() {
        let mut wire = Vec::new();
        let err = Uploader::new(&mut wire)
            .upload_binary(&[0x13, 0x00, 0x00])
            .unwrap_err();
        assert!(matches!(err, UploadError::OddLengthImage { len: 3 }));
        assert!(wire.is_empty());
    }
}
