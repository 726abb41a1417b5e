// Licensed under the Apache-2.0 license

use std::fmt;
use std::io::Write;

use crate::{parse_hex_addr, VerifyError};

const PASS_MARKER: &str = "<pass>:";
const FAIL_MARKER: &str = "<fail>:";

/// The two sentinel addresses a test program branches to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SymbolAddresses {
    pub pass: u64,
    pub fail: u64,
}

impl SymbolAddresses {
    /// Writes the one-line address artifact: `0x<pass> 0x<fail>`.
    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        writeln!(w, "{:#x} {:#x}", self.pass, self.fail)
    }

    /// Parses the artifact produced by [`SymbolAddresses::write_to`].
    pub fn parse(line: &str) -> Result<Self, VerifyError> {
        let mut tokens = line.split_whitespace();
        let pass = tokens.next().ok_or(VerifyError::TruncatedAddressFile)?;
        let fail = tokens.next().ok_or(VerifyError::TruncatedAddressFile)?;
        Ok(Self {
            pass: parse_hex_addr(1, pass)?,
            fail: parse_hex_addr(1, fail)?,
        })
    }
}

impl fmt::Display for SymbolAddresses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass={:#x} fail={:#x}", self.pass, self.fail)
    }
}

/// Scans a disassembly dump for the `<pass>:` and `<fail>:` label lines
/// and takes each line's leading token as the symbol's address.
///
/// The whole dump is scanned; if a label occurs more than once the last
/// occurrence wins. Both labels must be present.
pub fn extract_addresses<I, S>(lines: I) -> Result<SymbolAddresses, VerifyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut pass = None;
    let mut fail = None;
    for (idx, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        let slot = if line.contains(FAIL_MARKER) {
            &mut fail
        } else if line.contains(PASS_MARKER) {
            &mut pass
        } else {
            continue;
        };
        let line_no = idx + 1;
        let token = line
            .split_whitespace()
            .next()
            .ok_or_else(|| VerifyError::MalformedAddress {
                line_no,
                token: String::new(),
            })?;
        *slot = Some(parse_hex_addr(line_no, token)?);
    }
    Ok(SymbolAddresses {
        pass: pass.ok_or(VerifyError::MissingSymbol("pass"))?,
        fail: fail.ok_or(VerifyError::MissingSymbol("fail"))?,
    })
}
