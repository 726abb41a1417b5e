/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Pass/fail verification for tcore test runs. Extracts the pass/fail
    sentinel addresses from a disassembly dump and classifies a recorded
    instruction-fetch trace against them.

--*/

mod symbols;
mod trace;

use std::fmt;

pub use symbols::{extract_addresses, SymbolAddresses};
pub use trace::FetchTrace;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerifyError {
    /// The dump never defined the named sentinel symbol.
    MissingSymbol(&'static str),

    /// A token that had to be a hex address was not one.
    MalformedAddress { line_no: usize, token: String },

    /// The pass/fail address artifact did not hold two addresses.
    TruncatedAddressFile,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::MissingSymbol(name) => {
                write!(f, "could not find <{name}>: in the dump file")
            }
            VerifyError::MalformedAddress { line_no, token } => {
                write!(f, "line {line_no}: malformed hex address {token:?}")
            }
            VerifyError::TruncatedAddressFile => {
                write!(f, "address file must hold a pass and a fail address")
            }
        }
    }
}

impl std::error::Error for VerifyError {}

/// Strict boundary parse; accepts an optional 0x prefix.
pub(crate) fn parse_hex_addr(line_no: usize, token: &str) -> Result<u64, VerifyError> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u64::from_str_radix(digits, 16).map_err(|_| VerifyError::MalformedAddress {
        line_no,
        token: token.to_string(),
    })
}

/// Outcome of one test run on the target.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Passed,
    Failed,
    /// Neither sentinel was fetched: the trace is truncated, the
    /// addresses are stale, or the target hung.
    Inconclusive,
}

impl Verdict {
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Passed => 0,
            Verdict::Failed => 1,
            Verdict::Inconclusive => 2,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => f.write_str("TEST PASSED"),
            Verdict::Failed => f.write_str("TEST FAILED"),
            Verdict::Inconclusive => {
                f.write_str("INCONCLUSIVE: neither pass nor fail address was fetched")
            }
        }
    }
}

/// Classifies a run. The pass address is checked first, so a trace that
/// somehow reached both sentinels still counts as a pass.
pub fn verify(addrs: &SymbolAddresses, trace: &FetchTrace) -> Verdict {
    if trace.contains(addrs.pass) {
        Verdict::Passed
    } else if trace.contains(addrs.fail) {
        Verdict::Failed
    } else {
        Verdict::Inconclusive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs() -> SymbolAddresses {
        SymbolAddresses {
            pass: 0x1000,
            fail: 0x2000,
        }
    }

    #[test]
    fn test_pass_address_in_trace() {
        let trace = FetchTrace::parse(["0x0", "0x1000"]).unwrap();
        assert_eq!(verify(&addrs(), &trace), Verdict::Passed);
    }

    #[test]
    fn test_fail_address_in_trace() {
        let trace = FetchTrace::parse(["0x0", "0x2000"]).unwrap();
        assert_eq!(verify(&addrs(), &trace), Verdict::Failed);
    }

    #[test]
    fn test_pass_takes_precedence_over_fail() {
        let trace = FetchTrace::parse(["0x2000", "0x1000"]).unwrap();
        assert_eq!(verify(&addrs(), &trace), Verdict::Passed);
    }

    #[test]
    fn test_neither_address_is_inconclusive() {
        let trace = FetchTrace::parse(["0x4", "0x8"]).unwrap();
        let verdict = verify(&addrs(), &trace);
        assert_eq!(verdict, Verdict::Inconclusive);
        assert_eq!(verdict.exit_code(), 2);
    }

    #[test]
    fn test_empty_trace_is_inconclusive() {
        let trace = FetchTrace::parse(Vec::<String>::new()).unwrap();
        assert_eq!(verify(&addrs(), &trace), Verdict::Inconclusive);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Verdict::Passed.exit_code(), 0);
        assert_eq!(Verdict::Failed.exit_code(), 1);
        assert_eq!(Verdict::Inconclusive.exit_code(), 2);
    }
}
