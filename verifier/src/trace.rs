// Licensed under the Apache-2.0 license

use std::collections::HashSet;

use crate::{parse_hex_addr, VerifyError};

/// The set of program-counter values the core was observed to fetch.
/// Membership is all the verifier needs, so duplicates collapse.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FetchTrace {
    pcs: HashSet<u64>,
}

impl FetchTrace {
    /// Parses a fetch log: one hex program counter per line, with or
    /// without a 0x prefix. Blank lines are skipped.
    pub fn parse<I, S>(lines: I) -> Result<Self, VerifyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pcs = HashSet::new();
        for (idx, line) in lines.into_iter().enumerate() {
            let token = line.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            pcs.insert(parse_hex_addr(idx + 1, token)?);
        }
        Ok(Self { pcs })
    }

    pub fn contains(&self, pc: u64) -> bool {
        self.pcs.contains(&pc)
    }

    pub fn len(&self) -> usize {
        self.pcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_collapse() {
        let trace = FetchTrace::parse(["0x80000000", "0x80000004", "0x80000000"]).unwrap();
        assert_eq!(trace.len(), 2);
        assert!(trace.contains(0x8000_0000));
        assert!(trace.contains(0x8000_0004));
    }

    #[test]
    fn test_prefix_is_optional() {
        let trace = FetchTrace::parse(["80000000", "0x1000", ""]).unwrap();
        assert!(trace.contains(0x8000_0000));
        assert!(trace.contains(0x1000));
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn test_malformed_pc() {
        let err = FetchTrace::parse(["0x1000", "not-a-pc"]).unwrap_err();
        assert_eq!(
            err,
            VerifyError::MalformedAddress {
                line_no: 2,
                token: "not-a-pc".into()
            }
        );
    }
}
