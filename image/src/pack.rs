// Licensed under the Apache-2.0 license

use std::fmt;

/// Sub-words per memory word for the 128-bit instruction bus.
pub const DEFAULT_GROUP_SIZE: usize = 4;

const SUB_WORD_DIGITS: usize = 8;
const ZERO_SUB_WORD: &str = "00000000";

/// One bus-width memory word as hex text; always exactly
/// `group_size * 8` digits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryWord(String);

impl MemoryWord {
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PackError {
    /// A line was not a hex token of at most eight digits.
    MalformedToken { line_no: usize, token: String },

    /// An image line was not a whole number of eight-digit sub-words.
    MalformedWord { line_no: usize, len: usize },
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackError::MalformedToken { line_no, token } => {
                write!(f, "line {line_no}: malformed hex token {token:?}")
            }
            PackError::MalformedWord { line_no, len } => {
                write!(
                    f,
                    "line {line_no}: word length {len} is not a multiple of {SUB_WORD_DIGITS}"
                )
            }
        }
    }
}

impl std::error::Error for PackError {}

fn parse_sub_word(line_no: usize, token: &str) -> Result<String, PackError> {
    if token.is_empty()
        || token.len() > SUB_WORD_DIGITS
        || !token.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(PackError::MalformedToken {
            line_no,
            token: token.to_string(),
        });
    }
    // Short tokens are value-preserving: left-pad to the full sub-word.
    let mut sub_word = String::with_capacity(SUB_WORD_DIGITS);
    for _ in token.len()..SUB_WORD_DIGITS {
        sub_word.push('0');
    }
    sub_word.push_str(token);
    Ok(sub_word)
}

/// Packs instruction hex lines into memory words of `group_size`
/// sub-words each.
///
/// Sub-word order is reversed within each word so that the lowest
/// instruction address lands in the least significant lane of the wide
/// memory port. The final group is zero-padded to full width. Empty
/// lines are skipped; an empty input yields an empty image.
pub fn pack_lines<I, S>(lines: I, group_size: usize) -> Result<Vec<MemoryWord>, PackError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    assert!(group_size > 0);
    let mut sub_words = Vec::new();
    for (idx, line) in lines.into_iter().enumerate() {
        let token = line.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        sub_words.push(parse_sub_word(idx + 1, token)?);
    }

    let mut words = Vec::with_capacity(sub_words.len().div_ceil(group_size));
    for group in sub_words.chunks(group_size) {
        let mut word = String::with_capacity(group_size * SUB_WORD_DIGITS);
        for _ in group.len()..group_size {
            word.push_str(ZERO_SUB_WORD);
        }
        for sub_word in group.iter().rev() {
            word.push_str(sub_word);
        }
        words.push(MemoryWord(word));
    }
    Ok(words)
}

/// Inverse of [`pack_lines`]: splits each image line back into
/// sub-words in original instruction order. Padding sub-words from a
/// partial final group are kept, so the round trip is exact only when
/// the original line count was a multiple of `group_size`.
pub fn unpack_lines<I, S>(lines: I, group_size: usize) -> Result<Vec<String>, PackError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    assert!(group_size > 0);
    let mut sub_words = Vec::new();
    for (idx, line) in lines.into_iter().enumerate() {
        let word = line.as_ref().trim();
        if word.is_empty() {
            continue;
        }
        let line_no = idx + 1;
        if word.len() != group_size * SUB_WORD_DIGITS {
            return Err(PackError::MalformedWord {
                line_no,
                len: word.len(),
            });
        }
        if !word.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PackError::MalformedToken {
                line_no,
                token: word.to_string(),
            });
        }
        for i in (0..group_size).rev() {
            sub_words.push(word[i * SUB_WORD_DIGITS..(i + 1) * SUB_WORD_DIGITS].to_string());
        }
    }
    Ok(sub_words)
}
