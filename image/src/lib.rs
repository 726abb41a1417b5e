/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Memory image construction for the tcore test flow. Packs 32-bit
    instruction hex lines into bus-width memory words and converts raw
    binaries into block-reversed "static hex" listings.

--*/

mod pack;
mod static_hex;

use std::io::Write;

pub use pack::{pack_lines, unpack_lines, MemoryWord, PackError, DEFAULT_GROUP_SIZE};
pub use static_hex::binary_to_hex_lines;

/// Writes a memory image artifact: one word per line, no separators.
pub fn write_image(words: &[MemoryWord], mut w: impl Write) -> std::io::Result<()> {
    for word in words {
        writeln!(w, "{}", word.as_hex())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_image() {
        let words = pack_lines(["11111111", "22222222"], 2).unwrap();
        let mut out = Vec::new();
        write_image(&words, &mut out).unwrap();
        assert_eq!(out, b"2222222211111111\n");
    }
}
