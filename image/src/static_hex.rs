// Licensed under the Apache-2.0 license

use std::fmt::Write;

/// Converts a raw binary into "static hex" lines: the image is split
/// into `block_size`-byte blocks and each block is emitted byte-reversed
/// as one lowercase hex line. A short final block is emitted at its
/// natural width.
pub fn binary_to_hex_lines(data: &[u8], block_size: usize) -> Vec<String> {
    assert!(block_size > 0);
    data.chunks(block_size)
        .map(|block| {
            let mut line = String::with_capacity(block.len() * 2);
            for byte in block.iter().rev() {
                write!(line, "{byte:02x}").unwrap();
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::binary_to_hex_lines;

    #[test]
    fn test_blocks_are_byte_reversed() {
        let data: Vec<u8> = (0x10..0x10 + 16).collect();
        let lines = binary_to_hex_lines(&data, 16);
        assert_eq!(lines, vec!["1f1e1d1c1b1a19181716151413121110".to_string()]);
    }

    #[test]
    fn test_short_final_block() {
        let lines = binary_to_hex_lines(&[0xde, 0xad, 0xbe, 0xef, 0x01], 4);
        assert_eq!(lines, vec!["efbeadde".to_string(), "01".to_string()]);
    }

    #[test]
    fn test_empty_binary() {
        assert!(binary_to_hex_lines(&[], 16).is_empty());
    }
}
