//! PKCS#5/#7-style block padding as applied by pgcrypto's `encrypt()`.

use thiserror::Error;

/// Errors produced while stripping padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PaddingError {
    /// There is no trailing byte to read the pad length from.
    #[error("padding: cannot unpad empty input")]
    Empty,

    /// The trailing byte is zero, larger than the block size, or larger than
    /// the input.
    #[error("padding: invalid pad byte {0}")]
    InvalidPadByte(u8),
}

/// Pad `data` to a positive multiple of `block_size`.
///
/// Appends `n` copies of the byte `n`, where `n = block_size - len % block_size`.
/// Block-aligned input gets a full extra block, so at least one byte is always
/// added.
pub fn pad(data: &[u8], block_size: usize) -> Vec<u8> {
    debug_assert!((1..=255).contains(&block_size));
    let n = block_size - data.len() % block_size;
    let mut out = Vec::with_capacity(data.len() + n);
    out.extend_from_slice(data);
    out.resize(data.len() + n, n as u8);
    out
}

/// Strip padding added by [`pad`].
///
/// Only the final byte is inspected. The remaining pad bytes are not checked
/// against `n`: ciphertext written by pgcrypto in edge cases relies on this,
/// so the weak validation is part of the format.
///
/// # Errors
///
/// Returns [`PaddingError`] if the input is empty or the pad byte is out of
/// range.
pub fn unpad(data: &[u8], block_size: usize) -> Result<&[u8], PaddingError> {
    let &last = data.last().ok_or(PaddingError::Empty)?;
    let n = usize::from(last);
    if n == 0 || n > block_size || n > data.len() {
        return Err(PaddingError::InvalidPadByte(last));
    }
    Ok(&data[..data.len() - n])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(8)]
    #[case(16)]
    fn pad_unpad_round_trip(#[case] block_size: usize) {
        for len in 0..=(3 * block_size) {
            let data: Vec<u8> = (0..len as u8).collect();
            let padded = pad(&data, block_size);
            assert_eq!(padded.len() % block_size, 0);
            assert!(padded.len() > data.len());
            assert_eq!(unpad(&padded, block_size).unwrap(), data.as_slice());
        }
    }

    #[rstest]
    #[case(8, 0)]
    #[case(8, 16)]
    #[case(16, 16)]
    #[case(16, 48)]
    fn aligned_input_gets_full_block(#[case] block_size: usize, #[case] len: usize) {
        let padded = pad(&vec![b'x'; len], block_size);
        assert_eq!(padded.len(), len + block_size);
        assert!(padded[len..].iter().all(|&b| usize::from(b) == block_size));
    }

    #[test]
    fn pad_byte_equals_pad_length() {
        assert_eq!(pad(b"abcde", 8), b"abcde\x03\x03\x03");
    }

    #[test]
    fn unpad_rejects_empty() {
        assert_eq!(unpad(b"", 8), Err(PaddingError::Empty));
    }

    #[rstest]
    #[case(b"abcdefg\x00".as_slice())]
    #[case(b"abcdefg\x09".as_slice())]
    #[case(b"\x05\x05".as_slice())]
    fn unpad_rejects_out_of_range(#[case] data: &[u8]) {
        assert!(matches!(
            unpad(data, 8),
            Err(PaddingError::InvalidPadByte(_))
        ));
    }

    #[test]
    fn unpad_only_checks_final_byte() {
        assert_eq!(unpad(b"abcde\x07\x01\x03", 8).unwrap(), b"abcde");
    }
}
