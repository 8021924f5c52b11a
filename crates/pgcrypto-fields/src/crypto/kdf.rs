//! Passphrase-to-key mapping, reproducing what pgcrypto does with the `key`
//! argument of `encrypt()`.
//!
//! There is no hashing or stretching. Substituting a real KDF would make the
//! output unreadable by the database extension.

use zeroize::Zeroizing;

use super::cipher::CipherKind;

/// AES key sizes in ascending order.
pub const AES_KEY_SIZES: [usize; 3] = [16, 24, 32];

/// Largest key Blowfish accepts (448 bits).
pub const BLOWFISH_MAX_KEY_LEN: usize = 56;

/// Smallest key the Blowfish implementation accepts.
pub const BLOWFISH_MIN_KEY_LEN: usize = 4;

/// Map a passphrase to the key bytes handed to the block cipher.
///
/// - AES: zero-pad to the smallest of 16/24/32 bytes that fits, truncate
///   anything longer than 32.
/// - Blowfish: used as-is, truncated to 56 bytes.
pub fn derive_key(cipher: CipherKind, passphrase: &[u8]) -> Zeroizing<Vec<u8>> {
    match cipher {
        CipherKind::Aes => {
            let size = AES_KEY_SIZES
                .into_iter()
                .find(|&size| passphrase.len() <= size)
                .unwrap_or(AES_KEY_SIZES[2]);
            let mut key = Zeroizing::new(vec![0u8; size]);
            let n = passphrase.len().min(size);
            key[..n].copy_from_slice(&passphrase[..n]);
            key
        }
        CipherKind::Blowfish => {
            let n = passphrase.len().min(BLOWFISH_MAX_KEY_LEN);
            Zeroizing::new(passphrase[..n].to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 16)]
    #[case(4, 16)]
    #[case(16, 16)]
    #[case(17, 24)]
    #[case(24, 24)]
    #[case(25, 32)]
    #[case(32, 32)]
    #[case(40, 32)]
    fn aes_key_sizes(#[case] len: usize, #[case] expected: usize) {
        let key = derive_key(CipherKind::Aes, &vec![b'k'; len]);
        assert_eq!(key.len(), expected);
    }

    #[test]
    fn aes_short_key_is_zero_padded() {
        let key = derive_key(CipherKind::Aes, b"pass");
        assert_eq!(key.as_slice(), b"pass\0\0\0\0\0\0\0\0\0\0\0\0");
    }

    #[test]
    fn aes_long_key_is_truncated() {
        let passphrase: Vec<u8> = (0..40).collect();
        let key = derive_key(CipherKind::Aes, &passphrase);
        assert_eq!(key.as_slice(), &passphrase[..32]);
    }

    #[test]
    fn blowfish_key_is_used_as_is() {
        assert_eq!(derive_key(CipherKind::Blowfish, b"passw").as_slice(), b"passw");
    }

    #[test]
    fn blowfish_key_is_capped() {
        let key = derive_key(CipherKind::Blowfish, &[7u8; 80]);
        assert_eq!(key.len(), BLOWFISH_MAX_KEY_LEN);
    }
}
