//! [`CipherKey`]: caller-supplied key material.

use std::fmt;

use zeroize::Zeroizing;

/// Opaque passphrase bytes of arbitrary length.
///
/// Never persisted. The buffer is zeroed when the last clone is dropped, and
/// the [`Debug`] impl never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherKey(Zeroizing<Vec<u8>>);

impl CipherKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("CipherKey([REDACTED])")
    }
}

impl From<Vec<u8>> for CipherKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for CipherKey {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl<const N: usize> From<&[u8; N]> for CipherKey {
    fn from(bytes: &[u8; N]) -> Self {
        Self::new(bytes.as_slice())
    }
}

impl From<&str> for CipherKey {
    fn from(passphrase: &str) -> Self {
        Self::new(passphrase.as_bytes())
    }
}
