//! The cipher envelope: derive key → pad → CBC with a zero IV → armor.
//!
//! This mirrors pgcrypto's plain `encrypt(data, key, type)` function, not the
//! `encrypt_iv` variant. The IV is always all-zero, so equal plaintexts under
//! equal keys encrypt identically, and there is no authentication tag.
//!
//! **Precondition:** a value must be decrypted with the same [`CipherKind`]
//! it was encrypted with. The envelope cannot detect a mismatch.

use std::borrow::Cow;
use std::fmt;

use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use cbc::cipher::{
    block_padding::NoPadding, BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::armor::{self, ArmorError};
use super::kdf::derive_key;
use super::padding::{self, PaddingError};
use crate::error::{Error, Result};
use crate::key::CipherKey;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Supported block cipher families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherKind {
    /// AES-128/192/256 depending on the derived key length; 128-bit blocks.
    #[serde(alias = "AES")]
    Aes,
    /// Blowfish with a variable-length key; 64-bit blocks.
    #[default]
    #[serde(alias = "bf", alias = "Blowfish")]
    Blowfish,
}

impl CipherKind {
    /// Block size in bytes.
    pub const fn block_size(self) -> usize {
        match self {
            CipherKind::Aes => 16,
            CipherKind::Blowfish => 8,
        }
    }

    /// The cipher name pgcrypto's `encrypt()` / `decrypt()` expect.
    pub const fn pgcrypto_name(self) -> &'static str {
        match self {
            CipherKind::Aes => "aes",
            CipherKind::Blowfish => "bf",
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pgcrypto_name())
    }
}

/// Per-field cipher configuration. Immutable once a schema is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CipherSpec {
    #[serde(default)]
    pub cipher: CipherKind,

    /// Store armored text instead of raw bytes.
    #[serde(default = "default_armor")]
    pub armor: bool,

    /// Embed a `Version:` header in armored output.
    #[serde(default)]
    pub versioned: bool,
}

fn default_armor() -> bool {
    true
}

impl CipherSpec {
    /// An armored, unversioned spec for `cipher`.
    pub const fn new(cipher: CipherKind) -> Self {
        Self {
            cipher,
            armor: true,
            versioned: false,
        }
    }

    pub fn with_armor(mut self, armor: bool) -> Self {
        self.armor = armor;
        self
    }

    pub fn with_version(mut self, versioned: bool) -> Self {
        self.versioned = versioned;
        self
    }
}

impl Default for CipherSpec {
    fn default() -> Self {
        Self::new(CipherKind::default())
    }
}

/// A value in its persisted, encrypted form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EncryptedValue {
    /// Ciphertext bytes for a binary column.
    Raw(Vec<u8>),
    /// Armored ciphertext for a text column.
    Armored(String),
}

impl EncryptedValue {
    /// The raw ciphertext, dearmoring if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ArmorError`] if the armored text is malformed.
    pub fn ciphertext(&self) -> Result<Cow<'_, [u8]>, ArmorError> {
        match self {
            EncryptedValue::Raw(bytes) => Ok(Cow::Borrowed(bytes)),
            EncryptedValue::Armored(text) => armor::dearmor(text).map(Cow::Owned),
        }
    }
}

/// Structural failures while decrypting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecryptionError {
    #[error("decryption failed: {0}")]
    Armor(#[from] ArmorError),

    #[error("decryption failed: {0}")]
    Padding(#[from] PaddingError),

    /// The ciphertext is not a positive multiple of the block size.
    #[error("decryption failed: ciphertext length {len} is not a multiple of {block_size}")]
    Misaligned { len: usize, block_size: usize },
}

/// Stateless encrypt/decrypt pipeline for one [`CipherSpec`].
///
/// Cheap to copy and safe to share across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    spec: CipherSpec,
}

impl Envelope {
    pub const fn new(spec: CipherSpec) -> Self {
        Self { spec }
    }

    pub const fn spec(&self) -> CipherSpec {
        self.spec
    }

    pub const fn block_size(&self) -> usize {
        self.spec.cipher.block_size()
    }

    /// Encrypt `plaintext` under `key`.
    ///
    /// Deterministic: the same spec, key and plaintext always produce the same
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKeyLength`] if the cipher rejects the derived key.
    pub fn encrypt(&self, plaintext: &[u8], key: &CipherKey) -> Result<EncryptedValue> {
        let cipher = self.spec.cipher;
        let derived = derive_key(cipher, key.as_bytes());
        let padded = padding::pad(plaintext, cipher.block_size());
        let iv = &ZERO_IV[..cipher.block_size()];

        let ciphertext = match cipher {
            CipherKind::Blowfish => cbc_encrypt::<Blowfish>(&derived, iv, &padded),
            CipherKind::Aes => match derived.len() {
                16 => cbc_encrypt::<Aes128>(&derived, iv, &padded),
                24 => cbc_encrypt::<Aes192>(&derived, iv, &padded),
                _ => cbc_encrypt::<Aes256>(&derived, iv, &padded),
            },
        }
        .ok_or(Error::InvalidKeyLength {
            cipher,
            len: derived.len(),
        })?;

        Ok(if self.spec.armor {
            EncryptedValue::Armored(armor::armor(&ciphertext, self.spec.versioned))
        } else {
            EncryptedValue::Raw(ciphertext)
        })
    }

    /// Decrypt `value` under `key`.
    ///
    /// Either representation is accepted regardless of the `armor`
    /// flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decryption`] on malformed armor, misaligned ciphertext
    /// or an out-of-range pad byte, and [`Error::InvalidKeyLength`] if the
    /// cipher rejects the derived key. A wrong key usually, but not always,
    /// ends in a padding error; callers must not treat success as proof that
    /// the key was right.
    pub fn decrypt(&self, value: &EncryptedValue, key: &CipherKey) -> Result<Vec<u8>> {
        let cipher = self.spec.cipher;
        let block_size = cipher.block_size();
        let ciphertext = value.ciphertext().map_err(DecryptionError::from)?;
        if ciphertext.is_empty() || ciphertext.len() % block_size != 0 {
            return Err(DecryptionError::Misaligned {
                len: ciphertext.len(),
                block_size,
            }
            .into());
        }

        let derived = derive_key(cipher, key.as_bytes());
        let iv = &ZERO_IV[..block_size];
        let padded = match cipher {
            CipherKind::Blowfish => cbc_decrypt::<Blowfish>(&derived, iv, &ciphertext),
            CipherKind::Aes => match derived.len() {
                16 => cbc_decrypt::<Aes128>(&derived, iv, &ciphertext),
                24 => cbc_decrypt::<Aes192>(&derived, iv, &ciphertext),
                _ => cbc_decrypt::<Aes256>(&derived, iv, &ciphertext),
            },
        }
        .ok_or(Error::InvalidKeyLength {
            cipher,
            len: derived.len(),
        })?;

        let plaintext = padding::unpad(&padded, block_size).map_err(DecryptionError::from)?;
        Ok(plaintext.to_vec())
    }

    /// Whether `value` plausibly came out of [`Envelope::encrypt`] for this
    /// spec. Never fails.
    pub fn is_encrypted(&self, value: &EncryptedValue) -> bool {
        value.ciphertext().map_or(false, |ciphertext| {
            !ciphertext.is_empty() && ciphertext.len() % self.block_size() == 0
        })
    }
}

/// CBC-encrypt block-aligned `data`. `None` if the key length is rejected.
fn cbc_encrypt<C>(key: &[u8], iv: &[u8], data: &[u8]) -> Option<Vec<u8>>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let encryptor = cbc::Encryptor::<C>::new_from_slices(key, iv).ok()?;
    Some(encryptor.encrypt_padded_vec_mut::<NoPadding>(data))
}

/// CBC-decrypt block-aligned `data`. `None` if the key length is rejected.
fn cbc_decrypt<C>(key: &[u8], iv: &[u8], data: &[u8]) -> Option<Vec<u8>>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv).ok()?;
    decryptor.decrypt_padded_vec_mut::<NoPadding>(data).ok()
}
