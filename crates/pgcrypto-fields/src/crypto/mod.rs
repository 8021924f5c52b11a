//! pgcrypto-compatible encryption primitives.
//!
//! This module is free of record, schema and storage concerns. It provides
//! the byte-level envelope used by [`crate::field`].
//!
//! # Ciphertext format
//!
//! ```text
//! raw     = CBC(derive_key(key), iv = 0^blocksize, pad(plaintext))
//! armored = -----BEGIN PGP MESSAGE-----
//!           [Version: ...]
//!
//!           base64(raw)
//!           =base64(crc24(raw))
//!           -----END PGP MESSAGE-----
//! ```
//!
//! This is exactly what `armor(encrypt(plaintext, key, 'bf'))` returns
//! inside PostgreSQL (modulo body line wrapping and the optional header).

pub mod armor;
pub mod cipher;
pub mod kdf;
pub mod padding;

pub use armor::{armor, dearmor, is_encrypted, ArmorError};
pub use cipher::{CipherKind, CipherSpec, DecryptionError, EncryptedValue, Envelope};
pub use padding::{pad, unpad, PaddingError};
