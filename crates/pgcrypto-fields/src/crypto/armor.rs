//! OpenPGP ASCII armor (RFC 4880 §6.2) as produced and consumed by
//! pgcrypto's `armor()` / `dearmor()`.
//!
//! The body is standard base64 on a single line; pgcrypto wraps at 76
//! columns but accepts any line length, and [`dearmor`] accepts both.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// First line of every armored message.
pub const BEGIN_LINE: &str = "-----BEGIN PGP MESSAGE-----";

/// Last line of every armored message.
pub const END_LINE: &str = "-----END PGP MESSAGE-----";

/// Header written when the armor is versioned.
pub const VERSION_HEADER: &str = concat!("Version: pgcrypto-fields ", env!("CARGO_PKG_VERSION"));

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

/// Errors produced while dearmoring text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArmorError {
    #[error("armor: missing `{BEGIN_LINE}` line")]
    MissingBeginLine,

    #[error("armor: missing blank line before body")]
    MissingBody,

    #[error("armor: body is not valid base64")]
    InvalidBase64,

    #[error("armor: checksum line is malformed")]
    InvalidChecksum,

    #[error("armor: checksum mismatch")]
    BadChecksum,
}

/// Armor `data`, optionally embedding a [`VERSION_HEADER`].
///
/// The body line is exactly `ceil(len / 3) * 4` characters.
pub fn armor(data: &[u8], versioned: bool) -> String {
    let crc = crc24(data).to_be_bytes();
    let headers = if versioned {
        format!("{VERSION_HEADER}\n")
    } else {
        String::new()
    };
    format!(
        "{BEGIN_LINE}\n{headers}\n{}\n={}\n{END_LINE}",
        STANDARD.encode(data),
        STANDARD.encode(&crc[1..]),
    )
}

/// Decode an armored message back to its payload bytes.
///
/// Header lines are ignored. The checksum line is optional, but when present
/// it must match the payload.
///
/// # Errors
///
/// Returns [`ArmorError`] if the framing, base64 body or checksum is invalid.
pub fn dearmor(text: &str) -> Result<Vec<u8>, ArmorError> {
    let mut lines = text.trim().lines().map(str::trim_end);

    if !lines.by_ref().any(|line| line.starts_with("-----BEGIN")) {
        return Err(ArmorError::MissingBeginLine);
    }

    // Headers run until the first blank line.
    let mut in_body = false;
    for line in lines.by_ref() {
        if line.starts_with("-----END") {
            break;
        }
        if line.trim().is_empty() {
            in_body = true;
            break;
        }
    }
    if !in_body {
        return Err(ArmorError::MissingBody);
    }

    let mut body = String::new();
    let mut checksum = None;
    for line in lines {
        if line.starts_with("-----END") {
            break;
        }
        if let Some(crc) = line.strip_prefix('=') {
            checksum = Some(crc);
            break;
        }
        body.push_str(line.trim());
    }

    let data = STANDARD
        .decode(body.as_bytes())
        .map_err(|_| ArmorError::InvalidBase64)?;

    if let Some(crc) = checksum {
        let raw = STANDARD
            .decode(crc.trim())
            .map_err(|_| ArmorError::InvalidChecksum)?;
        let expected: [u8; 3] = raw
            .as_slice()
            .try_into()
            .map_err(|_| ArmorError::InvalidChecksum)?;
        let expected = u32::from_be_bytes([0, expected[0], expected[1], expected[2]]);
        if expected != crc24(&data) {
            return Err(ArmorError::BadChecksum);
        }
    }

    Ok(data)
}

/// Heuristic test for "this text is already an armored ciphertext".
///
/// Used to avoid double-encrypting values and to pass legacy plaintext
/// through untouched. Never fails; any decoding problem yields `false`.
pub fn is_encrypted(text: &str) -> bool {
    text.trim_start().starts_with(BEGIN_LINE)
        && dearmor(text).map_or(false, |data| !data.is_empty())
}

/// OpenPGP CRC-24 (RFC 4880 §6.1).
fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    const BF_CIPHERTEXT: &str = "7bd4a7b7a1377b2b2322c772c0d92417576a381ef9002c42";

    fn bf_bytes() -> Vec<u8> {
        hex::decode(BF_CIPHERTEXT).unwrap()
    }

    #[test]
    fn crc24_check_value() {
        assert_eq!(crc24(b""), CRC24_INIT);
        assert_eq!(crc24(b"123456789"), 0x21CF02);
    }

    #[test]
    fn armor_matches_known_output() {
        let expected = "-----BEGIN PGP MESSAGE-----\n\n\
                        e9Snt6E3eysjIsdywNkkF1dqOB75ACxC\n\
                        =q+BK\n\
                        -----END PGP MESSAGE-----";
        assert_eq!(armor(&bf_bytes(), false), expected);
    }

    #[test]
    fn armor_dearmor_round_trip() {
        for len in 0..64u8 {
            let data: Vec<u8> = (0..len).map(|b| b.wrapping_mul(37)).collect();
            assert_eq!(dearmor(&armor(&data, false)).unwrap(), data);
            assert_eq!(dearmor(&armor(&data, true)).unwrap(), data);
        }
    }

    #[test]
    fn body_length_is_fixed_function_of_input() {
        for len in [1usize, 2, 3, 4, 24, 32, 100] {
            let text = armor(&vec![0xAB; len], false);
            let body = text.lines().nth(2).unwrap();
            assert_eq!(body.len(), len.div_ceil(3) * 4);
        }
    }

    #[test]
    fn versioned_armor_carries_header() {
        let text = armor(&bf_bytes(), true);
        assert_eq!(text.lines().nth(1), Some(VERSION_HEADER));
        assert_eq!(text.lines().nth(2), Some(""));
    }

    #[test]
    fn dearmor_accepts_wrapped_body_and_crlf() {
        let text = "-----BEGIN PGP MESSAGE-----\r\n\
                    Comment: wrapped\r\n\
                    \r\n\
                    e9Snt6E3eysjIsdy\r\n\
                    wNkkF1dqOB75ACxC\r\n\
                    =q+BK\r\n\
                    -----END PGP MESSAGE-----\r\n";
        assert_eq!(dearmor(text).unwrap(), bf_bytes());
    }

    #[test]
    fn dearmor_tolerates_missing_checksum() {
        let text = "-----BEGIN PGP MESSAGE-----\n\ne9Snt6E3eysjIsdywNkkF1dqOB75ACxC\n-----END PGP MESSAGE-----";
        assert_eq!(dearmor(text).unwrap(), bf_bytes());
    }

    #[test]
    fn dearmor_rejects_bad_checksum() {
        let text = armor(&bf_bytes(), false).replace("=q+BK", "=AAAA");
        assert_eq!(dearmor(&text), Err(ArmorError::BadChecksum));
    }

    #[test]
    fn dearmor_rejects_malformed_input() {
        assert_eq!(dearmor("sensitive"), Err(ArmorError::MissingBeginLine));
        assert_eq!(
            dearmor("-----BEGIN PGP MESSAGE-----\nVersion: x"),
            Err(ArmorError::MissingBody)
        );
        assert_eq!(
            dearmor("-----BEGIN PGP MESSAGE-----\n\n!!!!\n-----END PGP MESSAGE-----"),
            Err(ArmorError::InvalidBase64)
        );
        assert_eq!(
            dearmor("-----BEGIN PGP MESSAGE-----\n\nAAAA\n=A\n-----END PGP MESSAGE-----"),
            Err(ArmorError::InvalidChecksum)
        );
    }

    #[test]
    fn is_encrypted_detects_armor() {
        assert!(is_encrypted(&armor(&bf_bytes(), false)));
        assert!(is_encrypted(&armor(&bf_bytes(), true)));
        assert!(!is_encrypted("example"));
        assert!(!is_encrypted(""));
        assert!(!is_encrypted("-----BEGIN PGP MESSAGE-----\n\n%%%"));
    }
}
