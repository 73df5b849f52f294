//! Checksum sidecar parsing and SHA-256 payload verification.
//!
//! Archive payloads ship with a text sidecar of the form
//! `<64-hex sha256>  <filename>`. Sidecars in the wild carry header lines,
//! stray binary, and inconsistent spacing, so extraction scans for the first
//! well-formed digest token instead of parsing positionally. Policy (whether
//! a failure is a warning or a hard fault) is decided by callers; this module
//! only computes facts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::CandelaError;

/// Outcome of verifying one payload against its sidecar digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumRecord {
    /// Digest the sidecar promised, lowercased.
    pub expected_hash: String,
    /// Digest computed over the payload bytes.
    pub actual_hash: String,
    /// Payload path or URL, for diagnostics.
    pub file_path: String,
    /// Whether the two digests matched (case-insensitive).
    pub verified: bool,
}

fn is_digest_token(token: &str) -> bool {
    token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Extract the expected SHA-256 digest from a checksum sidecar payload.
///
/// The payload is decoded lossily so embedded binary noise cannot abort the
/// scan; whitespace-separated tokens are then searched for the first 64-char
/// hex run, which is returned lowercased.
///
/// ```
/// use candela_core::checksum::extract_expected_hash;
///
/// let sidecar = b"# generated 2024-01-02\nABCDEF0123456789abcdef0123456789abcdef0123456789abcdef0123456789  BTCUSDT-1m-2024-01-01.zip\n";
/// let digest = extract_expected_hash(sidecar).unwrap();
/// assert_eq!(&digest[..6], "abcdef");
/// ```
///
/// # Errors
/// Returns `CandelaError::NotFound` when no well-formed digest token exists.
/// Callers must treat that as "integrity unverifiable", never as "verified".
pub fn extract_expected_hash(payload: &[u8]) -> Result<String, CandelaError> {
    let text = String::from_utf8_lossy(payload);
    text.split_whitespace()
        .find(|tok| is_digest_token(tok))
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| CandelaError::not_found("sha-256 digest in checksum sidecar"))
}

/// Verify payload bytes against an expected hex digest.
///
/// Hashes the full stream and compares case-insensitively. The outcome is
/// returned as a value either way; mismatches do not error here because the
/// freshness-window policy may downgrade them.
#[must_use]
pub fn verify(data: &[u8], expected: &str, file_path: &str) -> ChecksumRecord {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let actual_hash = hex::encode(hasher.finalize());
    let verified = actual_hash.eq_ignore_ascii_case(expected);
    #[cfg(feature = "tracing")]
    if !verified {
        tracing::warn!(
            file = file_path,
            expected,
            actual = actual_hash.as_str(),
            "checksum mismatch"
        );
    }
    ChecksumRecord {
        expected_hash: expected.to_ascii_lowercase(),
        actual_hash,
        file_path: file_path.to_string(),
        verified,
    }
}
