//! RSA key material handling
//!
//! Verification keys arrive as PEM text, either as an X.509
//! `SubjectPublicKeyInfo` block (`PUBLIC KEY`) or as a bare PKCS#1 block
//! (`RSA PUBLIC KEY`). Any other container is rejected.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::{DecodingKey, EncodingKey};

use super::error::{AuthError, AuthResult};

const PKIX_LABEL: &str = "PUBLIC KEY";
const PKCS1_LABEL: &str = "RSA PUBLIC KEY";
const PEM_LINE_WIDTH: usize = 64;

/// Which PEM container a verification key was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    /// `-----BEGIN PUBLIC KEY-----`
    Pkix,
    /// `-----BEGIN RSA PUBLIC KEY-----`
    Pkcs1,
}

impl fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pkix => write!(f, "PKIX"),
            Self::Pkcs1 => write!(f, "PKCS#1"),
        }
    }
}

/// Parsed RSA public key ready for signature verification
#[derive(Clone)]
pub struct VerificationKey {
    decoding_key: DecodingKey,
    pem: String,
    encoding: KeyEncoding,
}

impl VerificationKey {
    /// Key handle for `jsonwebtoken::decode`.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// PEM text the key was parsed from.
    #[must_use]
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Container the key was read from.
    #[must_use]
    pub const fn encoding(&self) -> KeyEncoding {
        self.encoding
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey").field("encoding", &self.encoding).finish_non_exhaustive()
    }
}

/// Parse an RSA public key from PEM text.
///
/// # Errors
/// Returns `AuthError::KeyFormat` if the text is not a PEM block, the block
/// label is neither `PUBLIC KEY` nor `RSA PUBLIC KEY`, the body is not valid
/// base64, or the key inside is not RSA.
pub fn parse_public_key_pem(pem: &str) -> AuthResult<VerificationKey> {
    let (label, _der) = decode_pem_block(pem)?;

    let encoding = match label.as_str() {
        PKIX_LABEL => KeyEncoding::Pkix,
        PKCS1_LABEL => KeyEncoding::Pkcs1,
        other => return Err(AuthError::KeyFormat(format!("invalid PEM type: {other}"))),
    };

    let decoding_key = DecodingKey::from_rsa_pem(pem.trim().as_bytes())
        .map_err(|e| AuthError::KeyFormat(format!("not an RSA public key: {e}")))?;

    Ok(VerificationKey { decoding_key, pem: pem.to_string(), encoding })
}

/// Parse an RSA private key (PKCS#1 or PKCS#8 PEM) for signing.
///
/// # Errors
/// Returns `AuthError::KeyFormat` if the key cannot be parsed.
pub fn signing_key_from_pem(pem: &str) -> AuthResult<EncodingKey> {
    EncodingKey::from_rsa_pem(pem.trim().as_bytes())
        .map_err(|e| AuthError::KeyFormat(format!("failed to parse private key: {e}")))
}

/// Armour DER-encoded `SubjectPublicKeyInfo` bytes as a `PUBLIC KEY` block.
#[must_use]
pub fn format_public_key_pem(der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str("-----BEGIN PUBLIC KEY-----\n");
    for chunk in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 output is ASCII, so every chunk is valid UTF-8
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}

/// Split a PEM block into its label and decoded body.
///
/// # Errors
/// Returns `AuthError::KeyFormat` when there is no well-formed block.
pub fn decode_pem_block(pem: &str) -> AuthResult<(String, Vec<u8>)> {
    let text = pem.trim();
    let decode_err = || AuthError::KeyFormat("failed to decode PEM block".to_string());

    let rest = text.strip_prefix("-----BEGIN ").ok_or_else(decode_err)?;
    let (label, rest) = rest.split_once("-----").ok_or_else(decode_err)?;
    let end_marker = format!("-----END {label}-----");
    let (body, _) = rest.split_once(end_marker.as_str()).ok_or_else(decode_err)?;

    let body: String = body.split_whitespace().collect();
    let der = STANDARD.decode(body).map_err(|_| decode_err())?;

    Ok((label.to_string(), der))
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::keys.
    use super::*;
    use crate::testing::fixtures;

    /// Validates `parse_public_key_pem` behavior for the two accepted
    /// containers scenario.
    ///
    /// Assertions:
    /// - Confirms a `PUBLIC KEY` block is reported as PKIX.
    /// - Confirms an `RSA PUBLIC KEY` block is reported as PKCS#1.
    #[test]
    fn test_parse_accepts_pkix_and_pkcs1() {
        let pkix = parse_public_key_pem(fixtures::PUBLIC_KEY_A_PEM).unwrap();
        assert_eq!(pkix.encoding(), KeyEncoding::Pkix);
        assert_eq!(pkix.encoding().to_string(), "PKIX");

        let pkcs1 = parse_public_key_pem(fixtures::PUBLIC_KEY_A_PKCS1_PEM).unwrap();
        assert_eq!(pkcs1.encoding(), KeyEncoding::Pkcs1);
        assert_eq!(pkcs1.pem(), fixtures::PUBLIC_KEY_A_PKCS1_PEM);
    }

    /// Validates `parse_public_key_pem` behavior for the unsupported input
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures garbage text fails with `KeyFormat`.
    /// - Ensures a private key block fails with an `invalid PEM type` message.
    /// - Ensures an EC public key fails with `KeyFormat`.
    #[test]
    fn test_parse_rejects_other_containers() {
        assert!(matches!(parse_public_key_pem("not a key"), Err(AuthError::KeyFormat(_))));

        let err = parse_public_key_pem(fixtures::SIGNING_KEY_A_PEM).unwrap_err();
        assert!(err.to_string().contains("invalid PEM type: RSA PRIVATE KEY"));

        assert!(matches!(
            parse_public_key_pem(fixtures::EC_PUBLIC_KEY_PEM),
            Err(AuthError::KeyFormat(_))
        ));
    }

    /// Validates `format_public_key_pem` behavior for the re-armour scenario.
    ///
    /// Assertions:
    /// - Confirms the re-armoured block decodes to the same bytes.
    /// - Ensures no body line exceeds 64 characters.
    /// - Confirms the result parses as a PKIX key.
    #[test]
    fn test_format_public_key_pem_roundtrips_der() {
        let (_, der) = decode_pem_block(fixtures::PUBLIC_KEY_A_PEM).unwrap();
        let pem = format_public_key_pem(&der);

        let (label, again) = decode_pem_block(&pem).unwrap();
        assert_eq!(label, "PUBLIC KEY");
        assert_eq!(again, der);
        assert!(pem.lines().all(|line| line.len() <= 64));
        assert_eq!(parse_public_key_pem(&pem).unwrap().encoding(), KeyEncoding::Pkix);
    }

    /// Validates `signing_key_from_pem` behavior for the public key input
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a private key parses.
    /// - Ensures a public key is rejected with `KeyFormat`.
    #[test]
    fn test_signing_key_from_pem() {
        assert!(signing_key_from_pem(fixtures::SIGNING_KEY_A_PEM).is_ok());
        assert!(matches!(
            signing_key_from_pem(fixtures::PUBLIC_KEY_A_PEM),
            Err(AuthError::KeyFormat(_))
        ));
    }
}
