//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 for secure OAuth authorization without client secrets.
//! Random material comes from the operating system CSPRNG.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Unreserved characters allowed in a code verifier (RFC 7636 §4.1)
pub const VERIFIER_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of generated verifiers (the RFC maximum)
pub const CODE_VERIFIER_LENGTH: usize = 128;
/// Shortest verifier a counterparty may send
pub const MIN_CODE_VERIFIER_LENGTH: usize = 43;
/// base64url-no-pad length of a SHA-256 digest
pub const CODE_CHALLENGE_LENGTH: usize = 43;
/// Random bytes behind a state token
pub const STATE_BYTES: usize = 32;
/// The only supported challenge method
pub const CHALLENGE_METHOD: &str = "S256";

// Largest multiple of the alphabet size that fits in a byte; bytes at or
// above it are redrawn so every character is equally likely.
#[allow(clippy::cast_possible_truncation)]
const REJECTION_BOUND: u8 = (256 / VERIFIER_ALPHABET.len() * VERIFIER_ALPHABET.len()) as u8;

/// PKCE errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PkceError {
    #[error("failed to generate PKCE parameters: {0}")]
    Generation(String),

    #[error("invalid code verifier format: {0}")]
    InvalidCodeVerifier(String),

    #[error("invalid code challenge: {0}")]
    InvalidCodeChallenge(String),
}

/// Generate a 128-character code verifier from the unreserved alphabet.
///
/// # Errors
/// Returns `PkceError::Generation` if the OS random source fails.
pub fn generate_code_verifier() -> Result<String, PkceError> {
    let mut verifier = String::with_capacity(CODE_VERIFIER_LENGTH);
    let mut buf = [0u8; CODE_VERIFIER_LENGTH];

    while verifier.len() < CODE_VERIFIER_LENGTH {
        OsRng.try_fill_bytes(&mut buf).map_err(|e| PkceError::Generation(e.to_string()))?;
        for byte in buf.iter().copied().filter(|b| *b < REJECTION_BOUND) {
            if verifier.len() == CODE_VERIFIER_LENGTH {
                break;
            }
            verifier.push(char::from(VERIFIER_ALPHABET[usize::from(byte) % VERIFIER_ALPHABET.len()]));
        }
    }

    Ok(verifier)
}

/// Derive the S256 code challenge: BASE64URL(SHA256(ASCII(verifier))).
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random state token for CSRF protection.
///
/// # Errors
/// Returns `PkceError::Generation` if the OS random source fails.
pub fn generate_state() -> Result<String, PkceError> {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| PkceError::Generation(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Validate that the state token matches
///
/// # Returns
/// `true` if states match, `false` otherwise
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    expected.len() == actual.len()
        && expected.bytes().zip(actual.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// Check a verifier's length (43-128) and alphabet.
///
/// # Errors
/// Returns `PkceError::InvalidCodeVerifier` naming the violation.
pub fn validate_code_verifier(verifier: &str) -> Result<(), PkceError> {
    let len = verifier.len();
    if !(MIN_CODE_VERIFIER_LENGTH..=CODE_VERIFIER_LENGTH).contains(&len) {
        return Err(PkceError::InvalidCodeVerifier(format!(
            "length must be {MIN_CODE_VERIFIER_LENGTH}-{CODE_VERIFIER_LENGTH} characters, got {len}"
        )));
    }

    if let Some((pos, ch)) =
        verifier.char_indices().find(|(_, c)| !c.is_ascii() || !VERIFIER_ALPHABET.contains(&(*c as u8)))
    {
        return Err(PkceError::InvalidCodeVerifier(format!(
            "invalid character at position {pos}: {ch}"
        )));
    }

    Ok(())
}

/// Check a challenge is 43 characters of base64url.
///
/// # Errors
/// Returns `PkceError::InvalidCodeChallenge` naming the violation.
pub fn validate_code_challenge(challenge: &str) -> Result<(), PkceError> {
    if challenge.len() != CODE_CHALLENGE_LENGTH {
        return Err(PkceError::InvalidCodeChallenge(format!(
            "expected {CODE_CHALLENGE_LENGTH} characters for SHA-256 base64url encoding, got {}",
            challenge.len()
        )));
    }

    URL_SAFE_NO_PAD
        .decode(challenge)
        .map_err(|e| PkceError::InvalidCodeChallenge(format!("invalid base64url encoding: {e}")))?;

    Ok(())
}

/// PKCE parameters for one authorization attempt
///
/// The verifier stays local until the token exchange; the challenge and
/// state go out in the authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceParams {
    /// 128 characters from [`VERIFIER_ALPHABET`]
    pub code_verifier: String,

    /// SHA-256 of the verifier, base64url without padding
    pub code_challenge: String,

    /// Always `S256`
    pub method: String,

    /// Random CSRF protection token
    pub state: String,
}

impl PkceParams {
    /// Generate fresh parameters.
    ///
    /// # Examples
    /// ```
    /// use tiergate_common::auth::pkce::PkceParams;
    ///
    /// let params = PkceParams::generate().expect("Failed to generate PKCE parameters");
    /// assert_eq!(params.code_verifier.len(), 128);
    /// assert_eq!(params.code_challenge.len(), 43);
    /// ```
    ///
    /// # Errors
    /// Returns `PkceError::Generation` if the OS random source fails.
    pub fn generate() -> Result<Self, PkceError> {
        let code_verifier = generate_code_verifier()?;
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state()?;

        Ok(Self { code_verifier, code_challenge, method: CHALLENGE_METHOD.to_string(), state })
    }

    /// Run the verifier and challenge validators over these parameters.
    ///
    /// # Errors
    /// Returns the first validation failure.
    pub fn self_check(&self) -> Result<(), PkceError> {
        validate_code_verifier(&self.code_verifier)?;
        validate_code_challenge(&self.code_challenge)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::pkce.
    use std::collections::HashSet;

    use super::*;

    /// Validates `PkceParams::generate` behavior for the generate pkce
    /// parameters scenario.
    ///
    /// Assertions:
    /// - Confirms the verifier is 128 characters and passes validation.
    /// - Confirms the challenge is 43 characters and passes validation.
    /// - Confirms `method` equals `"S256"`.
    #[test]
    fn test_generate_pkce_params() {
        let params = PkceParams::generate().expect("Failed to generate params");

        assert_eq!(params.code_verifier.len(), CODE_VERIFIER_LENGTH);
        assert_eq!(params.code_challenge.len(), CODE_CHALLENGE_LENGTH);
        assert_eq!(params.method, "S256");
        assert!(!params.state.is_empty());
        params.self_check().expect("generated params should validate");
    }

    /// Validates `PkceParams::generate` behavior for the 100 generations
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms 100 generations yield 100 distinct verifiers, challenges
    ///   and states.
    #[test]
    fn test_unique_params() {
        let mut verifiers = HashSet::new();
        let mut challenges = HashSet::new();
        let mut states = HashSet::new();

        for _ in 0..100 {
            let params = PkceParams::generate().expect("Failed to generate params");
            verifiers.insert(params.code_verifier);
            challenges.insert(params.code_challenge);
            states.insert(params.state);
        }

        assert_eq!(verifiers.len(), 100);
        assert_eq!(challenges.len(), 100);
        assert_eq!(states.len(), 100);
    }

    /// Validates `generate_code_challenge` behavior for the RFC 7636
    /// appendix B vector scenario.
    ///
    /// Assertions:
    /// - Confirms the published verifier maps to the published challenge.
    #[test]
    fn test_code_challenge_rfc_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            generate_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    /// Validates `generate_code_challenge` behavior for the code challenge
    /// deterministic scenario.
    ///
    /// Assertions:
    /// - Confirms the stored challenge equals a recomputation.
    /// - Ensures no padding or non-URL-safe characters appear.
    #[test]
    fn test_code_challenge_deterministic() {
        let params = PkceParams::generate().expect("Failed to generate params");
        assert_eq!(params.code_challenge, generate_code_challenge(&params.code_verifier));

        for value in [&params.code_challenge, &params.state] {
            assert!(!value.contains('='));
            assert!(!value.contains('+'));
            assert!(!value.contains('/'));
        }
    }

    /// Validates `validate_code_verifier` behavior for the length and
    /// charset scenario.
    ///
    /// Assertions:
    /// - Ensures 42 and 129 characters are rejected.
    /// - Ensures 43 and 128 characters are accepted.
    /// - Ensures a disallowed character is reported with its position.
    #[test]
    fn test_validate_code_verifier() {
        assert!(matches!(
            validate_code_verifier(&"a".repeat(42)),
            Err(PkceError::InvalidCodeVerifier(_))
        ));
        assert!(validate_code_verifier(&"a".repeat(129)).is_err());
        assert!(validate_code_verifier(&"a".repeat(43)).is_ok());
        assert!(validate_code_verifier(&"a".repeat(128)).is_ok());

        let bad = format!("{}+{}", "a".repeat(10), "b".repeat(40));
        let err = validate_code_verifier(&bad).unwrap_err();
        assert!(err.to_string().contains("position 10"));
    }

    /// Validates `validate_code_challenge` behavior for the malformed
    /// challenge scenario.
    ///
    /// Assertions:
    /// - Ensures a wrong length is rejected.
    /// - Ensures 43 characters outside base64url are rejected.
    #[test]
    fn test_validate_code_challenge() {
        assert!(matches!(
            validate_code_challenge("short"),
            Err(PkceError::InvalidCodeChallenge(_))
        ));
        assert!(validate_code_challenge(&"*".repeat(43)).is_err());
    }

    /// Validates `validate_state` behavior for the mismatch scenario.
    ///
    /// Assertions:
    /// - Ensures equal states match and different states do not.
    #[test]
    fn test_validate_state() {
        assert!(validate_state("abc", "abc"));
        assert!(!validate_state("abc", "abd"));
        assert!(!validate_state("abc", "abcd"));
    }
}
