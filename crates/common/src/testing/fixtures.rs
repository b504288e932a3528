//! Test fixtures
//!
//! RSA and EC key material for token tests, plus random identity helpers.
//! The keys are test-only and must never sign anything real.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// RSA-2048 signing key A, PKCS#1 `RSA PRIVATE KEY`
pub const SIGNING_KEY_A_PEM: &str = include_str!("../../tests/fixtures/keys/signing_a.pem");

/// RSA-2048 signing key B, unrelated to key A
pub const SIGNING_KEY_B_PEM: &str = include_str!("../../tests/fixtures/keys/signing_b.pem");

/// Public half of key A as a PKIX `PUBLIC KEY` block
pub const PUBLIC_KEY_A_PEM: &str = include_str!("../../tests/fixtures/keys/public_a.pem");

/// Public half of key B as a PKIX `PUBLIC KEY` block
pub const PUBLIC_KEY_B_PEM: &str = include_str!("../../tests/fixtures/keys/public_b.pem");

/// Public half of key A as a PKCS#1 `RSA PUBLIC KEY` block
pub const PUBLIC_KEY_A_PKCS1_PEM: &str =
    include_str!("../../tests/fixtures/keys/public_a_pkcs1.pem");

/// P-256 public key, a valid PEM that is not RSA
pub const EC_PUBLIC_KEY_PEM: &str = include_str!("../../tests/fixtures/keys/ec_public.pem");

/// Generate a random alphanumeric string of specified length
///
/// # Examples
///
/// ```
/// use tiergate_common::testing::fixtures::random_string;
///
/// let s = random_string(10);
/// assert_eq!(s.len(), 10);
/// ```
#[must_use]
pub fn random_string(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

/// Generate a random email address
///
/// # Examples
///
/// ```
/// use tiergate_common::testing::fixtures::random_email;
///
/// let email = random_email();
/// assert!(email.ends_with("@example.com"));
/// ```
#[must_use]
pub fn random_email() -> String {
    format!("{}@example.com", random_string(10).to_lowercase())
}
