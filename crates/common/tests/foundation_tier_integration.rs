//! Integration tests for the foundation tier
//!
//! Only the pure `auth` items are used here so the file builds with
//! `--no-default-features --features foundation`.

use tiergate_common::auth::pkce::{
    generate_code_challenge, validate_code_challenge, validate_code_verifier, validate_state,
};
use tiergate_common::{AuthError, PkceParams};

/// Validates PKCE generation without the runtime tier.
///
/// # Test Steps
/// 1. Generate fresh parameters
/// 2. Re-derive the challenge from the verifier
/// 3. Run both validators and the state comparison
#[test]
fn test_pkce_round_without_runtime() {
    let params = PkceParams::generate().expect("PKCE parameters");

    assert_eq!(params.method, "S256");
    assert_eq!(generate_code_challenge(&params.code_verifier), params.code_challenge);
    validate_code_verifier(&params.code_verifier).expect("verifier is well formed");
    validate_code_challenge(&params.code_challenge).expect("challenge is well formed");
    assert!(validate_state(&params.state, &params.state));
    params.self_check().expect("self check");
}

/// Validates the error taxonomy helpers without the runtime tier.
///
/// # Test Steps
/// 1. Wrap an expiry inside a fallback failure
/// 2. Classification sees through the wrapper
#[test]
fn test_error_taxonomy_without_runtime() {
    let err = AuthError::FallbackExhausted {
        remote: "connection refused".to_string(),
        local: Box::new(AuthError::Expired { expires_at: None }),
    };

    assert!(err.is_expired());
    assert!(!err.is_transport());
    assert!(AuthError::KeyFetch("timeout".to_string()).is_transport());
}
