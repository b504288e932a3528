//! RS256 token codec
//!
//! Issues and verifies the identity service's signed tokens. Verification
//! pins the algorithm to RS256 and checks issuer, audience, `nbf` and `exp`
//! with no leeway, so expiry boundaries are exact to the second.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tiergate_domain::constants::{
    ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS, TOKEN_AUDIENCE, TOKEN_ISSUER,
};
use tiergate_domain::{AccessTokenClaims, RefreshTokenClaims, TokenPair};

use super::error::{AuthError, AuthResult};
use super::types::ValidationOutcome;

/// Build access token claims issued at `issued_at`.
#[must_use]
pub fn access_claims(
    subject: &str,
    email: &str,
    roles: &[String],
    issued_at: DateTime<Utc>,
) -> AccessTokenClaims {
    let iat = issued_at.timestamp();
    AccessTokenClaims {
        sub: subject.to_string(),
        email: email.to_string(),
        roles: roles.to_vec(),
        iss: TOKEN_ISSUER.to_string(),
        aud: vec![TOKEN_AUDIENCE.to_string()],
        iat,
        nbf: iat,
        exp: iat + ACCESS_TOKEN_TTL_SECS,
    }
}

/// Build refresh token claims issued at `issued_at`.
#[must_use]
pub fn refresh_claims(
    subject: &str,
    session_id: &str,
    issued_at: DateTime<Utc>,
) -> RefreshTokenClaims {
    let iat = issued_at.timestamp();
    RefreshTokenClaims {
        sub: subject.to_string(),
        session_id: session_id.to_string(),
        iss: TOKEN_ISSUER.to_string(),
        aud: vec![TOKEN_AUDIENCE.to_string()],
        iat,
        nbf: iat,
        exp: iat + REFRESH_TOKEN_TTL_SECS,
    }
}

/// Sign an arbitrary claim set with RS256.
///
/// # Errors
/// Returns `AuthError::Signing` if the key cannot sign.
pub fn encode_claims<T: Serialize>(claims: &T, signing_key: &EncodingKey) -> AuthResult<String> {
    encode(&Header::new(Algorithm::RS256), claims, signing_key)
        .map_err(|e| AuthError::Signing(e.to_string()))
}

/// Create a 24h access token.
///
/// # Errors
/// Returns `AuthError::Signing` if signing fails.
pub fn create_access_token(
    subject: &str,
    email: &str,
    roles: &[String],
    signing_key: &EncodingKey,
) -> AuthResult<String> {
    encode_claims(&access_claims(subject, email, roles, Utc::now()), signing_key)
}

/// Create a 7d refresh token bound to `session_id`.
///
/// # Errors
/// Returns `AuthError::Signing` if signing fails.
pub fn create_refresh_token(
    subject: &str,
    session_id: &str,
    signing_key: &EncodingKey,
) -> AuthResult<String> {
    encode_claims(&refresh_claims(subject, session_id, Utc::now()), signing_key)
}

/// Create an access/refresh pair.
///
/// # Errors
/// Returns `AuthError::Signing` if either token cannot be signed.
pub fn create_token_pair(
    subject: &str,
    email: &str,
    roles: &[String],
    session_id: &str,
    signing_key: &EncodingKey,
) -> AuthResult<TokenPair> {
    let access_token = create_access_token(subject, email, roles, signing_key)?;
    let refresh_token = create_refresh_token(subject, session_id, signing_key)?;
    Ok(TokenPair::new(access_token, refresh_token, ACCESS_TOKEN_TTL_SECS))
}

/// Verify an access token and return its claims.
///
/// # Errors
/// - `AuthError::MalformedToken` if the token cannot be parsed
/// - `AuthError::Rejected` on bad signature, algorithm, issuer or audience
/// - `AuthError::Expired` if `exp` has passed
/// - `AuthError::InvalidClaims` if subject or email is empty
pub fn validate_access_token(token: &str, key: &DecodingKey) -> AuthResult<AccessTokenClaims> {
    let claims: AccessTokenClaims = verify(token, key)?;
    require_non_empty("sub", &claims.sub)?;
    require_non_empty("email", &claims.email)?;
    Ok(claims)
}

/// Verify a refresh token and return its claims.
///
/// # Errors
/// Same as [`validate_access_token`], with `session_id` in place of email.
pub fn validate_refresh_token(token: &str, key: &DecodingKey) -> AuthResult<RefreshTokenClaims> {
    let claims: RefreshTokenClaims = verify(token, key)?;
    require_non_empty("sub", &claims.sub)?;
    require_non_empty("session_id", &claims.session_id)?;
    Ok(claims)
}

/// Validate an access token without failing the call.
///
/// The outcome distinguishes an expired token from an invalid one.
#[must_use]
pub fn validate_token(token: &str, key: &DecodingKey) -> ValidationOutcome {
    match validate_access_token(token, key) {
        Ok(claims) => ValidationOutcome::valid(claims),
        Err(err) => ValidationOutcome::invalid(err),
    }
}

/// Whether the token's `exp` has passed. The signature is NOT verified.
///
/// Agrees with verification: a token is still valid during its `exp` second.
///
/// # Errors
/// `AuthError::MalformedToken` if unparsable, `AuthError::MissingExpiration`
/// if there is no `exp`.
pub fn is_token_expired(token: &str) -> AuthResult<bool> {
    Ok(expiry_passed(get_token_expiration(token)?, Utc::now()))
}

fn expiry_passed(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at < now
}

/// Read the token's `exp`. The signature is NOT verified.
///
/// # Errors
/// Same as [`is_token_expired`].
pub fn get_token_expiration(token: &str) -> AuthResult<DateTime<Utc>> {
    let claims: ExpiryOnly = decode_claims_unverified(token)?;
    claims
        .exp
        .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
        .ok_or(AuthError::MissingExpiration)
}

/// Decode the claim set without checking signature, issuer, audience or
/// expiry. Only for UX hints, never for authorization decisions.
///
/// # Errors
/// Returns `AuthError::MalformedToken` if the token cannot be parsed into `T`.
pub fn decode_claims_unverified<T: DeserializeOwned>(token: &str) -> AuthResult<T> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<T>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::MalformedToken(e.to_string()))
}

#[derive(Deserialize)]
struct ExpiryOnly {
    exp: Option<i64>,
}

fn strict_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = 0;
    validation.validate_nbf = true;
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_audience(&[TOKEN_AUDIENCE]);
    validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);
    validation
}

fn verify<T: DeserializeOwned>(token: &str, key: &DecodingKey) -> AuthResult<T> {
    decode::<T>(token, key, &strict_validation()).map(|data| data.claims).map_err(|err| {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired {
                expires_at: get_token_expiration(token).ok(),
            },
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AuthError::MalformedToken(err.to_string()),
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                AuthError::KeyFormat(err.to_string())
            }
            ErrorKind::InvalidSignature => AuthError::Rejected("invalid signature".to_string()),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::Rejected("unexpected signing method".to_string())
            }
            ErrorKind::InvalidIssuer => {
                AuthError::Rejected(format!("invalid issuer, expected '{TOKEN_ISSUER}'"))
            }
            ErrorKind::InvalidAudience => {
                AuthError::Rejected(format!("invalid audience, expected '{TOKEN_AUDIENCE}'"))
            }
            ErrorKind::ImmatureSignature => AuthError::Rejected("token not yet valid".to_string()),
            ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::InvalidClaims(format!("missing claim: {claim}"))
            }
            _ => AuthError::Rejected(err.to_string()),
        }
    })
}

fn require_non_empty(name: &str, value: &str) -> AuthResult<()> {
    if value.is_empty() {
        return Err(AuthError::InvalidClaims(format!("claim {name} is empty")));
    }
    Ok(())
}
