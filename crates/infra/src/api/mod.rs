//! Identity service adapters
//!
//! - [`RemoteKeyFetcher`]: `GET /api/auth/public-key`, feeds the key cache
//! - [`RemoteValidator`]: `POST /api/auth/validate` with local fallback

pub mod key_fetcher;
pub mod types;
pub mod validator;

pub use key_fetcher::RemoteKeyFetcher;
pub use types::{PublicKeyResponse, ValidateRequest, ValidateResponse};
pub use validator::RemoteValidator;

use tiergate_domain::{Result, TiergateError};
use url::Url;

/// Join an endpoint path onto the configured base URL.
///
/// Any path on the base is kept, so `https://host/v2` + `/api/auth/validate`
/// becomes `https://host/v2/api/auth/validate`.
pub(crate) fn endpoint_url(base_url: &str, endpoint: &str) -> Result<Url> {
    let base = Url::parse(base_url).map_err(|e| {
        TiergateError::Config(format!("invalid identity service URL {base_url}: {e}"))
    })?;
    if base.cannot_be_a_base() {
        return Err(TiergateError::Config(format!(
            "identity service URL {base_url} cannot be a base"
        )));
    }

    let joined = format!("{}{}", base.as_str().trim_end_matches('/'), endpoint);
    Url::parse(&joined)
        .map_err(|e| TiergateError::Config(format!("invalid endpoint URL {joined}: {e}")))
}
