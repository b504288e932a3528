//! Tiered authentication service
//!
//! Resolves an access token through the tiers in order:
//!
//! ```text
//! token ──► RemoteValidator ──(unreachable)──► LocalValidator
//!                                                  │
//!                                       (no key / not a JWT)
//!                                                  ▼
//!                                           OfflineStore
//! ```
//!
//! The offline store is only consulted when the network tiers could not
//! vouch for the token one way or the other. A definite rejection (bad
//! signature, expiry, `valid=false`) is final.

use std::sync::Arc;

use tiergate_common::auth::{
    AuthError, CredentialStore, KeyCacheConfig, KeyFetcher, LocalValidator, OAuthClient,
    OAuthConfig, PublicKeyCache, RefreshConfig, RefreshManager, TokenStore, TokenValidator,
    ValidationOutcome,
};
use tiergate_common::security::KeychainProvider;
use tiergate_domain::{AccessTokenClaims, Config, LocalUser, Result, TiergateError, TokenPair};
use tracing::{debug, info, instrument, warn};

use crate::api::{RemoteKeyFetcher, RemoteValidator};
use crate::database::OfflineStore;
use crate::errors::InfraError;
use crate::http::HttpClient;

/// Who a token belongs to, and which tier said so
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthIdentity {
    /// Vouched for by the identity service or a local signature check
    Token(AccessTokenClaims),
    /// Found in the offline store
    Offline(LocalUser),
}

impl AuthIdentity {
    /// Stable subject: the token's `sub`, or the local user id.
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::Token(claims) => claims.sub.clone(),
            Self::Offline(user) => user.id.to_string(),
        }
    }

    #[must_use]
    pub fn email(&self) -> &str {
        match self {
            Self::Token(claims) => &claims.email,
            Self::Offline(user) => &user.email,
        }
    }

    #[must_use]
    pub const fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }
}

/// Every validation tier, built once from [`Config`]
pub struct TieredAuthenticator {
    validator: Arc<dyn TokenValidator>,
    local: Arc<LocalValidator>,
    offline: Option<OfflineStore>,
}

impl std::fmt::Debug for TieredAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredAuthenticator")
            .field("local", &self.local)
            .field("offline", &self.offline.is_some())
            .finish_non_exhaustive()
    }
}

impl TieredAuthenticator {
    /// Assemble from pre-built tiers.
    #[must_use]
    pub fn new(
        validator: Arc<dyn TokenValidator>,
        local: Arc<LocalValidator>,
        offline: Option<OfflineStore>,
    ) -> Self {
        Self { validator, local, offline }
    }

    /// Build every tier the configuration enables.
    ///
    /// With `identity.local_only` the local validator answers directly;
    /// with `offline.enabled` the offline database is opened and migrated.
    ///
    /// # Errors
    /// - `TiergateError::Config` for a bad base URL or HTTP settings
    /// - `TiergateError::Database` if the offline database cannot be opened
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher: Arc<dyn KeyFetcher> = Arc::new(RemoteKeyFetcher::new(&config.identity)?);
        let cache =
            PublicKeyCache::with_config(fetcher, KeyCacheConfig::from(&config.key_cache));
        let local = Arc::new(LocalValidator::new(cache));

        let validator: Arc<dyn TokenValidator> = if config.identity.local_only {
            info!("Remote validation disabled, using local validator only");
            Arc::clone(&local) as Arc<dyn TokenValidator>
        } else {
            let http = HttpClient::for_identity_service(&config.identity)?;
            Arc::new(RemoteValidator::new(http, &config.identity.base_url, Arc::clone(&local))?)
        };

        let offline = if config.offline.enabled {
            Some(OfflineStore::open(&config.offline)?)
        } else {
            None
        };

        info!(
            base_url = %config.identity.base_url,
            local_only = config.identity.local_only,
            offline = offline.is_some(),
            "Tiered authenticator ready"
        );
        Ok(Self::new(validator, local, offline))
    }

    /// The first tier consulted.
    #[must_use]
    pub fn validator(&self) -> &Arc<dyn TokenValidator> {
        &self.validator
    }

    #[must_use]
    pub fn local(&self) -> &LocalValidator {
        &self.local
    }

    #[must_use]
    pub const fn offline(&self) -> Option<&OfflineStore> {
        self.offline.as_ref()
    }

    /// Resolve `token` to an identity.
    ///
    /// # Errors
    /// - `TiergateError::Auth` / `Expired` when a tier rejects the token
    /// - `TiergateError::Network` when no tier could answer and there is no
    ///   offline store
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> Result<AuthIdentity> {
        match self.validator.validate_access_token(token).await {
            Ok(claims) => {
                debug!(sub = %claims.sub, "Token vouched for by network tiers");
                Ok(AuthIdentity::Token(claims))
            }
            Err(err) if needs_offline_tier(&err) => match &self.offline {
                Some(store) => {
                    warn!(error = %err, "Network tiers unavailable, trying offline store");
                    let user_id = store.validate_token(token).await.map_err(map_infra)?;
                    let user = store.get_user(user_id).await.map_err(map_infra)?;
                    Ok(AuthIdentity::Offline(user))
                }
                None => Err(map_infra(err)),
            },
            Err(err) => Err(map_infra(err)),
        }
    }

    /// Report on `token` through the network tiers without failing.
    pub async fn validate_token(&self, token: &str) -> ValidationOutcome {
        self.validator.validate_token(token).await
    }

    /// Sign in against the offline store and hand back a token pair.
    ///
    /// # Errors
    /// - `TiergateError::Config` if the offline store is disabled
    /// - `TiergateError::Auth` for bad credentials
    pub async fn login_offline(&self, email: &str, password: &str) -> Result<TokenPair> {
        let store = self.offline_store()?;
        let session = store.authenticate(email, password).await.map_err(map_infra)?;
        Ok(session.to_token_pair())
    }

    /// End the offline session owning `access_token`.
    ///
    /// # Errors
    /// - `TiergateError::Config` if the offline store is disabled
    /// - `TiergateError::Database` if the delete fails
    pub async fn logout_offline(&self, access_token: &str) -> Result<()> {
        self.offline_store()?.delete_session(access_token).await.map_err(map_infra)
    }

    /// Stop background key refreshes.
    pub async fn shutdown(&self) {
        self.local.cache().shutdown().await;
    }

    fn offline_store(&self) -> Result<&OfflineStore> {
        self.offline
            .as_ref()
            .ok_or_else(|| TiergateError::Config("offline store is disabled".into()))
    }
}

/// Whether no network tier could give a definite answer for the token.
///
/// Offline tokens are opaque, so a malformed token is only final when the
/// identity service itself looked at it.
fn needs_offline_tier(err: &AuthError) -> bool {
    match err {
        AuthError::Transport(_) | AuthError::KeyFetch(_) | AuthError::MalformedToken(_) => true,
        AuthError::FallbackExhausted { local, .. } => needs_offline_tier(local),
        _ => false,
    }
}

/// OAuth client from the `oauth` settings.
#[must_use]
pub fn oauth_client(config: &Config) -> OAuthClient {
    OAuthClient::new(OAuthConfig::from(&config.oauth))
}

/// Credential store over the OS keychain service named in `keychain`.
#[must_use]
pub fn credential_store(config: &Config) -> CredentialStore<KeychainProvider> {
    CredentialStore::new(KeychainProvider::new(config.keychain.service_name.clone()))
}

/// Refresh manager persisting into the OS keychain, or `None` when
/// background refresh is disabled.
#[must_use]
pub fn refresh_manager(config: &Config) -> Option<RefreshManager<OAuthClient>> {
    if !config.refresh.enabled {
        return None;
    }
    let store: Arc<dyn TokenStore> = Arc::new(credential_store(config));
    let manager = RefreshManager::new(
        Arc::new(oauth_client(config)),
        RefreshConfig::from(&config.refresh),
    )
    .with_token_store(store);
    debug!(
        threshold_secs = manager.config().threshold.as_secs(),
        interval_secs = manager.config().check_interval.as_secs(),
        "Refresh manager configured"
    );
    Some(manager)
}

fn map_infra<E>(err: E) -> TiergateError
where
    InfraError: From<E>,
{
    InfraError::from(err).into()
}
