//! Background token renewal
//!
//! [`RefreshManager`] holds the current token pair and renews it through the
//! OAuth client once the access token is within the refresh threshold of
//! expiry. Renewed pairs are handed to an optional [`TokenStore`]; a store
//! failure is logged and the in-memory pair stays current.
//!
//! The background loop follows the scheduler lifecycle used elsewhere in the
//! workspace: a cancellation token per run, a joinable task handle, and a
//! bounded join on stop. Each run carries its own id so a loop that is still
//! winding down can never mark a newer run as stopped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tiergate_domain::constants::{
    DEFAULT_REFRESH_CHECK_INTERVAL_SECS, DEFAULT_REFRESH_THRESHOLD_SECS,
    MIN_REFRESH_THRESHOLD_SECS,
};
use tiergate_domain::{RefreshSettings, TokenPair};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::client::OAuthClientError;
use super::traits::{OAuthClientTrait, TokenStore};

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Callback consulted when a renewal fails
///
/// Returning `true` marks the failure as needing a fresh login.
pub type RefreshFailHook = Arc<dyn Fn(&OAuthClientError) -> bool + Send + Sync>;

/// Error type for refresh manager operations
#[derive(Debug)]
pub enum RefreshError {
    /// `start` called while the loop is active
    AlreadyRunning,

    /// `start` called without an access token
    MissingTokens,

    /// The current pair has no refresh token
    NoRefreshToken,

    /// The OAuth server refused or could not be reached
    OAuth(OAuthClientError),

    /// Renewal failed and the fail hook asked for a new login
    ReauthRequired(OAuthClientError),

    /// The caller's cancellation token fired before the renewal finished
    Cancelled,
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "manager already running"),
            Self::MissingTokens => write!(f, "tokens cannot be empty"),
            Self::NoRefreshToken => write!(f, "no refresh token available"),
            Self::OAuth(e) => write!(f, "token refresh failed: {e}"),
            Self::ReauthRequired(e) => {
                write!(f, "refresh failed, re-authentication required: {e}")
            }
            Self::Cancelled => write!(f, "refresh cancelled"),
        }
    }
}

impl std::error::Error for RefreshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OAuth(e) | Self::ReauthRequired(e) => Some(e),
            _ => None,
        }
    }
}

impl RefreshError {
    /// Whether the caller must send the user through login again.
    #[must_use]
    pub const fn requires_reauth(&self) -> bool {
        matches!(self, Self::ReauthRequired(_) | Self::NoRefreshToken)
    }
}

/// Refresh timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Renew once the access token is this close to expiry
    pub threshold: Duration,
    /// How often the background loop checks
    pub check_interval: Duration,
}

impl RefreshConfig {
    /// Build a config, normalising the threshold
    ///
    /// A zero threshold means the default (5 minutes); anything else below
    /// one minute is raised to one minute. A zero interval means the default
    /// (1 minute).
    #[must_use]
    pub fn new(threshold: Duration, check_interval: Duration) -> Self {
        let min_threshold = Duration::from_secs(MIN_REFRESH_THRESHOLD_SECS);
        let threshold = if threshold.is_zero() {
            Duration::from_secs(DEFAULT_REFRESH_THRESHOLD_SECS)
        } else {
            threshold.max(min_threshold)
        };
        let check_interval = if check_interval.is_zero() {
            Duration::from_secs(DEFAULT_REFRESH_CHECK_INTERVAL_SECS)
        } else {
            check_interval
        };

        Self { threshold, check_interval }
    }

    fn threshold_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.threshold)
            .unwrap_or_else(|_| chrono::Duration::minutes(1))
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl From<&RefreshSettings> for RefreshConfig {
    fn from(settings: &RefreshSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.threshold_seconds),
            Duration::from_secs(settings.check_interval_seconds),
        )
    }
}

/// Snapshot of the manager's timing state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshStatus {
    pub is_running: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// `expires_at` minus the threshold
    pub refresh_at: Option<DateTime<Utc>>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub time_until_expiry: Option<chrono::Duration>,
    pub time_until_refresh: Option<chrono::Duration>,
    pub needs_refresh: bool,
}

#[derive(Debug, Default)]
struct TokenState {
    tokens: Option<TokenPair>,
    expires_at: Option<DateTime<Utc>>,
    last_refresh_at: Option<DateTime<Utc>>,
}

/// Shared pieces the background loop needs
struct RefreshContext<C: OAuthClientTrait + 'static> {
    oauth_client: Arc<C>,
    token_store: Option<Arc<dyn TokenStore>>,
    on_refresh_fail: Option<RefreshFailHook>,
    config: RefreshConfig,
    state: Arc<RwLock<TokenState>>,
    refresh_lock: Arc<Mutex<()>>,
    /// Id of the active run; 0 when stopped
    active_run: Arc<AtomicU64>,
}

impl<C: OAuthClientTrait + 'static> Clone for RefreshContext<C> {
    fn clone(&self) -> Self {
        Self {
            oauth_client: Arc::clone(&self.oauth_client),
            token_store: self.token_store.clone(),
            on_refresh_fail: self.on_refresh_fail.clone(),
            config: self.config,
            state: Arc::clone(&self.state),
            refresh_lock: Arc::clone(&self.refresh_lock),
            active_run: Arc::clone(&self.active_run),
        }
    }
}

impl<C: OAuthClientTrait + 'static> RefreshContext<C> {
    async fn check_and_refresh(&self, cancel: &CancellationToken) {
        let due = {
            let state = self.state.read().await;
            match (&state.tokens, state.expires_at) {
                (Some(_), Some(expires_at)) => {
                    Utc::now() >= expires_at - self.config.threshold_delta()
                }
                _ => false,
            }
        };

        if !due {
            return;
        }

        debug!("Access token within refresh threshold");
        match self.perform_refresh(cancel).await {
            Ok(_) => {}
            Err(RefreshError::Cancelled) => debug!("Background refresh interrupted"),
            Err(e) => error!(error = %e, reauth = e.requires_reauth(), "Background token refresh failed"),
        }
    }

    async fn perform_refresh(&self, cancel: &CancellationToken) -> Result<TokenPair, RefreshError> {
        let _guard = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RefreshError::Cancelled),
            guard = self.refresh_lock.lock() => guard,
        };

        let refresh_token = {
            let state = self.state.read().await;
            state.tokens.as_ref().map(|t| t.refresh_token.clone()).unwrap_or_default()
        };
        if refresh_token.is_empty() {
            return Err(RefreshError::NoRefreshToken);
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RefreshError::Cancelled),
            outcome = self.oauth_client.refresh_token(&refresh_token) => outcome,
        };
        let mut tokens = match outcome {
            Ok(tokens) => tokens,
            Err(e) => {
                let reauth = self.on_refresh_fail.as_ref().is_some_and(|hook| hook(&e));
                return Err(if reauth {
                    RefreshError::ReauthRequired(e)
                } else {
                    RefreshError::OAuth(e)
                });
            }
        };

        // Servers that do not rotate refresh tokens omit it from the response
        if tokens.refresh_token.is_empty() {
            tokens.refresh_token = refresh_token;
        }

        let now = Utc::now();
        let expires_at = tokens.expires_at_from(now);
        {
            let mut state = self.state.write().await;
            state.tokens = Some(tokens.clone());
            state.expires_at = Some(expires_at);
            state.last_refresh_at = Some(now);
        }

        if let Some(store) = &self.token_store {
            if let Err(e) = store.store_tokens(&tokens).await {
                warn!(error = %e, "Failed to persist refreshed tokens");
            }
        }

        info!(expires_at = %expires_at, "Tokens refreshed");
        Ok(tokens)
    }
}

/// Keeps a token pair fresh in the background
///
/// All methods take `&self`; share the manager behind an `Arc`.
pub struct RefreshManager<C: OAuthClientTrait + 'static> {
    context: RefreshContext<C>,
    cancellation_token: parking_lot::Mutex<CancellationToken>,
    task_handle: TaskHandle,
    next_run: AtomicU64,
}

impl<C: OAuthClientTrait + 'static> RefreshManager<C> {
    /// Create a stopped manager
    ///
    /// # Arguments
    ///
    /// * `oauth_client` - Client used for the refresh grant
    /// * `config` - Threshold and check interval
    #[must_use]
    pub fn new(oauth_client: Arc<C>, config: RefreshConfig) -> Self {
        Self {
            context: RefreshContext {
                oauth_client,
                token_store: None,
                on_refresh_fail: None,
                config,
                state: Arc::new(RwLock::new(TokenState::default())),
                refresh_lock: Arc::new(Mutex::new(())),
                active_run: Arc::new(AtomicU64::new(0)),
            },
            cancellation_token: parking_lot::Mutex::new(CancellationToken::new()),
            task_handle: Arc::new(Mutex::new(None)),
            next_run: AtomicU64::new(1),
        }
    }

    /// Persist every renewed pair to `store`
    #[must_use]
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.context.token_store = Some(store);
        self
    }

    /// Consult `hook` when a renewal fails
    #[must_use]
    pub fn with_refresh_fail_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OAuthClientError) -> bool + Send + Sync + 'static,
    {
        self.context.on_refresh_fail = Some(Arc::new(hook));
        self
    }

    /// Get the effective timing configuration
    #[must_use]
    pub const fn config(&self) -> &RefreshConfig {
        &self.context.config
    }

    /// Install `tokens` and start the background loop
    ///
    /// The loop stops when [`stop`](Self::stop) is called or when `parent`
    /// is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if the loop is active and `MissingTokens` if
    /// the pair has no access token.
    #[instrument(skip_all)]
    pub async fn start(
        &self,
        parent: &CancellationToken,
        tokens: TokenPair,
    ) -> Result<(), RefreshError> {
        if tokens.access_token.is_empty() {
            return Err(RefreshError::MissingTokens);
        }
        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        if self
            .context
            .active_run
            .compare_exchange(0, run_id, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RefreshError::AlreadyRunning);
        }

        self.install_tokens(tokens).await;

        let cancel = parent.child_token();
        *self.cancellation_token.lock() = cancel.clone();

        let context = self.context.clone();
        let handle = tokio::spawn(async move {
            Self::refresh_loop(context, cancel, run_id).await;
        });
        *self.task_handle.lock().await = Some(handle);

        info!(
            threshold_secs = self.context.config.threshold.as_secs(),
            interval_ms = u64::try_from(self.context.config.check_interval.as_millis()).unwrap_or(u64::MAX),
            "Refresh manager started"
        );
        Ok(())
    }

    /// Stop the background loop and wait for it to finish
    ///
    /// An in-flight renewal is abandoned; its result is never installed.
    /// A loop that misses the join deadline is aborted. Safe to call when
    /// already stopped.
    #[instrument(skip_all)]
    pub async fn stop(&self) {
        let run_id = self.context.active_run.load(Ordering::SeqCst);
        self.cancellation_token.lock().cancel();

        if let Some(mut handle) = self.task_handle.lock().await.take() {
            let join_timeout = Duration::from_secs(5);
            match tokio::time::timeout(join_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Refresh loop task failed"),
                Err(_) => {
                    handle.abort();
                    warn!(timeout_secs = join_timeout.as_secs(), "Refresh loop join timed out, aborted");
                }
            }
        }

        if run_id != 0
            && self
                .context
                .active_run
                .compare_exchange(run_id, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            info!("Refresh manager stopped");
        }
    }

    /// Check if the background loop is active
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.context.active_run.load(Ordering::SeqCst) != 0
    }

    /// Get the current token pair
    pub async fn get_tokens(&self) -> Option<TokenPair> {
        self.context.state.read().await.tokens.clone()
    }

    /// Get the access token expiry
    pub async fn get_expires_at(&self) -> Option<DateTime<Utc>> {
        self.context.state.read().await.expires_at
    }

    /// Get the time of the last successful renewal
    pub async fn get_last_refresh_at(&self) -> Option<DateTime<Utc>> {
        self.context.state.read().await.last_refresh_at
    }

    /// Renew now, regardless of the threshold
    ///
    /// Waiting for a concurrent renewal and the grant itself both give up
    /// as soon as `cancel` fires; the current pair is then left untouched.
    ///
    /// # Errors
    ///
    /// Returns `NoRefreshToken` without contacting the server when the
    /// current pair has no refresh token, `Cancelled` when `cancel` fires
    /// first, otherwise the OAuth failure.
    #[instrument(skip_all)]
    pub async fn force_refresh(&self, cancel: &CancellationToken) -> Result<TokenPair, RefreshError> {
        self.context.perform_refresh(cancel).await
    }

    /// Replace the current pair, e.g. after an interactive login
    pub async fn update_tokens(&self, tokens: TokenPair) {
        self.install_tokens(tokens).await;
        debug!("Tokens updated");
    }

    /// Report timing state
    pub async fn get_refresh_status(&self) -> RefreshStatus {
        let state = self.context.state.read().await;
        let now = Utc::now();
        let refresh_at = state.expires_at.map(|at| at - self.context.config.threshold_delta());

        RefreshStatus {
            is_running: self.is_running(),
            expires_at: state.expires_at,
            refresh_at,
            last_refresh_at: state.last_refresh_at,
            time_until_expiry: state.expires_at.map(|at| at - now),
            time_until_refresh: refresh_at.map(|at| at - now),
            needs_refresh: refresh_at.is_some_and(|at| now > at),
        }
    }

    async fn install_tokens(&self, tokens: TokenPair) {
        let expires_at = tokens.expires_at_from(Utc::now());
        let mut state = self.context.state.write().await;
        state.tokens = Some(tokens);
        state.expires_at = Some(expires_at);
    }

    async fn refresh_loop(context: RefreshContext<C>, cancel: CancellationToken, run_id: u64) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Refresh loop cancelled");
                    break;
                }
                () = tokio::time::sleep(context.config.check_interval) => {
                    context.check_and_refresh(&cancel).await;
                }
            }
        }
        // Only clear the flag if no newer run has claimed it
        let _ = context.active_run.compare_exchange(run_id, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}

impl<C: OAuthClientTrait + 'static> Drop for RefreshManager<C> {
    fn drop(&mut self) {
        self.cancellation_token.lock().cancel();
    }
}
