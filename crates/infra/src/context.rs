//! Per-owner wiring of the session core
//!
//! One [`AuthContext`] holds exactly one token store, and everything that
//! touches tokens for that owner (controller, provider client, API client)
//! shares it together with one refresh coordinator.

use std::sync::Arc;

use pingauth_core::{
    Clock, MemorySessionStorage, Navigator, RefreshCoordinator, SessionController,
    SessionStorage, SystemClock, TokenStore,
};
use pingauth_domain::{AuthConfig, AuthState, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::auth::ProviderClient;
use crate::http::{AuthenticatedHttpClient, HttpTransport};

/// Everything one session owner needs, wired from an [`AuthConfig`]
pub struct AuthContext {
    config: AuthConfig,
    store: Arc<TokenStore>,
    provider: Arc<ProviderClient>,
    refresher: Arc<RefreshCoordinator>,
    session: SessionController,
    http: AuthenticatedHttpClient,
}

impl AuthContext {
    pub fn builder(config: AuthConfig, navigator: Arc<dyn Navigator>) -> AuthContextBuilder {
        AuthContextBuilder { config, navigator, storage: None, clock: None }
    }

    /// Wire a context with in-memory tab storage and the system clock.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` fails validation.
    pub fn new(config: AuthConfig, navigator: Arc<dyn Navigator>) -> Result<Self> {
        Self::builder(config, navigator).build()
    }

    /// Settle discovery, then restore any session held by the store.
    pub async fn initialize(&self) -> AuthState {
        self.provider.ensure_discovery_ready().await;
        self.session.initialize().await
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn http(&self) -> &AuthenticatedHttpClient {
        &self.http
    }

    pub fn provider(&self) -> &Arc<ProviderClient> {
        &self.provider
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn refresher(&self) -> &Arc<RefreshCoordinator> {
        &self.refresher
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.session.shutdown();
    }
}

/// Optional overrides for [`AuthContext`]
pub struct AuthContextBuilder {
    config: AuthConfig,
    navigator: Arc<dyn Navigator>,
    storage: Option<Arc<dyn SessionStorage>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AuthContextBuilder {
    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<AuthContext> {
        self.config.validate()?;

        let storage = self.storage.unwrap_or_else(|| Arc::new(MemorySessionStorage::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = Arc::new(TokenStore::with_clock(clock));
        let transport = HttpTransport::from_config(&self.config.http)?;

        let provider = Arc::new(ProviderClient::new(
            self.config.provider.clone(),
            transport.clone(),
            storage.clone(),
        ));
        let refresher = Arc::new(RefreshCoordinator::new(provider.clone(), store.clone()));

        let session = SessionController::builder(provider.clone(), store.clone(), self.navigator.clone())
            .refresher(refresher.clone())
            .storage(storage)
            .config(self.config.session.clone())
            .build();

        let mut http = AuthenticatedHttpClient::new(
            transport,
            store.clone(),
            refresher.clone(),
            self.navigator,
            self.config.session.login_path.clone(),
        )
        .with_session(session.clone());
        if let Some(base_url) = &self.config.http.api_base_url {
            http = http.with_base_url(base_url.clone());
        }

        info!(client_id = %self.config.provider.client_id, "auth_context_ready");
        Ok(AuthContext { config: self.config, store, provider, refresher, session, http })
    }
}

/// [`Navigator`] that hands targets to the host over a channel
///
/// Useful where "navigation" means answering with a redirect, such as a
/// server-side handler or a desktop shell.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, url: &str) {
        if self.tx.send(url.to_string()).is_err() {
            tracing::warn!("navigation_target_dropped");
        }
    }
}
