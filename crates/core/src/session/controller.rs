//! Session controller: the authentication state machine
//!
//! Orchestrates login initiation, callback handling, the background refresh
//! loop and logout. Every transition publishes a fresh [`AuthState`] on a
//! `watch` channel; notable outcomes are also published as
//! [`SessionEvent`]s on a `broadcast` channel.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use pingauth_domain::constants::{MSG_LOGIN_FAILED, MSG_SESSION_EXPIRED, STORAGE_KEY_RETURN_URL};
use pingauth_domain::{
    AuthError, AuthState, Result, SessionConfig, SessionEvent, SessionStatus, TokenTypeHint,
    UserIdentity,
};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::refresh::{RefreshCoordinator, RefreshRole};
use crate::auth::callback::CallbackParams;
use crate::auth::jwt;
use crate::auth::ports::{Navigator, ProviderApi, SessionStorage};
use crate::auth::storage::{MemorySessionStorage, PendingExchange};
use crate::auth::token_store::TokenStore;

const EVENT_CAPACITY: usize = 16;

struct SessionData {
    status: SessionStatus,
    user: Option<UserIdentity>,
    error: Option<String>,
}

struct Inner {
    provider: Arc<dyn ProviderApi>,
    store: Arc<TokenStore>,
    refresher: Arc<RefreshCoordinator>,
    navigator: Arc<dyn Navigator>,
    storage: Arc<dyn SessionStorage>,
    config: SessionConfig,
    session: Mutex<SessionData>,
    state_tx: watch::Sender<AuthState>,
    events_tx: broadcast::Sender<SessionEvent>,
    refresh_task: Mutex<Option<CancellationToken>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(token) = self.refresh_task.get_mut().take() {
            token.cancel();
        }
    }
}

/// Handle to one session; clones share the same session.
///
/// The background refresh task holds only a weak reference, so dropping the
/// last handle stops it.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn builder(
        provider: Arc<dyn ProviderApi>,
        store: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> SessionControllerBuilder {
        SessionControllerBuilder {
            provider,
            store,
            navigator,
            refresher: None,
            storage: None,
            config: SessionConfig::default(),
        }
    }

    /// Restore a session from tokens already held by the store.
    ///
    /// User identity comes from the ID token when it decodes, otherwise from
    /// the user-info endpoint. Discovery is prefetched in the background.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> AuthState {
        self.prefetch_discovery();

        self.transition(SessionStatus::Initializing, |data| data.error = None);

        if !self.inner.store.has_valid_tokens() {
            debug!("no_restorable_session");
            self.transition(SessionStatus::Unauthenticated, |data| data.user = None);
            return self.state();
        }

        match self.resolve_user().await {
            Ok(user) => {
                info!(sub = %user.sub, "session_restored");
                self.transition(SessionStatus::Authenticated, |data| data.user = Some(user));
                self.restart_refresh_loop();
            }
            Err(err) => {
                warn!(kind = err.label(), error = %err, "session_restore_failed");
                self.transition(SessionStatus::Unauthenticated, |data| data.user = None);
            }
        }

        self.state()
    }

    /// Redirect to the provider's authorization endpoint.
    ///
    /// # Errors
    /// Returns `Configuration` if the authorization URL cannot be built; no
    /// navigation happens in that case.
    pub fn login(&self) -> Result<()> {
        let url = self.inner.provider.build_authorization_url().map_err(|err| {
            error!(kind = err.label(), error = %err, "login_url_failed");
            err
        })?;

        info!("login_redirect");
        self.inner.navigator.navigate(&url);
        Ok(())
    }

    /// Remember where to send the user after the callback, then log in.
    pub fn login_with_return_url(&self, return_url: &str) -> Result<()> {
        self.remember_return_url(return_url);
        self.login()
    }

    /// Complete login with the code and state from the callback.
    ///
    /// On failure the store is cleared, the error is recorded in the state
    /// and the error is returned so the caller can render it.
    #[instrument(skip(self, code, state))]
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<UserIdentity> {
        self.stop_refresh_loop();
        self.transition(SessionStatus::Initializing, |data| data.error = None);

        match self.complete_callback(code, state).await {
            Ok(user) => {
                info!(sub = %user.sub, "login_completed");
                self.transition(SessionStatus::Authenticated, |data| {
                    data.user = Some(user.clone());
                });
                self.restart_refresh_loop();
                Ok(user)
            }
            Err(err) => {
                self.fail_callback(&err);
                Err(err)
            }
        }
    }

    /// Parse a callback query string and complete login.
    ///
    /// Provider error parameters and missing values fail the callback the
    /// same way an exchange failure does.
    pub async fn handle_callback_params(&self, query: &str) -> Result<UserIdentity> {
        match CallbackParams::from_query(query) {
            Ok(params) => self.handle_callback(&params.code, &params.state).await,
            Err(err) => {
                self.stop_refresh_loop();
                PendingExchange::take(self.inner.storage.as_ref());
                self.fail_callback(&err);
                Err(err)
            }
        }
    }

    /// Refresh the access token through the shared coordinator.
    ///
    /// Transport failures leave the session authenticated. Any other failure
    /// ends the session with a `SessionExpired` event: through a full logout
    /// when this call led the refresh, locally when it joined one led
    /// elsewhere.
    ///
    /// # Errors
    /// - `NotAuthenticated` when there is no authenticated session
    /// - the refresh error otherwise
    #[instrument(skip(self))]
    pub async fn refresh_access_token(&self) -> Result<()> {
        let status = self.status();
        if !matches!(status, SessionStatus::Authenticated | SessionStatus::RefreshingInline) {
            return Err(AuthError::NotAuthenticated);
        }

        self.transition(SessionStatus::RefreshingInline, |_| {});
        let outcome = self.inner.refresher.run().await;
        match outcome.result {
            Ok(_) => {
                self.transition(SessionStatus::Authenticated, |_| {});
                Ok(())
            }
            Err(err) if err.is_transient() => {
                warn!(kind = err.label(), error = %err, "token_refresh_deferred");
                self.transition(SessionStatus::Authenticated, |_| {});
                Err(err)
            }
            Err(err) => {
                error!(kind = err.label(), error = %err, "session_expired");
                match outcome.role {
                    RefreshRole::Leader => self.expire_session().await,
                    // The leader owns logout and navigation.
                    RefreshRole::Follower => {
                        self.end_rejected_session();
                    }
                }
                Err(err)
            }
        }
    }

    /// End the session after its credentials were rejected elsewhere, such
    /// as by the API client after a failed refresh.
    ///
    /// Stops the refresh loop, clears the store and moves to
    /// `Unauthenticated` with the session-expired message. Nothing is
    /// revoked and nothing navigates. Returns `false` when the session had
    /// already ended.
    pub fn end_rejected_session(&self) -> bool {
        self.stop_refresh_loop();
        self.inner.store.clear();

        let snapshot = {
            let mut data = self.inner.session.lock();
            if data.status == SessionStatus::Unauthenticated {
                return false;
            }
            debug!(from = %data.status, "session_rejected");
            data.status = SessionStatus::Unauthenticated;
            data.user = None;
            data.error = Some(MSG_SESSION_EXPIRED.to_string());
            self.build_state(&data)
        };

        self.inner.state_tx.send_replace(snapshot);
        let _ = self
            .inner
            .events_tx
            .send(SessionEvent::SessionExpired { message: MSG_SESSION_EXPIRED.to_string() });
        info!("session_ended_after_rejection");
        true
    }

    /// End the session locally and at the provider.
    ///
    /// Revocation is best effort. The store is always cleared and the
    /// navigator always receives a target: the end-session URL, or the home
    /// path if that URL cannot be built.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.stop_refresh_loop();
        self.transition(SessionStatus::LoggingOut, |data| data.error = None);

        let access_token = self.inner.store.access_token();
        let id_token = self.inner.store.id_token();

        if let Some(token) = access_token {
            self.inner.provider.revoke_token(&token, TokenTypeHint::AccessToken).await;
        }
        self.inner.store.clear();

        let target = match self.inner.provider.build_logout_url(id_token.as_deref()) {
            Ok(url) => url,
            Err(err) => {
                warn!(kind = err.label(), error = %err, "logout_url_unavailable");
                self.inner.config.home_path.clone()
            }
        };

        self.transition(SessionStatus::Unauthenticated, |data| {
            data.user = None;
            data.error = None;
        });
        let _ = self.inner.events_tx.send(SessionEvent::LoggedOut);
        info!("logout_completed");

        self.inner.navigator.navigate(&target);
    }

    pub fn get_access_token(&self) -> Option<String> {
        self.inner.store.access_token()
    }

    /// Authenticated status with a user and a non-expired access token
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated
    }

    /// Whether the access token is within the refresh buffer of expiry
    pub fn needs_refresh(&self) -> bool {
        self.inner.store.is_expired(self.inner.config.refresh_buffer())
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.session.lock().status
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.inner.session.lock().user.clone()
    }

    /// Current state, with credentials read fresh from the store
    pub fn state(&self) -> AuthState {
        let data = self.inner.session.lock();
        self.build_state(&data)
    }

    /// Receiver that yields a snapshot on every transition
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Store a post-login destination; only same-origin paths are kept.
    pub fn remember_return_url(&self, return_url: &str) {
        if is_local_path(return_url) {
            self.inner.storage.set(STORAGE_KEY_RETURN_URL, return_url.to_string());
        } else {
            warn!("return_url_rejected");
        }
    }

    /// Take the stored destination, falling back to the default return path.
    pub fn take_return_url(&self) -> String {
        self.inner
            .storage
            .take(STORAGE_KEY_RETURN_URL)
            .filter(|url| is_local_path(url))
            .unwrap_or_else(|| self.inner.config.default_return_path.clone())
    }

    /// Stop the background refresh task.
    pub fn shutdown(&self) {
        self.stop_refresh_loop();
    }

    pub fn is_refresh_loop_running(&self) -> bool {
        self.inner.refresh_task.lock().as_ref().is_some_and(|token| !token.is_cancelled())
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.inner.store
    }

    pub fn refresher(&self) -> &Arc<RefreshCoordinator> {
        &self.inner.refresher
    }

    async fn complete_callback(&self, code: &str, state: &str) -> Result<UserIdentity> {
        let response = self.inner.provider.exchange_code_for_tokens(code, state).await?;
        self.inner.store.set_tokens(response);
        self.resolve_user().await
    }

    fn fail_callback(&self, err: &AuthError) {
        self.inner.store.clear();
        let message = format!("{MSG_LOGIN_FAILED}: {err}");
        error!(kind = err.label(), error = %err, "callback_failed");

        self.transition(SessionStatus::Unauthenticated, |data| {
            data.user = None;
            data.error = Some(message.clone());
        });
        let _ = self.inner.events_tx.send(SessionEvent::LoginFailed { message });
    }

    /// ID token claims first; the user-info endpoint otherwise.
    async fn resolve_user(&self) -> Result<UserIdentity> {
        if let Some(id_token) = self.inner.store.id_token() {
            match jwt::extract_user_info(&id_token) {
                Ok(user) => return Ok(user),
                Err(err) => debug!(error = %err, "id_token_claims_unusable"),
            }
        }

        let access_token = self.inner.store.access_token().ok_or(AuthError::NotAuthenticated)?;
        self.inner.provider.fetch_user_info(&access_token).await
    }

    async fn expire_session(&self) {
        self.logout().await;
        self.transition(SessionStatus::Unauthenticated, |data| {
            data.error = Some(MSG_SESSION_EXPIRED.to_string());
        });
        let _ = self
            .inner
            .events_tx
            .send(SessionEvent::SessionExpired { message: MSG_SESSION_EXPIRED.to_string() });
    }

    fn prefetch_discovery(&self) {
        let provider = self.inner.provider.clone();
        tokio::spawn(async move {
            provider.resolve_discovery().await;
        });
    }

    /// Apply `update` and move to `next`, publishing the new state.
    ///
    /// Returns `false` and leaves the state untouched for an illegal edge.
    fn transition(&self, next: SessionStatus, update: impl FnOnce(&mut SessionData)) -> bool {
        let snapshot = {
            let mut data = self.inner.session.lock();
            let current = data.status;
            if current != next && !current.can_transition_to(next) {
                warn!(from = %current, to = %next, "illegal_session_transition");
                return false;
            }

            if current != next {
                debug!(from = %current, to = %next, "session_transition");
            }
            data.status = next;
            update(&mut data);
            self.build_state(&data)
        };

        self.inner.state_tx.send_replace(snapshot);
        true
    }

    fn build_state(&self, data: &SessionData) -> AuthState {
        let tokens = self.inner.store.snapshot();
        let live = !self.inner.store.is_expired(Duration::ZERO);
        AuthState::snapshot(data.status, data.user.clone(), tokens.as_ref(), live, data.error.clone())
    }

    fn restart_refresh_loop(&self) {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.inner.refresh_task.lock().replace(cancel.clone()) {
            previous.cancel();
        }

        let period = self.inner.config.check_interval();
        tokio::spawn(refresh_loop(Arc::downgrade(&self.inner), cancel, period));
        debug!(interval_secs = period.as_secs(), "refresh_loop_started");
    }

    fn stop_refresh_loop(&self) {
        if let Some(token) = self.inner.refresh_task.lock().take() {
            token.cancel();
            debug!("refresh_loop_stopped");
        }
    }

    /// One tick of the background loop; `false` ends the loop.
    async fn check_expiry(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        match self.status() {
            SessionStatus::Authenticated => {}
            SessionStatus::RefreshingInline => return true,
            _ => return false,
        }

        let Some(remaining) = self.inner.store.time_until_expiry() else {
            if self.inner.store.access_token().is_none() {
                info!("session_cleared_elsewhere");
                self.transition(SessionStatus::Unauthenticated, |data| data.user = None);
                return false;
            }
            return true;
        };

        if remaining > self.inner.config.refresh_buffer() {
            return true;
        }

        debug!(remaining_secs = remaining.as_secs(), "token_near_expiry");
        match self.refresh_access_token().await {
            Ok(()) => true,
            Err(err) => err.is_transient(),
        }
    }
}

async fn refresh_loop(inner: Weak<Inner>, cancel: CancellationToken, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let controller = SessionController { inner };
        if !controller.check_expiry(&cancel).await {
            break;
        }
    }
}

fn is_local_path(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//")
}

/// Builder for [`SessionController`]
pub struct SessionControllerBuilder {
    provider: Arc<dyn ProviderApi>,
    store: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    refresher: Option<Arc<RefreshCoordinator>>,
    storage: Option<Arc<dyn SessionStorage>>,
    config: SessionConfig,
}

impl SessionControllerBuilder {
    /// Share a coordinator with other consumers, such as the HTTP client.
    pub fn refresher(mut self, refresher: Arc<RefreshCoordinator>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SessionController {
        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(RefreshCoordinator::new(self.provider.clone(), self.store.clone()))
        });
        let storage = self.storage.unwrap_or_else(|| Arc::new(MemorySessionStorage::new()));
        let (state_tx, _) = watch::channel(AuthState::default());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        SessionController {
            inner: Arc::new(Inner {
                provider: self.provider,
                store: self.store,
                refresher,
                navigator: self.navigator,
                storage,
                config: self.config,
                session: Mutex::new(SessionData {
                    status: SessionStatus::Uninitialized,
                    user: None,
                    error: None,
                }),
                state_tx,
                events_tx,
                refresh_task: Mutex::new(None),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use pingauth_domain::TokenResponse;
    use serde_json::json;
    use tokio::time::timeout;

    use super::*;
    use crate::testing::{network_error, unsigned_jwt, MockProvider, RecordingNavigator};

    struct Harness {
        controller: SessionController,
        provider: Arc<MockProvider>,
        navigator: Arc<RecordingNavigator>,
        store: Arc<TokenStore>,
    }

    fn harness(config: SessionConfig) -> Harness {
        let provider = Arc::new(MockProvider::new());
        let navigator = Arc::new(RecordingNavigator::new());
        let store = Arc::new(TokenStore::new());
        let controller = SessionController::builder(provider.clone(), store.clone(), navigator.clone())
            .config(config)
            .build();
        Harness { controller, provider, navigator, store }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig { check_interval_seconds: 1, ..SessionConfig::default() }
    }

    fn id_token(sub: &str) -> String {
        unsigned_jwt(&json!({ "sub": sub, "email": format!("{sub}@example.com") }))
    }

    async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event before timeout")
            .expect("event channel open")
    }

    /// Validates `SessionController::login` navigation.
    ///
    /// Assertions:
    /// - Confirms the authorization URL is handed to the navigator.
    /// - Ensures a configuration error navigates nowhere.
    #[tokio::test]
    async fn test_login_navigates_to_authorization_url() {
        let h = harness(SessionConfig::default());
        h.controller.login().expect("login");
        assert_eq!(
            h.navigator.last().as_deref(),
            Some("https://auth.example.com/as/authorization.oauth2?response_type=code")
        );

        h.provider.set_authorization_url(Err(AuthError::Configuration("issuer".into())));
        assert!(matches!(h.controller.login(), Err(AuthError::Configuration(_))));
        assert_eq!(h.navigator.count(), 1);
    }

    /// Validates `handle_callback` for the success scenario.
    ///
    /// Assertions:
    /// - Confirms the code and state reach the provider.
    /// - Confirms the user comes from the ID token without a user-info call.
    /// - Confirms the published state is authenticated and not loading.
    #[tokio::test]
    async fn test_callback_success_authenticates() {
        let h = harness(SessionConfig::default());
        h.provider.set_exchange_response(Ok(TokenResponse::bearer("at", 3600)
            .with_refresh_token("rt")
            .with_id_token(id_token("ada"))));
        let state_rx = h.controller.subscribe();

        let user = h.controller.handle_callback("abc123", "S1").await.expect("callback");

        assert_eq!(user.sub, "ada");
        assert_eq!(h.provider.exchanges(), vec![("abc123".to_string(), "S1".to_string())]);
        assert_eq!(h.provider.user_info_calls(), 0);

        let state = state_rx.borrow().clone();
        assert_eq!(state.status, SessionStatus::Authenticated);
        assert!(state.is_authenticated);
        assert!(!state.is_loading);
        assert_eq!(state.access_token.as_deref(), Some("at"));
        assert!(h.controller.is_authenticated());
        assert!(h.controller.is_refresh_loop_running());
    }

    /// Validates `handle_callback` user-info fallback.
    ///
    /// Assertions:
    /// - Confirms the user-info endpoint is used without an ID token.
    #[tokio::test]
    async fn test_callback_without_id_token_fetches_user_info() {
        let h = harness(SessionConfig::default());
        h.provider.set_user_info(Ok(UserIdentity::new("from-userinfo")));

        let user = h.controller.handle_callback("code", "state").await.expect("callback");

        assert_eq!(user.sub, "from-userinfo");
        assert_eq!(h.provider.user_info_calls(), 1);
    }

    /// Validates `handle_callback` for the failure scenario.
    ///
    /// Assertions:
    /// - Confirms the error is returned to the caller.
    /// - Confirms the store is cleared and the error recorded.
    /// - Confirms a `LoginFailed` event is published.
    #[tokio::test]
    async fn test_callback_failure_clears_and_records() {
        let h = harness(SessionConfig::default());
        h.provider.set_exchange_response(Ok(TokenResponse::bearer("at", 3600)));
        h.provider.set_user_info(Err(AuthError::provider(Some(500), "Failed to fetch user info")));
        let mut events = h.controller.events();

        let err = h.controller.handle_callback("code", "state").await.expect_err("must fail");

        assert!(matches!(err, AuthError::Provider { status: Some(500), .. }));
        assert!(h.store.access_token().is_none());
        let state = h.controller.state();
        assert_eq!(state.status, SessionStatus::Unauthenticated);
        assert!(!state.is_authenticated);
        assert!(state.error.as_deref().is_some_and(|e| e.starts_with(MSG_LOGIN_FAILED)));
        assert!(matches!(next_event(&mut events).await, SessionEvent::LoginFailed { .. }));
    }

    /// Validates `handle_callback_params` with provider error parameters.
    ///
    /// Assertions:
    /// - Confirms the provider is never called.
    /// - Confirms `AuthorizationDenied` is recorded.
    #[tokio::test]
    async fn test_callback_query_with_error_params() {
        let h = harness(SessionConfig::default());

        let err = h
            .controller
            .handle_callback_params("?error=access_denied&error_description=nope")
            .await
            .expect_err("denied");

        assert!(matches!(err, AuthError::AuthorizationDenied { .. }));
        assert!(h.provider.exchanges().is_empty());
        assert!(h.controller.state().error.is_some());
    }

    /// Validates `initialize` for stored and empty token stores.
    ///
    /// Assertions:
    /// - Confirms valid stored tokens restore an authenticated session.
    /// - Confirms an empty store settles unauthenticated without error.
    #[tokio::test]
    async fn test_initialize_restores_or_settles() {
        let h = harness(SessionConfig::default());
        let state = h.controller.initialize().await;
        assert_eq!(state.status, SessionStatus::Unauthenticated);
        assert!(state.error.is_none());
        assert!(!state.is_loading);

        let restored = harness(SessionConfig::default());
        restored.store.set_tokens(TokenResponse::bearer("at", 3600).with_id_token(id_token("bob")));
        let state = restored.controller.initialize().await;
        assert_eq!(state.status, SessionStatus::Authenticated);
        assert_eq!(state.user.map(|u| u.sub).as_deref(), Some("bob"));
    }

    /// Validates `initialize` when the user cannot be resolved.
    ///
    /// Assertions:
    /// - Ensures the session settles unauthenticated.
    #[tokio::test]
    async fn test_initialize_user_resolution_failure() {
        let h = harness(SessionConfig::default());
        h.store.set_tokens(TokenResponse::bearer("at", 3600));
        h.provider.set_user_info(Err(network_error()));

        let state = h.controller.initialize().await;
        assert_eq!(state.status, SessionStatus::Unauthenticated);
        assert!(!h.controller.is_refresh_loop_running());
    }

    /// Validates `logout` side effects.
    ///
    /// Assertions:
    /// - Confirms the access token is revoked with the access-token hint.
    /// - Confirms the store is cleared and the end-session URL is used.
    /// - Confirms the refresh loop is stopped.
    #[tokio::test]
    async fn test_logout_revokes_clears_and_redirects() {
        let h = harness(SessionConfig::default());
        h.controller.handle_callback("code", "state").await.expect("login");
        let mut events = h.controller.events();

        h.controller.logout().await;

        assert_eq!(h.provider.revoked(), vec![("access-1".to_string(), TokenTypeHint::AccessToken)]);
        assert!(h.store.access_token().is_none());
        assert_eq!(
            h.navigator.last().as_deref(),
            Some("https://auth.example.com/idp/init_logout.openid?client_id=test")
        );
        assert_eq!(h.controller.state(), AuthState {
            status: SessionStatus::Unauthenticated,
            ..AuthState::default()
        });
        assert!(!h.controller.is_refresh_loop_running());
        assert_eq!(next_event(&mut events).await, SessionEvent::LoggedOut);
    }

    /// Validates `logout` when the end-session URL cannot be built.
    ///
    /// Assertions:
    /// - Confirms navigation falls back to the home path.
    #[tokio::test]
    async fn test_logout_falls_back_to_home() {
        let h = harness(SessionConfig::default());
        h.provider.set_logout_url(Err(AuthError::Configuration("bad issuer".into())));

        h.controller.logout().await;

        assert_eq!(h.navigator.last().as_deref(), Some("/"));
    }

    /// Validates the background loop for a token inside the refresh buffer.
    ///
    /// Assertions:
    /// - Confirms a refresh happens on the first tick.
    /// - Confirms the session stays authenticated with the new token.
    #[tokio::test]
    async fn test_background_loop_refreshes_near_expiry() {
        let h = harness(fast_config());
        h.provider.set_exchange_response(Ok(TokenResponse::bearer("short", 60)
            .with_refresh_token("rt")
            .with_id_token(id_token("ada"))));
        h.provider.set_refresh_response(Ok(TokenResponse::bearer("renewed", 3600)));

        h.controller.handle_callback("code", "state").await.expect("login");

        timeout(Duration::from_secs(2), async {
            while h.store.access_token().as_deref() != Some("renewed") {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("refresh before timeout");

        assert_eq!(h.provider.refresh_calls(), 1);
        assert_eq!(h.controller.status(), SessionStatus::Authenticated);
        assert!(h.controller.is_authenticated());
    }

    /// Validates the background loop for a rejected refresh.
    ///
    /// Assertions:
    /// - Confirms a `SessionExpired` event is published.
    /// - Confirms logout ran: store cleared, end-session navigation.
    #[tokio::test]
    async fn test_background_loop_failure_expires_session() {
        let h = harness(fast_config());
        h.provider.set_exchange_response(Ok(TokenResponse::bearer("short", 60)
            .with_refresh_token("rt")
            .with_id_token(id_token("ada"))));
        h.provider.set_refresh_response(Err(AuthError::provider(Some(400), "invalid_grant")));
        let mut events = h.controller.events();

        h.controller.handle_callback("code", "state").await.expect("login");

        assert_eq!(next_event(&mut events).await, SessionEvent::LoggedOut);
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::SessionExpired { message: MSG_SESSION_EXPIRED.to_string() }
        );
        assert!(h.store.access_token().is_none());
        assert_eq!(h.navigator.count(), 1);
        let state = h.controller.state();
        assert_eq!(state.status, SessionStatus::Unauthenticated);
        assert_eq!(state.error.as_deref(), Some(MSG_SESSION_EXPIRED));
    }

    /// Validates the background loop for a transport failure.
    ///
    /// Assertions:
    /// - Ensures the session stays authenticated and nothing navigates.
    #[tokio::test]
    async fn test_background_loop_transient_failure_keeps_session() {
        let h = harness(fast_config());
        h.provider.set_exchange_response(Ok(TokenResponse::bearer("short", 60)
            .with_refresh_token("rt")
            .with_id_token(id_token("ada"))));
        h.provider.set_refresh_response(Err(network_error()));

        h.controller.handle_callback("code", "state").await.expect("login");

        timeout(Duration::from_secs(2), async {
            while h.provider.refresh_calls() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("refresh attempted");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(h.controller.status(), SessionStatus::Authenticated);
        assert_eq!(h.navigator.count(), 0);
        assert_eq!(h.store.access_token().as_deref(), Some("short"));
        assert!(h.controller.is_refresh_loop_running());
    }

    /// Validates `end_rejected_session` after credentials were rejected
    /// outside the controller.
    ///
    /// Assertions:
    /// - Confirms the state moves to `Unauthenticated` with the expiry
    ///   message and the store is empty.
    /// - Confirms the refresh loop stops and nothing navigates.
    /// - Ensures a second call is a no-op without a second event.
    #[tokio::test]
    async fn test_end_rejected_session() {
        let h = harness(SessionConfig::default());
        h.provider.set_exchange_response(Ok(TokenResponse::bearer("at", 3600)
            .with_refresh_token("rt")
            .with_id_token(id_token("ada"))));
        h.controller.handle_callback("code", "state").await.expect("login");
        let mut events = h.controller.events();
        let mut state_rx = h.controller.subscribe();

        assert!(h.controller.end_rejected_session());

        assert!(state_rx.has_changed().expect("state channel open"));
        let state = state_rx.borrow_and_update().clone();
        assert_eq!(state.status, SessionStatus::Unauthenticated);
        assert!(!state.is_authenticated);
        assert!(state.access_token.is_none());
        assert_eq!(state.error.as_deref(), Some(MSG_SESSION_EXPIRED));
        assert!(h.store.access_token().is_none());
        assert!(!h.controller.is_refresh_loop_running());
        assert_eq!(h.navigator.count(), 0);
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::SessionExpired { message: MSG_SESSION_EXPIRED.to_string() }
        );

        assert!(!h.controller.end_rejected_session());
        assert!(events.try_recv().is_err());
    }

    /// Validates `refresh_access_token` joining a refresh led elsewhere.
    ///
    /// Assertions:
    /// - Confirms a rejected shared refresh ends the session locally.
    /// - Ensures the follower neither revokes nor navigates.
    #[tokio::test]
    async fn test_refresh_follower_leaves_navigation_to_leader() {
        let h = harness(SessionConfig::default());
        h.provider.set_exchange_response(Ok(TokenResponse::bearer("at", 3600)
            .with_refresh_token("rt")
            .with_id_token(id_token("ada"))));
        h.controller.handle_callback("code", "state").await.expect("login");
        h.provider.set_refresh_delay(Duration::from_millis(50));
        h.provider.set_refresh_response(Err(AuthError::provider(Some(400), "invalid_grant")));

        let refresher = h.controller.refresher().clone();
        let leader = tokio::spawn(async move { refresher.run().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.controller.refresher().is_refreshing());

        let result = h.controller.refresh_access_token().await;
        let outcome = leader.await.expect("leader completes");

        assert_eq!(outcome.role, RefreshRole::Leader);
        assert_eq!(result, Err(AuthError::provider(Some(400), "invalid_grant")));
        assert_eq!(h.provider.refresh_calls(), 1);
        assert!(h.provider.revoked().is_empty());
        assert_eq!(h.navigator.count(), 0);
        let state = h.controller.state();
        assert_eq!(state.status, SessionStatus::Unauthenticated);
        assert_eq!(state.error.as_deref(), Some(MSG_SESSION_EXPIRED));
        assert!(h.store.access_token().is_none());
    }

    /// Validates `refresh_access_token` without a session.
    ///
    /// Assertions:
    /// - Ensures `NotAuthenticated` is returned and no refresh is attempted.
    #[tokio::test]
    async fn test_refresh_requires_session() {
        let h = harness(SessionConfig::default());
        assert_eq!(h.controller.refresh_access_token().await, Err(AuthError::NotAuthenticated));
        assert_eq!(h.provider.refresh_calls(), 0);
    }

    /// Validates return URL handling.
    ///
    /// Assertions:
    /// - Confirms a local path round-trips once.
    /// - Ensures external URLs are ignored in favor of the default path.
    #[tokio::test]
    async fn test_return_url_round_trip() {
        let h = harness(SessionConfig::default());

        h.controller.login_with_return_url("/reports?id=7").expect("login");
        assert_eq!(h.controller.take_return_url(), "/reports?id=7");
        assert_eq!(h.controller.take_return_url(), "/dashboard");

        h.controller.remember_return_url("https://evil.example.com");
        assert_eq!(h.controller.take_return_url(), "/dashboard");
        h.controller.remember_return_url("//evil.example.com");
        assert_eq!(h.controller.take_return_url(), "/dashboard");
    }

    /// Validates that dropping the last handle stops the refresh loop.
    ///
    /// Assertions:
    /// - Ensures no refresh happens after the controller is dropped.
    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_refresh_loop() {
        let h = harness(fast_config());
        h.store.set_tokens(
            TokenResponse::bearer("at", 3600).with_refresh_token("rt").with_id_token(id_token("ada")),
        );
        h.controller.initialize().await;
        assert!(h.controller.is_refresh_loop_running());

        let Harness { controller, provider, store, .. } = h;
        drop(controller);
        store.set_tokens(TokenResponse::bearer("short", 10).with_refresh_token("rt"));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(provider.refresh_calls(), 0);
    }
}
