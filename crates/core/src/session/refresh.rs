//! Single-flight token refresh
//!
//! At most one refresh request is in flight per session context. The first
//! caller becomes the leader and talks to the provider; callers arriving
//! meanwhile park on a oneshot result slot and are resolved together, with
//! the same outcome, when the leader settles.

use std::sync::Arc;

use parking_lot::Mutex;
use pingauth_domain::{AuthError, Result};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::auth::ports::ProviderApi;
use crate::auth::token_store::TokenStore;

/// Whether a caller performed the refresh or waited on someone else's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRole {
    Leader,
    Follower,
}

/// Result of one [`RefreshCoordinator::run`] call
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub role: RefreshRole,
    /// New access token on success
    pub result: Result<String>,
}

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Result<String>>>,
}

/// Shared single-flight refresher for a token store
pub struct RefreshCoordinator {
    provider: Arc<dyn ProviderApi>,
    store: Arc<TokenStore>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(provider: Arc<dyn ProviderApi>, store: Arc<TokenStore>) -> Self {
        Self { provider, store, state: Mutex::new(RefreshState::default()) }
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().in_flight
    }

    /// Refresh the access token, joining an in-flight refresh if there is
    /// one.
    pub async fn refresh(&self) -> Result<String> {
        self.run().await.result
    }

    /// Like [`refresh`](Self::refresh), also reporting whether this caller
    /// led the refresh.
    ///
    /// Only the leader should apply side effects of a failure (clearing the
    /// store, redirecting), so they happen once per refresh.
    pub async fn run(&self) -> RefreshOutcome {
        let waiter = {
            let mut state = self.state.lock();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            debug!("token_refresh_joined");
            let result = rx.await.unwrap_or_else(|_| {
                Err(AuthError::Network("refresh ended without a result".to_string()))
            });
            return RefreshOutcome { role: RefreshRole::Follower, result };
        }

        let mut flight = InFlight { coordinator: self, settled: false };
        let result = self.perform().await;
        flight.settle(&result);

        RefreshOutcome { role: RefreshRole::Leader, result }
    }

    async fn perform(&self) -> Result<String> {
        let refresh_token = self.store.refresh_token().ok_or(AuthError::NoRefreshToken)?;

        info!("token_refresh_started");
        let response = self.provider.refresh_tokens(&refresh_token).await.map_err(|err| {
            warn!(kind = err.label(), error = %err, "token_refresh_failed");
            err
        })?;

        let access_token = response.access_token.clone();
        self.store.apply_refresh(response);
        info!("token_refresh_succeeded");
        Ok(access_token)
    }

    /// Reset the flag and resolve every parked caller with `result`.
    fn settle(&self, result: &Result<String>) {
        let waiters = {
            let mut state = self.state.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        if !waiters.is_empty() {
            debug!(waiters = waiters.len(), success = result.is_ok(), "token_refresh_settled");
        }
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

/// Settles the coordinator even if the leader's future is dropped mid-flight.
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self, result: &Result<String>) {
        self.settled = true;
        self.coordinator.settle(result);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator
                .settle(&Err(AuthError::Network("refresh was cancelled".to_string())));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pingauth_domain::TokenResponse;

    use super::*;
    use crate::testing::MockProvider;

    fn coordinator_with(provider: Arc<MockProvider>) -> (Arc<RefreshCoordinator>, Arc<TokenStore>) {
        let store = Arc::new(TokenStore::new());
        store.set_tokens(TokenResponse::bearer("old", 60).with_refresh_token("rt-1"));
        (Arc::new(RefreshCoordinator::new(provider, store.clone())), store)
    }

    /// Validates `RefreshCoordinator::refresh` under concurrent callers.
    ///
    /// Assertions:
    /// - Confirms exactly one provider refresh for ten concurrent callers.
    /// - Confirms every caller receives the same new token.
    /// - Confirms exactly one caller led the refresh.
    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let provider = Arc::new(MockProvider::new());
        provider.set_refresh_delay(Duration::from_millis(50));
        provider.set_refresh_response(Ok(TokenResponse::bearer("fresh", 3600)));
        let (coordinator, store) = coordinator_with(provider.clone());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.run().await })
            })
            .collect();

        let mut leaders = 0;
        for handle in handles {
            let outcome = handle.await.expect("task completes");
            assert_eq!(outcome.result.as_deref(), Ok("fresh"));
            if outcome.role == RefreshRole::Leader {
                leaders += 1;
            }
        }

        assert_eq!(leaders, 1);
        assert_eq!(provider.refresh_calls(), 1);
        assert_eq!(store.access_token().as_deref(), Some("fresh"));
        assert_eq!(store.refresh_token().as_deref(), Some("rt-1"));
        assert!(!coordinator.is_refreshing());
    }

    /// Validates failure propagation to every parked caller.
    ///
    /// Assertions:
    /// - Confirms all callers receive the provider error.
    /// - Confirms the store is left untouched by a failed refresh.
    #[tokio::test]
    async fn test_failure_rejects_all_waiters() {
        let provider = Arc::new(MockProvider::new());
        provider.set_refresh_delay(Duration::from_millis(20));
        provider.set_refresh_response(Err(AuthError::provider(Some(400), "invalid_grant")));
        let (coordinator, store) = coordinator_with(provider.clone());

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.refresh().await })
            })
            .collect();

        for handle in handles {
            let result = handle.await.expect("task completes");
            assert_eq!(result, Err(AuthError::provider(Some(400), "invalid_grant")));
        }
        assert_eq!(provider.refresh_calls(), 1);
        assert_eq!(store.access_token().as_deref(), Some("old"));
    }

    /// Validates the missing refresh token path.
    ///
    /// Assertions:
    /// - Ensures `NoRefreshToken` is returned without calling the provider.
    #[tokio::test]
    async fn test_missing_refresh_token() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(TokenStore::new());
        store.set_tokens(TokenResponse::bearer("old", 60));
        let coordinator = RefreshCoordinator::new(provider.clone(), store);

        assert_eq!(coordinator.refresh().await, Err(AuthError::NoRefreshToken));
        assert_eq!(provider.refresh_calls(), 0);
    }

    /// Validates recovery when the leader's future is dropped.
    ///
    /// Assertions:
    /// - Confirms a parked follower is released with an error.
    /// - Confirms the in-flight flag is reset so a later refresh proceeds.
    #[tokio::test]
    async fn test_dropped_leader_releases_followers() {
        let provider = Arc::new(MockProvider::new());
        provider.set_refresh_delay(Duration::from_secs(60));
        provider.set_refresh_response(Ok(TokenResponse::bearer("never", 3600)));
        let (coordinator, _store) = coordinator_with(provider.clone());

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coordinator.is_refreshing());

        let follower = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        leader.abort();
        let result = follower.await.expect("follower completes");
        assert!(matches!(result, Err(AuthError::Network(_))));
        assert!(!coordinator.is_refreshing());

        provider.set_refresh_delay(Duration::ZERO);
        provider.set_refresh_response(Ok(TokenResponse::bearer("later", 3600)));
        assert_eq!(coordinator.refresh().await.as_deref(), Ok("later"));
    }
}
