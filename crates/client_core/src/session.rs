//! Session store: identity and bearer token for the current user.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::domain::Identity;
use storage::{load_json, save_json, KeyValueStore};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{busy::InFlight, error::Result, AuthCollaborator};

pub const SESSION_STORAGE_KEY: &str = "auth-storage";

/// Anything that can hand out the current bearer token.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn token(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedSession {
    identity: Option<Identity>,
    token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub token: Option<String>,
    pub is_busy: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct SessionState {
    identity: Option<Identity>,
    token: Option<String>,
    error: Option<String>,
}

impl SessionState {
    fn clear_credentials(&mut self) {
        self.identity = None;
        self.token = None;
    }

    fn persisted(&self) -> PersistedSession {
        PersistedSession {
            identity: self.identity.clone(),
            token: self.token.clone(),
        }
    }
}

pub struct SessionStore {
    auth: Arc<dyn AuthCollaborator>,
    persistence: Arc<dyn KeyValueStore>,
    in_flight: InFlight,
    inner: Mutex<SessionState>,
}

impl SessionStore {
    pub fn new(auth: Arc<dyn AuthCollaborator>, persistence: Arc<dyn KeyValueStore>) -> Self {
        Self {
            auth,
            persistence,
            in_flight: InFlight::default(),
            inner: Mutex::new(SessionState::default()),
        }
    }

    /// Builds the store from whatever a previous process persisted. A
    /// missing or unreadable record yields a signed-out store.
    pub async fn restore(
        auth: Arc<dyn AuthCollaborator>,
        persistence: Arc<dyn KeyValueStore>,
    ) -> Self {
        let persisted = match load_json::<PersistedSession>(
            persistence.as_ref(),
            SESSION_STORAGE_KEY,
        )
        .await
        {
            Ok(persisted) => persisted.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "session: ignoring unreadable persisted session");
                PersistedSession::default()
            }
        };

        let store = Self::new(auth, persistence);
        {
            let mut state = store.inner.lock().await;
            state.identity = persisted.identity;
            state.token = persisted.token;
        }
        store
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Identity> {
        let _busy = self.in_flight.enter();
        self.inner.lock().await.error = None;

        let result = self.auth.login(username, password).await;

        let mut state = self.inner.lock().await;
        let outcome = match result {
            Ok(response) => {
                let identity = response.identity();
                info!(username = %identity.username, role = %identity.role, "session: logged in");
                state.identity = Some(identity.clone());
                state.token = Some(response.token);
                Ok(identity)
            }
            Err(err) => {
                state.clear_credentials();
                state.error = Some(err.to_string());
                Err(err)
            }
        };
        self.persist(&state).await;
        outcome
    }

    /// Tells the server the token is done with, then forgets it locally no
    /// matter what the server said.
    pub async fn logout(&self) {
        let _busy = self.in_flight.enter();
        let token = self.inner.lock().await.token.clone();
        if let Some(token) = token {
            if let Err(err) = self.auth.logout(&token).await {
                warn!(error = %err, "session: logout request failed");
            }
        }

        let mut state = self.inner.lock().await;
        state.clear_credentials();
        state.error = None;
        self.persist(&state).await;
        info!("session: logged out");
    }

    /// Re-resolves the identity behind the held token. Rejection is treated
    /// as an expired session and is not reported as an error.
    pub async fn check_session(&self) {
        let Some(token) = self.inner.lock().await.token.clone() else {
            return;
        };
        let _busy = self.in_flight.enter();

        let result = self.auth.get_identity(&token).await;

        let mut state = self.inner.lock().await;
        match result {
            Ok(identity) => {
                state.identity = Some(identity);
                state.error = None;
            }
            Err(err) => {
                warn!(error = %err, "session: held token was rejected; signing out");
                state.clear_credentials();
            }
        }
        self.persist(&state).await;
    }

    pub async fn clear_error(&self) {
        self.inner.lock().await.error = None;
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock().await;
        SessionSnapshot {
            identity: state.identity.clone(),
            token: state.token.clone(),
            is_busy: self.in_flight.is_busy(),
            error: state.error.clone(),
        }
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.inner.lock().await.identity.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        let state = self.inner.lock().await;
        state.identity.is_some() && state.token.is_some()
    }

    pub async fn is_admin(&self) -> bool {
        self.inner
            .lock()
            .await
            .identity
            .as_ref()
            .is_some_and(Identity::is_admin)
    }

    async fn persist(&self, state: &SessionState) {
        let record = state.persisted();
        if let Err(err) =
            save_json(self.persistence.as_ref(), SESSION_STORAGE_KEY, &record).await
        {
            warn!(error = %err, "session: failed to persist session");
        }
    }
}

#[async_trait]
impl CredentialSource for SessionStore {
    async fn token(&self) -> Option<String> {
        self.inner.lock().await.token.clone()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
