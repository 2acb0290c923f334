//! Client-side cache of the round list and the round currently being viewed.
//!
//! Operations never queue behind one another. Overlapping calls each apply
//! their own response when it arrives, so the last response to resolve wins.

use std::sync::Arc;

use shared::{
    domain::{Pagination, RoundDetail, RoundId, RoundStatusFilter, RoundSummary, TapDelta},
    protocol::ListRoundsQuery,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    busy::{InFlight, InFlightGuard},
    error::Result,
    ClientError, CredentialSource, RoundCollaborator,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundCacheSnapshot {
    pub rounds: Vec<RoundSummary>,
    pub current_round: Option<RoundDetail>,
    pub pagination: Pagination,
    pub is_busy: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct RoundCacheState {
    rounds: Vec<RoundSummary>,
    current_round: Option<RoundDetail>,
    pagination: Pagination,
    error: Option<String>,
}

impl RoundCacheState {
    fn fail(&mut self, err: ClientError) -> ClientError {
        self.error = Some(err.to_string());
        err
    }
}

pub struct RoundCache {
    api: Arc<dyn RoundCollaborator>,
    credentials: Arc<dyn CredentialSource>,
    in_flight: InFlight,
    inner: Mutex<RoundCacheState>,
}

impl RoundCache {
    pub fn new(api: Arc<dyn RoundCollaborator>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            api,
            credentials,
            in_flight: InFlight::default(),
            inner: Mutex::new(RoundCacheState::default()),
        }
    }

    /// Marks the cache busy until the returned guard drops and clears the
    /// previous error.
    async fn begin(&self) -> InFlightGuard<'_> {
        let busy = self.in_flight.enter();
        self.inner.lock().await.error = None;
        busy
    }

    async fn require_token(&self) -> Result<String> {
        self.credentials
            .token()
            .await
            .ok_or(ClientError::NotAuthorized)
    }

    /// Creates a round and puts it at the head of the cached list. Pagination
    /// bookkeeping is left alone.
    pub async fn create_round(&self) -> Result<RoundSummary> {
        let _busy = self.begin().await;
        let result = match self.require_token().await {
            Ok(token) => self.api.create(&token).await,
            Err(err) => Err(err),
        };

        let mut state = self.inner.lock().await;
        match result {
            Ok(round) => {
                state.rounds.insert(0, round.clone());
                info!(round_id = %round.id, "rounds: created round");
                Ok(round)
            }
            Err(err) => Err(state.fail(err)),
        }
    }

    /// Without a cursor the fetched page replaces the cached list; with one
    /// it is appended. Pagination state is always taken from the response.
    pub async fn list_rounds(&self, query: ListRoundsQuery) -> Result<Pagination> {
        let _busy = self.begin().await;
        let result = match self.require_token().await {
            Ok(token) => self.api.list(&token, &query).await,
            Err(err) => Err(err),
        };

        let mut state = self.inner.lock().await;
        match result {
            Ok(page) => {
                debug!(
                    items = page.items.len(),
                    appended = query.cursor.is_some(),
                    has_more = page.pagination.has_more,
                    "rounds: page loaded"
                );
                if query.cursor.is_some() {
                    state.rounds.extend(page.items);
                } else {
                    state.rounds = page.items;
                }
                state.pagination = page.pagination.clone();
                Ok(page.pagination)
            }
            Err(err) => Err(state.fail(err)),
        }
    }

    /// Fetches the page after the held cursor. Returns `false` without any
    /// request when there is no further page.
    pub async fn load_more(&self, limit: u32, status: Option<RoundStatusFilter>) -> Result<bool> {
        let cursor = self.inner.lock().await.pagination.next_cursor.clone();
        let Some(cursor) = cursor else {
            return Ok(false);
        };
        self.list_rounds(
            ListRoundsQuery::first_page(limit)
                .with_cursor(Some(cursor))
                .with_status(status),
        )
        .await?;
        Ok(true)
    }

    /// Replaces the held round detail wholesale.
    pub async fn get_round_detail(&self, round_id: &RoundId) -> Result<RoundDetail> {
        let _busy = self.begin().await;
        let result = match self.require_token().await {
            Ok(token) => self.api.detail(&token, round_id).await,
            Err(err) => Err(err),
        };

        let mut state = self.inner.lock().await;
        match result {
            Ok(detail) => {
                debug!(round_id = %detail.round.id, "rounds: detail loaded");
                state.current_round = Some(detail.clone());
                Ok(detail)
            }
            Err(err) => Err(state.fail(err)),
        }
    }

    /// Registers a tap remotely. The returned increments are folded into the
    /// held detail only if it is still the tapped round; otherwise they are
    /// dropped.
    pub async fn register_tap(&self, round_id: &RoundId) -> Result<TapDelta> {
        let _busy = self.begin().await;
        let result = match self.require_token().await {
            Ok(token) => self.api.tap(&token, round_id).await,
            Err(err) => Err(err),
        };

        let mut state = self.inner.lock().await;
        match result {
            Ok(delta) => {
                match state.current_round.as_mut() {
                    Some(detail) if detail.round.id == *round_id => {
                        detail.my_stats.taps = detail.my_stats.taps.saturating_add(delta.taps);
                        detail.my_stats.score = detail.my_stats.score.saturating_add(delta.score);
                        detail.round.total_score =
                            detail.round.total_score.saturating_add(delta.score);
                    }
                    _ => {
                        debug!(%round_id, "rounds: tapped round is no longer viewed; increment dropped");
                    }
                }
                Ok(delta)
            }
            Err(err) => Err(state.fail(err)),
        }
    }

    pub async fn clear_error(&self) {
        self.inner.lock().await.error = None;
    }

    pub async fn set_current_round(&self, detail: Option<RoundDetail>) {
        self.inner.lock().await.current_round = detail;
    }

    pub async fn clear_current_round(&self) {
        self.set_current_round(None).await;
    }

    pub async fn current_round(&self) -> Option<RoundDetail> {
        self.inner.lock().await.current_round.clone()
    }

    pub async fn snapshot(&self) -> RoundCacheSnapshot {
        let state = self.inner.lock().await;
        RoundCacheSnapshot {
            rounds: state.rounds.clone(),
            current_round: state.current_round.clone(),
            pagination: state.pagination.clone(),
            is_busy: self.in_flight.is_busy(),
            error: state.error.clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/rounds_tests.rs"]
mod tests;
