use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex as StdMutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use shared::{
    domain::{
        Identity, LeaderboardEntry, Pagination, PlayerRef, PlayerStats, Role, RoundDetail,
        RoundId, RoundSummary, TapDelta,
    },
    error::ErrorCode,
    protocol::{ListRoundsQuery, LoginResponse, RoundPage},
};
use tokio::sync::{oneshot, Mutex};

use crate::{
    error::Result, AuthCollaborator, ClientError, Clock, CredentialSource, RoundCollaborator,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn sample_round(id: &str, start: DateTime<Utc>, seconds: i64) -> RoundSummary {
    RoundSummary {
        id: RoundId::from(id),
        start_time: start,
        end_time: start + Duration::seconds(seconds),
        total_score: 0,
        created_at: start - Duration::seconds(60),
    }
}

pub fn sample_detail(id: &str, start: DateTime<Utc>, seconds: i64) -> RoundDetail {
    RoundDetail {
        round: RoundSummary {
            total_score: 40,
            ..sample_round(id, start, seconds)
        },
        top_stats: vec![LeaderboardEntry {
            taps: 20,
            score: 35,
            user: PlayerRef {
                username: "alice".to_string(),
            },
        }],
        my_stats: PlayerStats { taps: 3, score: 5 },
    }
}

pub fn page(ids: &[&str], next_cursor: Option<&str>) -> RoundPage {
    RoundPage {
        items: ids.iter().map(|id| sample_round(id, t0(), 30)).collect(),
        pagination: Pagination {
            limit: 10,
            next_cursor: next_cursor.map(Into::into),
            has_more: next_cursor.is_some(),
        },
    }
}

/// Clock whose time only moves when a test says so.
pub struct ManualClock {
    now: StdMutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: StdMutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub struct StaticToken(pub Option<String>);

#[async_trait]
impl CredentialSource for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

pub fn token(value: &str) -> Arc<StaticToken> {
    Arc::new(StaticToken(Some(value.to_string())))
}

#[derive(Default)]
pub struct FakeAuth {
    pub reject_login: Option<String>,
    pub reject_identity: bool,
    pub reject_logout: bool,
    pub role: Option<Role>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AuthCollaborator for FakeAuth {
    async fn login(&self, username: &str, _password: &str) -> Result<LoginResponse> {
        self.calls.lock().await.push(format!("login:{username}"));
        if let Some(message) = &self.reject_login {
            return Err(ClientError::auth(ErrorCode::Unauthorized, message.clone()));
        }
        Ok(LoginResponse {
            username: username.to_string(),
            role: self.role.clone().unwrap_or(Role::Other("SURVIVOR".to_string())),
            token: format!("token-{username}"),
        })
    }

    async fn get_identity(&self, token: &str) -> Result<Identity> {
        self.calls.lock().await.push(format!("me:{token}"));
        if self.reject_identity {
            return Err(ClientError::auth(ErrorCode::Unauthorized, "token expired"));
        }
        Ok(Identity {
            username: token.trim_start_matches("token-").to_string(),
            role: self.role.clone().unwrap_or(Role::Admin),
        })
    }

    async fn logout(&self, token: &str) -> Result<()> {
        self.calls.lock().await.push(format!("logout:{token}"));
        if self.reject_logout {
            return Err(ClientError::auth(ErrorCode::Internal, "logout unavailable"));
        }
        Ok(())
    }
}

/// Scripted round server. Every call is recorded as `op:token:arg`.
#[derive(Default)]
pub struct FakeRounds {
    pub fail_with: StdMutex<Option<ClientError>>,
    pub created: Option<RoundSummary>,
    pub pages: Mutex<VecDeque<RoundPage>>,
    pub details: HashMap<RoundId, RoundDetail>,
    pub tap_delta: TapDelta,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub queries: Arc<Mutex<Vec<ListRoundsQuery>>>,
}

impl FakeRounds {
    pub fn fail(&self, err: ClientError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    fn check(&self) -> Result<()> {
        match self.fail_with.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RoundCollaborator for FakeRounds {
    async fn create(&self, token: &str) -> Result<RoundSummary> {
        self.calls.lock().await.push(format!("create:{token}"));
        self.check()?;
        Ok(self
            .created
            .clone()
            .unwrap_or_else(|| sample_round("created", t0(), 30)))
    }

    async fn list(&self, token: &str, query: &ListRoundsQuery) -> Result<RoundPage> {
        self.calls.lock().await.push(format!("list:{token}"));
        self.queries.lock().await.push(query.clone());
        self.check()?;
        Ok(self
            .pages
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| page(&[], None)))
    }

    async fn detail(&self, token: &str, round_id: &RoundId) -> Result<RoundDetail> {
        self.calls
            .lock()
            .await
            .push(format!("detail:{token}:{round_id}"));
        self.check()?;
        self.details
            .get(round_id)
            .cloned()
            .ok_or_else(|| ClientError::api(ErrorCode::NotFound, "Round not found"))
    }

    async fn tap(&self, token: &str, round_id: &RoundId) -> Result<TapDelta> {
        self.calls
            .lock()
            .await
            .push(format!("tap:{token}:{round_id}"));
        self.check()?;
        Ok(self.tap_delta)
    }
}

/// Yields until `calls` has recorded at least `count` entries.
pub async fn wait_for_calls(calls: &Mutex<Vec<String>>, count: usize) {
    while calls.lock().await.len() < count {
        tokio::task::yield_now().await;
    }
}

/// Auth server that records each call and then never answers.
#[derive(Default)]
pub struct PendingAuth {
    pub calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AuthCollaborator for PendingAuth {
    async fn login(&self, username: &str, _password: &str) -> Result<LoginResponse> {
        self.calls.lock().await.push(format!("login:{username}"));
        std::future::pending().await
    }

    async fn get_identity(&self, token: &str) -> Result<Identity> {
        self.calls.lock().await.push(format!("me:{token}"));
        std::future::pending().await
    }

    async fn logout(&self, token: &str) -> Result<()> {
        self.calls.lock().await.push(format!("logout:{token}"));
        std::future::pending().await
    }
}

/// Round server whose answers are held back until the test opens the gate
/// registered for that call. Calls are named `list:<limit>`,
/// `detail:<round id>`, `tap:<round id>` and `create`; calls without a gate
/// answer at once.
#[derive(Default)]
pub struct GatedRounds {
    pub details: HashMap<RoundId, RoundDetail>,
    pub calls: Arc<Mutex<Vec<String>>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
}

impl GatedRounds {
    pub fn with_details(ids: &[&str]) -> Self {
        Self {
            details: ids
                .iter()
                .map(|id| (RoundId::from(*id), sample_detail(id, t0(), 30)))
                .collect(),
            ..Self::default()
        }
    }

    pub async fn gate(&self, call: &str) -> oneshot::Sender<()> {
        let (open, gate) = oneshot::channel();
        self.gates.lock().await.insert(call.to_string(), gate);
        open
    }

    async fn pass(&self, call: String) {
        self.calls.lock().await.push(call.clone());
        let gate = self.gates.lock().await.remove(&call);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }
}

#[async_trait]
impl RoundCollaborator for GatedRounds {
    async fn create(&self, _token: &str) -> Result<RoundSummary> {
        self.pass("create".to_string()).await;
        Ok(sample_round("created", t0(), 30))
    }

    async fn list(&self, _token: &str, query: &ListRoundsQuery) -> Result<RoundPage> {
        self.pass(format!("list:{}", query.limit)).await;
        let id = format!("limit-{}", query.limit);
        Ok(page(&[id.as_str()], None))
    }

    async fn detail(&self, _token: &str, round_id: &RoundId) -> Result<RoundDetail> {
        self.pass(format!("detail:{round_id}")).await;
        self.details
            .get(round_id)
            .cloned()
            .ok_or_else(|| ClientError::api(ErrorCode::NotFound, "Round not found"))
    }

    async fn tap(&self, _token: &str, round_id: &RoundId) -> Result<TapDelta> {
        self.pass(format!("tap:{round_id}")).await;
        Ok(TapDelta { taps: 1, score: 1 })
    }
}
