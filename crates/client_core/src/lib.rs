use async_trait::async_trait;
use shared::{
    domain::{Identity, RoundDetail, RoundId, RoundSummary, TapDelta},
    protocol::{ListRoundsQuery, LoginResponse, RoundPage},
};

mod busy;
pub mod error;
pub mod phase;
pub mod rounds;
pub mod session;
pub mod transport;
pub mod view;

pub use error::{ClientError, Result};
pub use phase::{Clock, RoundClock, RoundPhase, SystemClock};
pub use rounds::{RoundCache, RoundCacheSnapshot};
pub use session::{CredentialSource, SessionSnapshot, SessionStore};
pub use transport::HttpApi;
pub use view::{PhaseTicker, RoundView, TICK_PERIOD};

/// Remote authority for credentials and identity.
#[async_trait]
pub trait AuthCollaborator: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;
    async fn get_identity(&self, token: &str) -> Result<Identity>;
    async fn logout(&self, token: &str) -> Result<()>;
}

/// Remote authority for rounds and scoring. Every call carries the bearer
/// token as-is.
#[async_trait]
pub trait RoundCollaborator: Send + Sync {
    async fn create(&self, token: &str) -> Result<RoundSummary>;
    async fn list(&self, token: &str, query: &ListRoundsQuery) -> Result<RoundPage>;
    async fn detail(&self, token: &str, round_id: &RoundId) -> Result<RoundDetail>;
    async fn tap(&self, token: &str, round_id: &RoundId) -> Result<TapDelta>;
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
