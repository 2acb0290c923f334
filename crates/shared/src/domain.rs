use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! opaque_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_newtype!(RoundId);
opaque_newtype!(Cursor);

/// Account role as reported by the auth endpoints. Only `ADMIN` carries
/// meaning on the client; any other value is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "ADMIN",
            Role::Other(value) => value,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        if value == "ADMIN" {
            Role::Admin
        } else {
            Role::Other(value)
        }
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        match value {
            Role::Admin => "ADMIN".to_string(),
            Role::Other(value) => value,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub id: RoundId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_score: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub taps: u64,
    pub score: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub taps: u64,
    pub score: u64,
    pub user: PlayerRef,
}

impl LeaderboardEntry {
    pub fn username(&self) -> &str {
        &self.user.username
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDetail {
    pub round: RoundSummary,
    /// Ordered by score, highest first.
    pub top_stats: Vec<LeaderboardEntry>,
    pub my_stats: PlayerStats,
}

impl RoundDetail {
    pub fn winner(&self) -> Option<&LeaderboardEntry> {
        self.top_stats.first()
    }
}

/// Increment reported by the server for a single tap, not a running total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapDelta {
    pub taps: u64,
    pub score: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub limit: u32,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 10;
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            next_cursor: None,
            has_more: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoundStatusFilter {
    Active,
    Waiting,
    Finished,
    Other(String),
}

impl RoundStatusFilter {
    pub fn as_str(&self) -> &str {
        match self {
            RoundStatusFilter::Active => "active",
            RoundStatusFilter::Waiting => "waiting",
            RoundStatusFilter::Finished => "finished",
            RoundStatusFilter::Other(value) => value,
        }
    }
}

impl From<String> for RoundStatusFilter {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => RoundStatusFilter::Active,
            "waiting" => RoundStatusFilter::Waiting,
            "finished" => RoundStatusFilter::Finished,
            _ => RoundStatusFilter::Other(value),
        }
    }
}

impl From<&str> for RoundStatusFilter {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<RoundStatusFilter> for String {
    fn from(value: RoundStatusFilter) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RoundStatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_unknown_values_verbatim() {
        let admin: Role = serde_json::from_str("\"ADMIN\"").expect("role");
        assert_eq!(admin, Role::Admin);

        let survivor: Role = serde_json::from_str("\"SURVIVOR\"").expect("role");
        assert_eq!(survivor, Role::Other("SURVIVOR".to_string()));
        assert_eq!(
            serde_json::to_string(&survivor).expect("encode"),
            "\"SURVIVOR\""
        );
    }

    #[test]
    fn round_detail_decodes_camel_case_payload() {
        let detail: RoundDetail = serde_json::from_str(
            r#"{
                "round": {
                    "id": "r-1",
                    "startTime": "2024-01-01T00:00:00Z",
                    "endTime": "2024-01-01T00:01:00Z",
                    "totalScore": 42,
                    "createdAt": "2023-12-31T23:59:00Z"
                },
                "topStats": [
                    {"taps": 10, "score": 30, "user": {"username": "alice"}},
                    {"taps": 6, "score": 12, "user": {"username": "bob"}}
                ],
                "myStats": {"taps": 6, "score": 12}
            }"#,
        )
        .expect("detail");

        assert_eq!(detail.round.id, RoundId::from("r-1"));
        assert_eq!(detail.round.total_score, 42);
        assert_eq!(detail.winner().map(|w| w.username()), Some("alice"));
        assert_eq!(detail.my_stats, PlayerStats { taps: 6, score: 12 });
    }

    #[test]
    fn pagination_accepts_null_cursor() {
        let pagination: Pagination =
            serde_json::from_str(r#"{"limit": 10, "nextCursor": null, "hasMore": false}"#)
                .expect("pagination");
        assert_eq!(pagination, Pagination::default());
    }

    #[test]
    fn status_filter_keeps_open_values() {
        assert_eq!(RoundStatusFilter::from("active"), RoundStatusFilter::Active);
        assert_eq!(
            RoundStatusFilter::from("archived").as_str(),
            "archived"
        );
    }
}
