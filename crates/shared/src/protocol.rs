use serde::{Deserialize, Serialize};

use crate::domain::{Cursor, Identity, Pagination, Role, RoundStatusFilter, RoundSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub role: Role,
    pub token: String,
}

impl LoginResponse {
    pub fn identity(&self) -> Identity {
        Identity {
            username: self.username.clone(),
            role: self.role.clone(),
        }
    }
}

/// One page of the round list. The server names the items `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundPage {
    #[serde(rename = "data")]
    pub items: Vec<RoundSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRoundsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RoundStatusFilter>,
}

impl ListRoundsQuery {
    pub fn first_page(limit: u32) -> Self {
        Self {
            cursor: None,
            limit,
            status: None,
        }
    }

    pub fn with_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_status(mut self, status: Option<RoundStatusFilter>) -> Self {
        self.status = status;
        self
    }
}

impl Default for ListRoundsQuery {
    fn default() -> Self {
        Self::first_page(Pagination::DEFAULT_LIMIT)
    }
}
