//! reqwest implementation of the auth and round collaborators.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Identity, RoundDetail, RoundId, RoundSummary, TapDelta},
    error::{ApiErrorBody, ErrorCode},
    protocol::{ListRoundsQuery, LoginRequest, LoginResponse, RoundPage},
};
use tracing::{debug, warn};
use url::Url;

use crate::{error::Result, AuthCollaborator, ClientError, RoundCollaborator};

const LOGIN_FAILED: &str = "authorization failed";
const IDENTITY_FAILED: &str = "failed to resolve session";
const LOGOUT_FAILED: &str = "failed to log out";
const CREATE_FAILED: &str = "failed to create round";
const LIST_FAILED: &str = "failed to load rounds";
const DETAIL_FAILED: &str = "failed to load round details";
const TAP_FAILED: &str = "failed to register tap";

#[derive(Debug, Clone, Copy)]
enum Authority {
    Auth,
    Rounds,
}

impl Authority {
    fn error(self, code: ErrorCode, message: impl Into<String>) -> ClientError {
        match self {
            Authority::Auth => ClientError::auth(code, message),
            Authority::Rounds => ClientError::api(code, message),
        }
    }
}

#[derive(Clone)]
pub struct HttpApi {
    http: Client,
    base_url: Url,
}

impl HttpApi {
    /// `base_url` is the API root, e.g. `https://host/api/v1`.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid api url: {base_url}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!("api url must start with http:// or https://"));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // http(s) urls always have a path to extend.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        request: RequestBuilder,
        authority: Authority,
        fallback: &'static str,
    ) -> Result<Response> {
        let response = request.send().await.map_err(|err| {
            warn!(error = %err, "api: request failed before a response arrived");
            authority.error(ErrorCode::Internal, fallback)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ApiErrorBody>().await.unwrap_or_default();
        let message = body.user_message().unwrap_or(fallback).to_string();
        debug!(status = status.as_u16(), %message, "api: request rejected");
        Err(authority.error(ErrorCode::from_status(status.as_u16()), message))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        authority: Authority,
        fallback: &'static str,
    ) -> Result<T> {
        let response = self.send(request, authority, fallback).await?;
        response.json::<T>().await.map_err(|err| {
            warn!(error = %err, "api: response body did not match the expected shape");
            authority.error(ErrorCode::Internal, fallback)
        })
    }
}

#[async_trait]
impl AuthCollaborator for HttpApi {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let request = self
            .http
            .post(self.endpoint(&["auth", "login"]))
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            });
        self.send_json(request, Authority::Auth, LOGIN_FAILED).await
    }

    async fn get_identity(&self, token: &str) -> Result<Identity> {
        let request = self
            .http
            .get(self.endpoint(&["auth", "me"]))
            .bearer_auth(token);
        self.send_json(request, Authority::Auth, IDENTITY_FAILED)
            .await
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let request = self
            .http
            .post(self.endpoint(&["auth", "logout"]))
            .bearer_auth(token)
            .json(&serde_json::json!({}));
        self.send(request, Authority::Auth, LOGOUT_FAILED).await?;
        Ok(())
    }
}

#[async_trait]
impl RoundCollaborator for HttpApi {
    async fn create(&self, token: &str) -> Result<RoundSummary> {
        let request = self
            .http
            .post(self.endpoint(&["rounds"]))
            .bearer_auth(token)
            .json(&serde_json::json!({}));
        self.send_json(request, Authority::Rounds, CREATE_FAILED)
            .await
    }

    async fn list(&self, token: &str, query: &ListRoundsQuery) -> Result<RoundPage> {
        let request = self
            .http
            .get(self.endpoint(&["rounds"]))
            .query(query)
            .bearer_auth(token);
        self.send_json(request, Authority::Rounds, LIST_FAILED).await
    }

    async fn detail(&self, token: &str, round_id: &RoundId) -> Result<RoundDetail> {
        let request = self
            .http
            .get(self.endpoint(&["rounds", round_id.as_str()]))
            .bearer_auth(token);
        self.send_json(request, Authority::Rounds, DETAIL_FAILED)
            .await
    }

    async fn tap(&self, token: &str, round_id: &RoundId) -> Result<TapDelta> {
        let request = self
            .http
            .post(self.endpoint(&["rounds", round_id.as_str(), "tap"]))
            .bearer_auth(token)
            .json(&serde_json::json!({}));
        self.send_json(request, Authority::Rounds, TAP_FAILED).await
    }
}
