//! HTTP client for the sync server.
//!
//! Thin typed wrappers over reqwest with the error mapping the engine
//! relies on: transport failures become `Network`, 5xx becomes `Server`,
//! 401/403 become `Unauthorized`/`Forbidden`, and anything the client
//! cannot interpret becomes `Protocol`.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use jottery_core::{
    Error, PullRequest, PullResponse, PushRequest, PushResponse, RegisterRequest,
    RegisterResponse, Result, SyncStatusResponse,
};

/// Strip the trailing slash so path concatenation is uniform.
pub fn normalize_endpoint(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Typed client for one sync endpoint.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    bearer: Option<String>,
}

impl ApiClient {
    /// Client without credentials (registration only).
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: normalize_endpoint(endpoint),
            bearer: None,
        }
    }

    /// Client holding a bearer API key.
    pub fn with_key(endpoint: &str, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: normalize_endpoint(endpoint),
            bearer: Some(api_key),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn expect<T: DeserializeOwned>(resp: Response, expected: StatusCode) -> Result<T> {
        let status = resp.status();
        if status == expected {
            return resp
                .json::<T>()
                .await
                .map_err(|e| Error::Protocol(format!("Malformed response body: {e}")));
        }
        Err(Self::status_error(status, resp).await)
    }

    async fn status_error(status: StatusCode, resp: Response) -> Error {
        let message = resp.text().await.unwrap_or_default();
        if status.is_server_error() {
            Error::Server {
                status: status.as_u16(),
                message,
            }
        } else if status == StatusCode::UNAUTHORIZED {
            Error::Unauthorized(message)
        } else if status == StatusCode::FORBIDDEN {
            Error::Forbidden(message)
        } else {
            Error::Protocol(format!("Unexpected status {status}: {message}"))
        }
    }

    /// `POST /api/v1/auth/register`, expecting `201`.
    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        let resp = self
            .http
            .post(self.url("/api/v1/auth/register"))
            .json(req)
            .send()
            .await?;
        Self::expect(resp, StatusCode::CREATED).await
    }

    /// `GET /api/v1/sync/status`.
    pub async fn status(&self) -> Result<SyncStatusResponse> {
        let resp = self
            .authorize(self.http.get(self.url("/api/v1/sync/status")))
            .send()
            .await?;
        Self::expect(resp, StatusCode::OK).await
    }

    /// `POST /api/v1/sync/push`.
    pub async fn push(&self, req: &PushRequest) -> Result<PushResponse> {
        let resp = self
            .authorize(self.http.post(self.url("/api/v1/sync/push")))
            .json(req)
            .send()
            .await?;
        Self::expect(resp, StatusCode::OK).await
    }

    /// `POST /api/v1/sync/pull`.
    pub async fn pull(&self, req: &PullRequest) -> Result<PullResponse> {
        let resp = self
            .authorize(self.http.post(self.url("/api/v1/sync/pull")))
            .json(req)
            .send()
            .await?;
        Self::expect(resp, StatusCode::OK).await
    }

    /// `DELETE /api/v1/sync/notes/:id`, expecting `204`.
    pub async fn delete_note(&self, id: Uuid) -> Result<()> {
        let resp = self
            .authorize(
                self.http
                    .delete(self.url(&format!("/api/v1/sync/notes/{id}"))),
            )
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(Self::status_error(status, resp).await)
        }
    }
}
