use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{AuthToken, ErrorPayload};

use super::traits::{ApiResponse, AuthOutcome, BlobClient, CatalogClient, Credentials, SessionProvider};

/// HTTP implementation of the session, catalog, and blob seams.
///
/// Holds the session token acquired by `authenticate`; every catalog call
/// after that carries it as a bearer header. The token is per-client state,
/// never process-wide.
pub struct HttpApiClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: RwLock::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token.read().as_ref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send a catalog request and capture status + body without interpreting
    /// them. Auth-rejection statuses are worth a log line on their own.
    async fn send_raw(&self, req: RequestBuilder) -> Result<ApiResponse> {
        let resp = self.authorized(req).send().await?;
        let status = resp.status().as_u16();
        if status == 401 || status == 403 {
            warn!("catalog auth rejected status={}", status);
        }
        let body = resp.text().await?;
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl SessionProvider for HttpApiClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome> {
        let payload = serde_json::json!({
            "clientId": credentials.client_id,
            "clientSecret": credentials.client_secret,
        });

        let resp = self
            .client
            .post(self.endpoint("auth"))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;

        if (200..300).contains(&status) {
            let token: AuthToken = serde_json::from_str(&body)?;
            *self.token.write() = Some(token.token);
            debug!("session token acquired");
            Ok(AuthOutcome::Granted)
        } else {
            let payload: ErrorPayload = serde_json::from_str(&body).unwrap_or_default();
            let reason = if payload.error.is_empty() {
                format!("HTTP {}", status)
            } else {
                payload.error
            };
            warn!("authentication rejected: {}", reason);
            Ok(AuthOutcome::Rejected { reason })
        }
    }
}

#[async_trait]
impl CatalogClient for HttpApiClient {
    async fn map_details(&self, id_or_code: &str) -> Result<ApiResponse> {
        debug!("fetching map details for {}", id_or_code);
        self.send_raw(self.client.get(self.endpoint(&format!("map/{}", id_or_code))))
            .await
    }

    async fn map_set_details(&self, code: &str) -> Result<ApiResponse> {
        debug!("fetching map-set details for {}", code);
        self.send_raw(self.client.get(self.endpoint(&format!("map-set/{}", code))))
            .await
    }

    async fn download_url(&self, mesh_link: &str) -> Result<ApiResponse> {
        self.send_raw(
            self.client
                .get(self.endpoint("file-url"))
                .query(&[("link", mesh_link)]),
        )
        .await
    }
}

#[async_trait]
impl BlobClient for HttpApiClient {
    async fn download(&self, url: &str) -> Result<Bytes> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;
        debug!("downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }
}
