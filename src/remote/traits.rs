use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Typed outcome of an authentication attempt. A transport failure is an
/// `Err` on the call itself; `Rejected` means the service answered no.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted,
    Rejected { reason: String },
}

/// Raw response from one catalog call. Payload interpretation (empty body,
/// error payload, decoding) happens in the resolver, not here.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome>;
}

/// Catalog metadata service. Each method is exactly one outbound request.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn map_details(&self, id_or_code: &str) -> Result<ApiResponse>;
    async fn map_set_details(&self, code: &str) -> Result<ApiResponse>;
    async fn download_url(&self, mesh_link: &str) -> Result<ApiResponse>;
}

#[async_trait]
pub trait BlobClient: Send + Sync {
    async fn download(&self, url: &str) -> Result<Bytes>;
}
