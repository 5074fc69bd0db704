// Catalog resolution: one outbound request per descriptor, strict payload
// interpretation before any decoding.

use std::sync::Arc;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::{ErrorPayload, MapDescriptor, MapSetDescriptor, MapSetResult};
use crate::remote::traits::{ApiResponse, CatalogClient};

/// Interpret a raw catalog response into a decodable payload.
///
/// An empty/blank body is `EmptyResponse`, distinct from a decodable but
/// unsuccessful response, which carries the service's error message and
/// status code.
pub(crate) fn interpret_payload(resp: ApiResponse) -> Result<String> {
    if resp.body.trim().is_empty() {
        return Err(PipelineError::EmptyResponse);
    }
    if !resp.is_success() {
        let payload: ErrorPayload = serde_json::from_str(&resp.body).unwrap_or_default();
        let message = if payload.error.is_empty() {
            resp.body
        } else {
            payload.error
        };
        return Err(PipelineError::Catalog {
            message,
            status: resp.status,
        });
    }
    Ok(resp.body)
}

pub struct CatalogResolver {
    catalog: Arc<dyn CatalogClient>,
}

impl CatalogResolver {
    pub fn new(catalog: Arc<dyn CatalogClient>) -> Self {
        Self { catalog }
    }

    pub async fn resolve_map(&self, id_or_code: &str) -> Result<MapDescriptor> {
        let resp = self.catalog.map_details(id_or_code).await?;
        let body = interpret_payload(resp)?;
        let descriptor: MapDescriptor = serde_json::from_str(&body)?;
        debug!("resolved map {} ({})", descriptor.map_code, descriptor.id);
        Ok(descriptor)
    }

    /// Resolve a map-set. A decoded set with no members is `EmptyResponse`
    /// as well; there is nothing to resolve.
    pub async fn resolve_map_set(&self, code: &str) -> Result<MapSetDescriptor> {
        let resp = self.catalog.map_set_details(code).await?;
        let body = interpret_payload(resp)?;
        let result: MapSetResult = serde_json::from_str(&body)?;
        let set = result.map_set;
        if set.map_set_data.is_empty() {
            return Err(PipelineError::EmptyResponse);
        }
        debug!(
            "resolved map-set {} with {} members",
            set.map_set_code,
            set.map_set_data.len()
        );
        Ok(set)
    }
}
