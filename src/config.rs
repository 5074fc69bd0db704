use serde::Deserialize;

use crate::remote::traits::Credentials;

/// File extension for persisted mesh artifacts.
pub const ARTIFACT_EXT: &str = "glb";

/// File extension for reusable prefabricated units.
pub const UNIT_EXT: &str = "unit";

/// Name of the default destination container node in the scene graph.
pub const DEFAULT_CONTAINER: &str = "MapSpace";

/// Top-level configuration for the acquisition pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Base URL of the catalog service.
    pub api_base: String,
    /// Directory used for persisted mesh artifacts.
    pub cache_dir: String,
    /// Directory used for saved prefabricated units.
    pub units_dir: String,
    /// Client id used to open a session.
    pub client_id: String,
    /// Client secret used to open a session.
    pub client_secret: String,
}

impl PipelineConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            cache_dir: "map-data".to_string(),
            units_dir: "units".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}
