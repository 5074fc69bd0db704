// Map and map-set mesh acquisition pipeline.
//
// Resolves a logical content code into locally materialized mesh artifacts:
// session-gated catalog resolution, cache-aware download, per-artifact
// persistence, and barrier-synchronized composite assembly.

use std::sync::Once;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod remote;
pub mod scene;

static INIT_TRACING: Once = Once::new();

/// Initialize the global tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        info!("mesh pipeline tracing initialized");
    });
}
