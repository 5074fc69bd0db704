// Acquisition pipeline: session gate, catalog resolution, artifact
// materialization, and barrier-synchronized composite completion.

pub mod barrier;
pub mod fetcher;
pub mod gate;
pub mod job;
pub mod resolver;
pub mod store;
