// Import assembly: persisted artifacts become scene nodes, composites
// become one reusable unit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::UNIT_EXT;
use crate::error::Result;
use crate::model::Placement;

use super::traits::{NodeId, SceneSink};

/// Outcome of an import attempt. `DuplicateSkipped` and `SinkUnavailable`
/// are deliberate no-ops, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported(NodeId),
    DuplicateSkipped,
    SinkUnavailable,
}

pub struct ImportAssembler {
    sink: Option<Arc<dyn SceneSink>>,
    units_dir: PathBuf,
    // Serializes staging-parent find-or-create; member chains run
    // concurrently and must all land under the same parent.
    staging_lock: Mutex<()>,
}

impl ImportAssembler {
    pub fn new(sink: Option<Arc<dyn SceneSink>>, units_dir: &Path) -> Self {
        Self {
            sink,
            units_dir: units_dir.to_path_buf(),
            staging_lock: Mutex::new(()),
        }
    }

    pub fn unit_path(&self, name: &str) -> PathBuf {
        self.units_dir.join(format!("{}.{}", name, UNIT_EXT))
    }

    /// Node name derived from the artifact file stem.
    fn derived_name(path: &Path) -> String {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Import a single-map artifact: attach it under the destination
    /// container and save it as a reusable unit named `unit_name`.
    pub fn import_single(&self, path: &Path, unit_name: &str) -> Result<ImportOutcome> {
        let Some(sink) = &self.sink else {
            debug!("scene sink unavailable; skipping import of {}", path.display());
            return Ok(ImportOutcome::SinkUnavailable);
        };

        let name = Self::derived_name(path);
        if sink.find_node(&name).is_some() {
            warn!("node {} already exists in the scene; leaving it untouched", name);
            return Ok(ImportOutcome::DuplicateSkipped);
        }

        let node = sink.load_artifact(path, &name)?;
        sink.attach(node, sink.container())?;
        sink.save_unit(node, &self.unit_path(unit_name))?;

        info!("imported {} under destination container", name);
        Ok(ImportOutcome::Imported(node))
    }

    /// Import one member of a composite: place it and attach it under the
    /// named staging parent, lazily creating the parent on first use.
    pub fn import_member(
        &self,
        path: &Path,
        placement: &Placement,
        composite_name: &str,
    ) -> Result<ImportOutcome> {
        let Some(sink) = &self.sink else {
            debug!("scene sink unavailable; skipping import of {}", path.display());
            return Ok(ImportOutcome::SinkUnavailable);
        };

        let staging = {
            let _guard = self.staging_lock.lock();
            match sink.find_node(composite_name) {
                Some(node) => node,
                None => {
                    let node = sink.create_node(composite_name);
                    sink.attach(node, sink.container())?;
                    node
                }
            }
        };

        let name = Self::derived_name(path);
        if sink.find_node(&name).is_some() {
            warn!("node {} already exists in the scene; leaving it untouched", name);
            return Ok(ImportOutcome::DuplicateSkipped);
        }

        let node = sink.load_artifact(path, &name)?;
        sink.set_placement(node, placement)?;
        sink.attach(node, staging)?;

        debug!("member {} attached under {}", name, composite_name);
        Ok(ImportOutcome::Imported(node))
    }

    /// Finalize a fully assembled composite: save the staging parent as one
    /// unit, re-instantiate that unit under the destination container, and
    /// discard the transient staging parent.
    pub fn finish_composite(&self, composite_name: &str) -> Result<()> {
        let Some(sink) = &self.sink else {
            debug!("scene sink unavailable; skipping composite assembly");
            return Ok(());
        };

        let Some(staging) = sink.find_node(composite_name) else {
            debug!("no staging parent for {}; nothing to assemble", composite_name);
            return Ok(());
        };

        let unit_path = self.unit_path(composite_name);
        sink.save_unit(staging, &unit_path)?;
        sink.remove(staging)?;

        let instance = sink.instantiate_unit(&unit_path)?;
        sink.attach(instance, sink.container())?;

        info!("composite {} assembled and saved as unit", composite_name);
        Ok(())
    }
}
