// Acquisition job orchestration: one pipeline run from credentials to
// imported (and, for map-sets, assembled) content.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::model::{ContentKind, MapSetDescriptor, MapSetEntry, Placement};
use crate::remote::http::HttpApiClient;
use crate::remote::traits::{BlobClient, CatalogClient, Credentials, SessionProvider};
use crate::scene::assembler::{ImportAssembler, ImportOutcome};
use crate::scene::traits::SceneSink;

use super::barrier::CompletionBarrier;
use super::fetcher::{ArtifactFetcher, FetchOutcome};
use super::gate::SessionGate;
use super::resolver::CatalogResolver;
use super::store::ArtifactStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Authenticating,
    ResolvingMetadata,
    Importing,
    AwaitingMembers,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub code: String,
    pub kind: ContentKind,
    pub credentials: Credentials,
}

/// Terminal state of one member (or of the single map) after its chain
/// settled. Only `Failed` counts as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberOutcome {
    Imported,
    DuplicateSkipped,
    NoMesh,
    SinkUnavailable,
    Failed(String),
}

impl MemberOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, MemberOutcome::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct MemberReport {
    pub id: String,
    pub code: String,
    pub outcome: MemberOutcome,
}

/// Summary of a finished job. `state` is `Done` or `Failed`.
#[derive(Debug)]
pub struct JobReport {
    pub code: String,
    pub kind: ContentKind,
    pub state: JobState,
    pub members: Vec<MemberReport>,
    pub assembled: bool,
}

impl JobReport {
    pub fn imported(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.outcome == MemberOutcome::Imported)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.members.iter().filter(|m| m.outcome.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.members.len() - self.imported() - self.failed()
    }
}

/// Per-job state, owned by the job value and passed explicitly through the
/// pipeline, never shared across jobs. The member registry maps a member
/// id back to the placement it takes within the composite.
struct Job {
    code: String,
    kind: ContentKind,
    state: JobState,
    registry: HashMap<String, Placement>,
}

impl Job {
    fn new(request: &AcquisitionRequest) -> Self {
        Self {
            code: request.code.clone(),
            kind: request.kind,
            state: JobState::Idle,
            registry: HashMap::new(),
        }
    }

    fn advance(&mut self, next: JobState) {
        if self.state == JobState::Done {
            warn!("job {} already done; ignoring transition", self.code);
            return;
        }
        debug!("job {}: {:?} -> {:?}", self.code, self.state, next);
        self.state = next;
    }

    fn register_members(&mut self, set: &MapSetDescriptor) {
        for entry in &set.map_set_data {
            self.registry.insert(entry.map.id.clone(), entry.placement());
        }
    }

    fn placement_for(&self, member_id: &str) -> Placement {
        self.registry.get(member_id).copied().unwrap_or_default()
    }

    fn into_report(self, members: Vec<MemberReport>, assembled: bool) -> JobReport {
        JobReport {
            code: self.code,
            kind: self.kind,
            state: self.state,
            members,
            assembled,
        }
    }
}

/// Clears the busy flag on every exit path, success or error.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The acquisition pipeline facade. One job at a time; a second `acquire`
/// while one is in flight is rejected via the busy flag, never queued.
pub struct MeshPipeline {
    gate: SessionGate,
    resolver: CatalogResolver,
    fetcher: Arc<ArtifactFetcher>,
    assembler: Arc<ImportAssembler>,
    store: Arc<ArtifactStore>,
    busy: AtomicBool,
}

impl MeshPipeline {
    pub fn new(
        session: Arc<dyn SessionProvider>,
        catalog: Arc<dyn CatalogClient>,
        blob: Arc<dyn BlobClient>,
        store: Arc<ArtifactStore>,
        assembler: Arc<ImportAssembler>,
    ) -> Self {
        Self {
            gate: SessionGate::new(session),
            resolver: CatalogResolver::new(Arc::clone(&catalog)),
            fetcher: Arc::new(ArtifactFetcher::new(catalog, blob, Arc::clone(&store))),
            assembler,
            store,
            busy: AtomicBool::new(false),
        }
    }

    /// Build a pipeline over HTTP collaborators from configuration. The
    /// sink is `None` outside an offline/editing context.
    pub fn from_config(config: &PipelineConfig, sink: Option<Arc<dyn SceneSink>>) -> Result<Self> {
        let client = Arc::new(HttpApiClient::new(config.api_base.clone()));
        let store = Arc::new(ArtifactStore::new(Path::new(&config.cache_dir))?);
        let assembler = Arc::new(ImportAssembler::new(sink, Path::new(&config.units_dir)));
        Ok(Self::new(
            client.clone(),
            client.clone(),
            client,
            store,
            assembler,
        ))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run one acquisition end to end.
    pub async fn acquire(&self, request: AcquisitionRequest) -> Result<JobReport> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let mut job = Job::new(&request);
        job.advance(JobState::Authenticating);
        self.gate.acquire(&request.credentials).await?;

        job.advance(JobState::ResolvingMetadata);
        match request.kind {
            ContentKind::Map => self.run_single(job).await,
            ContentKind::MapSet => self.run_composite(job).await,
        }
    }

    async fn run_single(&self, mut job: Job) -> Result<JobReport> {
        let descriptor = self.resolver.resolve_map(&job.code).await?;

        job.advance(JobState::Importing);
        let path = self.store.artifact_path(&job.code, &job.code);
        let outcome = match self
            .fetcher
            .materialize(descriptor.mesh_link(), &path)
            .await?
        {
            FetchOutcome::NoMesh => {
                info!("map {} has no mesh available; nothing to import", job.code);
                MemberOutcome::NoMesh
            }
            FetchOutcome::CacheHit(path) | FetchOutcome::Fetched(path) => {
                match self.assembler.import_single(&path, &job.code)? {
                    ImportOutcome::Imported(_) => MemberOutcome::Imported,
                    ImportOutcome::DuplicateSkipped => MemberOutcome::DuplicateSkipped,
                    ImportOutcome::SinkUnavailable => MemberOutcome::SinkUnavailable,
                }
            }
        };

        job.advance(JobState::Done);
        info!("map {} acquisition complete", job.code);
        let member = MemberReport {
            id: descriptor.id,
            code: job.code.clone(),
            outcome,
        };
        Ok(job.into_report(vec![member], false))
    }

    async fn run_composite(&self, mut job: Job) -> Result<JobReport> {
        let set = self.resolver.resolve_map_set(&job.code).await?;
        let total = set.map_set_data.len();
        job.register_members(&set);
        job.advance(JobState::AwaitingMembers);

        let barrier = Arc::new(CompletionBarrier::new(total));

        // Fan out one independent fetch/import chain per member. Chains may
        // settle in any order; the barrier is the only shared state.
        let mut handles = Vec::with_capacity(total);
        for entry in set.map_set_data.iter().cloned() {
            let placement = job.placement_for(&entry.map.id);
            let fetcher = Arc::clone(&self.fetcher);
            let assembler = Arc::clone(&self.assembler);
            let store = Arc::clone(&self.store);
            let barrier = Arc::clone(&barrier);
            let set_code = set.map_set_code.clone();
            handles.push(tokio::spawn(async move {
                Self::run_member(entry, placement, set_code, fetcher, assembler, store, barrier)
                    .await
            }));
        }

        let mut members = Vec::with_capacity(total);
        for handle in handles {
            match handle.await {
                Ok(report) => members.push(report),
                Err(e) => error!("member chain panicked: {}", e),
            }
        }

        let assembled = if barrier.has_fired() {
            self.assembler.finish_composite(&set.map_set_code)?;
            true
        } else {
            warn!(
                "map-set {} incomplete ({}/{} members); assembly not performed",
                set.map_set_code,
                barrier.completed(),
                barrier.total()
            );
            false
        };

        if assembled {
            job.advance(JobState::Done);
            info!("map-set {} acquisition complete", set.map_set_code);
        } else {
            job.advance(JobState::Failed);
        }
        Ok(job.into_report(members, assembled))
    }

    /// One member's fetch/import chain. Failures are logged and isolated;
    /// only a member that actually ends up imported arrives at the
    /// barrier, so a set with a skipped member is never assembled.
    async fn run_member(
        entry: MapSetEntry,
        placement: Placement,
        set_code: String,
        fetcher: Arc<ArtifactFetcher>,
        assembler: Arc<ImportAssembler>,
        store: Arc<ArtifactStore>,
        barrier: Arc<CompletionBarrier>,
    ) -> MemberReport {
        let map = &entry.map;
        let path = store.artifact_path(&set_code, &map.map_code);

        let outcome = match fetcher.materialize(map.mesh_link(), &path).await {
            Ok(FetchOutcome::NoMesh) => {
                debug!("member {} has no mesh; skipped", map.map_code);
                MemberOutcome::NoMesh
            }
            Ok(FetchOutcome::CacheHit(path)) | Ok(FetchOutcome::Fetched(path)) => {
                match assembler.import_member(&path, &placement, &set_code) {
                    Ok(ImportOutcome::Imported(_)) => MemberOutcome::Imported,
                    Ok(ImportOutcome::DuplicateSkipped) => MemberOutcome::DuplicateSkipped,
                    Ok(ImportOutcome::SinkUnavailable) => MemberOutcome::SinkUnavailable,
                    Err(e) => {
                        error!("member {} import failed: {}", map.map_code, e);
                        MemberOutcome::Failed(e.to_string())
                    }
                }
            }
            Err(e) => {
                error!("member {} fetch failed: {}", map.map_code, e);
                MemberOutcome::Failed(e.to_string())
            }
        };

        if outcome == MemberOutcome::Imported {
            barrier.arrive();
        }

        MemberReport {
            id: map.id.clone(),
            code: map.map_code.clone(),
            outcome,
        }
    }
}
