// End-to-end pipeline tests against fake catalog + blob upstreams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use mapmesh_engine::config::{PipelineConfig, DEFAULT_CONTAINER};
use mapmesh_engine::engine::job::{AcquisitionRequest, JobState, MemberOutcome, MeshPipeline};
use mapmesh_engine::engine::store::ArtifactStore;
use mapmesh_engine::error::PipelineError;
use mapmesh_engine::model::ContentKind;
use mapmesh_engine::remote::http::HttpApiClient;
use mapmesh_engine::remote::traits::Credentials;
use mapmesh_engine::scene::assembler::ImportAssembler;
use mapmesh_engine::scene::memory::MemoryScene;
use mapmesh_engine::scene::traits::SceneSink;

struct Upstream {
    base: String,
    auth_calls: AtomicUsize,
    url_calls: AtomicUsize,
    blob_calls: AtomicUsize,
    fail_blob_link: Option<String>,
    auth_delay_ms: u64,
}

async fn auth_handler(State(up): State<Arc<Upstream>>) -> impl IntoResponse {
    up.auth_calls.fetch_add(1, Ordering::SeqCst);
    if up.auth_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(up.auth_delay_ms)).await;
    }
    Json(serde_json::json!({ "token": "tok-1" }))
}

async fn map_handler(AxumPath(code): AxumPath<String>) -> impl IntoResponse {
    match code.as_str() {
        "map-42" => Json(serde_json::json!({
            "_id": "id-42",
            "mapCode": "map-42",
            "mapMesh": { "texturedMesh": { "meshLink": "" } }
        }))
        .into_response(),
        "map-77" => Json(serde_json::json!({
            "_id": "id-77",
            "mapCode": "map-77",
            "mapMesh": { "texturedMesh": { "meshLink": "link-77" } }
        }))
        .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "map not found" })),
        )
            .into_response(),
    }
}

async fn map_set_handler(AxumPath(code): AxumPath<String>) -> impl IntoResponse {
    let member = |n: u32, link: &str| {
        serde_json::json!({
            "map": {
                "_id": format!("id-m{}", n),
                "mapCode": format!("m{}", n),
                "mapMesh": { "texturedMesh": { "meshLink": link } }
            },
            "position": { "x": 0.0, "y": n as f32, "z": 0.0 },
            "rotation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
        })
    };
    let members = match code.as_str() {
        "set-7" => vec![
            member(1, "link-m1"),
            member(2, "link-m2"),
            member(3, "link-m3"),
        ],
        // Member 2 has no mesh available.
        "set-gap" => vec![member(1, "link-m1"), member(2, ""), member(3, "link-m3")],
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "map-set not found" })),
            )
                .into_response();
        }
    };
    Json(serde_json::json!({
        "mapSet": {
            "mapSetCode": code,
            "mapSetData": members
        }
    }))
    .into_response()
}

async fn file_url_handler(
    State(up): State<Arc<Upstream>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    up.url_calls.fetch_add(1, Ordering::SeqCst);
    let link = params.get("link").cloned().unwrap_or_default();
    Json(serde_json::json!({ "url": format!("{}/blob/{}", up.base, link) }))
}

async fn blob_handler(
    State(up): State<Arc<Upstream>>,
    AxumPath(link): AxumPath<String>,
) -> impl IntoResponse {
    up.blob_calls.fetch_add(1, Ordering::SeqCst);
    if up.fail_blob_link.as_deref() == Some(link.as_str()) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "blob unavailable").into_response();
    }
    format!("mesh-{}", link).into_bytes().into_response()
}

async fn start_upstream(fail_blob_link: Option<&str>, auth_delay_ms: u64) -> Arc<Upstream> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let upstream = Arc::new(Upstream {
        base: format!("http://{}", addr),
        auth_calls: AtomicUsize::new(0),
        url_calls: AtomicUsize::new(0),
        blob_calls: AtomicUsize::new(0),
        fail_blob_link: fail_blob_link.map(|s| s.to_string()),
        auth_delay_ms,
    });

    let app = Router::new()
        .route("/auth", post(auth_handler))
        .route("/map/{code}", get(map_handler))
        .route("/map-set/{code}", get(map_set_handler))
        .route("/file-url", get(file_url_handler))
        .route("/blob/{link}", get(blob_handler))
        .with_state(upstream.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    upstream
}

struct Harness {
    pipeline: MeshPipeline,
    scene: Arc<MemoryScene>,
    store: Arc<ArtifactStore>,
    units_dir: std::path::PathBuf,
    _cache: tempfile::TempDir,
    _units: tempfile::TempDir,
}

fn build_harness(upstream: &Upstream) -> Harness {
    let cache = tempfile::tempdir().unwrap();
    let units = tempfile::tempdir().unwrap();

    let client = Arc::new(HttpApiClient::new(upstream.base.clone()));
    let store = Arc::new(ArtifactStore::new(cache.path()).unwrap());
    let scene = Arc::new(MemoryScene::new(DEFAULT_CONTAINER));
    let assembler = Arc::new(ImportAssembler::new(
        Some(scene.clone() as Arc<dyn SceneSink>),
        units.path(),
    ));

    let pipeline = MeshPipeline::new(
        client.clone(),
        client.clone(),
        client,
        store.clone(),
        assembler,
    );

    Harness {
        pipeline,
        scene,
        store,
        units_dir: units.path().to_path_buf(),
        _cache: cache,
        _units: units,
    }
}

fn request(code: &str, kind: ContentKind) -> AcquisitionRequest {
    AcquisitionRequest {
        code: code.to_string(),
        kind,
        credentials: Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        },
    }
}

// Single map with an empty mesh link completes with no fetch and no
// import, busy flag clear.
#[tokio::test]
async fn test_single_map_without_mesh_completes_without_network() {
    let upstream = start_upstream(None, 0).await;
    let harness = build_harness(&upstream);

    let report = harness
        .pipeline
        .acquire(request("map-42", ContentKind::Map))
        .await
        .unwrap();

    assert_eq!(report.state, JobState::Done);
    assert_eq!(report.members.len(), 1);
    assert_eq!(report.members[0].outcome, MemberOutcome::NoMesh);
    assert_eq!(upstream.url_calls.load(Ordering::SeqCst), 0);
    assert_eq!(upstream.blob_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.scene.node_count_named("map-42"), 0);
    assert!(!harness.pipeline.is_busy());
}

// Map-set of 3, all cache misses, all fetches succeed: 3
// persists, 3 member imports, exactly one composite assembly.
#[tokio::test]
async fn test_map_set_downloads_all_members_and_assembles_once() {
    let upstream = start_upstream(None, 0).await;
    let harness = build_harness(&upstream);

    let report = harness
        .pipeline
        .acquire(request("set-7", ContentKind::MapSet))
        .await
        .unwrap();

    assert_eq!(report.state, JobState::Done);
    assert!(report.assembled);
    assert_eq!(report.imported(), 3);
    assert_eq!(report.failed(), 0);
    assert_eq!(upstream.blob_calls.load(Ordering::SeqCst), 3);

    for code in ["m1", "m2", "m3"] {
        let path = harness.store.artifact_path("set-7", code);
        assert_eq!(
            harness.store.read(&path).unwrap(),
            format!("mesh-link-{}", code).into_bytes()
        );
    }

    // Exactly one assembled composite under the container, members intact
    // after the save/instantiate round trip.
    assert_eq!(harness.scene.node_count_named("set-7"), 1);
    let mut children = harness.scene.child_names_of("set-7");
    children.sort();
    assert_eq!(children, vec!["m1", "m2", "m3"]);
    assert_eq!(harness.scene.placement_of("m2").unwrap().position.y, 2.0);

    assert!(harness.units_dir.join("set-7.unit").is_file());
    assert!(!harness.pipeline.is_busy());
}

// Member 2's blob fetch fails: two arrivals, assembly never
// fires, the error is isolated to that member.
#[tokio::test]
async fn test_failed_member_blocks_assembly_but_not_siblings() {
    let upstream = start_upstream(Some("link-m2"), 0).await;
    let harness = build_harness(&upstream);

    let report = harness
        .pipeline
        .acquire(request("set-7", ContentKind::MapSet))
        .await
        .unwrap();

    assert_eq!(report.state, JobState::Failed);
    assert!(!report.assembled);
    assert_eq!(report.imported(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped(), 0);

    let failed: Vec<_> = report
        .members
        .iter()
        .filter(|m| m.outcome.is_failure())
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].code, "m2");

    assert!(harness
        .store
        .exists(&harness.store.artifact_path("set-7", "m1")));
    assert!(!harness
        .store
        .exists(&harness.store.artifact_path("set-7", "m2")));
    assert!(harness
        .store
        .exists(&harness.store.artifact_path("set-7", "m3")));

    // Staging parent holds the two imported members; no unit was saved.
    assert_eq!(harness.scene.child_names_of("set-7").len(), 2);
    assert!(!harness.units_dir.join("set-7.unit").is_file());
    assert!(!harness.pipeline.is_busy());
}

// A member with no mesh is skipped, not failed, but a set containing a
// skipped member is never assembled.
#[tokio::test]
async fn test_no_mesh_member_skips_assembly_without_failing() {
    let upstream = start_upstream(None, 0).await;
    let harness = build_harness(&upstream);

    let report = harness
        .pipeline
        .acquire(request("set-gap", ContentKind::MapSet))
        .await
        .unwrap();

    assert_eq!(report.state, JobState::Failed);
    assert!(!report.assembled);
    assert_eq!(report.imported(), 2);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.skipped(), 1);

    let skipped: Vec<_> = report
        .members
        .iter()
        .filter(|m| m.outcome == MemberOutcome::NoMesh)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].code, "m2");

    // Skipping is silent: no URL resolution or blob fetch for m2.
    assert_eq!(upstream.blob_calls.load(Ordering::SeqCst), 2);
    assert!(!harness
        .store
        .exists(&harness.store.artifact_path("set-gap", "m2")));

    assert!(!harness.units_dir.join("set-gap.unit").is_file());
    assert!(!harness.pipeline.is_busy());
}

// Blank client id: immediate CredentialsMissing, zero network
// calls, busy flag clear.
#[tokio::test]
async fn test_blank_credentials_fail_before_any_network_call() {
    let upstream = start_upstream(None, 0).await;
    let harness = build_harness(&upstream);

    let mut req = request("map-42", ContentKind::Map);
    req.credentials.client_id = String::new();

    let err = harness.pipeline.acquire(req).await.unwrap_err();
    assert!(matches!(err, PipelineError::CredentialsMissing));
    assert_eq!(upstream.auth_calls.load(Ordering::SeqCst), 0);
    assert!(!harness.pipeline.is_busy());
}

// A cached artifact short-circuits the network entirely.
#[tokio::test]
async fn test_cache_hit_skips_network_fetch() {
    let upstream = start_upstream(None, 0).await;
    let cache = tempfile::tempdir().unwrap();
    let group = cache.path().join("map-77");
    std::fs::create_dir_all(&group).unwrap();
    std::fs::write(group.join("map-77.glb"), b"cached-mesh").unwrap();

    let units = tempfile::tempdir().unwrap();
    let client = Arc::new(HttpApiClient::new(upstream.base.clone()));
    let store = Arc::new(ArtifactStore::new(cache.path()).unwrap());
    let scene = Arc::new(MemoryScene::new(DEFAULT_CONTAINER));
    let assembler = Arc::new(ImportAssembler::new(
        Some(scene.clone() as Arc<dyn SceneSink>),
        units.path(),
    ));
    let pipeline = MeshPipeline::new(client.clone(), client.clone(), client, store, assembler);

    let report = pipeline
        .acquire(request("map-77", ContentKind::Map))
        .await
        .unwrap();

    assert_eq!(report.state, JobState::Done);
    assert_eq!(report.members[0].outcome, MemberOutcome::Imported);
    assert_eq!(upstream.url_calls.load(Ordering::SeqCst), 0);
    assert_eq!(upstream.blob_calls.load(Ordering::SeqCst), 0);
    assert_eq!(scene.node_count_named("map-77"), 1);
}

// Importing the same map twice is a no-op the second time.
#[tokio::test]
async fn test_second_acquisition_skips_duplicate_node() {
    let upstream = start_upstream(None, 0).await;
    let harness = build_harness(&upstream);

    let first = harness
        .pipeline
        .acquire(request("map-77", ContentKind::Map))
        .await
        .unwrap();
    assert_eq!(first.members[0].outcome, MemberOutcome::Imported);
    assert_eq!(upstream.blob_calls.load(Ordering::SeqCst), 1);

    let second = harness
        .pipeline
        .acquire(request("map-77", ContentKind::Map))
        .await
        .unwrap();
    assert_eq!(second.state, JobState::Done);
    assert_eq!(second.members[0].outcome, MemberOutcome::DuplicateSkipped);

    // Cache hit: still only one blob fetch; still only one node.
    assert_eq!(upstream.blob_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.scene.node_count_named("map-77"), 1);
}

// A second acquire while one is in flight is rejected, not queued.
#[tokio::test]
async fn test_concurrent_acquire_is_rejected_as_busy() {
    let upstream = start_upstream(None, 300).await;
    let harness = build_harness(&upstream);

    let (first, second) = tokio::join!(
        harness.pipeline.acquire(request("map-42", ContentKind::Map)),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            harness
                .pipeline
                .acquire(request("map-42", ContentKind::Map))
                .await
        }
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(PipelineError::Busy)));
    assert!(!harness.pipeline.is_busy());
}

// An unknown map-set aborts the job with the catalog's error and leaves
// the pipeline reusable.
#[tokio::test]
async fn test_catalog_error_aborts_job_and_clears_busy() {
    let upstream = start_upstream(None, 0).await;
    let harness = build_harness(&upstream);

    let err = harness
        .pipeline
        .acquire(request("set-unknown", ContentKind::MapSet))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Catalog { status: 404, .. }));
    assert!(!harness.pipeline.is_busy());

    // The pipeline accepts a fresh request afterwards.
    let report = harness
        .pipeline
        .acquire(request("map-42", ContentKind::Map))
        .await
        .unwrap();
    assert_eq!(report.state, JobState::Done);
}

// A pipeline built from configuration behaves like the hand-wired one.
#[tokio::test]
async fn test_pipeline_from_config_runs_end_to_end() -> anyhow::Result<()> {
    mapmesh_engine::init_tracing();
    let upstream = start_upstream(None, 0).await;
    let cache = tempfile::tempdir()?;
    let units = tempfile::tempdir()?;

    let config = PipelineConfig {
        api_base: upstream.base.clone(),
        cache_dir: cache.path().to_string_lossy().into_owned(),
        units_dir: units.path().to_string_lossy().into_owned(),
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
    };

    let scene = Arc::new(MemoryScene::new(DEFAULT_CONTAINER));
    let pipeline = MeshPipeline::from_config(&config, Some(scene.clone() as Arc<dyn SceneSink>))?;

    let report = pipeline
        .acquire(AcquisitionRequest {
            code: "map-77".to_string(),
            kind: ContentKind::Map,
            credentials: config.credentials(),
        })
        .await?;

    assert_eq!(report.state, JobState::Done);
    assert_eq!(report.members[0].outcome, MemberOutcome::Imported);
    assert_eq!(scene.node_count_named("map-77"), 1);
    assert!(cache.path().join("map-77").join("map-77.glb").is_file());
    Ok(())
}
