//! Full reconciliation cycles against an in-memory orchestrator and a
//! counting reloader.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cadence_core::{
    AppId, Application, EventStream, HealthCheckResult, Orchestrator, OrchestratorError, Task,
};
use cadence_renderer::Renderer;
use cadence_sync::{
    CommandSpec, Reconciler, ReconcilerSettings, Reloader, Stage, SyncError, WriteResult,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeOrchestrator {
    response: Mutex<Result<Vec<Application>, OrchestratorError>>,
    calls: AtomicUsize,
}

impl FakeOrchestrator {
    fn new(apps: Vec<Application>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(apps)),
            calls: AtomicUsize::new(0),
        })
    }

    fn set(&self, response: Result<Vec<Application>, OrchestratorError>) {
        *self.response.lock().unwrap() = response;
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn list_applications(&self) -> Result<Vec<Application>, OrchestratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.lock().unwrap().clone()
    }

    async fn subscribe_events(&self) -> Result<EventStream, OrchestratorError> {
        Ok(Box::pin(futures::stream::empty()))
    }
}

#[derive(Default)]
struct CountingReloader {
    calls: AtomicUsize,
    fail: AtomicBool,
}

#[async_trait]
impl Reloader for CountingReloader {
    async fn reload(&self) -> Result<(), SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::Reload {
                command: "nginx -s reload".into(),
                status: Some(1),
                stderr: "nginx: [error] invalid PID number".into(),
            });
        }
        Ok(())
    }
}

fn task(id: &str, port: u16, alive: Option<bool>) -> Task {
    Task {
        id: id.to_string(),
        host: "10.0.0.5".to_string(),
        ports: vec![port],
        health_check_results: alive
            .map(|alive| vec![HealthCheckResult { alive, ..HealthCheckResult::default() }])
            .unwrap_or_default(),
        ..Task::default()
    }
}

fn app(id: &str, tasks: Vec<Task>) -> Application {
    Application {
        id: id.to_string(),
        tasks,
        ..Application::default()
    }
}

struct Harness {
    _dir: TempDir,
    output: PathBuf,
    orchestrator: Arc<FakeOrchestrator>,
    reloader: Arc<CountingReloader>,
    reconciler: Reconciler,
}

fn harness(apps: Vec<Application>, validate: Option<CommandSpec>) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().expect("tempdir");
    let output = dir.path().join("nginx").join("nginx.conf");
    let orchestrator = FakeOrchestrator::new(apps);
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = Reconciler::new(
        orchestrator.clone(),
        Renderer::new().expect("renderer"),
        reloader.clone(),
        ReconcilerSettings {
            output: output.clone(),
            validate,
            fetch_timeout: Duration::from_secs(5),
        },
    );
    Harness {
        _dir: dir,
        output,
        orchestrator,
        reloader,
        reconciler,
    }
}

fn reloads(h: &Harness) -> usize {
    h.reloader.calls.load(Ordering::SeqCst)
}

// ---------------------------------------------------------------------------
// 1. Idempotence and reload-iff-changed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn identical_snapshot_twice_is_unchanged_and_reloads_once() {
    let h = harness(vec![app("/shop/web", vec![task("w1", 31000, None)])], None);

    let first = h.reconciler.run_cycle(false).await.expect("first cycle");
    assert!(first.write.changed());
    assert!(first.reloaded);
    let bytes = std::fs::read(&h.output).expect("artifact");
    let mtime = std::fs::metadata(&h.output).unwrap().modified().unwrap();

    let second = h.reconciler.run_cycle(false).await.expect("second cycle");
    assert!(matches!(second.write, WriteResult::Unchanged { .. }));
    assert!(!second.reloaded);
    assert_eq!(std::fs::read(&h.output).unwrap(), bytes);
    assert_eq!(std::fs::metadata(&h.output).unwrap().modified().unwrap(), mtime);

    assert_eq!(reloads(&h), 1);
    let status = h.reconciler.status().current();
    assert!(status.is_healthy());
    assert_eq!(status.cycles, 2);
    assert!(status.last_reload.is_some());
    assert_eq!(status.artifact_digest.as_deref(), Some(first.write.digest()));
}

#[tokio::test]
async fn topology_change_rewrites_and_reloads() {
    let h = harness(vec![app("/web", vec![task("w1", 31000, None)])], None);
    h.reconciler.run_cycle(false).await.expect("first");

    h.orchestrator.set(Ok(vec![app(
        "/web",
        vec![task("w1", 31000, None), task("w2", 31001, None)],
    )]));
    let report = h.reconciler.run_cycle(false).await.expect("second");
    assert!(report.write.changed());
    assert_eq!(report.instances, 2);
    assert_eq!(reloads(&h), 2);
    assert!(std::fs::read_to_string(&h.output)
        .unwrap()
        .contains("server 10.0.0.5:31001;"));
}

#[tokio::test]
async fn health_flap_to_unhealthy_drops_group() {
    let mut web = app("/web", vec![task("w1", 31000, Some(true))]);
    web.health_checks = vec![serde_json::json!({ "protocol": "HTTP" })];
    let h = harness(vec![web.clone()], None);
    h.reconciler.run_cycle(false).await.expect("healthy");
    assert!(h.reconciler.snapshot().current().contains(&AppId::from("web")));

    web.tasks = vec![task("w1", 31000, Some(false))];
    h.orchestrator.set(Ok(vec![web]));
    let report = h.reconciler.run_cycle(false).await.expect("unhealthy");
    assert_eq!(report.groups, 0);
    assert!(h.reconciler.snapshot().current().is_empty());
    assert!(!std::fs::read_to_string(&h.output).unwrap().contains("upstream web"));
}

// ---------------------------------------------------------------------------
// 2. Failure stages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_failure_records_error_then_recovers() {
    let h = harness(vec![app("/web", vec![task("w1", 31000, None)])], None);
    h.orchestrator
        .set(Err(OrchestratorError::Transport("connection refused".into())));

    let err = h.reconciler.run_cycle(false).await.unwrap_err();
    assert_eq!(err.stage(), Stage::Fetch);
    assert!(!h.output.exists(), "no write on fetch failure");
    assert_eq!(reloads(&h), 0);
    let failed = h.reconciler.status().current();
    assert!(failed.last_error.as_deref().unwrap_or("").contains("connection refused"));
    assert!(failed.last_sync.is_none());

    h.orchestrator
        .set(Ok(vec![app("/web", vec![task("w1", 31000, None)])]));
    h.reconciler.run_cycle(false).await.expect("recovery");
    let healed = h.reconciler.status().current();
    assert!(healed.is_healthy());
    assert!(healed.last_sync.is_some());
    assert_eq!(reloads(&h), 1);
}

/// Never answers the listing call.
struct StalledOrchestrator;

#[async_trait]
impl Orchestrator for StalledOrchestrator {
    async fn list_applications(&self) -> Result<Vec<Application>, OrchestratorError> {
        std::future::pending().await
    }

    async fn subscribe_events(&self) -> Result<EventStream, OrchestratorError> {
        Ok(Box::pin(futures::stream::empty()))
    }
}

#[tokio::test(start_paused = true)]
async fn fetch_deadline_fails_cycle_without_touching_artifact() {
    let dir = TempDir::new().expect("tempdir");
    let output = dir.path().join("nginx.conf");
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = Reconciler::new(
        Arc::new(StalledOrchestrator),
        Renderer::new().expect("renderer"),
        reloader.clone(),
        ReconcilerSettings {
            output: output.clone(),
            validate: None,
            fetch_timeout: Duration::from_secs(3),
        },
    );

    let err = reconciler.run_cycle(false).await.unwrap_err();
    assert_eq!(err.stage(), Stage::Fetch);
    assert!(matches!(err, SyncError::Timeout { stage: Stage::Fetch, .. }), "got {err:?}");
    assert!(!output.exists());
    assert_eq!(reloader.calls.load(Ordering::SeqCst), 0);
    let status = reconciler.status().current();
    assert!(status.last_error.is_some());
    assert!(status.last_sync.is_none());
}

#[tokio::test]
async fn render_failure_keeps_artifact_and_skips_reload() {
    let dir = TempDir::new().expect("tempdir");
    let template = dir.path().join("broken.tera");
    std::fs::write(&template, "{{ no_such.field }}").unwrap();
    let output = dir.path().join("nginx.conf");
    std::fs::write(&output, "# last good\n").unwrap();
    let reloader = Arc::new(CountingReloader::default());
    let reconciler = Reconciler::new(
        FakeOrchestrator::new(vec![app("/web", vec![task("w1", 31000, None)])]),
        Renderer::with_template(&template).expect("template compiles"),
        reloader.clone(),
        ReconcilerSettings {
            output: output.clone(),
            validate: None,
            fetch_timeout: Duration::from_secs(5),
        },
    );

    let err = reconciler.run_cycle(false).await.unwrap_err();
    assert!(matches!(err, SyncError::Render(_)), "got {err:?}");
    assert_eq!(err.stage(), Stage::Write);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "# last good\n");
    assert_eq!(reloader.calls.load(Ordering::SeqCst), 0);
    assert!(!reconciler.status().current().is_healthy());
}

#[tokio::test]
async fn failed_fetch_keeps_previous_snapshot() {
    let h = harness(vec![app("/web", vec![task("w1", 31000, None)])], None);
    h.reconciler.run_cycle(false).await.expect("first");

    h.orchestrator.set(Err(OrchestratorError::Status {
        status: 503,
        body: "no leader".into(),
    }));
    h.reconciler.run_cycle(false).await.unwrap_err();
    assert!(h.reconciler.snapshot().current().contains(&AppId::from("web")));
}

#[tokio::test]
async fn rejected_validation_keeps_artifact_and_skips_reload() {
    let h = harness(
        vec![app("/web", vec![task("w1", 31000, None)])],
        Some(CommandSpec::new(
            vec!["sh".into(), "-c".into(), "exit 1".into()],
            Duration::from_secs(5),
        )),
    );
    std::fs::create_dir_all(h.output.parent().unwrap()).unwrap();
    std::fs::write(&h.output, "# hand written\n").unwrap();

    let err = h.reconciler.run_cycle(false).await.unwrap_err();
    assert_eq!(err.stage(), Stage::Write);
    assert_eq!(std::fs::read_to_string(&h.output).unwrap(), "# hand written\n");
    assert_eq!(reloads(&h), 0);
    assert!(!h.reconciler.status().current().is_healthy());
}

#[tokio::test]
async fn reload_failure_leaves_new_artifact_in_place() {
    let h = harness(vec![app("/web", vec![task("w1", 31000, None)])], None);
    h.reloader.fail.store(true, Ordering::SeqCst);

    let err = h.reconciler.run_cycle(false).await.unwrap_err();
    assert_eq!(err.stage(), Stage::Reload);
    assert!(std::fs::read_to_string(&h.output)
        .unwrap()
        .contains("upstream web"));
    let status = h.reconciler.status().current();
    assert!(status.last_error.is_some());
    assert!(status.last_reload.is_none());

    // The artifact already matches, so the next cycle does not retry the reload.
    h.reloader.fail.store(false, Ordering::SeqCst);
    let report = h.reconciler.run_cycle(false).await.expect("next cycle");
    assert!(!report.reloaded);
    assert_eq!(reloads(&h), 1);
    assert!(h.reconciler.status().current().is_healthy());
}

// ---------------------------------------------------------------------------
// 3. Dry run and diff
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dry_run_never_writes_or_reloads() {
    let h = harness(vec![app("/web", vec![task("w1", 31000, None)])], None);
    let report = h.reconciler.run_cycle(true).await.expect("dry run");
    assert!(matches!(report.write, WriteResult::WouldWrite { .. }));
    assert!(!report.reloaded);
    assert!(!h.output.exists());
    assert_eq!(reloads(&h), 0);
}

#[tokio::test]
async fn diff_is_empty_after_sync_and_shows_new_instance() {
    let h = harness(vec![app("/web", vec![task("w1", 31000, None)])], None);
    h.reconciler.run_cycle(false).await.expect("sync");
    assert!(h.reconciler.diff().await.expect("diff").is_none());

    h.orchestrator.set(Ok(vec![app(
        "/web",
        vec![task("w1", 31000, None), task("w2", 31001, None)],
    )]));
    let diff = h.reconciler.diff().await.expect("diff").expect("changes");
    assert!(diff.unified_diff.contains("+    server 10.0.0.5:31001;"));
    assert_eq!(h.orchestrator.calls.load(Ordering::SeqCst), 3);
}
