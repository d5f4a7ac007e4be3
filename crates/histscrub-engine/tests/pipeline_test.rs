mod common;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use histscrub_core::{FailureKind, Result, RewritePlan, ScrubError, Stage};
use histscrub_engine::{NoProgress, Pipeline, Progress, ScriptedGate};
use histscrub_git::{FilterRepo, RewriteEngine};

use common::{commit_file, config, make_git_repo, run_git, source};

const GEMINI_KEY: &str = "AIzaSyD3m0Fak3K3yF0rT3st1ngOnly0000000";
const VISION_KEY: &str = "XdP8NQ7vision-test-key-42";

#[derive(Default)]
struct Recorder {
    stages: Vec<Stage>,
}

impl Progress for Recorder {
    fn completed(&mut self, stage: Stage, _detail: &str) {
        self.stages.push(stage);
    }
}

/// Succeeds without touching the repository
struct NoopEngine;

#[async_trait]
impl RewriteEngine for NoopEngine {
    fn name(&self) -> &str {
        "noop"
    }

    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    async fn rewrite(&self, _repo: &Path, _plan: &RewritePlan) -> Result<()> {
        Ok(())
    }
}

struct FailingEngine;

#[async_trait]
impl RewriteEngine for FailingEngine {
    fn name(&self) -> &str {
        "failing"
    }

    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    async fn rewrite(&self, _repo: &Path, _plan: &RewritePlan) -> Result<()> {
        Err(ScrubError::RewriteEngineFailure(
            "exited with exit status: 1".to_string(),
        ))
    }
}

/// Two secrets committed on main, one of them also reachable only from a
/// feature branch after main drops it. Returns the introducing commit.
fn leaky_repo(dir: &Path) -> String {
    make_git_repo(dir);
    commit_file(dir, "README.md", "# demo\n", "initial");
    commit_file(
        dir,
        "config.py",
        &format!("GEMINI_API_KEY = \"{}\"\nDEBUG = True\n", GEMINI_KEY),
        "add config",
    );
    let leak = commit_file(
        dir,
        "vision/settings.py",
        &format!("api_key='{}'\nregion = \"eu\"\n", VISION_KEY),
        "add vision settings",
    );

    run_git(dir, &["checkout", "--quiet", "-b", "feature"]);
    commit_file(dir, "notes.txt", "wip\n", "feature work");
    run_git(dir, &["checkout", "--quiet", "main"]);
    run_git(dir, &["tag", "v0.1"]);

    commit_file(
        dir,
        "config.py",
        "import os\nGEMINI_API_KEY = os.environ[\"GEMINI_API_KEY\"]\n",
        "read key from env",
    );
    commit_file(
        dir,
        "vision/settings.py",
        "import os\napi_key = os.environ[\"VISION_KEY\"]\n",
        "read vision key from env",
    );

    leak
}

fn two_sources(leak: &str) -> Vec<histscrub_config::SourceDefinition> {
    vec![
        source("gemini", leak, "config.py", "GEMINI_API_KEY", 30),
        source("vision", leak, "vision/settings.py", "api_key", 16),
    ]
}

#[tokio::test]
async fn test_declined_confirmation_touches_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    let leak = leaky_repo(&repo);
    let snapshot_dir = tmp.path().join("snapshot.git");

    let pipeline = Pipeline::open(config(&snapshot_dir, two_sources(&leak)), &repo)
        .await
        .unwrap()
        .with_engine(Arc::new(NoopEngine));

    let mut gate = ScriptedGate::new("no");
    let mut progress = Recorder::default();
    let result = pipeline.run(&mut gate, &mut progress).await;

    assert_eq!(result.exit_code(), 2);
    assert_eq!(result.stage_reached, Stage::Confirmation);
    assert!(result.snapshot.is_none());
    assert!(!snapshot_dir.exists());
    assert!(progress.stages.is_empty());
    assert!(gate.shown().unwrap().contains("Secret sources (2)"));
}

#[tokio::test]
async fn test_missing_commit_in_shallow_clone() {
    let tmp = tempfile::tempdir().unwrap();
    let origin = tmp.path().join("origin");
    let leak = leaky_repo(&origin);

    let url = format!("file://{}", origin.display());
    run_git(
        tmp.path(),
        &["clone", "--quiet", "--depth", "1", &url, "shallow"],
    );
    let shallow = tmp.path().join("shallow");
    let snapshot_dir = tmp.path().join("snapshot.git");

    let pipeline = Pipeline::open(config(&snapshot_dir, two_sources(&leak)), &shallow)
        .await
        .unwrap()
        .with_engine(Arc::new(NoopEngine));

    let mut progress = Recorder::default();
    let result = pipeline.run(&mut ScriptedGate::approve(), &mut progress).await;

    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::CommitNotFound);
    assert_eq!(failure.stage, Stage::Preflight);
    assert!(failure.message.contains("fetch full history"));
    assert!(failure.message.contains(&leak));
    assert_eq!(result.exit_code(), 3);

    assert!(!snapshot_dir.exists());
    assert!(!progress.stages.contains(&Stage::Extraction));
}

#[tokio::test]
async fn test_shallow_clone_refused_even_when_commit_present() {
    let tmp = tempfile::tempdir().unwrap();
    let origin = tmp.path().join("origin");
    let leak = leaky_repo(&origin);

    let url = format!("file://{}", origin.display());
    run_git(
        tmp.path(),
        &[
            "clone",
            "--quiet",
            "--depth",
            "3",
            "--no-single-branch",
            &url,
            "shallow",
        ],
    );
    let shallow = tmp.path().join("shallow");
    run_git(&shallow, &["cat-file", "-e", &format!("{}^{{commit}}", leak)]);
    let snapshot_dir = tmp.path().join("snapshot.git");

    let pipeline = Pipeline::open(config(&snapshot_dir, two_sources(&leak)), &shallow)
        .await
        .unwrap()
        .with_engine(Arc::new(NoopEngine));

    let mut progress = Recorder::default();
    let result = pipeline.run(&mut ScriptedGate::approve(), &mut progress).await;

    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::CommitNotFound);
    assert_eq!(failure.stage, Stage::Preflight);
    assert!(failure.message.contains("fetch full history"));
    assert_eq!(result.exit_code(), 3);

    assert!(!snapshot_dir.exists());
    assert!(result.snapshot.is_none());
    assert_eq!(progress.stages, vec![Stage::Confirmation]);
}

#[tokio::test]
async fn test_reflog_only_commit_fails_preflight() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    leaky_repo(&repo);
    let tip = run_git(&repo, &["rev-parse", "HEAD"]);
    let orphaned = commit_file(
        &repo,
        "scratch.py",
        &format!("api_key = \"{}\"\n", VISION_KEY),
        "scratch",
    );
    run_git(&repo, &["reset", "--quiet", "--hard", &tip]);
    let snapshot_dir = tmp.path().join("snapshot.git");

    let sources = vec![source("scratch", &orphaned, "scratch.py", "api_key", 16)];
    let pipeline = Pipeline::open(config(&snapshot_dir, sources), &repo)
        .await
        .unwrap()
        .with_engine(Arc::new(NoopEngine));

    let mut progress = Recorder::default();
    let result = pipeline.run(&mut ScriptedGate::approve(), &mut progress).await;

    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.stage, Stage::Preflight);
    assert_eq!(failure.kind, FailureKind::CommitNotFound);
    assert!(failure.message.contains("not reachable"));
    assert!(failure.message.contains(&orphaned));
    assert!(!failure.message.contains("fetch full history"));

    assert!(!snapshot_dir.exists());
    assert!(!progress.stages.contains(&Stage::Snapshot));
}

#[tokio::test]
async fn test_stale_snapshot_is_left_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    let leak = leaky_repo(&repo);
    let snapshot_dir = tmp.path().join("snapshot.git");
    std::fs::create_dir_all(&snapshot_dir).unwrap();
    std::fs::write(snapshot_dir.join("keep-me"), "previous run").unwrap();

    let pipeline = Pipeline::open(config(&snapshot_dir, two_sources(&leak)), &repo)
        .await
        .unwrap()
        .with_engine(Arc::new(NoopEngine));
    let result = pipeline.run(&mut ScriptedGate::approve(), &mut NoProgress).await;

    assert_eq!(result.exit_code(), 10);
    assert!(snapshot_dir.join("keep-me").exists());
}

#[tokio::test]
async fn test_missing_engine_fails_preflight() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    let leak = leaky_repo(&repo);
    let snapshot_dir = tmp.path().join("snapshot.git");

    let mut config = config(&snapshot_dir, two_sources(&leak));
    config.engine.program = "histscrub-no-such-engine".to_string();

    let pipeline = Pipeline::open(config, &repo).await.unwrap();
    let result = pipeline
        .run(&mut ScriptedGate::approve(), &mut Recorder::default())
        .await;

    assert_eq!(result.exit_code(), 11);
    assert_eq!(result.stage_reached, Stage::Preflight);
    assert!(!snapshot_dir.exists());
}

#[tokio::test]
async fn test_extraction_failures_discard_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    let leak = leaky_repo(&repo);

    let cases = [
        (source("gone", &leak, "missing.py", "API_KEY", 8), 4),
        (source("nokey", &leak, "config.py", "OPENAI_API_KEY", 8), 5),
    ];

    for (index, (definition, expected)) in cases.into_iter().enumerate() {
        let snapshot_dir = tmp.path().join(format!("snapshot-{}.git", index));
        let pipeline = Pipeline::open(config(&snapshot_dir, vec![definition]), &repo)
            .await
            .unwrap()
            .with_engine(Arc::new(NoopEngine));
        let result = pipeline
            .run(&mut ScriptedGate::approve(), &mut Recorder::default())
            .await;

        assert_eq!(result.exit_code(), expected);
        assert_eq!(result.stage_reached, Stage::Extraction);
        assert!(result.snapshot.is_none());
        assert!(!snapshot_dir.exists());
    }
}

#[tokio::test]
async fn test_empty_credential_is_invalid() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    make_git_repo(&repo);
    let commit = commit_file(&repo, ".env", "API_KEY = \"\"\n", "placeholder");
    let snapshot_dir = tmp.path().join("snapshot.git");

    let pipeline = Pipeline::open(
        config(&snapshot_dir, vec![source("env", &commit, ".env", "API_KEY", 1)]),
        &repo,
    )
    .await
    .unwrap()
    .with_engine(Arc::new(NoopEngine));
    let result = pipeline
        .run(&mut ScriptedGate::approve(), &mut Recorder::default())
        .await;

    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::CredentialInvalid);
    assert_eq!(failure.stage, Stage::Validation);
    assert_eq!(result.exit_code(), 6);
    assert!(!snapshot_dir.exists());
}

#[tokio::test]
async fn test_short_credential_is_invalid() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    make_git_repo(&repo);
    let commit = commit_file(&repo, ".env", "API_KEY = 'abc123'\n", "short key");
    let snapshot_dir = tmp.path().join("snapshot.git");

    let pipeline = Pipeline::open(
        config(&snapshot_dir, vec![source("env", &commit, ".env", "API_KEY", 20)]),
        &repo,
    )
    .await
    .unwrap()
    .with_engine(Arc::new(NoopEngine));
    let result = pipeline
        .run(&mut ScriptedGate::approve(), &mut Recorder::default())
        .await;

    assert_eq!(result.exit_code(), 6);
    assert!(!result.failure.unwrap().message.contains("abc123"));
}

#[tokio::test]
async fn test_engine_failure_keeps_snapshot_and_skips_verification() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    let leak = leaky_repo(&repo);
    let snapshot_dir = tmp.path().join("snapshot.git");

    let pipeline = Pipeline::open(config(&snapshot_dir, two_sources(&leak)), &repo)
        .await
        .unwrap()
        .with_engine(Arc::new(FailingEngine));
    let result = pipeline
        .run(&mut ScriptedGate::approve(), &mut Recorder::default())
        .await;

    assert_eq!(result.exit_code(), 8);
    assert_eq!(result.stage_reached, Stage::Rewrite);
    assert!(result.verification.is_none());
    assert_eq!(result.snapshot.as_deref(), Some(snapshot_dir.as_path()));
    assert!(snapshot_dir.exists());
}

#[tokio::test]
async fn test_noop_rewrite_is_caught_by_verification() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    let leak = leaky_repo(&repo);
    let snapshot_dir = tmp.path().join("snapshot.git");

    let pipeline = Pipeline::open(config(&snapshot_dir, two_sources(&leak)), &repo)
        .await
        .unwrap()
        .with_engine(Arc::new(NoopEngine));
    let mut progress = Recorder::default();
    let result = pipeline.run(&mut ScriptedGate::approve(), &mut progress).await;

    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::ResidualSecretDetected);
    assert!(failure.message.contains("gemini"));
    assert!(failure.message.contains("vision"));
    assert_eq!(result.exit_code(), 9);
    assert_eq!(result.rules_applied, 2);

    let report = result.verification.as_ref().unwrap();
    assert!(!report.passed());
    assert!(progress.stages.contains(&Stage::Rewrite));
    assert!(snapshot_dir.exists());

    let json = serde_json::to_string(&result).unwrap();
    assert!(!json.contains(GEMINI_KEY));
    assert!(!json.contains(VISION_KEY));

    // Standalone verification agrees with the run
    let again = pipeline.verify_snapshot(&snapshot_dir).await.unwrap();
    assert_eq!(again.residual.len(), report.residual.len());
}

#[tokio::test]
async fn test_full_rewrite_removes_both_secrets_everywhere() {
    if FilterRepo::default().ensure_available().is_err() {
        eprintln!("git-filter-repo not installed; skipping");
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    let leak = leaky_repo(&repo);
    let snapshot_dir = tmp.path().join("snapshot.git");

    let pipeline = Pipeline::open(config(&snapshot_dir, two_sources(&leak)), &repo)
        .await
        .unwrap();
    let mut progress = Recorder::default();
    let result = pipeline.run(&mut ScriptedGate::approve(), &mut progress).await;

    assert!(result.succeeded(), "{:?}", result.failure);
    assert_eq!(result.stage_reached, Stage::Complete);
    assert_eq!(result.rules_applied, 2);
    assert!(result.verification.as_ref().unwrap().passed());
    assert_eq!(progress.stages.last(), Some(&Stage::Verification));

    let feature_config = run_git(&snapshot_dir, &["show", "feature:config.py"]);
    assert!(feature_config.contains("***REMOVED***"));
    assert!(!feature_config.contains(GEMINI_KEY));

    let tagged_settings = run_git(&snapshot_dir, &["show", "v0.1:vision/settings.py"]);
    assert!(tagged_settings.contains("api_key='***REMOVED***'"));

    // The source repository is only read
    let original = run_git(&repo, &["show", &format!("{}:config.py", leak)]);
    assert!(original.contains(GEMINI_KEY));

    let verified = pipeline.verify_snapshot(&snapshot_dir).await.unwrap();
    assert!(verified.passed());
}
