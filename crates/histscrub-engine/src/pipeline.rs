use std::path::{Path, PathBuf};
use std::sync::Arc;

use histscrub_config::Config;
use histscrub_core::{
    ExtractedCredential, Result, RewritePlan, RunBuilder, RunResult, ScrubError, SecretSource,
    Stage, VerificationReport,
};
use histscrub_git::{
    FilterRepo, Repository, RewriteEngine, Snapshot, ensure_absent, reclaim, scan_history,
};
use histscrub_security::{CredentialValidator, ReplacementPlanner, extract_credential};
use tracing::{debug, error, info, warn};

use crate::gate::ConfirmationGate;

/// Receives a line per completed stage
pub trait Progress {
    fn completed(&mut self, stage: Stage, detail: &str);
}

pub struct NoProgress;

impl Progress for NoProgress {
    fn completed(&mut self, _stage: Stage, _detail: &str) {}
}

pub struct Pipeline {
    config: Config,
    repo: Repository,
    sources: Vec<SecretSource>,
    snapshot_dir: PathBuf,
    engine: Arc<dyn RewriteEngine>,
}

impl Pipeline {
    /// Bind a validated config to the repository at `repo_path`, using the
    /// configured filter-repo program as the rewrite engine
    pub async fn open(config: Config, repo_path: &Path) -> Result<Self> {
        config.validate()?;
        let repo = Repository::open(repo_path).await?;
        let snapshot_dir = config.snapshot_dir(repo.path());
        let engine: Arc<dyn RewriteEngine> = Arc::new(FilterRepo::new(
            config.engine.program.clone(),
            config.engine.replace_messages,
        ));

        Ok(Self {
            sources: config.secret_sources(),
            config,
            repo,
            snapshot_dir,
            engine,
        })
    }

    pub fn with_engine(mut self, engine: Arc<dyn RewriteEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn sources(&self) -> &[SecretSource] {
        &self.sources
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// What the operator is asked to approve
    pub fn summary(&self) -> String {
        let mut text = String::new();
        text.push_str(&format!("Repository:  {}\n", self.repo.path().display()));
        text.push_str(&format!("Snapshot:    {}\n", self.snapshot_dir.display()));
        text.push_str(&format!("Engine:      {}\n", self.engine.name()));
        text.push_str(&format!(
            "Marker:      {}\n",
            self.config.redaction_marker
        ));
        text.push_str(&format!("Secret sources ({}):\n", self.sources.len()));
        for source in &self.sources {
            text.push_str(&format!(
                "  - {} (key {}, min length {})\n",
                source,
                source.key_description(),
                source.min_length
            ));
        }
        text.push_str(
            "\nEvery branch and tag of the snapshot will be rewritten. \
             The source repository is only read.\n",
        );
        text
    }

    /// Execute every stage in order, stopping at the first failure
    pub async fn run(
        &self,
        gate: &mut dyn ConfirmationGate,
        progress: &mut dyn Progress,
    ) -> RunResult {
        let mut run = RunBuilder::new(self.repo.path().to_path_buf());
        info!(
            "Starting run {} on {}",
            run.run_id(),
            self.repo.path().display()
        );

        match self.execute(&mut run, gate, progress).await {
            Ok(()) => {
                info!("Run {} complete", run.run_id());
                run.finish(None)
            }
            Err(e) => {
                error!("Run {} failed during {}: {}", run.run_id(), run.stage(), e);
                run.finish(Some(&e))
            }
        }
    }

    async fn execute(
        &self,
        run: &mut RunBuilder,
        gate: &mut dyn ConfirmationGate,
        progress: &mut dyn Progress,
    ) -> Result<()> {
        run.enter(Stage::Confirmation);
        if !gate.confirm(&self.summary())? {
            return Err(ScrubError::ConfirmationDeclined);
        }
        progress.completed(Stage::Confirmation, "operator confirmed");

        run.enter(Stage::Preflight);
        self.preflight().await?;
        progress.completed(
            Stage::Preflight,
            &format!(
                "{} available, {} commit(s) resolved",
                self.engine.name(),
                self.sources.len()
            ),
        );

        run.enter(Stage::Snapshot);
        let snapshot = Snapshot::create(&self.repo, &self.snapshot_dir).await?;
        run.set_snapshot(Some(snapshot.path().to_path_buf()));

        // Until the rewrite starts the snapshot is still pristine and disposable
        let plan = match self.prepare(run, &snapshot, progress).await {
            Ok(plan) => plan,
            Err(e) => {
                let path = snapshot.path().to_path_buf();
                match snapshot.discard().await {
                    Ok(()) => run.set_snapshot(None),
                    Err(cleanup) => {
                        warn!("Could not remove snapshot {}: {}", path.display(), cleanup);
                        run.warn(format!(
                            "snapshot {} could not be removed: {}",
                            path.display(),
                            cleanup
                        ));
                    }
                }
                return Err(e);
            }
        };
        let snapshot_path = snapshot.keep();

        run.enter(Stage::Rewrite);
        self.engine.rewrite(&snapshot_path, &plan).await?;
        run.set_rules_applied(plan.len());
        progress.completed(
            Stage::Rewrite,
            &format!("{} rule(s) applied across all refs", plan.len()),
        );

        run.enter(Stage::Reclaim);
        if self.config.reclaim.enabled {
            match reclaim(&snapshot_path).await {
                Ok(()) => progress.completed(Stage::Reclaim, "reflogs expired, objects pruned"),
                Err(e) => {
                    warn!("Reclaim failed: {}", e);
                    run.warn(format!(
                        "reclaim failed, unreachable objects may still hold secrets: {}",
                        e
                    ));
                }
            }
        } else {
            run.warn("reclaim disabled; unreachable objects were not pruned");
        }

        run.enter(Stage::Verification);
        let report = scan_history(&snapshot_path, &plan).await?;
        run.set_verification(report.clone());
        let report = report.into_result()?;
        progress.completed(
            Stage::Verification,
            &format!("{} objects scanned, no secrets found", report.objects_scanned),
        );

        Ok(())
    }

    /// Read-only checks against the source repository
    async fn preflight(&self) -> Result<()> {
        self.engine.ensure_available()?;

        for source in &self.sources {
            let oid = self.repo.require_commit(&source.commit).await?;
            debug!("{} resolves to {}", source.commit, oid);
            if !self.repo.is_reachable(&oid).await? {
                return Err(ScrubError::CommitUnreachable {
                    commit: source.commit.to_string(),
                });
            }
        }

        // A mirror of truncated history would be rewritten and verified only in part
        if self.repo.is_shallow().await? {
            return Err(ScrubError::ShallowRepository(self.repo.path().to_path_buf()));
        }

        ensure_absent(&self.snapshot_dir)
    }

    /// Extraction, validation and planning against the pristine snapshot
    async fn prepare(
        &self,
        run: &mut RunBuilder,
        snapshot: &Snapshot,
        progress: &mut dyn Progress,
    ) -> Result<RewritePlan> {
        let mirror = snapshot.repository();
        let refs = mirror.refs().await?;
        progress.completed(
            Stage::Snapshot,
            &format!(
                "mirror clone of {} ref(s) at {}",
                refs.len(),
                snapshot.path().display()
            ),
        );

        run.enter(Stage::Extraction);
        let credentials = extract_all(&mirror, &self.sources).await?;
        progress.completed(
            Stage::Extraction,
            &format!("{} credential(s) read from history", credentials.len()),
        );

        run.enter(Stage::Validation);
        let warnings = self.validate(&credentials)?;
        for message in &warnings {
            run.warn(message.clone());
        }
        progress.completed(
            Stage::Validation,
            &format!("{} warning(s)", warnings.len()),
        );

        run.enter(Stage::Planning);
        let plan = self.plan(credentials)?;
        progress.completed(Stage::Planning, &format!("{} replacement rule(s)", plan.len()));

        Ok(plan)
    }

    fn validate(&self, credentials: &[ExtractedCredential]) -> Result<Vec<String>> {
        let validator = CredentialValidator::new(self.config.validation.separators.clone());
        let mut warnings = Vec::new();

        for credential in credentials {
            if let Some(finding) = validator.validate(credential)? {
                warn!("{}", finding);
                warnings.push(finding.to_string());
            }
        }

        Ok(warnings)
    }

    fn plan(&self, credentials: Vec<ExtractedCredential>) -> Result<RewritePlan> {
        let planner = ReplacementPlanner::new(self.config.redaction_marker.clone())?;
        planner.plan(credentials)
    }

    /// Re-run only the verification scan against an existing snapshot.
    ///
    /// Literals are extracted again from the source repository, which still
    /// holds the original history.
    pub async fn verify_snapshot(&self, snapshot_dir: &Path) -> Result<VerificationReport> {
        if !snapshot_dir.exists() {
            return Err(ScrubError::SnapshotFailed(format!(
                "{} does not exist",
                snapshot_dir.display()
            )));
        }
        let snapshot = Repository::open(snapshot_dir).await?;

        let credentials = extract_all(&self.repo, &self.sources).await?;
        self.validate(&credentials)?;
        let plan = self.plan(credentials)?;

        info!(
            "Verifying {} against {} literal(s)",
            snapshot.path().display(),
            plan.len()
        );
        scan_history(snapshot.path(), &plan).await
    }
}

async fn extract_all(
    repo: &Repository,
    sources: &[SecretSource],
) -> Result<Vec<ExtractedCredential>> {
    let mut credentials = Vec::with_capacity(sources.len());
    for source in sources {
        let content = repo.read_source(source).await?;
        credentials.push(extract_credential(source, &content)?);
    }
    Ok(credentials)
}
