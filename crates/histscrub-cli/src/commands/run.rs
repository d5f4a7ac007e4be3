use anyhow::{Context, Result};
use histscrub_config::Config;
use histscrub_core::{FailureKind, RunResult, Stage};
use histscrub_engine::{ConfirmationGate, Pipeline, Progress, is_affirmative};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::info;

pub async fn handle(repo: &Path, config_path: Option<&Path>, report: Option<&Path>) -> Result<i32> {
    let (path, config) = Config::discover(repo, config_path)?;
    info!(
        "Loaded config from {} ({} source(s))",
        path.display(),
        config.sources.len()
    );
    println!("Using {}", path.display());

    let pipeline = Pipeline::open(config, repo).await?;

    let stdin = std::io::stdin();
    let mut gate = PromptGate::new(stdin.lock(), std::io::stdout());
    let result = pipeline.run(&mut gate, &mut ConsoleProgress).await;

    print_summary(&result);

    if let Some(report) = report {
        write_report(&result, report)?;
        println!("  Report: {}", report.display());
    }

    if result.succeeded() {
        print_follow_up(&pipeline, &result).await;
    }

    Ok(result.exit_code())
}

fn write_report(result: &RunResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    info!("Wrote run report {} to {}", result.run_id, path.display());
    Ok(())
}

/// Asks for a typed `yes` on a line-oriented reader
pub struct PromptGate<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> ConfirmationGate for PromptGate<R, W> {
    fn confirm(&mut self, summary: &str) -> histscrub_core::Result<bool> {
        writeln!(self.output, "\n{}", summary)?;
        write!(self.output, "Type 'yes' to continue: ")?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn completed(&mut self, stage: Stage, detail: &str) {
        println!("✓ {}: {}", stage, detail);
    }
}

fn print_summary(result: &RunResult) {
    for warning in &result.warnings {
        eprintln!("⚠ {}: {}", warning.stage, warning.message);
    }

    println!();
    match &result.failure {
        None => {
            println!("Run {} succeeded", result.run_id);
            println!("  Rules applied: {}", result.rules_applied);
            if let Some(report) = &result.verification {
                println!("  Objects verified: {}", report.objects_scanned);
            }
        }
        Some(failure) => {
            eprintln!(
                "✗ Run {} failed during {} (exit {})",
                result.run_id,
                failure.stage,
                failure.kind.exit_code()
            );
            eprintln!("  {}", failure.message);

            if failure.kind == FailureKind::ResidualSecretDetected
                && let Some(report) = &result.verification
            {
                for hit in &report.residual {
                    eprintln!(
                        "  {} {} still holds the secret from {}",
                        hit.object_type,
                        hit.object_id,
                        hit.sources.join(", ")
                    );
                }
            }
        }
    }

    if let Some(snapshot) = &result.snapshot {
        println!("  Snapshot: {}", snapshot.display());
        if !result.succeeded() {
            println!("  The snapshot was kept for inspection; remove it before the next run.");
        }
    }
}

async fn print_follow_up(pipeline: &Pipeline, result: &RunResult) {
    let Some(snapshot) = &result.snapshot else {
        return;
    };

    let remote = match pipeline.repository().remote_url("origin").await {
        Ok(Some(url)) => url,
        _ => "<remote-url>".to_string(),
    };

    let labels: Vec<&str> = pipeline
        .sources()
        .iter()
        .map(|s| s.label.as_str())
        .collect();

    println!();
    println!("Nothing has been pushed. Remaining steps:");
    println!("  1. Inspect the rewritten history:");
    println!("       git -C {} log --all --oneline", snapshot.display());
    println!("  2. Force-push every branch and tag from the snapshot:");
    println!("       git -C {} push --force --all {}", snapshot.display(), remote);
    println!("       git -C {} push --force --tags {}", snapshot.display(), remote);
    println!("  3. Delete remote branches that no longer exist in the snapshot.");
    println!("  4. Ask the hosting provider to purge cached views, pull request refs and forks.");
    println!("  5. Rotate the credentials: {}", labels.join(", "));
    println!();
    println!(
        "Clones, forks and CI caches made before the rewrite still contain the secrets. \
         Rotation is the only complete remediation."
    );
}
