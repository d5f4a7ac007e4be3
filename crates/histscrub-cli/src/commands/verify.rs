use anyhow::Result;
use histscrub_config::Config;
use histscrub_engine::Pipeline;
use std::path::Path;
use tracing::info;

pub async fn handle(repo: &Path, config_path: Option<&Path>, snapshot: &Path) -> Result<i32> {
    let (path, config) = Config::discover(repo, config_path)?;
    info!("Loaded config from {}", path.display());
    let pipeline = Pipeline::open(config, repo).await?;

    let report = match pipeline.verify_snapshot(snapshot).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("✗ {}", e);
            return Ok(e.kind().exit_code());
        }
    };

    for hit in &report.residual {
        eprintln!(
            "  {} {} still holds the secret from {}",
            hit.object_type,
            hit.object_id,
            hit.sources.join(", ")
        );
    }

    match report.into_result() {
        Ok(report) => {
            println!(
                "✓ {} objects scanned in {}, no secrets found",
                report.objects_scanned,
                snapshot.display()
            );
            Ok(0)
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            Ok(e.kind().exit_code())
        }
    }
}
