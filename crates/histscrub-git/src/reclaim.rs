use std::path::Path;

use histscrub_core::Result;
use tracing::info;

use crate::command::run;

/// Expire every reflog entry and prune unreachable objects immediately.
///
/// Only affects this copy of the repository; other clones and forge caches
/// keep whatever they already fetched.
pub async fn reclaim(repo: &Path) -> Result<()> {
    run(
        repo,
        &[
            "reflog",
            "expire",
            "--expire=now",
            "--expire-unreachable=now",
            "--all",
        ],
    )
    .await?;

    run(repo, &["gc", "--quiet", "--prune=now", "--aggressive"]).await?;

    info!("Expired reflogs and pruned unreachable objects in {}", repo.display());
    Ok(())
}
