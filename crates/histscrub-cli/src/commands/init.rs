use anyhow::Result;
use histscrub_config::{CONFIG_FILE_NAME, Config};
use std::path::Path;

pub fn handle(repo: &Path) -> Result<i32> {
    let path = repo.join(CONFIG_FILE_NAME);

    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    std::fs::write(&path, Config::template())?;

    println!("✓ Created {}", path.display());
    println!("  Add a [[source]] entry for each leaked secret, then run 'histscrub'");

    Ok(0)
}
