pub mod init;
pub mod run;
pub mod verify;

use anyhow::Result;

use crate::cli::{Cli, Commands};

/// Run the selected command and return the process exit code
pub async fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command {
        None => run::handle(&cli.repo, cli.config.as_deref(), cli.report.as_deref()).await,
        Some(Commands::Init) => init::handle(&cli.repo),
        Some(Commands::Verify { snapshot }) => {
            verify::handle(&cli.repo, cli.config.as_deref(), &snapshot).await
        }
    }
}
