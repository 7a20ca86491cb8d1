use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::kliento::new;
use anyhow::{Context, Result};
use url::Url;

/// Handle the server action
/// # Errors
/// Returns an error if the DSN is malformed or the server fails.
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            // Catch malformed DSNs before handing them to the pool.
            Url::parse(&dsn).context("Invalid database DSN")?;

            new(port, dsn, globals).await?;
        }
    }

    Ok(())
}
