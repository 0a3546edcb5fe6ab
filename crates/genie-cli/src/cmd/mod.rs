pub mod advise;
pub mod config;
pub mod diagram;
pub mod init;
pub mod profile;
pub mod run;
pub mod tickets;

use anyhow::Context;
use std::future::Future;

/// Drive one async command to completion on a fresh runtime.
pub fn block_on<F: Future>(fut: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    Ok(rt.block_on(fut))
}

/// The project config, or defaults when `init` has not been run.
pub fn config_or_default(root: &std::path::Path) -> anyhow::Result<genie_core::Config> {
    match genie_core::Config::load(root) {
        Ok(config) => Ok(config),
        Err(genie_core::GenieError::NotInitialized) => Ok(genie_core::Config::default()),
        Err(e) => Err(e).context("failed to load config"),
    }
}
