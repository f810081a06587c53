use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Primary tier: cookie jar with per-entry expiry.
pub const COOKIE_JAR_FILE: &str = "cookies.json";
/// Secondary tier: encoded tokens, dropped on logout.
pub const SESSION_FILE: &str = "session.json";
/// Legacy tier: plain credentials written by earlier releases.
pub const LEGACY_CREDENTIALS_FILE: &str = "credentials.json";

/// Default state directory: `~/.evreg`.
#[tracing::instrument(skip(runtime))]
pub fn default_state_dir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory, pass --home or set EVREG_HOME")?;
    Ok(home_dir.join(".evreg"))
}
