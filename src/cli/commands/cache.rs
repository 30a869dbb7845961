//! `forge cache`: response cache maintenance.

use std::fs;

use anyhow::Context;

use super::CommandError;
use crate::config::Settings;

pub fn clear(settings: &Settings) -> Result<(), CommandError> {
    let dir = settings.cache.directory();
    if dir.exists() {
        fs::remove_dir_all(&dir)
            .with_context(|| format!("failed to remove {}", dir.display()))?;
    }
    println!("Cleared response cache at {}", dir.display());
    Ok(())
}
