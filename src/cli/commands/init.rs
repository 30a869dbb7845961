//! `forge init`: write a default settings file.

use std::fs;

use anyhow::Context;

use super::CommandError;
use crate::config::{Settings, config_file};

pub fn run(force: bool) -> Result<(), CommandError> {
    let file = config_file();
    if file.exists() && !force {
        return Err(CommandError::Usage(format!(
            "{} already exists (use --force to overwrite)",
            file.display()
        )));
    }
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered =
        toml::to_string_pretty(&Settings::default()).context("failed to render settings")?;
    fs::write(&file, rendered).with_context(|| format!("failed to write {}", file.display()))?;
    println!("Wrote {}", file.display());
    Ok(())
}
