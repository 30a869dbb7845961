//! `forge config`: print the resolved configuration.

use anyhow::Context;

use super::CommandError;
use crate::config::Settings;

pub fn show(settings: &Settings) -> Result<(), CommandError> {
    let rendered = toml::to_string_pretty(settings).context("failed to render settings")?;
    print!("{rendered}");
    Ok(())
}
