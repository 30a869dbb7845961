//! `forge auth refresh`: show how to mint a token with additional
//! scopes. The CLI never stores credentials; the result is handed back in
//! via `FORGE_TOKEN` or `auth.token`.

use super::CommandError;
use crate::config::Settings;

pub fn refresh(settings: &Settings, scopes: &[String]) -> Result<(), CommandError> {
    let list = scopes.join(",");
    if list.is_empty() {
        println!("Generate a token at:");
        println!("  https://{}/settings/tokens/new", settings.host);
    } else {
        println!("Generate a token carrying {list} at:");
        println!(
            "  https://{}/settings/tokens/new?scopes={list}",
            settings.host
        );
    }
    println!();
    println!("Then hand it to forge:");
    println!("  export FORGE_TOKEN=<token>");
    Ok(())
}
