use clap::Parser;

use forgecli::api::ApiError;
use forgecli::cli::commands::{self, CommandError};
use forgecli::cli::{AuthAction, CacheAction, Cli, Commands};
use forgecli::config::Settings;

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load_with_file(cli.config.clone()) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("error loading configuration: {error}");
            std::process::exit(1);
        }
    };
    forgecli::logging::init_with_config(&settings.logging);

    if let Err(error) = dispatch(&cli, &settings) {
        eprintln!("error: {error}");
        if let CommandError::Api(ApiError::Http(http)) = &error {
            if let Some(hint) = &http.scopes_suggestion {
                eprintln!("{hint}");
            }
        }
        std::process::exit(1);
    }
}

fn dispatch(cli: &Cli, settings: &Settings) -> Result<(), CommandError> {
    match &cli.command {
        Commands::Api {
            endpoint,
            method,
            headers,
            input,
            cache,
            include,
        } => commands::api::run(
            settings,
            endpoint,
            method,
            headers,
            input.as_deref(),
            *cache,
            *include,
        ),
        Commands::Graphql {
            query,
            fields,
            cache,
        } => commands::graphql::run(settings, query, fields, *cache),
        Commands::Config => commands::config::show(settings),
        Commands::Cache { action } => match action {
            CacheAction::Clear => commands::cache::clear(settings),
        },
        Commands::Auth { action } => match action {
            AuthAction::Refresh { scopes } => commands::auth::refresh(settings, scopes),
        },
        Commands::Init { force } => commands::init::run(*force),
    }
}
