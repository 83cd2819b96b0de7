// Entrypoint for the CLI application.
// - Parses and validates the flags before any I/O happens.
// - Prints every error to stderr and exits with status 1.

use anyhow::Context;
use clap::{CommandFactory, Parser};
use updatebot::api::ApiClient;
use updatebot::cli::{normalize_args, Cli, Options};
use updatebot::config::Config;
use updatebot::token::{require_token, token_from_env};
use updatebot::ui::{update_profile, TerminalPrompt};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        eprintln!("{e:#}");
        let usage = e
            .downcast_ref::<updatebot::Error>()
            .is_some_and(updatebot::Error::is_usage);
        if usage {
            eprintln!();
            eprintln!("{}", Cli::command().render_help());
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args()));
    let options = Options::try_from(cli)?;

    let token = require_token(token_from_env(&TerminalPrompt))?;

    let config = Config::from_env();
    let api = ApiClient::from_config(&config).context("Failed to set up the Discord client")?;

    let stdout = std::io::stdout();
    update_profile(&api, &options, &token, &mut stdout.lock())?;
    Ok(())
}
