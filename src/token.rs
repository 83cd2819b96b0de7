// Token acquisition: the environment wins, otherwise ask on the terminal
// when there is one.

use crate::{Error, Result};
use std::io::IsTerminal;

/// Environment variable holding the bot token.
pub const TOKEN_ENV: &str = "DISCORD_TOKEN";

pub const TOKEN_PROMPT: &str = "Bot Token (input feedback is NOT shown)";

/// Source of hidden user input.
pub trait SecretPrompt {
    /// Returns `None` when nothing could be read.
    fn read_secret(&self, prompt: &str) -> Option<String>;
}

/// Prompt used when there is no terminal to ask on.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl SecretPrompt for NoPrompt {
    fn read_secret(&self, _prompt: &str) -> Option<String> {
        None
    }
}

/// Use `env_value` verbatim when set, even if empty. Otherwise ask through
/// `prompt`, but only for interactive runs.
pub fn resolve_token(
    env_value: Option<String>,
    interactive: bool,
    prompt: &dyn SecretPrompt,
) -> Option<String> {
    if let Some(token) = env_value {
        log::debug!("using token from {TOKEN_ENV}");
        return Some(token);
    }
    if !interactive {
        log::debug!("{TOKEN_ENV} is unset and stdout is not a terminal");
        return None;
    }
    prompt.read_secret(TOKEN_PROMPT)
}

/// Resolve the token for this process: `DISCORD_TOKEN`, then the prompt if
/// stdout is a terminal.
pub fn token_from_env(prompt: &dyn SecretPrompt) -> Option<String> {
    let env_value = std::env::var_os(TOKEN_ENV).map(|v| v.to_string_lossy().into_owned());
    resolve_token(env_value, std::io::stdout().is_terminal(), prompt)
}

/// An unset or empty token ends the run.
pub fn require_token(token: Option<String>) -> Result<String> {
    token.filter(|t| !t.is_empty()).ok_or(Error::NoToken)
}
