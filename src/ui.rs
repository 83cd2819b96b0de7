// UI layer: the masked token prompt, the update flow and the confirmation
// printed once Discord accepts the change.

use crate::api::{ApiClient, HttpClient, UpdateRequest, UpdatedAccount};
use crate::avatar::resolve_avatar;
use crate::cli::Options;
use crate::token::SecretPrompt;
use crate::Result;
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;

/// Reads the token with `dialoguer::Password`, which hides input on the
/// terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl SecretPrompt for TerminalPrompt {
    fn read_secret(&self, prompt: &str) -> Option<String> {
        Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(|e| log::warn!("failed to read token: {e}"))
            .ok()
    }
}

/// Resolve the avatar (if any), submit the patch and print the result to
/// `out`. Nothing is written to `out` unless the update succeeds.
pub fn update_profile<H: HttpClient>(
    api: &ApiClient<H>,
    options: &Options,
    token: &str,
    out: &mut impl Write,
) -> Result<()> {
    let avatar = options
        .avatar
        .as_deref()
        .map(|source| resolve_avatar(source, api.http()))
        .transpose()?;

    let req = UpdateRequest {
        username: options.username.clone(),
        avatar,
    };

    // spinner lives on stderr so stdout only ever carries the confirmation
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Updating user...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = api.modify_current_user(token, &req);
    spinner.finish_and_clear();
    let account = result?;

    log::info!("updated user {}", account.id);
    report(out, &req, &account, api.avatar_url(&account).as_deref())
}

/// Print the confirmation for the fields that were requested.
pub fn report(
    out: &mut impl Write,
    req: &UpdateRequest,
    account: &UpdatedAccount,
    avatar_url: Option<&str>,
) -> Result<()> {
    writeln!(out, "Updated user")?;

    if req.username.is_some() {
        writeln!(
            out,
            "  => Username: {}#{}",
            account.username, account.discriminator
        )?;
    }

    if req.avatar.is_some() {
        writeln!(out, "  => Avatar  : {}", avatar_url.unwrap_or("none"))?;
    }

    Ok(())
}
