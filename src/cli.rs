// Command-line parsing: clap handles the flags, `Options` is the validated,
// immutable result handed to the rest of the run.

use crate::{Error, Result};
use clap::Parser;

/// Update a Discord bot's username and/or avatar.
#[derive(Parser, Debug, Default)]
#[command(name = "updatebot", version, args_override_self = true)]
pub struct Cli {
    /// The new username for the bot
    #[arg(long, value_name = "NAME", allow_hyphen_values = true)]
    pub username: Option<String>,

    /// The new avatar for the bot, either a URL or a file path
    #[arg(long, value_name = "URL or file path", allow_hyphen_values = true)]
    pub avatar: Option<String>,
}

const SINGLE_DASH_FLAGS: [&str; 2] = ["username", "avatar"];

/// Accept the single-dash long flags (`-username x`, `-avatar=x`) by
/// rewriting them to `--username` / `--avatar` before clap sees them. The
/// argument after a bare flag is its value and is passed through untouched.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut value_next = false;
    args.into_iter()
        .map(|arg| {
            if std::mem::take(&mut value_next) {
                return arg;
            }
            let Some(flag) = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-')) else {
                return arg;
            };
            let (name, inline_value) = match flag.split_once('=') {
                Some((name, _)) => (name, true),
                None => (flag, false),
            };
            if !SINGLE_DASH_FLAGS.contains(&name) {
                return arg;
            }
            value_next = !inline_value;
            if arg.starts_with("--") {
                arg
            } else {
                format!("-{arg}")
            }
        })
        .collect()
}

/// Validated options for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    pub username: Option<String>,
    pub avatar: Option<String>,
}

impl TryFrom<Cli> for Options {
    type Error = Error;

    fn try_from(cli: Cli) -> Result<Self> {
        let username = cli.username.filter(|s| !s.is_empty());
        let avatar = cli.avatar.filter(|s| !s.is_empty());

        if username.is_none() && avatar.is_none() {
            return Err(Error::MissingChanges);
        }
        if let Some(name) = &username {
            validate_username(name)?;
        }

        Ok(Options { username, avatar })
    }
}

/// Usernames must be 3 to 31 characters long.
pub fn validate_username(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len <= 2 || len >= 32 {
        return Err(Error::UsernameLength(len));
    }
    Ok(())
}
