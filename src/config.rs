// Configuration: endpoints come from the environment with Discord's public
// defaults, the same way the API gateway URL used to be resolved. There is
// no config file.

/// Environment variable holding the API base URL.
pub const API_URL_ENV: &str = "DISCORD_API_URL";
/// Environment variable holding the CDN base URL used for avatar links.
pub const CDN_URL_ENV: &str = "DISCORD_CDN_URL";

pub const DEFAULT_API_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_CDN_URL: &str = "https://cdn.discordapp.com";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: String,
    pub cdn_base_url: String,
}

impl Config {
    /// Read `DISCORD_API_URL` / `DISCORD_CDN_URL`, falling back to the
    /// public Discord endpoints.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.into())
                .trim_end_matches('/')
                .to_string()
        };
        Config {
            api_base_url: pick(API_URL_ENV, DEFAULT_API_URL),
            cdn_base_url: pick(CDN_URL_ENV, DEFAULT_CDN_URL),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
