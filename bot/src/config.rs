use std::path::Path;

use serde::Deserialize;

// Bot settings
pub const DEFAULT_MODEL_ENGINE: &str = "gpt-4.1-mini";
pub const DEFAULT_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_TOP_P: f64 = 1.0;

// Starting dollar balance granted on the daily reset and on lazy account
// creation.
pub const INITIAL_DABLOONS: f64 = 0.5;

pub const STATIC_CONFIG_PATH: &str = "data/static_config.json";

pub struct ServerConfig {
    pub discord_token: String,
    pub openai_api_key: String,
    pub database_url: String,
    pub admin_user_id: Option<u64>,
    /// Timezone the daily allowance reset is anchored to.
    pub reset_timezone: chrono_tz::Tz,
    /// Multiple of the normal allowance the admin account receives on reset.
    pub admin_allowance_multiplier: f64,
    /// Guild used for testing; prompts compiled there skip the user
    /// directory and memory sections.
    pub test_guild_id: Option<u64>,
    pub handle_alarming_words: bool,
    /// Replay historical reactions into the ledger on startup.
    pub backfill_reactions: bool,
}

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(e) => match e {
            std::env::VarError::NotPresent => Ok(None),
            std::env::VarError::NotUnicode(_) => Err(format!(
                "Could not get the environment variable `{key}` due to unicode error"
            )),
        },
    }
}

fn required_var(key: &str) -> String {
    let val = var(key);
    match val {
        Ok(val) => match val {
            Some(val) => val,
            None => {
                tracing::error!("Environment variable `{key}` is required");
                std::process::exit(1)
            }
        },
        Err(e) => {
            tracing::error!(
                "Environment variable `{key}` is required, but could not retrieve: {e}"
            );
            std::process::exit(1)
        }
    }
}

fn flag(key: &str) -> bool {
    matches!(
        var(key).ok().flatten().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

impl ServerConfig {
    pub fn new_from_env() -> Self {
        let reset_timezone = match var("RESET_TIMEZONE") {
            Ok(Some(tz)) => tz.parse().unwrap_or_else(|_| {
                tracing::warn!("Unknown RESET_TIMEZONE `{tz}`, falling back to US/Eastern");
                chrono_tz::US::Eastern
            }),
            _ => chrono_tz::US::Eastern,
        };

        ServerConfig {
            discord_token: required_var("DISCORD_TOKEN"),
            openai_api_key: required_var("OPENAI_API_KEY"),
            database_url: required_var("DATABASE_URL"),
            admin_user_id: var("ADMIN_USER_ID")
                .ok()
                .flatten()
                .and_then(|id| id.parse().ok()),
            reset_timezone,
            admin_allowance_multiplier: var("ADMIN_ALLOWANCE_MULTIPLIER")
                .ok()
                .flatten()
                .and_then(|m| m.parse().ok())
                .unwrap_or(4.0),
            test_guild_id: var("TEST_GUILD_ID")
                .ok()
                .flatten()
                .and_then(|id| id.parse().ok()),
            handle_alarming_words: flag("HANDLE_ALARMING_WORDS"),
            backfill_reactions: flag("BACKFILL_REACTIONS"),
        }
    }
}

/// Read-only assets loaded once at startup. Edits to the file require a
/// restart.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticAssets {
    pub default_personality: String,
    #[serde(default)]
    pub insults: Vec<String>,
}

impl Default for StaticAssets {
    fn default() -> Self {
        StaticAssets {
            default_personality: "You are a helpful assistant in a Discord server.".into(),
            insults: vec![],
        }
    }
}

impl StaticAssets {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(assets) => assets,
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", path.display());
                    StaticAssets::default()
                }
            },
            Err(_) => {
                tracing::info!(
                    "No static config at {}, using built-in defaults",
                    path.display()
                );
                StaticAssets::default()
            }
        }
    }
}
