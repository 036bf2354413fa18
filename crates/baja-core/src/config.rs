use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEZONE: &str = "America/New_York";
pub const DEFAULT_HTTP_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Top-level config (baja.toml + BAJA_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BajaConfig {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Register slash commands on this guild only (instant refresh while
    /// developing). Global registration when unset.
    pub guild_id: Option<u64>,
    /// Retitle threads whose name is still the starter message.
    #[serde(default = "bool_true")]
    pub rename_threads: bool,
    #[serde(default = "default_rename_after")]
    pub rename_after_messages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// OpenAI-compatible chat completions endpoint (OpenRouter by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// Tried in order; the next model is used when one fails.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sent as `HTTP-Referer` (OpenRouter attribution).
    pub referer: Option<String>,
    /// Sent as `X-Title` (OpenRouter attribution).
    pub title: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_provider_base_url(),
            models: default_models(),
            max_tokens: default_max_tokens(),
            referer: None,
            title: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    pub token: Option<String>,
    pub parts_data_source_id: Option<String>,
    #[serde(default = "default_notion_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: None,
            parts_data_source_id: None,
            base_url: default_notion_base_url(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Zone used for guilds that never ran `/timezone`.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    /// Per-source (and per-thread) message cap for one history fetch.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_http_port(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_rename_after() -> usize {
    3
}
fn default_provider_base_url() -> String {
    "https://openrouter.ai/api".to_string()
}
fn default_models() -> Vec<String> {
    vec![
        "google/gemini-2.0-flash-001".to_string(),
        "openrouter/auto".to_string(),
    ]
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_notion_base_url() -> String {
    "https://api.notion.com".to_string()
}
fn default_max_results() -> usize {
    5
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.baja/baja.db", home)
}

impl BajaConfig {
    /// Load config from a TOML file with BAJA_* env var overrides.
    ///
    /// Nested keys use a double underscore: `BAJA_DISCORD__BOT_TOKEN`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("BAJA_").split("__")),
        )
    }

    fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        let config: BajaConfig = figment
            .extract()
            .map_err(|e| crate::error::BajaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the process cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            return Err(crate::error::BajaError::Config(
                "discord.bot_token is required".to_string(),
            ));
        }
        if self.database.path.trim().is_empty() {
            return Err(crate::error::BajaError::Config(
                "database.path is required".to_string(),
            ));
        }
        if self.provider.models.is_empty() {
            return Err(crate::error::BajaError::Config(
                "provider.models must list at least one model".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.baja/baja.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn minimal_toml_fills_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "baja.toml",
                r#"
                [discord]
                bot_token = "abc"
                "#,
            )?;
            let config = BajaConfig::load(Some("baja.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.scheduler.default_timezone, DEFAULT_TIMEZONE);
            assert_eq!(config.scheduler.history_limit, DEFAULT_HISTORY_LIMIT);
            assert_eq!(config.provider.models.len(), 2);
            assert!(config.discord.rename_threads);
            assert_eq!(config.http.port, DEFAULT_HTTP_PORT);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.create_file("baja.toml", "[discord]\nbot_token = \"abc\"\n")?;
            jail.set_env("BAJA_SCHEDULER__DEFAULT_TIMEZONE", "Europe/Berlin");
            let config = BajaConfig::load(Some("baja.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.scheduler.default_timezone, "Europe/Berlin");
            Ok(())
        });
    }

    #[test]
    fn missing_token_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("baja.toml", "[discord]\nbot_token = \"\"\n")?;
            assert!(BajaConfig::load(Some("baja.toml")).is_err());
            Ok(())
        });
    }
}
