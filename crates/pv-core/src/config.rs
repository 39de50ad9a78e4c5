use crate::error::{PvError, Result};
use crate::types::SystemPromptMode;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "gpt-oss-20b";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
pub const DEFAULT_WELCOME_MESSAGE: &str =
    "I am an LLM-based AI assistant. Ask me anything and I will do my best to help!";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PalaverConfig {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    pub session: SessionSettings,
    pub bot: BotConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Everything the in-memory session layer needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub max_context_messages: usize,
    pub max_store_size: usize,
    pub store_ttl_hours: u64,
    pub max_message_length: usize,
    pub default_system_prompt: String,
    pub prompt_mode: SystemPromptMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub welcome_message: String,
    pub system_prompt_file: Option<PathBuf>,
    pub rate_limit_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            timeout_secs: 60,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_context_messages: 10,
            max_store_size: 1000,
            store_ttl_hours: 24,
            max_message_length: 4000,
            default_system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            prompt_mode: SystemPromptMode::PerUser,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            welcome_message: DEFAULT_WELCOME_MESSAGE.into(),
            system_prompt_file: None,
            rate_limit_secs: 2.0,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            enabled: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_path: PathBuf::from("data/bot.db") }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Default for PalaverConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            llm: LlmConfig::default(),
            session: SessionSettings::default(),
            bot: BotConfig::default(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PalaverConfig {
    /// Load from the process environment, reading a `.env` file first if one exists.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let bot_token = required(&lookup, "TELEGRAM_BOT_TOKEN")?;
        let api_key = required(&lookup, "OPENROUTER_API_KEY")?;

        let prompt_mode = match get("PROMPT_MODE") {
            Some(raw) => raw.parse::<SystemPromptMode>().map_err(|e| {
                PvError::Config(format!("PROMPT_MODE is invalid: {e}"))
            })?,
            None => defaults.session.prompt_mode,
        };

        let enabled = match get("API_ENABLED") {
            Some(raw) => parse_bool("API_ENABLED", &raw)?,
            None => defaults.server.enabled,
        };

        Ok(Self {
            telegram: TelegramConfig { bot_token },
            llm: LlmConfig {
                api_key,
                base_url: get("OPENROUTER_BASE_URL").unwrap_or(defaults.llm.base_url),
                model: get("OPENROUTER_MODEL").unwrap_or(defaults.llm.model),
                timeout_secs: positive(&lookup, "LLM_TIMEOUT_SECS", defaults.llm.timeout_secs)?,
            },
            session: SessionSettings {
                max_context_messages: positive(
                    &lookup,
                    "MAX_CONTEXT_MESSAGES",
                    defaults.session.max_context_messages,
                )?,
                max_store_size: positive(&lookup, "MAX_STORAGE_SIZE", defaults.session.max_store_size)?,
                store_ttl_hours: positive(&lookup, "STORAGE_TTL_HOURS", defaults.session.store_ttl_hours)?,
                max_message_length: positive(
                    &lookup,
                    "MAX_MESSAGE_LENGTH",
                    defaults.session.max_message_length,
                )?,
                default_system_prompt: get("DEFAULT_SYSTEM_PROMPT")
                    .unwrap_or(defaults.session.default_system_prompt),
                prompt_mode,
            },
            bot: BotConfig {
                welcome_message: get("WELCOME_MESSAGE").unwrap_or(defaults.bot.welcome_message),
                system_prompt_file: get("SYSTEM_PROMPT_FILE").map(PathBuf::from),
                rate_limit_secs: positive(&lookup, "RATE_LIMIT_SECONDS", defaults.bot.rate_limit_secs)?,
            },
            server: ServerConfig {
                host: get("API_HOST").unwrap_or(defaults.server.host),
                port: positive(&lookup, "API_PORT", defaults.server.port)?,
                enabled,
            },
            storage: StorageConfig {
                database_path: get("DATABASE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.database_path),
            },
            logging: LoggingConfig {
                level: get("LOG_LEVEL").unwrap_or(defaults.logging.level),
                format: get("LOG_FORMAT").unwrap_or(defaults.logging.format),
            },
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Err(PvError::Config(format!("{key} is required"))),
        Some(v) if v.trim().is_empty() => Err(PvError::Config(format!("{key} cannot be empty"))),
        Some(v) => Ok(v.trim().to_string()),
    }
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + Display,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    let value = raw.trim().parse::<T>().map_err(|_| {
        PvError::Config(format!("{key} must be a valid number, got: {raw}"))
    })?;
    if value <= T::default() {
        return Err(PvError::Config(format!("{key} must be greater than 0, got: {value}")));
    }
    Ok(value)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PvError::Config(format!("{key} must be a boolean, got: {raw}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] =
        [("TELEGRAM_BOT_TOKEN", " 123:abc "), ("OPENROUTER_API_KEY", "sk-test")];

    #[test]
    fn test_defaults_applied() {
        let cfg = PalaverConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(cfg.telegram.bot_token, "123:abc");
        assert_eq!(cfg.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.session.max_context_messages, 10);
        assert_eq!(cfg.session.max_store_size, 1000);
        assert_eq!(cfg.session.store_ttl_hours, 24);
        assert_eq!(cfg.session.max_message_length, 4000);
        assert_eq!(cfg.session.prompt_mode, SystemPromptMode::PerUser);
        assert_eq!(cfg.bot.rate_limit_secs, 2.0);
        assert!(cfg.server.enabled);
    }

    #[test]
    fn test_missing_token() {
        let err = PalaverConfig::from_lookup(lookup_from(&[("OPENROUTER_API_KEY", "k")])).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN is required"));
    }

    #[test]
    fn test_blank_api_key() {
        let err = PalaverConfig::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("OPENROUTER_API_KEY", "   "),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("OPENROUTER_API_KEY cannot be empty"));
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAX_CONTEXT_MESSAGES", "ten"));
        let err = PalaverConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("MAX_CONTEXT_MESSAGES must be a valid number"));
    }

    #[test]
    fn test_zero_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("STORAGE_TTL_HOURS", "0"));
        let err = PalaverConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("STORAGE_TTL_HOURS must be greater than 0"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("MAX_STORAGE_SIZE", "3"),
            ("PROMPT_MODE", "deployment"),
            ("RATE_LIMIT_SECONDS", "0.5"),
            ("API_ENABLED", "false"),
            ("SYSTEM_PROMPT_FILE", "prompts/system.txt"),
        ]);
        let cfg = PalaverConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(cfg.session.max_store_size, 3);
        assert_eq!(cfg.session.prompt_mode, SystemPromptMode::Deployment);
        assert_eq!(cfg.bot.rate_limit_secs, 0.5);
        assert!(!cfg.server.enabled);
        assert_eq!(cfg.bot.system_prompt_file, Some(PathBuf::from("prompts/system.txt")));
    }
}
