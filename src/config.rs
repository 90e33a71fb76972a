use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

use crate::llm_providers::LLMProviderType;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LLMConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub generation: GenerationConfig,
}

/// Large Language Model service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub provider: LLMProviderType,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub proxy_url: Option<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

/// Limits and policy values used while building prompts and recovering records.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationConfig {
    /// Characters of source text embedded in a question prompt.
    pub prompt_source_chars: usize,
    /// Characters of source text accepted with a question request.
    pub max_source_chars: usize,
    pub questions_per_type: usize,
    pub max_questions: usize,
    pub duration_tolerance: f64,
    pub default_task_hours: f64,
    /// Longest plan, in days, a request may ask for.
    pub max_plan_days: i64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            prompt_source_chars: 3000,
            max_source_chars: 50_000,
            questions_per_type: 2,
            max_questions: 10,
            duration_tolerance: 0.01,
            default_task_hours: 2.0,
            max_plan_days: 366,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let llm_config = LLMConfig::from_env()?;
        let server_config = ServerConfig::from_env()?;
        let logging_config = LoggingConfig::from_env()?;
        let generation_config = GenerationConfig::from_env()?;

        let config = Config {
            llm: llm_config,
            server: server_config,
            logging: logging_config,
            generation: generation_config,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            llm_provider = ?self.llm.provider,
            llm_model = ?self.llm.model,
            llm_api_key_masked = %mask_sensitive_data(&self.llm.api_key),
            llm_proxy = ?self.llm.proxy_url.as_deref().map(mask_sensitive_data),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            max_questions = self.generation.max_questions,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.llm.api_key.is_empty() || self.llm.api_key == "your-api-key" {
            warn!("LLM API key appears to be placeholder or empty - generation endpoints will fail");
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!(
                "LLM_TEMPERATURE must be between 0 and 2, got {}",
                self.llm.temperature
            ));
        }

        if self.llm.max_attempts == 0 {
            return Err(anyhow!("LLM_MAX_ATTEMPTS must be at least 1"));
        }

        if self.generation.max_questions == 0 || self.generation.questions_per_type == 0 {
            return Err(anyhow!("Question limits must be greater than 0"));
        }

        if self.generation.default_task_hours <= 0.0 {
            return Err(anyhow!("DEFAULT_TASK_HOURS must be positive"));
        }

        if self.generation.max_plan_days < 1 {
            return Err(anyhow!("MAX_PLAN_DAYS must be at least 1"));
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
        {
            warn!("Invalid log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl LLMConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("LLM_API_KEY")
            .or_else(|_| env::var("MOONSHOT_API_KEY"))
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .unwrap_or_else(|_| "your-api-key".to_string());

        let base_url = env::var("LLM_BASE_URL").ok();

        let provider_str = env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = LLMProviderType::from_name(&provider_str);

        let model = env::var("LLM_MODEL").ok();

        let temperature = parse_env("LLM_TEMPERATURE", 0.7_f32)?;
        let max_tokens = parse_env("LLM_MAX_TOKENS", 4000_u32)?;
        let timeout_secs = parse_env("LLM_TIMEOUT_SECS", 60_u64)?;
        let max_attempts = parse_env("LLM_MAX_ATTEMPTS", 3_u32)?;
        let retry_backoff_ms = parse_env("LLM_RETRY_BACKOFF_MS", 2000_u64)?;

        let proxy_url = env::var("HTTPS_PROXY")
            .or_else(|_| env::var("https_proxy"))
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(LLMConfig {
            api_key,
            base_url,
            provider,
            model,
            temperature,
            max_tokens,
            timeout_secs,
            max_attempts,
            retry_backoff_ms,
            proxy_url,
        })
    }

    /// Configuration for the given provider with defaults for everything else.
    pub fn for_provider(provider: LLMProviderType, api_key: &str, base_url: Option<String>) -> Self {
        LLMConfig {
            api_key: api_key.to_string(),
            base_url,
            provider,
            model: None,
            temperature: 0.7,
            max_tokens: 4000,
            timeout_secs: 60,
            max_attempts: 3,
            retry_backoff_ms: 2000,
            proxy_url: None,
        }
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str)
        })?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info,study_planner=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

impl GenerationConfig {
    fn from_env() -> Result<Self> {
        let defaults = GenerationConfig::default();
        Ok(GenerationConfig {
            prompt_source_chars: parse_env("PROMPT_SOURCE_CHARS", defaults.prompt_source_chars)?,
            max_source_chars: parse_env("MAX_SOURCE_CHARS", defaults.max_source_chars)?,
            questions_per_type: parse_env("QUESTIONS_PER_TYPE", defaults.questions_per_type)?,
            max_questions: parse_env("MAX_QUESTIONS", defaults.max_questions)?,
            duration_tolerance: defaults.duration_tolerance,
            default_task_hours: parse_env("DEFAULT_TASK_HOURS", defaults.default_task_hours)?,
            max_plan_days: parse_env("MAX_PLAN_DAYS", defaults.max_plan_days)?,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
