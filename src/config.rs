use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LLMConfig,
    pub search: SearchConfig,
    pub sandbox: SandboxConfig,
    pub agent: AgentConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub static_dir: String,
    pub plot_dir: String,
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
    pub analysis_max_rows: usize,
}

/// Provider and model used by one agent role.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub replicate_api_token: String,
    pub openai_api_key: String,
    pub openrouter_api_key: String,
    pub groq_api_key: String,
    pub anthropic_api_key: String,
    /// Base URL override for the OpenAI-compatible providers.
    pub api_base: Option<String>,
    pub router: ModelConfig,
    pub inferencer: ModelConfig,
    pub sql: ModelConfig,
    pub viz: ModelConfig,
    pub chat: ModelConfig,
}

impl LLMConfig {
    /// API key for a provider name, if one is configured.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        let key = match provider {
            "replicate" => &self.replicate_api_token,
            "openai" => &self.openai_api_key,
            "openrouter" => &self.openrouter_api_key,
            "groq" => &self.groq_api_key,
            "anthropic" => &self.anthropic_api_key,
            _ => return None,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub provider: String,
    pub exa_api_key: String,
    pub exa_base_url: String,
    pub serpapi_key: String,
    pub max_results: usize,
    pub research_model: String,
    pub research_poll_secs: u64,
    pub research_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    pub provider: String,
    pub python: String,
    pub timeout_secs: u64,
    pub daytona_api_key: String,
    pub daytona_api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub max_steps: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub source_url: String,
    pub data_dir: String,
}

pub const DEFAULT_ARGO_SOURCE: &str = "https://www.ncei.noaa.gov/data/oceans/argo/gadr/data/atlantic/2020/02/";

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(key, default)
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {}", key))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let default_provider = var_or("LLM_PROVIDER", "replicate");
        let model = |key: &str, default_model: &str| ModelConfig {
            provider: env::var(format!("{}_PROVIDER", key)).unwrap_or_else(|_| default_provider.clone()),
            model: var_or(&format!("{}_MODEL", key), default_model),
        };

        Ok(Self {
            server: ServerConfig {
                port: parse_var("PORT", "5000")?,
                host: var_or("HOST", "0.0.0.0"),
                cors_allowed_origins: var_or("ALLOWED_ORIGINS", "*")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                static_dir: var_or("STATIC_DIR", "dist"),
                plot_dir: var_or("PLOT_DIR", "artifacts/plots"),
                log_dir: env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
            },
            database: DatabaseConfig {
                url: var_or("DATABASE_URL", "sqlite://app.db"),
                max_connections: parse_var("DB_MAX_CONNECTIONS", "5")?,
                busy_timeout_secs: parse_var("DB_BUSY_TIMEOUT_SECS", "5")?,
                analysis_max_rows: parse_var("ANALYSIS_MAX_ROWS", "1000")?,
            },
            llm: LLMConfig {
                replicate_api_token: env::var("REPLICATE_API_TOKEN").unwrap_or_default(),
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                openrouter_api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
                api_base: env::var("LLM_API_BASE").ok().filter(|v| !v.trim().is_empty()),
                router: model("ROUTER", "openai/o4-mini"),
                inferencer: model("INFERENCER", "openai/o4-mini"),
                sql: model("SQL", "openai/gpt-5"),
                viz: model("VIZ", "anthropic/claude-4-sonnet"),
                chat: model("CHAT", "openai/o4-mini"),
            },
            search: SearchConfig {
                provider: var_or("SEARCH_PROVIDER", "exa"),
                exa_api_key: env::var("EXA_API_KEY").unwrap_or_default(),
                exa_base_url: var_or("EXA_BASE_URL", "https://api.exa.ai"),
                serpapi_key: env::var("SERPAPI_KEY").unwrap_or_default(),
                max_results: parse_var("SEARCH_MAX_RESULTS", "5")?,
                research_model: var_or("RESEARCH_MODEL", "exa-research"),
                research_poll_secs: parse_var("RESEARCH_POLL_SECS", "5")?,
                research_timeout_secs: parse_var("RESEARCH_TIMEOUT_SECS", "600")?,
            },
            sandbox: SandboxConfig {
                provider: var_or("SANDBOX_PROVIDER", "local"),
                python: var_or("SANDBOX_PYTHON", "python3"),
                timeout_secs: parse_var("SANDBOX_TIMEOUT_SECS", "60")?,
                daytona_api_key: env::var("DAYTONA_API_KEY").unwrap_or_default(),
                daytona_api_url: var_or("DAYTONA_API_URL", "https://app.daytona.io/api"),
            },
            agent: AgentConfig {
                max_steps: parse_var("AGENT_MAX_STEPS", "6")?,
            },
            ingest: IngestConfig {
                source_url: var_or("ARGO_SOURCE_URL", DEFAULT_ARGO_SOURCE),
                data_dir: var_or("ARGO_DIR", "argo_data"),
            },
        })
    }

    /// Configuration with defaults only, for tests and tooling.
    pub fn for_tests(database_url: &str) -> Self {
        let model = |m: &str| ModelConfig {
            provider: "replicate".to_string(),
            model: m.to_string(),
        };
        Self {
            server: ServerConfig {
                port: 5000,
                host: "127.0.0.1".to_string(),
                cors_allowed_origins: vec!["*".to_string()],
                static_dir: "dist".to_string(),
                plot_dir: "artifacts/plots".to_string(),
                log_dir: None,
            },
            database: DatabaseConfig {
                url: database_url.to_string(),
                max_connections: 1,
                busy_timeout_secs: 5,
                analysis_max_rows: 1000,
            },
            llm: LLMConfig {
                replicate_api_token: String::new(),
                openai_api_key: String::new(),
                openrouter_api_key: String::new(),
                groq_api_key: String::new(),
                anthropic_api_key: String::new(),
                api_base: None,
                router: model("openai/o4-mini"),
                inferencer: model("openai/o4-mini"),
                sql: model("openai/gpt-5"),
                viz: model("anthropic/claude-4-sonnet"),
                chat: model("openai/o4-mini"),
            },
            search: SearchConfig {
                provider: "exa".to_string(),
                exa_api_key: String::new(),
                exa_base_url: "https://api.exa.ai".to_string(),
                serpapi_key: String::new(),
                max_results: 5,
                research_model: "exa-research".to_string(),
                research_poll_secs: 5,
                research_timeout_secs: 600,
            },
            sandbox: SandboxConfig {
                provider: "none".to_string(),
                python: "python3".to_string(),
                timeout_secs: 60,
                daytona_api_key: String::new(),
                daytona_api_url: "https://app.daytona.io/api".to_string(),
            },
            agent: AgentConfig { max_steps: 6 },
            ingest: IngestConfig {
                source_url: DEFAULT_ARGO_SOURCE.to_string(),
                data_dir: "argo_data".to_string(),
            },
        }
    }
}
