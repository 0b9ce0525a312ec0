use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct LabsConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Upstream chat-completions endpoint. The API key is expected to come from
/// the environment (`LABS__AI__API_KEY` or `DEEPSEEK_API_KEY`) rather than
/// the config file, and must never appear in logs.
#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_ai_timeout")]
    pub timeout_seconds: u64,
}

fn default_ai_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Mean-absolute-deviation cutoff below which recent play is "stable".
    pub stability_threshold: f64,
    /// How many of the most recent samples feed the stability index.
    pub recent_window: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            stability_threshold: 50.0,
            recent_window: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl LabsConfig {
    /// Load from a TOML file, then overlay environment variables
    /// (`LABS__AI__API_KEY` etc.) so secrets stay out of the file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("LABS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        let mut cfg: LabsConfig = s.try_deserialize()?;

        if cfg.ai.api_key.is_empty() {
            if let Ok(key) = std::env::var("DEEPSEEK_API_KEY") {
                cfg.ai.api_key = key;
            }
        }

        Ok(cfg)
    }
}
