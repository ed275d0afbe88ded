// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_max_tool_rounds() -> u32 {
    4
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    60
}

/// Generation capability settings, loaded from `config/ai.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// "openai" | "groq" | "mock" (case-insensitive)
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY / GROQ_API_KEY (by provider)
    #[serde(default)]
    pub api_key: String,
    /// Override for OpenAI-compatible endpoints; provider default otherwise.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "groq".to_string(),
            model: default_model(),
            api_key: String::new(),
            base_url: None,
            max_tool_rounds: default_max_tool_rounds(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let mut cfg: AiConfig = serde_json::from_str(data)?;

        // Normalize provider
        cfg.provider = cfg.provider.trim().to_lowercase();

        // Resolve api key if "ENV"
        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                "groq" => env::var("GROQ_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing GROQ_API_KEY env var"))?,
                "mock" => String::new(),
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        if !cfg.temperature.is_finite() || !(0.0..=2.0).contains(&cfg.temperature) {
            cfg.temperature = default_temperature();
        }
        cfg.max_tool_rounds = cfg.max_tool_rounds.clamp(1, 16);

        Ok(cfg)
    }

    /// Load `config/ai.json`; a missing or unreadable file yields the disabled default.
    pub fn load_or_default() -> Self {
        let path = Path::new(DEFAULT_AI_CONFIG_PATH);
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "pipeline", error = ?e, "ai config unreadable; generation disabled");
                Self::default()
            }
        }
    }

    /// Chat completions endpoint for the configured provider.
    pub fn chat_url(&self) -> String {
        let base = match (&self.base_url, self.provider.as_str()) {
            (Some(b), _) => b.trim_end_matches('/').to_string(),
            (None, "openai") => "https://api.openai.com/v1".to_string(),
            (None, _) => "https://api.groq.com/openai/v1".to_string(),
        };
        format!("{base}/chat/completions")
    }
}
