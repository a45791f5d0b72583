//! Configuration module for taskwise.
//!
//! Loads typed configuration from `./config.json` or `~/.taskwise/config.json`
//! and then lets environment variables override the LLM settings.
//! All fields use `serde` defaults, so a missing file or an empty object is a
//! valid configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Default Groq endpoint (OpenAI-compatible).
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Default local Ollama daemon.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration.
    ///
    /// Priority:
    /// 1. local `config.json` in current directory
    /// 2. `~/.taskwise/config.json`
    ///
    /// Environment overrides are applied on top of whichever source wins.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match Self::source_path() {
            Some(path) => {
                debug!("Loading config from: {}", path.display());
                Self::load_from(&path)?
            }
            None => Config::default(),
        };

        config.llm.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Candidate config files, in the order `load` tries them.
    pub fn search_paths() -> [PathBuf; 2] {
        [PathBuf::from("config.json"), Self::default_path()]
    }

    /// The file `load` would read, if any exists.
    pub fn source_path() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.exists())
    }

    /// Load configuration from a specific path, without environment overrides.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the default config file path (`~/.taskwise/config.json`).
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Get the default config directory path.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".taskwise")
    }

    /// Write the default config template to disk.
    pub fn write_default_template() -> anyhow::Result<PathBuf> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = serde_json::json!({
            "llm": {
                "provider": "groq",
                "temperature": 0.7,
                "maxTokens": 1024,
                "groq": {
                    "apiKey": "gsk_YOUR_KEY_HERE",
                    "model": "llama-3.1-70b-versatile"
                },
                "ollama": {
                    "baseUrl": OLLAMA_BASE_URL,
                    "model": "llama3"
                }
            }
        });

        std::fs::write(&path, serde_json::to_string_pretty(&template)?)?;
        Ok(path)
    }

    /// Check the configuration for values that would make every LLM call fail.
    ///
    /// Returns a list of human-readable problems, or `Ok(())` if none.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let llm = &self.llm;

        if !(0.0..=2.0).contains(&llm.temperature) {
            errors.push(format!(
                "llm.temperature must be between 0 and 2 (got {}).",
                llm.temperature
            ));
        }
        if llm.max_tokens == 0 {
            errors.push("llm.maxTokens must be greater than zero.".into());
        }
        if llm.ollama.model.is_empty() {
            errors.push("llm.ollama.model is empty. Specify a local model name.".into());
        }
        if llm.ollama.base_url.is_empty() {
            errors.push("llm.ollama.baseUrl is empty.".into());
        }
        if llm.provider == ProviderKind::Groq {
            if llm.groq.model.is_empty() {
                errors.push("llm.groq.model is empty. Specify a model name.".into());
            }
            if llm.groq.api_key.contains("YOUR_") {
                errors.push(
                    "llm.groq.apiKey is still the template placeholder. \
                     Replace it or set GROQ_API_KEY."
                        .into(),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

// ── LLM Configuration ───────────────────────────────────────────────

/// Which backend should serve as the primary provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Groq,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::Ollama => "ollama",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown LLM provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub temperature: f32,
    pub max_tokens: u32,
    pub groq: GroqConfig,
    pub ollama: OllamaConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Groq,
            temperature: 0.7,
            max_tokens: 1024,
            groq: GroqConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Whether the remote provider can be used as primary.
    pub fn use_remote_primary(&self) -> bool {
        self.provider == ProviderKind::Groq && !self.groq.api_key.trim().is_empty()
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LLM_PROVIDER") {
            match v.parse() {
                Ok(kind) => self.provider = kind,
                Err(e) => warn!(value = %v, "Ignoring LLM_PROVIDER: {}", e),
            }
        }
        if let Some(key) = lookup("GROQ_API_KEY") {
            info!("Using Groq API key from environment variable");
            self.groq.api_key = key;
        }
        if let Some(model) = lookup("GROQ_MODEL") {
            self.groq.model = model;
        }
        if let Some(base) = lookup("GROQ_API_BASE") {
            self.groq.api_base = Some(base);
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.ollama.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(v) = lookup("LLM_TEMPERATURE") {
            match v.trim().parse() {
                Ok(t) => self.temperature = t,
                Err(_) => warn!(value = %v, "Ignoring unparseable LLM_TEMPERATURE"),
            }
        }
        if let Some(v) = lookup("LLM_MAX_TOKENS") {
            match v.trim().parse() {
                Ok(n) => self.max_tokens = n,
                Err(_) => warn!(value = %v, "Ignoring unparseable LLM_MAX_TOKENS"),
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroqConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: "llama-3.1-70b-versatile".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: OLLAMA_BASE_URL.into(),
            model: "llama3".into(),
        }
    }
}
