//! Configuration system (layered: defaults < file < env < CLI).
//!
//! A [`Config`] is built once at startup and handed to the stitcher, the
//! upstream client and the server state. Nothing reads the environment after
//! that point.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use bon::Builder;
use serde::Deserialize;

use crate::error::{DeepClaudeError, Result};

pub const DEFAULT_REASONING_MODEL: &str = "deepseek-r1";
pub const DEFAULT_ANSWER_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_MODEL_NAME: &str = "deepclaude";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Where one upstream chat-completion call is sent.
///
/// `url` is the full chat-completions endpoint, not a base URL.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpstreamEndpoint {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

impl UpstreamEndpoint {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for UpstreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamEndpoint")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

/// Runtime configuration.
///
/// # Example
/// ```
/// use deepclaude::config::{Config, UpstreamEndpoint};
///
/// let config = Config::builder()
///     .reasoning(UpstreamEndpoint::new("https://r.example/v1/chat/completions", "rk"))
///     .answer(UpstreamEndpoint::new("https://a.example/v1/chat/completions", "ak"))
///     .build();
/// assert_eq!(config.model_name, "deepclaude");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Builder)]
pub struct Config {
    /// Key clients must present as a bearer token. Auth is off when unset.
    #[builder(into)]
    pub api_key: Option<String>,
    #[builder(default)]
    pub reasoning: UpstreamEndpoint,
    #[builder(default)]
    pub answer: UpstreamEndpoint,
    #[builder(into, default = DEFAULT_REASONING_MODEL.to_owned())]
    pub reasoning_model: String,
    #[builder(into, default = DEFAULT_ANSWER_MODEL.to_owned())]
    pub answer_model: String,
    /// Model name clients ask for to get the stitched stream; also written
    /// into every outbound envelope.
    #[builder(into, default = DEFAULT_MODEL_NAME.to_owned())]
    pub model_name: String,
    #[builder(default = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
    #[builder(default = SocketAddr::from(([0, 0, 0, 0], 8000)))]
    pub listen_addr: SocketAddr,
    #[builder(into, default = DEFAULT_LOG_LEVEL.to_owned())]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("reasoning", &self.reasoning)
            .field("answer", &self.answer)
            .field("reasoning_model", &self.reasoning_model)
            .field("answer_model", &self.answer_model)
            .field("model_name", &self.model_name)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .field("listen_addr", &self.listen_addr)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

/// On-disk TOML shape. Every field is optional; unset fields keep the
/// value from the previous layer.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub listen_addr: Option<SocketAddr>,
    pub log_level: Option<String>,
    pub reasoning: Option<FilePhase>,
    pub answer: Option<FilePhase>,
}

/// Per-phase section of the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilePhase {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl Config {
    /// Defaults, then the optional TOML file, then the process environment
    /// (including a `.env` file if present).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path)?;
            config.apply_file(FileConfig::parse(&raw)?);
        }
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay values from a parsed config file.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(key) = file.api_key {
            self.api_key = Some(key);
        }
        if let Some(name) = file.model_name {
            self.model_name = name;
        }
        if let Some(max) = file.max_tokens {
            self.max_tokens = max;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(addr) = file.listen_addr {
            self.listen_addr = addr;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        if let Some(phase) = file.reasoning {
            phase.apply(&mut self.reasoning, &mut self.reasoning_model);
        }
        if let Some(phase) = file.answer {
            phase.apply(&mut self.answer, &mut self.answer_model);
        }
    }

    /// Overlay values from environment-style lookups.
    ///
    /// `BASE_API_URL`/`BASE_API_KEY` fill both phases; the `REASONING_*` and
    /// `ANSWER_*` variables override them per phase. Unparseable numeric or
    /// address values are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("BASE_API_URL");
        let base_key = lookup("BASE_API_KEY");

        if let Some(url) = lookup("REASONING_API_URL").or_else(|| base_url.clone()) {
            self.reasoning.url = url;
        }
        if let Some(key) = lookup("REASONING_API_KEY").or_else(|| base_key.clone()) {
            self.reasoning.api_key = key;
        }
        if let Some(url) = lookup("ANSWER_API_URL").or(base_url) {
            self.answer.url = url;
        }
        if let Some(key) = lookup("ANSWER_API_KEY").or(base_key) {
            self.answer.api_key = key;
        }

        if let Some(key) = lookup("API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("REASONING_MODEL") {
            self.reasoning_model = model;
        }
        if let Some(model) = lookup("ANSWER_MODEL") {
            self.answer_model = model;
        }
        if let Some(name) = lookup("MODEL_NAME") {
            self.model_name = name;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(raw) = lookup("LISTEN_ADDR") {
            match raw.parse() {
                Ok(addr) => self.listen_addr = addr,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid LISTEN_ADDR"),
            }
        }
        if let Some(raw) = lookup("REQUEST_TIMEOUT_SECS") {
            match raw.parse() {
                Ok(secs) => self.request_timeout = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid REQUEST_TIMEOUT_SECS"),
            }
        }
        if let Some(raw) = lookup("MAX_TOKENS") {
            match raw.parse() {
                Ok(max) => self.max_tokens = max,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid MAX_TOKENS"),
            }
        }
    }

    /// Check that both phases can actually be called.
    pub fn validate(&self) -> Result<()> {
        for (phase, endpoint) in [("reasoning", &self.reasoning), ("answer", &self.answer)] {
            if endpoint.url.is_empty() {
                return Err(DeepClaudeError::Configuration(format!(
                    "missing {phase} upstream URL (set BASE_API_URL or {}_API_URL)",
                    phase.to_uppercase()
                )));
            }
            reqwest::Url::parse(&endpoint.url).map_err(|e| {
                DeepClaudeError::Configuration(format!(
                    "invalid {phase} upstream URL '{}': {e}",
                    endpoint.url
                ))
            })?;
        }
        if self.reasoning_model == self.answer_model {
            return Err(DeepClaudeError::Configuration(
                "reasoning and answer model must differ".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(DeepClaudeError::Configuration(
                "max_tokens must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Whether inbound requests must carry a bearer key.
    pub fn requires_auth(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl FileConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

impl FilePhase {
    fn apply(self, endpoint: &mut UpstreamEndpoint, model: &mut String) {
        if let Some(url) = self.url {
            endpoint.url = url;
        }
        if let Some(key) = self.api_key {
            endpoint.api_key = key;
        }
        if let Some(m) = self.model {
            *model = m;
        }
    }
}
