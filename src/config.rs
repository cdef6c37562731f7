use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::executor::DEFAULT_TIMEOUT;
use crate::llm::ContextMode;

pub const DEEPSEEK_API_KEY: &str = "DEEPSEEK_API_KEY";
pub const GOOGLE_AI_API_KEY: &str = "GOOGLE_AI_API_KEY";
pub const DEEPSEEK_API_BASE_URL: &str = "DEEPSEEK_API_BASE_URL";
pub const GEMINI_API_BASE_URL: &str = "GEMINI_API_BASE_URL";
pub const ENABLE_TOOLS: &str = "ENABLE_TOOLS";
pub const REASONING_TIMEOUT_SECS: &str = "REASONING_TIMEOUT_SECS";
pub const GEMINI_CONTEXT_MODE: &str = "GEMINI_CONTEXT_MODE";

/// Allow-list of gate keys read from `ENABLE_TOOLS`.
///
/// An unset or empty value enables everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolFilter {
    allowed: Option<Vec<String>>,
}

impl ToolFilter {
    pub fn allow_all() -> Self {
        Self { allowed: None }
    }

    pub fn parse(raw: Option<&str>) -> Self {
        let entries = raw
            .unwrap_or_default()
            .split(',')
            .map(str::to_string)
            .collect::<Vec<_>>();

        // Splitting "" yields [""], which means no filter.
        if entries.len() == 1 && entries[0].is_empty() {
            return Self::allow_all();
        }

        Self {
            allowed: Some(entries),
        }
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(allowed) => allowed.iter().any(|entry| entry == key),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub deepseek_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub deepseek_base_url: Option<String>,
    pub gemini_base_url: Option<String>,
    pub tool_filter: ToolFilter,
    pub timeout: Duration,
    pub context_mode: ContextMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            deepseek_api_key: None,
            google_api_key: None,
            deepseek_base_url: None,
            gemini_base_url: None,
            tool_filter: ToolFilter::allow_all(),
            timeout: DEFAULT_TIMEOUT,
            context_mode: ContextMode::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let timeout = match get(REASONING_TIMEOUT_SECS).map(|raw| raw.parse::<u64>()) {
            Some(Ok(seconds)) if seconds > 0 => Duration::from_secs(seconds),
            Some(_) => {
                warn!("{REASONING_TIMEOUT_SECS} must be a positive integer, using default");
                DEFAULT_TIMEOUT
            }
            None => DEFAULT_TIMEOUT,
        };

        let context_mode = match get(GEMINI_CONTEXT_MODE).map(|raw| raw.parse::<ContextMode>()) {
            Some(Ok(mode)) => mode,
            Some(Err(err)) => {
                warn!("{GEMINI_CONTEXT_MODE}: {err}, using default");
                ContextMode::default()
            }
            None => ContextMode::default(),
        };

        Self {
            deepseek_api_key: get(DEEPSEEK_API_KEY),
            google_api_key: get(GOOGLE_AI_API_KEY),
            deepseek_base_url: get(DEEPSEEK_API_BASE_URL),
            gemini_base_url: get(GEMINI_API_BASE_URL),
            tool_filter: ToolFilter::parse(lookup(ENABLE_TOOLS).as_deref()),
            timeout,
            context_mode,
        }
    }
}

/// Loads an env file into the process environment. A missing or unreadable
/// file is reported and otherwise ignored.
pub fn load_env_file(path: &Path) {
    match dotenvy::from_path(path) {
        Ok(()) => info!(path = %path.display(), "loaded environment file"),
        Err(err) => warn!(path = %path.display(), error = %err, "could not load environment file"),
    }
}
