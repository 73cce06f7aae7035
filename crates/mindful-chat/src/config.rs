use std::env;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::net::SocketAddr;

use mindful_chat_openai_model::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAIConfig, OpenAIConfigBuilder,
};

/// Address the server listens on when none is configured.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8501";

/// Shown when `GROQ_API_KEY` is not set.
pub const SETUP_INSTRUCTIONS: &str = "GROQ_API_KEY is not set. To fix this: \
1. Create a `.env` file in the directory you start the server from. \
2. Add your API key: `GROQ_API_KEY=your-api-key-here`. \
3. Restart the application.";

const API_KEY_VAR: &str = "GROQ_API_KEY";
const MODEL_VAR: &str = "MINDFUL_CHAT_MODEL";
const BASE_URL_VAR: &str = "MINDFUL_CHAT_BASE_URL";
const ADDR_VAR: &str = "MINDFUL_CHAT_ADDR";

/// An environment variable holds a value that cannot be used.
#[derive(Debug)]
pub struct ConfigError {
    var: &'static str,
    reason: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.var, self.reason)
    }
}

impl StdError for ConfigError {}

/// Settings of the server, read once at startup.
#[derive(Clone)]
pub struct Settings {
    api_key: Option<String>,
    model: String,
    base_url: String,
    addr: SocketAddr,
}

impl Settings {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let lookup = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let addr = lookup(ADDR_VAR).unwrap_or_else(|| DEFAULT_ADDR.to_owned());
        let addr = addr.trim().parse().map_err(|err| ConfigError {
            var: ADDR_VAR,
            reason: format!("{err}"),
        })?;

        Ok(Self {
            api_key: lookup(API_KEY_VAR).map(|key| key.trim().to_owned()),
            model: lookup(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            base_url: lookup(BASE_URL_VAR)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            addr,
        })
    }

    /// Returns `true` if an API key is available.
    #[inline]
    pub fn api_key_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Returns the model identifier.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the address to listen on.
    #[inline]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the provider configuration, or `None` without an API key.
    pub fn openai_config(&self) -> Option<OpenAIConfig> {
        let api_key = self.api_key.as_ref()?;
        Some(
            OpenAIConfigBuilder::with_api_key(api_key)
                .with_model(&self.model)
                .with_base_url(&self.base_url)
                .build(),
        )
    }
}

impl Debug for Settings {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("addr", &self.addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();
        assert!(!settings.api_key_configured());
        assert!(settings.openai_config().is_none());
        assert_eq!(settings.model(), DEFAULT_MODEL);
        assert_eq!(settings.addr(), "127.0.0.1:8501".parse().unwrap());
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("GROQ_API_KEY", "gsk_secret"),
            ("MINDFUL_CHAT_MODEL", "llama-3.1-8b-instant"),
            ("MINDFUL_CHAT_BASE_URL", "http://localhost:8080/v1/"),
            ("MINDFUL_CHAT_ADDR", "0.0.0.0:3000"),
        ])
        .unwrap();

        let config = settings.openai_config().unwrap();
        assert_eq!(config.model(), "llama-3.1-8b-instant");
        assert_eq!(config.base_url(), "http://localhost:8080/v1");
        assert_eq!(settings.addr().port(), 3000);
    }

    #[test]
    fn test_blank_api_key() {
        let settings = settings(&[("GROQ_API_KEY", "  ")]).unwrap();
        assert!(!settings.api_key_configured());
    }

    #[test]
    fn test_invalid_addr() {
        let err = settings(&[("MINDFUL_CHAT_ADDR", "nowhere")]).unwrap_err();
        assert!(err.to_string().starts_with("invalid MINDFUL_CHAT_ADDR"));
    }

    #[test]
    fn test_env_file() {
        let path = env::temp_dir()
            .join(format!("mindful-chat-{}.env", std::process::id()));
        std::fs::write(
            &path,
            "# local settings\nGROQ_API_KEY=gsk_from_file\nMINDFUL_CHAT_ADDR=\"127.0.0.1:9000\"\n",
        )
        .unwrap();
        let vars: HashMap<String, String> = dotenvy::from_path_iter(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        let settings =
            Settings::from_lookup(|var| vars.get(var).cloned()).unwrap();
        assert!(settings.api_key_configured());
        assert_eq!(settings.addr().port(), 9000);
        assert!(SETUP_INSTRUCTIONS.contains(".env"));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let settings = settings(&[("GROQ_API_KEY", "gsk_secret")]).unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("gsk_secret"));
        assert!(debug.contains("<redacted>"));
    }
}
