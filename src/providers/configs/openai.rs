use super::base::ProviderConfig;
use anyhow::Result;

pub const OPENAI_DEFAULT_HOST: &str = "https://api.openai.com";

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    /// Base URL without a trailing slash; request paths are appended to it.
    pub host: String,
}

impl OpenAiProviderConfig {
    pub fn new(api_key: String, host: String) -> Self {
        Self {
            api_key,
            host: normalize_host(&host),
        }
    }

    /// Replace the host when one is given, as `--host` does.
    pub fn with_host(self, host: Option<String>) -> Self {
        match host {
            Some(host) => Self::new(self.api_key, host),
            None => self,
        }
    }
}

impl ProviderConfig for OpenAiProviderConfig {
    fn from_env() -> Result<Self> {
        let api_key = Self::get_env("OPENAI_API_KEY", true, None)?
            .ok_or_else(|| anyhow::anyhow!("OpenAI API key should be present"))?;

        let host = Self::get_env("OPENAI_API_HOST", false, None)?
            .unwrap_or_else(|| OPENAI_DEFAULT_HOST.to_string());

        Ok(Self::new(api_key, host))
    }
}

/// Blank hosts fall back to the public API.
fn normalize_host(host: &str) -> String {
    match host.trim().trim_end_matches('/') {
        "" => OPENAI_DEFAULT_HOST.to_string(),
        host => host.to_string(),
    }
}
