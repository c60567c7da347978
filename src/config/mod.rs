use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Service configuration.
///
/// Non-secret tuning lives in an optional TOML file; deployment secrets
/// (webhook secret, OAuth credentials, OpenAI key) are overlaid from the
/// environment so they never have to touch disk.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub zoom: ZoomConfig,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    /// Shared secret token for webhook signature verification.
    pub webhook_secret: String,
    pub client_id: String,
    pub client_secret: String,
    /// Required for the account_credentials grant.
    pub account_id: Option<String>,
    pub grant: OAuthGrant,
    pub api_base: String,
    pub oauth_token_url: String,
    /// Ordered auth strategies for webhook-embedded download URLs. The exact
    /// combination Zoom honors is deployment-dependent, so it stays config.
    pub download_auth: Vec<DownloadAuth>,
}

/// Grant style for the server-to-server token exchange. Scope requirements
/// differ per deployment, so both styles are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthGrant {
    AccountCredentials,
    ClientCredentials,
}

/// A single credential-presentation strategy for recording downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadAuth {
    BearerHeader,
    AccessTokenQuery,
    PasscodeQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub chat_model: String,
    pub transcription_model: String,
    pub language: String,
    pub api_base: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            webhook_secret: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            account_id: None,
            grant: OAuthGrant::AccountCredentials,
            api_base: "https://api.zoom.us/v2".to_string(),
            oauth_token_url: "https://zoom.us/oauth/token".to_string(),
            download_auth: vec![
                DownloadAuth::BearerHeader,
                DownloadAuth::AccessTokenQuery,
                DownloadAuth::PasscodeQuery,
            ],
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            chat_model: "gpt-4o".to_string(),
            transcription_model: "whisper-1".to_string(),
            language: "en".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl Config {
    /// Loads the TOML config file if one exists, then overlays environment
    /// variables for secrets and the listen port.
    pub fn load() -> Result<Self> {
        let config_path = global::config_file()?;
        let mut config = if config_path.exists() {
            let config = Self::load_file(&config_path)?;
            info!("Loaded config from {:?}", config_path);
            config
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Overlays deployment secrets from a key lookup (the environment in
    /// production, a plain map in tests).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup("ZOOM_WEBHOOK_SECRET_TOKEN") {
            self.zoom.webhook_secret = secret;
        }
        if let Some(client_id) = lookup("ZOOM_CLIENT_ID") {
            self.zoom.client_id = client_id;
        }
        if let Some(client_secret) = lookup("ZOOM_CLIENT_SECRET") {
            self.zoom.client_secret = client_secret;
        }
        if let Some(account_id) = lookup("ZOOM_ACCOUNT_ID") {
            self.zoom.account_id = Some(account_id);
            self.zoom.grant = OAuthGrant::AccountCredentials;
        }
        if let Some(api_key) = lookup("OPENAI_API_KEY") {
            self.openai.api_key = Some(api_key);
        }
        if let Some(model) = lookup("OPENAI_CHAT_MODEL") {
            self.openai.chat_model = model;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.zoom.grant, OAuthGrant::AccountCredentials);
        assert_eq!(config.zoom.download_auth[0], DownloadAuth::BearerHeader);
        assert_eq!(config.openai.transcription_model, "whisper-1");
        assert!(config.openai.api_key.is_none());
    }

    #[test]
    fn test_env_overlay() {
        let mut config = Config::default();
        let env = HashMap::from([
            ("ZOOM_WEBHOOK_SECRET_TOKEN", "whsec"),
            ("ZOOM_CLIENT_ID", "client"),
            ("ZOOM_CLIENT_SECRET", "secret"),
            ("ZOOM_ACCOUNT_ID", "acct"),
            ("OPENAI_API_KEY", "sk-test"),
            ("PORT", "8080"),
        ]);

        config.apply_overrides(lookup_from(&env));

        assert_eq!(config.zoom.webhook_secret, "whsec");
        assert_eq!(config.zoom.account_id.as_deref(), Some("acct"));
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_overlay_ignores_unparsable_port() {
        let mut config = Config::default();
        let env = HashMap::from([("PORT", "not-a-port")]);
        config.apply_overrides(lookup_from(&env));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.zoom.download_auth, config.zoom.download_auth);
    }
}
