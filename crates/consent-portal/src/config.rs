//! Configuration loading and management

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration for the portal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Branding and navigation targets
    #[serde(default)]
    pub portal: PortalConfig,

    /// Session cookie configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Authorization server client configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Organization name shown in page headings
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Neutral landing page: signed-in visitors without a grant and rejected
    /// consents end up here
    #[serde(default = "default_landing_url")]
    pub landing_url: String,

    /// Only addresses in this domain may sign in or sign up (e.g. "ufl.edu")
    #[serde(default)]
    pub email_domain: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            organization: default_organization(),
            landing_url: default_landing_url(),
            email_domain: None,
        }
    }
}

fn default_organization() -> String {
    "Open Source Club".to_string()
}

fn default_landing_url() -> String {
    "/account".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Session cookie lifetime in seconds (default: 20 minutes)
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_secs: u64,

    /// Mark the cookie `Secure`; disable only for plain-HTTP development
    #[serde(default = "default_true")]
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            session_lifetime_secs: default_session_lifetime(),
            secure: true,
        }
    }
}

fn default_cookie_name() -> String {
    "ows-jwt".to_string()
}

fn default_session_lifetime() -> u64 {
    1200 // 20 minutes, matches the server's access token TTL
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Timeout for each call to the authorization server
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            session: SessionConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config directory
    pub fn load(config_path: &str) -> Result<Self> {
        let config_file = Path::new(config_path).join("config.json");

        if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| "Failed to parse config.json")?;
            tracing::info!("Loaded configuration from {:?}", config_file);
            Ok(config)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_file
            );
            let config = Config::default();

            // Create config directory if it doesn't exist
            std::fs::create_dir_all(config_path)
                .with_context(|| format!("Failed to create config directory: {}", config_path))?;

            // Write default config for reference
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            Ok(config)
        }
    }
}
