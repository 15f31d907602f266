use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use duet_gateway::UserCredential;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuetConfig {
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub gemini: GeminiConfig,
    pub cohere: CohereConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CohereConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_cohere_base_url")]
    pub base_url: String,
}

impl std::fmt::Debug for CohereConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CohereConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn default_cohere_base_url() -> String {
    "https://api.cohere.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    #[serde(default = "default_reference_base_url")]
    pub base_url: String,
}

fn default_reference_base_url() -> String {
    "https://en.wikipedia.org/api/rest_v1".to_string()
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_reference_base_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Keywords that also route a prompt to the code-snippet fallback
    #[serde(default)]
    pub extra_code_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "~/.duet/conversations.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default)]
    pub users: Vec<GatewayUser>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("users", &self.users)
            .finish()
    }
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    18790
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            users: Vec::new(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayUser {
    pub id: String,
    #[serde(default)]
    pub token: String,
}

impl std::fmt::Debug for GatewayUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayUser")
            .field("id", &self.id)
            .field("token", &mask_secret(&self.token))
            .finish()
    }
}

impl GatewayConfig {
    /// Credentials for the gateway's identity resolver
    pub fn credentials(&self) -> Vec<UserCredential> {
        self.users
            .iter()
            .map(|u| UserCredential {
                id: u.id.clone(),
                token: u.token.clone(),
            })
            .collect()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".duet")
}

impl DuetConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                // Refuse to start if group or other can read
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `duet init` first.",
                path.display()
            )
        })?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    /// Expand allowed `${VAR}`s and parse, warning on hard-coded secrets
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content, |name| std::env::var(name).ok());
        let config: Self = toml::from_str(&expanded)?;

        if config.providers.gemini.api_key.starts_with("AIza") {
            warn!(
                "Gemini API key is hardcoded in config file. For security, use environment variables: api_key = \"${{GEMINI_API_KEY}}\""
            );
        }

        if config.providers.gemini.api_key.is_empty() {
            warn!("Gemini API key is empty; the primary provider will always come back empty");
        }
        if config.providers.cohere.api_key.is_empty() {
            warn!("Cohere API key is empty; merging and code snippets will be skipped");
        }

        Ok(config)
    }
}

/// Environment variables that may be expanded in config files, besides the
/// `DUET_USER_` prefix used for per-user gateway tokens.
const ALLOWED_ENV_VARS: &[&str] = &[
    "GEMINI_API_KEY",
    "COHERE_API_KEY",
    "DUET_GATEWAY_TOKEN",
    "HOME",
    "USER",
];

const ALLOWED_ENV_PREFIX: &str = "DUET_USER_";

fn is_allowed_env_var(name: &str) -> bool {
    ALLOWED_ENV_VARS.contains(&name)
        || (name.len() > ALLOWED_ENV_PREFIX.len() && name.starts_with(ALLOWED_ENV_PREFIX))
}

fn expand_env_vars(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !is_allowed_env_var(&var_name) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Leave the ${VAR} unexpanded so it's obvious
            pos = abs_start + end + 1;
            continue;
        }

        let value = lookup(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}

/// Mask a secret for display.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(s: &str) -> PathBuf {
    match s.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(s),
    }
}
