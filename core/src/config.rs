use crate::errors::{KbChatError, KbChatResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Foundation model used when none is configured
pub const DEFAULT_MODEL_ARN: &str =
    "arn:aws:bedrock:us-east-1::foundation-model/anthropic.claude-3-5-sonnet-20240620-v1:0";
/// Low temperature keeps answers close to the retrieved documents
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Layered configuration for the knowledge base chat.
///
/// Every field is optional so that defaults, the config file, the environment
/// and command-line flags can be merged before validation.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct KbChatConfig {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub knowledge_base_id: Option<String>,
    pub model_arn: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub endpoint_url: Option<String>,
    pub log_level: Option<String>,
}

impl KbChatConfig {
    /// Built-in defaults for the non-secret fields
    pub fn with_defaults() -> Self {
        Self {
            model_arn: Some(DEFAULT_MODEL_ARN.to_string()),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            log_level: Some("warn".to_string()),
            ..Self::default()
        }
    }

    /// Loads configuration from a file if it exists, otherwise returns an empty config
    pub fn load_from_file(path: &Path) -> KbChatResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            KbChatError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content)
            .map_err(|e| KbChatError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Reads the well-known environment variables through `lookup`.
    ///
    /// Taking the lookup as a closure keeps tests away from process-wide state.
    pub fn from_env_with<F>(lookup: F) -> KbChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let temperature = match get("KBCHAT_TEMPERATURE") {
            Some(raw) => Some(raw.trim().parse::<f32>().map_err(|e| {
                KbChatError::ConfigError(format!("Invalid KBCHAT_TEMPERATURE '{}': {}", raw, e))
            })?),
            None => None,
        };
        let max_tokens = match get("KBCHAT_MAX_TOKENS") {
            Some(raw) => Some(raw.trim().parse::<u32>().map_err(|e| {
                KbChatError::ConfigError(format!("Invalid KBCHAT_MAX_TOKENS '{}': {}", raw, e))
            })?),
            None => None,
        };

        Ok(Self {
            region: get("AWS_REGION").or_else(|| get("AWS_DEFAULT_REGION")),
            access_key_id: get("AWS_ACCESS_KEY_ID"),
            secret_access_key: get("AWS_SECRET_ACCESS_KEY"),
            session_token: get("AWS_SESSION_TOKEN"),
            knowledge_base_id: get("KNOWLEDGE_BASE_ID"),
            model_arn: get("MODEL_ARN"),
            temperature,
            max_tokens,
            endpoint_url: get("KBCHAT_ENDPOINT_URL"),
            log_level: None,
        })
    }

    /// Reads the process environment
    pub fn from_env() -> KbChatResult<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            region: other.region.clone().or_else(|| self.region.clone()),
            access_key_id: other
                .access_key_id
                .clone()
                .or_else(|| self.access_key_id.clone()),
            secret_access_key: other
                .secret_access_key
                .clone()
                .or_else(|| self.secret_access_key.clone()),
            session_token: other
                .session_token
                .clone()
                .or_else(|| self.session_token.clone()),
            knowledge_base_id: other
                .knowledge_base_id
                .clone()
                .or_else(|| self.knowledge_base_id.clone()),
            model_arn: other.model_arn.clone().or_else(|| self.model_arn.clone()),
            temperature: other.temperature.or(self.temperature),
            max_tokens: other.max_tokens.or(self.max_tokens),
            endpoint_url: other
                .endpoint_url
                .clone()
                .or_else(|| self.endpoint_url.clone()),
            log_level: other.log_level.clone().or_else(|| self.log_level.clone()),
        }
    }

    /// Checks that every required field is present and returns the settings
    /// the client needs. All missing fields are reported at once.
    pub fn validate(&self) -> KbChatResult<BedrockSettings> {
        fn present(value: &Option<String>) -> Option<String> {
            value
                .as_ref()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        let region = present(&self.region);
        let access_key_id = present(&self.access_key_id);
        let secret_access_key = present(&self.secret_access_key);
        let knowledge_base_id = present(&self.knowledge_base_id);

        let missing: Vec<&str> = [
            ("region (AWS_REGION)", region.is_none()),
            ("access_key_id (AWS_ACCESS_KEY_ID)", access_key_id.is_none()),
            (
                "secret_access_key (AWS_SECRET_ACCESS_KEY)",
                secret_access_key.is_none(),
            ),
            (
                "knowledge_base_id (KNOWLEDGE_BASE_ID)",
                knowledge_base_id.is_none(),
            ),
        ]
        .iter()
        .filter(|(_, is_missing)| *is_missing)
        .map(|(name, _)| *name)
        .collect();

        let (Some(region), Some(access_key_id), Some(secret_access_key), Some(knowledge_base_id)) =
            (region, access_key_id, secret_access_key, knowledge_base_id)
        else {
            return Err(KbChatError::ConfigError(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            )));
        };

        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(KbChatError::ConfigError(format!(
                "temperature must be between 0 and 1, got {}",
                temperature
            )));
        }

        let max_tokens = self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        if max_tokens == 0 {
            return Err(KbChatError::ConfigError(
                "max_tokens must be greater than zero".to_string(),
            ));
        }

        Ok(BedrockSettings {
            credentials: AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token: present(&self.session_token),
            },
            endpoint_url: present(&self.endpoint_url)
                .unwrap_or_else(|| default_endpoint(&region)),
            region,
            knowledge_base_id,
            model_arn: present(&self.model_arn).unwrap_or_else(|| DEFAULT_MODEL_ARN.to_string()),
            temperature,
            max_tokens,
        })
    }
}

/// Static credentials passed through to request signing
#[derive(Clone, PartialEq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &mask_secret(&self.access_key_id))
            .field("secret_access_key", &"****")
            .field("session_token", &self.session_token.as_ref().map(|_| "****"))
            .finish()
    }
}

/// Validated configuration for the Bedrock knowledge base client
#[derive(Debug, Clone, PartialEq)]
pub struct BedrockSettings {
    pub region: String,
    pub credentials: AwsCredentials,
    pub knowledge_base_id: String,
    pub model_arn: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub endpoint_url: String,
}

/// Regional endpoint of the Bedrock agent runtime
pub fn default_endpoint(region: &str) -> String {
    format!("https://bedrock-agent-runtime.{}.amazonaws.com", region)
}

/// Shows the first four characters of a secret, enough to tell keys apart
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() > 4 {
        format!("{}****", visible)
    } else {
        "****".to_string()
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> KbChatResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        KbChatError::ConfigError("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> KbChatResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}
