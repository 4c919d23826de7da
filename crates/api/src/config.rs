use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub audience: AudienceConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub identity_provider: IdentityProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Must exceed the analysis stage bounds or long analyses are cut off.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Where entitlements and saved reports live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Analysis requests per client per minute. 0 disables the limit.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Language the model is asked to answer in.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_stage_timeout")]
    pub page_timeout_secs: u64,

    #[serde(default = "default_stage_timeout")]
    pub generation_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            page_timeout_secs: default_stage_timeout(),
            generation_timeout_secs: default_stage_timeout(),
        }
    }
}

/// OpenAI-compatible chat completion backend.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_openai_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Overrides the built-in system prompt when non-empty.
    #[serde(default)]
    pub system_prompt: String,
}

/// Best-effort monthly visitor lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct AudienceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_audience_base_url")]
    pub base_url: String,

    #[serde(default = "default_audience_timeout")]
    pub timeout_secs: u64,
}

impl Default for AudienceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_audience_base_url(),
            timeout_secs: default_audience_timeout(),
        }
    }
}

/// Verification of identity-provider bearer tokens.
///
/// `public_key` (RS256) takes precedence over `hs256_secret`. With neither
/// set, the report endpoints reject every request.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub public_key: String,

    #[serde(default)]
    pub hs256_secret: String,

    #[serde(default)]
    pub issuer: String,

    #[serde(default)]
    pub audience: String,

    #[serde(default = "default_roles_claim")]
    pub roles_claim: String,

    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            hs256_secret: String::new(),
            issuer: String::new(),
            audience: String::new(),
            roles_claim: default_roles_claim(),
            leeway_secs: default_jwt_leeway(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Shared secret for `X-Signature` on payment webhooks.
    #[serde(default)]
    pub webhook_secret: String,

    /// Confirms checkout plans immediately, without a payment webhook.
    #[serde(default)]
    pub simulate_payments: bool,

    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            webhook_secret: String::new(),
            simulate_payments: false,
            app_base_url: default_app_base_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Key required to grant admin override. Empty disables granting.
    #[serde(default)]
    pub admin_key: String,
}

/// Management API of the identity provider, used to push plan changes.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProviderConfig {
    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub api_token: String,

    #[serde(default = "default_identity_timeout")]
    pub timeout_secs: u64,
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            api_token: String::new(),
            timeout_secs: default_identity_timeout(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_request_timeout() -> u64 {
    120
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_rate_limit() -> u32 {
    30
}
fn default_language() -> String {
    domain::services::DEFAULT_LANGUAGE.to_string()
}
fn default_stage_timeout() -> u64 {
    30
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}
fn default_audience_base_url() -> String {
    "https://www.similarweb.com".to_string()
}
fn default_audience_timeout() -> u64 {
    10
}
fn default_roles_claim() -> String {
    shared::jwt::DEFAULT_ROLES_CLAIM.to_string()
}
fn default_jwt_leeway() -> u64 {
    shared::jwt::DEFAULT_LEEWAY_SECS
}
fn default_app_base_url() -> String {
    "http://localhost:5173".to_string()
}
fn default_identity_timeout() -> u64 {
    10
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with SI__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("SI").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// This method creates a config entirely from defaults and overrides,
    /// without relying on config files (which may not be accessible during tests).
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        // Embed defaults directly to avoid file system dependency in tests
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8000
            request_timeout_secs = 120

            [storage]
            backend = "memory"

            [database]
            url = ""
            max_connections = 20
            min_connections = 2
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            rate_limit_per_minute = 30

            [analysis]
            language = "Swedish"
            page_timeout_secs = 30
            generation_timeout_secs = 30

            [openai]
            api_key = ""
            base_url = "https://api.openai.com/v1"
            model = "gpt-3.5-turbo"
            max_tokens = 1000
            temperature = 0.7

            [audience]
            enabled = false

            [billing]
            webhook_secret = ""
            simulate_payments = false
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        // Without a generation key no analysis can run
        if self.openai.api_key.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "SI__OPENAI__API_KEY environment variable must be set".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Postgres && self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "SI__DATABASE__URL must be set when storage.backend is postgres".to_string(),
            ));
        }

        // Validate port range
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        // Validate connection pool settings
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.analysis.page_timeout_secs == 0 || self.analysis.generation_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "analysis stage timeouts must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .expect("Invalid socket address")
    }

    /// Pool settings in the shape the persistence crate expects.
    pub fn pool_config(&self) -> persistence::db::PoolSettings {
        persistence::db::PoolSettings {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            connect_timeout_secs: self.database.connect_timeout_secs,
            idle_timeout_secs: self.database.idle_timeout_secs,
        }
    }
}
