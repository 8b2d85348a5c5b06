//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPCHAT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ANTHROPIC_API_KEY` - Anthropic Claude API key
//! - `OPENAI_API_KEY` - `OpenAI` API key (query and item embeddings)
//!
//! ## Optional
//! - `SHOPCHAT_HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8000)
//! - `CLAUDE_MODEL` - Claude model ID (default: claude-sonnet-4-20250514)
//! - `CLAUDE_MAX_TOKENS` - Response token limit (default: 4096)
//! - `EMBEDDING_MODEL` - `OpenAI` embedding model (default: text-embedding-3-small).
//!   Must produce 1536-dimension vectors to fit the `embedding` column, so only
//!   `text-embedding-3-small` and `text-embedding-ada-002` are accepted.
//! - `VECTOR_MIN_SIMILARITY` - Cosine similarity floor for semantic matches (default: 0.25)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.25;
const DEFAULT_PORT: &str = "8000";

/// Embedding models producing the 1536-dimension vectors stored by the
/// inventory table.
pub const SUPPORTED_EMBEDDING_MODELS: &[&str] = &["text-embedding-3-small", "text-embedding-ada-002"];

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Claude AI configuration
    pub claude: ClaudeConfig,
    /// `OpenAI` configuration for embeddings
    pub openai: OpenAIConfig,
    /// Semantic search tuning
    pub search: SearchConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Claude AI API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ClaudeConfig {
    /// Anthropic API key
    pub api_key: SecretString,
    /// Model ID (e.g., claude-sonnet-4-20250514)
    pub model: String,
    /// Maximum tokens per response
    pub max_tokens: u32,
}

impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// `OpenAI` API configuration for embeddings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct OpenAIConfig {
    /// `OpenAI` API key
    pub api_key: SecretString,
    /// Embedding model name
    pub embedding_model: String,
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"[REDACTED]")
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

/// Inventory search tuning.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Semantic matches scoring below this cosine similarity are discarded,
    /// which lets the text fallback take over for unrelated queries.
    pub min_similarity: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// look like placeholder secrets.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SHOPCHAT_DATABASE_URL")?;
        let host = parse_env("SHOPCHAT_HOST", "0.0.0.0")?;
        let port = parse_env("PORT", DEFAULT_PORT)?;

        let claude = ClaudeConfig::from_env()?;
        let openai = OpenAIConfig::from_env()?;
        let search = SearchConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            claude,
            openai,
            search,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ClaudeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_validated_secret("ANTHROPIC_API_KEY")?,
            model: get_env_or_default("CLAUDE_MODEL", DEFAULT_CLAUDE_MODEL),
            max_tokens: parse_env("CLAUDE_MAX_TOKENS", &DEFAULT_MAX_TOKENS.to_string())?,
        })
    }
}

impl OpenAIConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let embedding_model = get_env_or_default("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL);
        validate_embedding_model(&embedding_model)?;
        Ok(Self {
            api_key: get_validated_secret("OPENAI_API_KEY")?,
            embedding_model,
        })
    }
}

impl SearchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let min_similarity: f64 = parse_env(
            "VECTOR_MIN_SIMILARITY",
            &DEFAULT_MIN_SIMILARITY.to_string(),
        )?;
        validate_similarity(min_similarity)?;
        Ok(Self { min_similarity })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn validate_similarity(value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            "VECTOR_MIN_SIMILARITY".to_string(),
            format!("must be between 0 and 1 (got {value})"),
        ))
    }
}

/// Reject embedding models whose vectors would not fit the inventory table.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for models outside
/// [`SUPPORTED_EMBEDDING_MODELS`].
pub fn validate_embedding_model(model: &str) -> Result<(), ConfigError> {
    if SUPPORTED_EMBEDDING_MODELS.contains(&model) {
        return Ok(());
    }
    Err(ConfigError::InvalidEnvVar(
        "EMBEDDING_MODEL".to_string(),
        format!(
            "{model} does not produce 1536-dimension vectors (supported: {})",
            SUPPORTED_EMBEDDING_MODELS.join(", ")
        ),
    ))
}

/// Reject secrets that are obviously unfilled placeholders.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.trim().is_empty() {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "is empty".to_string(),
        ));
    }

    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/shopchat"),
            host: "127.0.0.1".parse().expect("valid ip"),
            port: 8000,
            claude: ClaudeConfig {
                api_key: SecretString::from("sk-ant-super-secret-key"),
                model: DEFAULT_CLAUDE_MODEL.to_string(),
                max_tokens: DEFAULT_MAX_TOKENS,
            },
            openai: OpenAIConfig {
                api_key: SecretString::from("sk-openai-super-secret"),
                embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            },
            search: SearchConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_default_port_parses() {
        let port: u16 = DEFAULT_PORT.parse().expect("valid port");
        assert_eq!(port, 8000);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-api-key-here", "TEST_VAR")
            .expect_err("placeholder should be rejected");
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_empty() {
        assert!(validate_secret_strength("   ", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("sk-ant-api03-Zk9QwL2mXv", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_similarity_bounds() {
        assert!(validate_similarity(0.0).is_ok());
        assert!(validate_similarity(1.0).is_ok());
        assert!(validate_similarity(-0.1).is_err());
        assert!(validate_similarity(1.5).is_err());
    }

    #[test]
    fn test_embedding_model_must_fit_vector_column() {
        assert!(validate_embedding_model(DEFAULT_EMBEDDING_MODEL).is_ok());
        assert!(validate_embedding_model("text-embedding-ada-002").is_ok());

        let err = validate_embedding_model("text-embedding-3-large").expect_err("3072 dimensions");
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "EMBEDDING_MODEL"));
        assert!(err.to_string().contains("1536"));
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_config());

        assert!(debug_output.contains(DEFAULT_CLAUDE_MODEL));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk-ant-super-secret-key"));
        assert!(!debug_output.contains("sk-openai-super-secret"));
    }
}
