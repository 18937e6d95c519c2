//! Gateway configuration loaded from the environment

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::{jwt::JwtConfig, llm::LlmConfig, rate_limiter::RateLimiterConfig};

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP listener binds to
    pub bind_address: String,
    /// Port the HTTP listener binds to
    pub port: u16,
    pub jwt: JwtConfig,
    pub llm: LlmConfig,
    pub rate_limit: RateLimiterConfig,
}

/// Flat view of the environment variables
#[derive(Debug, Deserialize)]
struct RawConfig {
    bind_address: String,
    port: u16,
    jwt_secret: Option<String>,
    jwt_expires_in: String,
    llm_api_key: Option<String>,
    llm_base_url: String,
    llm_model: String,
    llm_temperature: f32,
    llm_max_tokens: u32,
    rate_limit_max_requests: u32,
    rate_limit_window_seconds: u64,
    rate_limit_ban_seconds: u64,
    rate_limit_trust_proxy: bool,
}

impl GatewayConfig {
    /// Create a new GatewayConfig from environment variables
    ///
    /// # Environment Variables
    /// - `BIND_ADDRESS`: listener address (default: "0.0.0.0")
    /// - `PORT`: listener port (default: 3001)
    /// - `JWT_SECRET`: HMAC secret for signing tokens (required)
    /// - `JWT_EXPIRES_IN`: token lifetime such as "7d", "12h", "900" (default: "7d")
    /// - `LLM_API_KEY`: completion API key (optional, generation fails in-stream without it)
    /// - `LLM_BASE_URL`: completion API base URL (default: "https://models.inference.ai.azure.com")
    /// - `LLM_MODEL`: model name (default: "gpt-4o-mini")
    /// - `LLM_TEMPERATURE`: sampling temperature (default: 0.3)
    /// - `LLM_MAX_TOKENS`: output token budget (default: 4000)
    /// - `RATE_LIMIT_MAX_REQUESTS`: requests per window and client (default: 20)
    /// - `RATE_LIMIT_WINDOW_SECONDS`: throttle window (default: 60)
    /// - `RATE_LIMIT_BAN_SECONDS`: lockout once the limit is hit (default: 60)
    /// - `RATE_LIMIT_TRUST_PROXY`: key clients on `X-Forwarded-For` (default: false)
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig = Config::builder()
            .set_default("bind_address", "0.0.0.0")?
            .set_default("port", 3001)?
            .set_default("jwt_expires_in", "7d")?
            .set_default("llm_base_url", "https://models.inference.ai.azure.com")?
            .set_default("llm_model", "gpt-4o-mini")?
            .set_default("llm_temperature", 0.3)?
            .set_default("llm_max_tokens", 4000)?
            .set_default("rate_limit_max_requests", 20)?
            .set_default("rate_limit_window_seconds", 60)?
            .set_default("rate_limit_ban_seconds", 60)?
            .set_default("rate_limit_trust_proxy", false)?
            .add_source(Environment::default().try_parsing(true))
            .build()
            .context("Failed to read gateway configuration")?
            .try_deserialize()
            .context("Invalid gateway configuration")?;

        let secret = raw
            .jwt_secret
            .filter(|secret| !secret.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        let expires_in = parse_duration_secs(&raw.jwt_expires_in)
            .with_context(|| format!("Invalid JWT_EXPIRES_IN value: {}", raw.jwt_expires_in))?;

        Ok(GatewayConfig {
            bind_address: raw.bind_address,
            port: raw.port,
            jwt: JwtConfig { secret, expires_in },
            llm: LlmConfig {
                api_key: raw.llm_api_key.filter(|key| !key.trim().is_empty()),
                base_url: raw.llm_base_url,
                model: raw.llm_model,
                temperature: raw.llm_temperature,
                max_tokens: raw.llm_max_tokens,
            },
            rate_limit: RateLimiterConfig {
                max_attempts: raw.rate_limit_max_requests,
                window_seconds: raw.rate_limit_window_seconds,
                ban_duration_seconds: raw.rate_limit_ban_seconds,
                trust_forwarded_for: raw.rate_limit_trust_proxy,
            },
        })
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Parse a lifetime such as "7d", "12h", "30m", "45s" or "900" into seconds
pub fn parse_duration_secs(value: &str) -> Result<u64> {
    let value = value.trim();
    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 'd')) => (&value[..idx], 86_400),
        Some((idx, 'h')) => (&value[..idx], 3_600),
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 's')) => (&value[..idx], 1),
        Some(_) => (value, 1),
        None => anyhow::bail!("empty duration"),
    };

    let amount: u64 = digits
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a whole number", digits))?;

    if amount == 0 {
        anyhow::bail!("duration must be positive");
    }

    amount
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("duration is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "JWT_SECRET",
        "JWT_EXPIRES_IN",
        "PORT",
        "LLM_API_KEY",
        "LLM_TEMPERATURE",
        "RATE_LIMIT_TRUST_PROXY",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration_secs("7d").unwrap(), 604_800);
        assert_eq!(parse_duration_secs("12h").unwrap(), 43_200);
        assert_eq!(parse_duration_secs("30m").unwrap(), 1_800);
        assert_eq!(parse_duration_secs("45s").unwrap(), 45);
        assert_eq!(parse_duration_secs("900").unwrap(), 900);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration_secs("").is_err());
        assert!(parse_duration_secs("0").is_err());
        assert!(parse_duration_secs("soon").is_err());
        assert!(parse_duration_secs("-5m").is_err());
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env();
        unsafe {
            std::env::set_var("JWT_SECRET", "test-secret");
        }

        let config = GatewayConfig::from_env().unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.jwt.secret, "test-secret");
        assert_eq!(config.jwt.expires_in, 604_800);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 4000);
        assert!((config.llm.temperature - 0.3).abs() < f32::EPSILON);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.rate_limit.max_attempts, 20);
        assert!(!config.rate_limit.trust_forwarded_for);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_from_env_with_custom_values() {
        clear_env();
        unsafe {
            std::env::set_var("JWT_SECRET", "test-secret");
            std::env::set_var("JWT_EXPIRES_IN", "2h");
            std::env::set_var("PORT", "8080");
            std::env::set_var("LLM_API_KEY", "sk-test");
            std::env::set_var("LLM_TEMPERATURE", "0.7");
            std::env::set_var("RATE_LIMIT_TRUST_PROXY", "true");
        }

        let config = GatewayConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt.expires_in, 7_200);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.listen_address(), "0.0.0.0:8080");
        assert!(config.rate_limit.trust_forwarded_for);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_requires_jwt_secret() {
        clear_env();
        let error = GatewayConfig::from_env().unwrap_err();
        assert!(error.to_string().contains("JWT_SECRET"));
    }
}
