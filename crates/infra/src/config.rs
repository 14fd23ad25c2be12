//! Runtime configuration, loaded from `HOURBRIDGE_*` environment variables.

use anyhow::{Context, Result, bail};
use chrono::Duration;

use hourbridge_auth::{JwtSettings, ResolverSettings};

pub const DEV_JWT_SECRET: &str = "hourbridge-insecure-dev-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEnv {
    JwtSecret,
    JwtIssuer,
    JwtMaxLifetimeMinutes,
    TokenTtlMinutes,
    HmacSkewSeconds,
    AllowQueryApiKey,
    ConfigCacheTtlSeconds,
    PartnershipCacheTtlSeconds,
    AuditRetentionDays,
}

impl ConfigEnv {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JwtSecret => "HOURBRIDGE_JWT_SECRET",
            Self::JwtIssuer => "HOURBRIDGE_JWT_ISSUER",
            Self::JwtMaxLifetimeMinutes => "HOURBRIDGE_JWT_MAX_LIFETIME_MINUTES",
            Self::TokenTtlMinutes => "HOURBRIDGE_TOKEN_TTL_MINUTES",
            Self::HmacSkewSeconds => "HOURBRIDGE_HMAC_SKEW_SECONDS",
            Self::AllowQueryApiKey => "HOURBRIDGE_ALLOW_QUERY_API_KEY",
            Self::ConfigCacheTtlSeconds => "HOURBRIDGE_CONFIG_CACHE_TTL_SECONDS",
            Self::PartnershipCacheTtlSeconds => "HOURBRIDGE_PARTNERSHIP_CACHE_TTL_SECONDS",
            Self::AuditRetentionDays => "HOURBRIDGE_AUDIT_RETENTION_DAYS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_max_lifetime: Duration,
    pub token_ttl: Duration,
    pub hmac_max_skew: Duration,
    pub allow_query_api_key: bool,
    /// System controls, tenant flags and whitelist.
    pub config_cache_ttl: Duration,
    /// Partnerships and user settings.
    pub partnership_cache_ttl: Duration,
    pub audit_retention_days: u32,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_issuer: "hourbridge".to_string(),
            jwt_max_lifetime: Duration::minutes(1440),
            token_ttl: Duration::minutes(60),
            hmac_max_skew: Duration::seconds(300),
            allow_query_api_key: false,
            config_cache_ttl: Duration::seconds(300),
            partnership_cache_ttl: Duration::seconds(60),
            audit_retention_days: 365,
        }
    }
}

impl FederationConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: ConfigEnv| lookup(key.as_str()).filter(|v| !v.trim().is_empty());

        let jwt_secret = match get(ConfigEnv::JwtSecret) {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "{} not set; using insecure dev default",
                    ConfigEnv::JwtSecret.as_str()
                );
                defaults.jwt_secret.clone()
            }
        };

        let config = Self {
            jwt_secret,
            jwt_issuer: get(ConfigEnv::JwtIssuer).unwrap_or(defaults.jwt_issuer),
            jwt_max_lifetime: minutes(&get, ConfigEnv::JwtMaxLifetimeMinutes)?
                .unwrap_or(defaults.jwt_max_lifetime),
            token_ttl: minutes(&get, ConfigEnv::TokenTtlMinutes)?.unwrap_or(defaults.token_ttl),
            hmac_max_skew: seconds(&get, ConfigEnv::HmacSkewSeconds)?
                .unwrap_or(defaults.hmac_max_skew),
            allow_query_api_key: match get(ConfigEnv::AllowQueryApiKey) {
                Some(raw) => parse_bool(ConfigEnv::AllowQueryApiKey, &raw)?,
                None => defaults.allow_query_api_key,
            },
            config_cache_ttl: seconds(&get, ConfigEnv::ConfigCacheTtlSeconds)?
                .unwrap_or(defaults.config_cache_ttl),
            partnership_cache_ttl: seconds(&get, ConfigEnv::PartnershipCacheTtlSeconds)?
                .unwrap_or(defaults.partnership_cache_ttl),
            audit_retention_days: match get(ConfigEnv::AuditRetentionDays) {
                Some(raw) => parse_positive(ConfigEnv::AuditRetentionDays, &raw)? as u32,
                None => defaults.audit_retention_days,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.token_ttl > self.jwt_max_lifetime {
            bail!(
                "{} ({}m) exceeds {} ({}m)",
                ConfigEnv::TokenTtlMinutes.as_str(),
                self.token_ttl.num_minutes(),
                ConfigEnv::JwtMaxLifetimeMinutes.as_str(),
                self.jwt_max_lifetime.num_minutes()
            );
        }
        Ok(())
    }

    pub fn jwt_settings(&self) -> JwtSettings {
        JwtSettings {
            secret: self.jwt_secret.clone(),
            issuer: self.jwt_issuer.clone(),
            max_lifetime: self.jwt_max_lifetime,
        }
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            hmac_max_skew: self.hmac_max_skew,
            allow_query_api_key: self.allow_query_api_key,
        }
    }
}

fn parse_positive(key: ConfigEnv, raw: &str) -> Result<i64> {
    let value: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be an integer (got '{raw}')", key.as_str()))?;
    if value <= 0 || value > u32::MAX as i64 {
        bail!("{} must be a positive integer (got {value})", key.as_str());
    }
    Ok(value)
}

fn parse_bool(key: ConfigEnv, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be a boolean (got '{other}')", key.as_str()),
    }
}

fn minutes(get: &impl Fn(ConfigEnv) -> Option<String>, key: ConfigEnv) -> Result<Option<Duration>> {
    get(key)
        .map(|raw| parse_positive(key, &raw).map(Duration::minutes))
        .transpose()
}

fn seconds(get: &impl Fn(ConfigEnv) -> Option<String>, key: ConfigEnv) -> Result<Option<Duration>> {
    get(key)
        .map(|raw| parse_positive(key, &raw).map(Duration::seconds))
        .transpose()
}
