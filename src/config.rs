use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::proxy::types::{
    BodySizeLimit, GatewayConfig, HealthPath, HealthProbeConfig, ProbeTimeout, ProxyConfig,
    ProxyTimeout, UpstreamUrl,
};

/// Prefix of structured environment overrides, e.g. `GATEWAY__UPSTREAM__BASE_URL`
pub const ENV_PREFIX: &str = "GATEWAY";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub upstream: UpstreamSettings,
    pub proxy: ProxySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub service_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub health_path: String,
    pub health_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxySettings {
    pub timeout_ms: u64,
    pub max_body_bytes: usize,
    pub propagate_request_id: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Unprefixed variables kept for compatibility with existing deployments
#[derive(Debug, Default, Clone)]
pub struct LegacyVariables {
    pub port: Option<String>,
    pub backend_url: Option<String>,
    pub log_level: Option<String>,
}

impl LegacyVariables {
    pub fn from_env() -> Self {
        Self {
            port: env::var("GATEWAY_PORT").ok(),
            backend_url: env::var("BACKEND_URL").ok(),
            log_level: env::var("LOG_LEVEL").ok(),
        }
    }
}

/// Structured `GATEWAY__SECTION__KEY` overrides with typed values
pub fn environment_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

/// Deployment environment: `ENVIRONMENT`, then `NODE_ENV`, then `development`
pub fn current_environment() -> String {
    env::var("ENVIRONMENT")
        .or_else(|_| env::var("NODE_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

impl Settings {
    pub fn new() -> std::result::Result<Self, ConfigError> {
        Self::load(
            &current_environment(),
            environment_source(),
            &LegacyVariables::from_env(),
        )
    }

    /// Layer defaults, optional files, `environment_source` and the legacy variables
    pub fn load(
        environment: &str,
        environment_source: Environment,
        legacy: &LegacyVariables,
    ) -> std::result::Result<Self, ConfigError> {
        let config = Self::defaults(environment)?
            // Add configuration file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(environment_source)
            .set_override_option("application.port", legacy.port.clone())?
            .set_override_option("upstream.base_url", legacy.backend_url.clone())?
            .set_override_option("logging.level", legacy.log_level.clone())?
            .build()?;

        config.try_deserialize()
    }

    fn defaults(
        environment: &str,
    ) -> std::result::Result<ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("application.host", "0.0.0.0")?
            .set_default("application.port", 5921)?
            .set_default("application.environment", environment)?
            .set_default("application.service_name", "gateway")?
            .set_default("upstream.base_url", "http://backend:3847")?
            .set_default("upstream.health_path", "/api/health")?
            .set_default("upstream.health_timeout_ms", 5000)?
            .set_default("proxy.timeout_ms", 30_000)?
            .set_default("proxy.max_body_bytes", 52_428_800_u64)?
            .set_default("proxy.propagate_request_id", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")
    }

    pub fn is_production(&self) -> bool {
        self.application.environment.eq_ignore_ascii_case("production")
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.application.host, self.application.port)
            .parse()
            .map_err(|e| Error::InvalidSetting {
                key: "application.host",
                reason: format!("{e}"),
            })
    }

    /// Validate the raw settings into the router's configuration
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let upstream_url = UpstreamUrl::try_new(self.upstream.base_url.clone()).map_err(|e| {
            Error::InvalidUpstreamUrl {
                url: self.upstream.base_url.clone(),
                reason: e.to_string(),
            }
        })?;

        let timeout = ProxyTimeout::try_new(Duration::from_millis(self.proxy.timeout_ms))
            .map_err(|e| Error::InvalidSetting {
                key: "proxy.timeout_ms",
                reason: e.to_string(),
            })?;

        let max_body_size =
            BodySizeLimit::try_new(self.proxy.max_body_bytes).map_err(|e| Error::InvalidSetting {
                key: "proxy.max_body_bytes",
                reason: e.to_string(),
            })?;

        let health_path = HealthPath::try_new(self.upstream.health_path.clone()).map_err(|e| {
            Error::InvalidSetting {
                key: "upstream.health_path",
                reason: e.to_string(),
            }
        })?;

        let health_timeout =
            ProbeTimeout::try_new(Duration::from_millis(self.upstream.health_timeout_ms)).map_err(
                |e| Error::InvalidSetting {
                    key: "upstream.health_timeout_ms",
                    reason: e.to_string(),
                },
            )?;

        Ok(GatewayConfig {
            proxy: ProxyConfig {
                upstream_url,
                timeout,
                max_body_size,
                propagate_request_id: self.proxy.propagate_request_id,
            },
            health: HealthProbeConfig {
                path: health_path,
                timeout: health_timeout,
            },
            service_name: self.application.service_name.clone(),
            expose_error_details: !self.is_production(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;

    fn env_source(vars: &[(&str, &str)]) -> Environment {
        let map: Map<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        environment_source().source(Some(map))
    }

    fn load(vars: &[(&str, &str)], legacy: LegacyVariables) -> Settings {
        Settings::load("test", env_source(vars), &legacy).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[], LegacyVariables::default());

        assert_eq!(settings.application.host, "0.0.0.0");
        assert_eq!(settings.application.port, 5921);
        assert_eq!(settings.application.environment, "test");
        assert_eq!(settings.application.service_name, "gateway");
        assert_eq!(settings.upstream.base_url, "http://backend:3847");
        assert_eq!(settings.upstream.health_path, "/api/health");
        assert_eq!(settings.upstream.health_timeout_ms, 5000);
        assert_eq!(settings.proxy.timeout_ms, 30_000);
        assert_eq!(settings.proxy.max_body_bytes, 50 * 1024 * 1024);
        assert!(settings.proxy.propagate_request_id);
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_prefixed_environment_overrides_defaults() {
        let settings = load(
            &[
                ("GATEWAY__UPSTREAM__BASE_URL", "http://localhost:4000"),
                ("GATEWAY__PROXY__TIMEOUT_MS", "250"),
                ("GATEWAY__LOGGING__FORMAT", "pretty"),
            ],
            LegacyVariables::default(),
        );

        assert_eq!(settings.upstream.base_url, "http://localhost:4000");
        assert_eq!(settings.proxy.timeout_ms, 250);
        assert_eq!(settings.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_environment_source_parses_typed_values() {
        let settings = load(
            &[
                ("GATEWAY__APPLICATION__PORT", "7000"),
                ("GATEWAY__PROXY__MAX_BODY_BYTES", "1024"),
                ("GATEWAY__PROXY__PROPAGATE_REQUEST_ID", "false"),
            ],
            LegacyVariables::default(),
        );

        assert_eq!(settings.application.port, 7000);
        assert_eq!(settings.proxy.max_body_bytes, 1024);
        assert!(!settings.proxy.propagate_request_id);
        assert_eq!(settings.gateway_config().unwrap().proxy.max_body_bytes(), 1024);
    }

    #[test]
    fn test_legacy_variables_take_precedence() {
        let settings = load(
            &[("GATEWAY__UPSTREAM__BASE_URL", "http://localhost:4000")],
            LegacyVariables {
                port: Some("8088".to_string()),
                backend_url: Some("http://legacy-backend:3847".to_string()),
                log_level: Some("debug".to_string()),
            },
        );

        assert_eq!(settings.application.port, 8088);
        assert_eq!(settings.upstream.base_url, "http://legacy-backend:3847");
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_gateway_config_from_defaults() {
        let settings = load(&[], LegacyVariables::default());
        let config = settings.gateway_config().unwrap();

        assert_eq!(config.proxy.target(), "http://backend:3847");
        assert_eq!(config.proxy.timeout(), Duration::from_secs(30));
        assert_eq!(config.proxy.max_body_bytes(), 52_428_800);
        assert_eq!(config.health.path.as_ref(), "/api/health");
        assert_eq!(*config.health.timeout.as_ref(), Duration::from_secs(5));
        assert_eq!(config.service_name, "gateway");
        assert!(config.expose_error_details);
    }

    #[test]
    fn test_invalid_upstream_url_is_rejected() {
        let mut settings = load(&[], LegacyVariables::default());
        settings.upstream.base_url = "backend".to_string();

        assert!(matches!(
            settings.gateway_config(),
            Err(Error::InvalidUpstreamUrl { .. })
        ));
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let mut settings = load(&[], LegacyVariables::default());
        settings.proxy.timeout_ms = 0;
        assert!(matches!(
            settings.gateway_config(),
            Err(Error::InvalidSetting { key: "proxy.timeout_ms", .. })
        ));

        let mut settings = load(&[], LegacyVariables::default());
        settings.proxy.max_body_bytes = 0;
        assert!(matches!(
            settings.gateway_config(),
            Err(Error::InvalidSetting { key: "proxy.max_body_bytes", .. })
        ));
    }

    #[test]
    fn test_production_hides_error_details() {
        let settings = Settings::load(
            "production",
            env_source(&[]),
            &LegacyVariables::default(),
        )
        .unwrap();

        assert!(settings.is_production());
        assert!(!settings.gateway_config().unwrap().expose_error_details);
    }

    #[test]
    fn test_bind_address() {
        let settings = load(&[], LegacyVariables::default());
        assert_eq!(
            settings.bind_address().unwrap(),
            "0.0.0.0:5921".parse::<SocketAddr>().unwrap()
        );
    }
}
