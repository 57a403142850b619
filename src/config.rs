use clap::Parser;
use config::{Config, Environment};
use serde::Deserialize;

use crate::generator::GeneratorSettings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Host address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Deployment environment label (development | production)
    #[arg(long, env = "APP_ENV")]
    pub environment: Option<String>,

    /// Session inactivity timeout in seconds
    #[arg(long, env = "SESSION_TIMEOUT_SECS")]
    pub session_timeout_secs: Option<u64>,

    /// Rate limit: max requests per window per client
    #[arg(long, env = "RATE_LIMIT_MAX")]
    pub rate_limit_max: Option<usize>,

    /// Rate limit: window length in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS")]
    pub rate_limit_window_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub limit: LimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub environment: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Idle time after which a session expires.
    pub timeout_secs: u64,
    /// How often the sweep task scans for expired sessions.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // Defaults
        builder = builder
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.environment", "development")?
            .set_default("session.timeout_secs", 3600)?
            .set_default("session.sweep_interval_secs", 60)?
            .set_default("limit.max_requests", 10)?
            .set_default("limit.window_secs", 60)?;

        // CLI overrides (clap also resolves their env fallbacks)
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(env) = cli.environment {
            builder = builder.set_override("server.environment", env)?;
        }
        if let Some(secs) = cli.session_timeout_secs {
            builder = builder.set_override("session.timeout_secs", secs)?;
        }
        if let Some(max) = cli.rate_limit_max {
            builder = builder.set_override("limit.max_requests", max as u64)?;
        }
        if let Some(secs) = cli.rate_limit_window_secs {
            builder = builder.set_override("limit.window_secs", secs)?;
        }

        // Environment variables prefixed with WAYFIND_, e.g.
        // WAYFIND_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("WAYFIND")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

/// Load generation backend settings from the environment.
///
/// API key and base URL are required; a missing or empty value is a fatal
/// startup condition reported to the caller.
pub fn load_generator_settings() -> Result<GeneratorSettings, String> {
    let api_key = std::env::var("GENERATOR_API_KEY")
        .map_err(|_| "Missing required env var: GENERATOR_API_KEY".to_string())?;
    if api_key.trim().is_empty() {
        return Err("GENERATOR_API_KEY cannot be empty".to_string());
    }

    let base_url = std::env::var("GENERATOR_BASE_URL")
        .map_err(|_| "Missing required env var: GENERATOR_BASE_URL".to_string())?;
    if base_url.trim().is_empty() {
        return Err("GENERATOR_BASE_URL cannot be empty".to_string());
    }

    let model = std::env::var("GENERATOR_MODEL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "glm-4.5-air".to_string());

    let timeout_secs = std::env::var("GENERATOR_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    Ok(GeneratorSettings {
        base_url,
        api_key,
        model,
        timeout_secs,
    })
}
