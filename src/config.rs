use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

/// Token-bucket parameters shared by every client bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    pub enabled: bool,
    /// Refill rate in tokens per second.
    pub rps: f64,
    /// Bucket capacity, i.e. requests allowed back to back.
    pub burst: u32,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the peer address.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub query_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundConfig {
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub limiter: LimiterConfig,
    pub store: StoreConfig,
    pub background: BackgroundConfig,
    pub mail: MailConfig,
}

const ENVIRONMENTS: [&str; 3] = ["development", "staging", "production"];

impl AppConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.query_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.background.shutdown_grace_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => panic!("Failed to deserialize default config: {}", e),
            },
            Err(e) => panic!("Failed to parse default config: {}", e),
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();
    let custom_path = std::env::var("TAPIR_CONFIG").ok();
    load_from(custom_path.as_deref())
}

/// Embedded defaults, then `tapir.toml`, then `custom_path`, then `TAPIR__*`
/// environment variables; the result is validated.
pub fn load_from(custom_path: Option<&str>) -> anyhow::Result<AppConfig> {
    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: tapir.toml (in CWD)
        .add_source(::config::File::with_name("tapir").required(false));

    if let Some(path) = custom_path {
        builder = builder.add_source(::config::File::with_name(path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("TAPIR").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if !ENVIRONMENTS.contains(&cfg.server.environment.as_str()) {
        return Err(anyhow::anyhow!(
            "invalid server.environment: {} (expected one of {})",
            cfg.server.environment,
            ENVIRONMENTS.join("|")
        ));
    }

    // Limiter: parameters only matter while it is switched on
    if cfg.limiter.enabled {
        if !cfg.limiter.rps.is_finite() || cfg.limiter.rps <= 0.0 {
            return Err(anyhow::anyhow!("limiter.rps must be > 0"));
        }
        if cfg.limiter.burst == 0 {
            return Err(anyhow::anyhow!("limiter.burst must be > 0"));
        }
    }

    if cfg.store.query_timeout_ms == 0 {
        return Err(anyhow::anyhow!("store.query_timeout_ms must be > 0"));
    }

    Ok(())
}
