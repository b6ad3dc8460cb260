use std::collections::HashMap;

use serde::Deserialize;

const DEFAULTS: &str = include_str!("../config/default.toml");

/// Flat environment variables honoured for compatibility with existing deployments.
/// They win over every other source.
const LEGACY_VARS: &[(&str, &str)] = &[
    ("NODE_ENV", "environment"),
    ("SERVERPORT", "server.realtime_port"),
    ("PORT", "server.port"),
    ("MONGO_URL", "database.url"),
    ("CLOUD_NAME", "assets.cloud_name"),
    ("CLOUD_API_KEY", "assets.api_key"),
    ("CLOUD_API_SECRET", "assets.api_secret"),
    ("JWT_SECRET", "auth.jwt_secret"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    /// Socket-capable listener, started before the database is reachable.
    pub realtime_port: u16,
    /// Plain REST listener, started once the database is confirmed.
    pub port: u16,
    /// Directory holding the bundled client build.
    pub client_dir: String,
    /// Maximum accepted JSON body in bytes.
    pub body_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Database used when the URL does not name one.
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    pub cookie_name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssetConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub assets: AssetConfig,
    pub realtime: RealtimeConfig,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

/// Loads the configuration snapshot from the process environment.
///
/// Precedence, lowest first: embedded defaults, `marketplace.toml` in the working
/// directory, the file named by `MARKETPLACE_CONFIG`, `MARKETPLACE__SECTION__KEY`
/// variables, then the flat legacy variables (`PORT`, `MONGO_URL`, ...).
pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();
    from_vars(std::env::vars())
}

/// Builds the configuration from an explicit variable set instead of the process environment.
pub fn from_vars<I>(vars: I) -> anyhow::Result<AppConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: HashMap<String, String> = vars.into_iter().collect();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::with_name("marketplace").required(false));

    if let Some(custom_path) = vars.get("MARKETPLACE_CONFIG") {
        builder = builder.add_source(::config::File::with_name(custom_path).required(false));
    }

    let env_map: ::config::Map<String, String> =
        vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    builder = builder.add_source(
        ::config::Environment::with_prefix("MARKETPLACE")
            .separator("__")
            .source(Some(env_map)),
    );

    for (var, key) in LEGACY_VARS {
        if let Some(value) = vars.get(*var).filter(|v| !v.trim().is_empty()) {
            builder = builder.set_override(*key, value.trim())?;
        }
    }
    if let Some(raw) = vars.get("JWT_EXPIRES_IN").filter(|v| !v.trim().is_empty()) {
        let hours = i64::try_from(parse_ttl_hours(raw)?)
            .map_err(|_| anyhow::anyhow!("token lifetime too large: {}", raw.trim()))?;
        builder = builder.set_override("auth.token_ttl_hours", hours)?;
    }

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Longest accepted session lifetime: one year.
pub const MAX_TOKEN_TTL_HOURS: u64 = 365 * 24;

/// Parses token lifetimes written as `1d`, `12h` or a plain number of hours.
pub fn parse_ttl_hours(raw: &str) -> anyhow::Result<u64> {
    let raw = raw.trim();
    let (digits, multiplier) = if let Some(days) = raw.strip_suffix('d') {
        (days, 24)
    } else if let Some(hours) = raw.strip_suffix('h') {
        (hours, 1)
    } else {
        (raw, 1)
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid token lifetime: {}", raw))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("token lifetime too large: {}", raw))
}

fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    if cfg.server.realtime_port == 0 {
        return Err(anyhow::anyhow!("invalid server.realtime_port: {}", cfg.server.realtime_port));
    }
    if cfg.server.port == cfg.server.realtime_port {
        return Err(anyhow::anyhow!(
            "server.port and server.realtime_port must differ (both {})",
            cfg.server.port
        ));
    }
    #[cfg(unix)]
    for port in [cfg.server.port, cfg.server.realtime_port] {
        if port < 1024 {
            tracing::warn!("Using privileged port {} - may require elevated permissions", port);
        }
    }
    if cfg.server.body_limit == 0 {
        return Err(anyhow::anyhow!("server.body_limit must be > 0"));
    }

    // Database
    if cfg.database.url.trim().is_empty() {
        return Err(anyhow::anyhow!("database.url must be set (MONGO_URL)"));
    }

    // Auth
    if cfg.auth.jwt_secret.trim().is_empty() {
        return Err(anyhow::anyhow!("auth.jwt_secret must be set (JWT_SECRET)"));
    }
    if cfg.auth.token_ttl_hours == 0 || cfg.auth.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
        return Err(anyhow::anyhow!(
            "auth.token_ttl_hours must be between 1 and {} (got {})",
            MAX_TOKEN_TTL_HOURS,
            cfg.auth.token_ttl_hours
        ));
    }
    if cfg.auth.cookie_name.trim().is_empty() {
        return Err(anyhow::anyhow!("auth.cookie_name must not be empty"));
    }

    // Realtime
    if !cfg.realtime.path.starts_with('/') {
        return Err(anyhow::anyhow!("realtime.path must start with '/': {}", cfg.realtime.path));
    }

    Ok(())
}
