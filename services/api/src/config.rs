use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

// API service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    // None selects the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub azure: AzureConfig,
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub endpoint: String,
    pub secret: String,
    pub timeout_ms: u64,
}

impl AzureConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9090";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_CONNECT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_ACCESS_TTL_SECONDS: i64 = 3600;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 86400;
const DEFAULT_AZURE_TIMEOUT_MS: u64 = 30_000;
const DEBUG_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Default, Deserialize)]
struct ApiConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    database_url: Option<String>,
    db_max_connections: Option<u32>,
    db_connect_timeout_ms: Option<u64>,
    jwt_secret: Option<String>,
    jwt_access_ttl_seconds: Option<i64>,
    jwt_refresh_ttl_seconds: Option<i64>,
    azure_endpoint: Option<String>,
    azure_secret: Option<String>,
    azure_timeout_ms: Option<u64>,
    debug: Option<bool>,
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
}

fn database_url_from_env() -> Option<String> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return Some(url);
    }
    // Discrete DB_* variables, only when a host is given.
    let host = std::env::var("DB_HOST").ok()?;
    let port = std::env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let user = std::env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("DB_PASSWORD").unwrap_or_default();
    let name = std::env::var("DB_NAME").unwrap_or_else(|_| "postgres".to_string());
    Some(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = match std::env::var("TYR_API_BIND") {
            Ok(value) => value.parse().with_context(|| "parse TYR_API_BIND")?,
            Err(_) => match std::env::var("SERVER_PORT") {
                Ok(port) => {
                    let port: u16 = port.parse().with_context(|| "parse SERVER_PORT")?;
                    SocketAddr::from(([0, 0, 0, 0], port))
                }
                Err(_) => DEFAULT_BIND.parse().with_context(|| "parse default bind")?,
            },
        };
        let metrics_bind = std::env::var("TYR_METRICS_BIND")
            .unwrap_or_else(|_| DEFAULT_METRICS_BIND.to_string())
            .parse()
            .with_context(|| "parse TYR_METRICS_BIND")?;
        let debug = env_flag("DEBUG");

        let database = database_url_from_env().map(|url| DatabaseConfig {
            url,
            max_connections: env_parsed("DB_MAX_CONNECTIONS")
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
            connect_timeout_ms: env_parsed("DB_CONNECT_TIMEOUT_MS")
                .unwrap_or(DEFAULT_DB_CONNECT_TIMEOUT_MS),
        });

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").unwrap_or_default(),
            access_ttl_seconds: env_parsed("JWT_ACCESS_TTL_SECONDS")
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_ACCESS_TTL_SECONDS),
            refresh_ttl_seconds: env_parsed("JWT_REFRESH_TTL_SECONDS")
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_REFRESH_TTL_SECONDS),
        };

        let azure = AzureConfig {
            endpoint: std::env::var("AZURE_ENDPOINT").unwrap_or_default(),
            secret: std::env::var("AZURE_SECRET").unwrap_or_default(),
            timeout_ms: env_parsed("AZURE_TIMEOUT_MS")
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_AZURE_TIMEOUT_MS),
        };

        Ok(Self {
            bind_addr,
            metrics_bind,
            database,
            jwt,
            azure,
            debug,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("TYR_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read TYR_CONFIG: {path}"))?;
            let override_cfg: ApiConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse api config yaml")?;
            config.apply_override(override_cfg)?;
        }
        config.finalize()
    }

    fn apply_override(&mut self, cfg: ApiConfigOverride) -> Result<()> {
        if let Some(value) = cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(url) = cfg.database_url {
            let database = self.database.get_or_insert(DatabaseConfig {
                url: String::new(),
                max_connections: DEFAULT_DB_MAX_CONNECTIONS,
                connect_timeout_ms: DEFAULT_DB_CONNECT_TIMEOUT_MS,
            });
            database.url = url;
        }
        if let Some(database) = self.database.as_mut() {
            if let Some(value) = cfg.db_max_connections {
                database.max_connections = value;
            }
            if let Some(value) = cfg.db_connect_timeout_ms {
                database.connect_timeout_ms = value;
            }
        }
        if let Some(value) = cfg.jwt_secret {
            self.jwt.secret = value;
        }
        if let Some(value) = cfg.jwt_access_ttl_seconds {
            self.jwt.access_ttl_seconds = value;
        }
        if let Some(value) = cfg.jwt_refresh_ttl_seconds {
            self.jwt.refresh_ttl_seconds = value;
        }
        if let Some(value) = cfg.azure_endpoint {
            self.azure.endpoint = value;
        }
        if let Some(value) = cfg.azure_secret {
            self.azure.secret = value;
        }
        if let Some(value) = cfg.azure_timeout_ms {
            self.azure.timeout_ms = value;
        }
        if let Some(value) = cfg.debug {
            self.debug = value;
        }
        Ok(())
    }

    /// Fill debug defaults and reject configurations the service cannot run with.
    pub fn finalize(mut self) -> Result<Self> {
        if self.jwt.secret.is_empty() {
            if !self.debug {
                bail!("JWT_SECRET must be set unless DEBUG is enabled");
            }
            self.jwt.secret = DEBUG_JWT_SECRET.to_string();
        }
        if self.jwt.access_ttl_seconds <= 0 || self.jwt.refresh_ttl_seconds <= 0 {
            bail!("jwt token lifetimes must be positive");
        }
        if self.azure.endpoint.is_empty() {
            tracing::warn!("AZURE_ENDPOINT is not set; document analysis will fail");
        }
        self.azure.endpoint = self.azure.endpoint.trim_end_matches('/').to_string();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const KEYS: [&str; 18] = [
        "TYR_API_BIND",
        "SERVER_PORT",
        "TYR_METRICS_BIND",
        "DATABASE_URL",
        "DB_HOST",
        "DB_PORT",
        "DB_USER",
        "DB_PASSWORD",
        "DB_NAME",
        "DB_MAX_CONNECTIONS",
        "JWT_SECRET",
        "JWT_ACCESS_TTL_SECONDS",
        "JWT_REFRESH_TTL_SECONDS",
        "AZURE_ENDPOINT",
        "AZURE_SECRET",
        "AZURE_TIMEOUT_MS",
        "DEBUG",
        "TYR_CONFIG",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    fn set(key: &str, value: &str) {
        unsafe {
            std::env::set_var(key, value);
        }
    }

    #[test]
    #[serial]
    fn defaults_without_env() {
        clear_env();
        let config = ApiConfig::from_env().expect("config");
        assert_eq!(config.bind_addr, DEFAULT_BIND.parse().expect("bind"));
        assert!(config.database.is_none());
        assert_eq!(config.jwt.access_ttl_seconds, 3600);
        assert_eq!(config.jwt.refresh_ttl_seconds, 86400);
        assert!(!config.debug);
    }

    #[test]
    #[serial]
    fn server_port_and_db_parts() {
        clear_env();
        set("SERVER_PORT", "9000");
        set("DB_HOST", "db.local");
        set("DB_USER", "tyr");
        set("DB_PASSWORD", "pw");
        set("DB_NAME", "receipts");
        let config = ApiConfig::from_env().expect("config");
        clear_env();
        assert_eq!(config.bind_addr.port(), 9000);
        let database = config.database.expect("database");
        assert_eq!(database.url, "postgres://tyr:pw@db.local:5432/receipts");
        assert_eq!(database.max_connections, DEFAULT_DB_MAX_CONNECTIONS);
    }

    #[test]
    #[serial]
    fn missing_secret_rejected_outside_debug() {
        clear_env();
        let err = ApiConfig::from_env_or_yaml().expect_err("secret required");
        assert!(err.to_string().contains("JWT_SECRET"));

        set("DEBUG", "true");
        let config = ApiConfig::from_env_or_yaml().expect("debug config");
        clear_env();
        assert_eq!(config.jwt.secret, DEBUG_JWT_SECRET);
    }

    #[test]
    #[serial]
    fn yaml_overrides_env() {
        clear_env();
        set("JWT_SECRET", "from-env");
        let mut file = tempfile_path("tyr-config-override.yaml");
        writeln!(
            file.1,
            "bind_addr: 127.0.0.1:7000\njwt_secret: from-yaml\nazure_endpoint: https://ocr.example/\ndatabase_url: postgres://localhost/db"
        )
        .expect("write");
        set("TYR_CONFIG", file.0.to_str().expect("path"));
        let config = ApiConfig::from_env_or_yaml().expect("config");
        clear_env();
        let _ = std::fs::remove_file(&file.0);
        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(config.jwt.secret, "from-yaml");
        assert_eq!(config.azure.endpoint, "https://ocr.example");
        assert_eq!(
            config.database.expect("database").url,
            "postgres://localhost/db"
        );
    }

    #[test]
    #[serial]
    fn yaml_parse_error_has_context() {
        clear_env();
        let mut file = tempfile_path("tyr-config-bad.yaml");
        writeln!(file.1, "bind_addr: [").expect("write");
        set("TYR_CONFIG", file.0.to_str().expect("path"));
        let err = ApiConfig::from_env_or_yaml().expect_err("bad yaml");
        clear_env();
        let _ = std::fs::remove_file(&file.0);
        assert!(err.to_string().contains("parse api config yaml"));
    }

    fn tempfile_path(name: &str) -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!("{}-{name}", std::process::id()));
        let file = std::fs::File::create(&path).expect("create temp config");
        (path, file)
    }
}
