use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigurationError;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseMode {
    /// Redshift when credentials are complete, demo otherwise.
    #[default]
    Auto,
    Redshift,
    Demo,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WarehouseConfig {
    pub mode: WarehouseMode,
    pub host: Option<String>,
    pub port: u16,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub pool_size: u32,
    pub connect_timeout_secs: u64,
    /// Row limit appended to statements that carry none.
    pub row_limit: u32,
}

/// Connection parameters once every required field is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedshiftCredentials {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl WarehouseConfig {
    pub fn credentials(&self) -> Result<RedshiftCredentials, ConfigurationError> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let host = present(&self.host);
        let database = present(&self.database);
        let username = present(&self.username);
        let password = present(&self.password);

        let missing: Vec<&str> = [
            ("REDSHIFT_HOST", host.is_none()),
            ("REDSHIFT_DATABASE", database.is_none()),
            ("REDSHIFT_USERNAME", username.is_none()),
            ("REDSHIFT_PASSWORD", password.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        match (host, database, username, password) {
            (Some(host), Some(database), Some(username), Some(password)) => Ok(RedshiftCredentials {
                host,
                port: self.port,
                database,
                username,
                password,
            }),
            _ => Err(ConfigurationError::MissingWarehouseCredentials(missing.join(", "))),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    /// The backend actually used once `Auto` has been resolved.
    pub fn resolved_mode(&self) -> WarehouseMode {
        match self.mode {
            WarehouseMode::Auto if self.is_configured() => WarehouseMode::Redshift,
            WarehouseMode::Auto => WarehouseMode::Demo,
            other => other,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            mode: WarehouseMode::Auto,
            host: None,
            port: 5439,
            database: None,
            username: None,
            password: None,
            pool_size: 5,
            connect_timeout_secs: 10,
            row_limit: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: String, // "openai" or "none"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key: None,
            api_url: None,
            temperature: 0.1,
            max_tokens: 500,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub require_vpn: bool,
    /// Bypasses the origin check entirely.
    pub local_development: bool,
    pub allowed_networks: Vec<String>,
    /// Use the first X-Forwarded-For entry instead of the socket peer.
    pub trust_forwarded_for: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            require_vpn: false,
            local_development: false,
            allowed_networks: vec![
                "10.0.0.0/8".to_string(),
                "172.16.0.0/12".to_string(),
                "192.168.0.0/16".to_string(),
            ],
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub warehouse: WarehouseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub network: NetworkConfig,
    pub production_mode: bool,
    pub status_ttl_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            warehouse: WarehouseConfig::default(),
            web: WebConfig::default(),
            llm: LlmConfig::default(),
            network: NetworkConfig::default(),
            production_mode: false,
            status_ttl_secs: 300,
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Serve the seeded demo warehouse instead of Redshift
    #[arg(long)]
    pub demo: bool,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // A missing .env is the normal case outside local development
        let _ = dotenvy::dotenv();
        Self::load(args, |key| std::env::var(key).ok())
    }

    /// Builds the configuration from file, `ANALYST__*` variables, the
    /// deployment's legacy variables (read through `lookup`), then CLI flags.
    pub fn load<F>(args: &CliArgs, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config_builder = Config::builder();

        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            let default_locations = [
                "config.toml",
                "config/config.toml",
                "/etc/warehouse-analyst/config.toml",
            ];

            if let Some(location) = default_locations.iter().find(|l| Path::new(l).exists()) {
                config_builder =
                    config_builder.add_source(File::new(location, config::FileFormat::Toml));
            }
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("ANALYST")
                .separator("__")
                .try_parsing(true),
        );

        let flag = |key: &str| lookup(key).map(|v| v.trim().eq_ignore_ascii_case("true"));

        config_builder = config_builder
            .set_override_option("warehouse.host", lookup("REDSHIFT_HOST"))?
            .set_override_option("warehouse.port", lookup("REDSHIFT_PORT"))?
            .set_override_option("warehouse.database", lookup("REDSHIFT_DATABASE"))?
            .set_override_option("warehouse.username", lookup("REDSHIFT_USERNAME"))?
            .set_override_option("warehouse.password", lookup("REDSHIFT_PASSWORD"))?
            .set_override_option("llm.api_key", lookup("OPENAI_API_KEY"))?
            .set_override_option("network.require_vpn", flag("VPN_REQUIRED"))?
            .set_override_option("network.local_development", flag("LOCAL_DEVELOPMENT"))?
            .set_override_option("production_mode", flag("PRODUCTION_MODE"))?;

        if let Some(networks) = lookup("ALLOWED_NETWORKS") {
            let networks: Vec<String> = networks
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();
            config_builder = config_builder.set_override("network.allowed_networks", networks)?;
        }

        if flag("DEMO_MODE") == Some(true) {
            config_builder = config_builder.set_override("warehouse.mode", "demo")?;
        }

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if args.demo {
            config.warehouse.mode = WarehouseMode::Demo;
        }

        Ok(config)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> AppConfig {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::load(&CliArgs::default(), |key| env.get(key).cloned()).unwrap()
    }

    #[test]
    fn defaults_without_any_source() {
        let config = load_with(&[]);
        assert_eq!(config.warehouse.port, 5439);
        assert_eq!(config.warehouse.row_limit, 100);
        assert_eq!(config.warehouse.resolved_mode(), WarehouseMode::Demo);
        assert_eq!(config.network.allowed_networks.len(), 3);
        assert!(!config.network.require_vpn);
        assert_eq!(config.status_ttl_secs, 300);
    }

    #[test]
    fn legacy_variables_fill_the_warehouse_section() {
        let config = load_with(&[
            ("REDSHIFT_HOST", "warehouse.internal"),
            ("REDSHIFT_PORT", "5440"),
            ("REDSHIFT_DATABASE", "analytics"),
            ("REDSHIFT_USERNAME", "reader"),
            ("REDSHIFT_PASSWORD", "secret"),
            ("OPENAI_API_KEY", "sk-test"),
        ]);

        let credentials = config.warehouse.credentials().unwrap();
        assert_eq!(credentials.host, "warehouse.internal");
        assert_eq!(credentials.port, 5440);
        assert_eq!(config.warehouse.resolved_mode(), WarehouseMode::Redshift);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn missing_credentials_are_listed() {
        let config = load_with(&[("REDSHIFT_HOST", "warehouse.internal"), ("REDSHIFT_PASSWORD", " ")]);
        let err = config.warehouse.credentials().unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingWarehouseCredentials(
                "REDSHIFT_DATABASE, REDSHIFT_USERNAME, REDSHIFT_PASSWORD".to_string()
            )
        );
    }

    #[test]
    fn network_flags_and_ranges() {
        let config = load_with(&[
            ("VPN_REQUIRED", "TRUE"),
            ("ALLOWED_NETWORKS", "10.1.0.0/16, 192.168.5.0/24,"),
        ]);
        assert!(config.network.require_vpn);
        assert_eq!(
            config.network.allowed_networks,
            vec!["10.1.0.0/16".to_string(), "192.168.5.0/24".to_string()]
        );
    }

    #[test]
    fn demo_flag_wins_over_credentials() {
        let env = [
            ("REDSHIFT_HOST", "h"),
            ("REDSHIFT_DATABASE", "d"),
            ("REDSHIFT_USERNAME", "u"),
            ("REDSHIFT_PASSWORD", "p"),
            ("DEMO_MODE", "true"),
        ];
        let config = load_with(&env);
        assert_eq!(config.warehouse.resolved_mode(), WarehouseMode::Demo);
    }
}
