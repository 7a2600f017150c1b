//! Handles settings for the application.
//!
//! Values come from `settings.toml` (optional), then from `SPLITLEDGER__*`
//! environment variables (e.g. `SPLITLEDGER__SERVER__PORT=8080`), then from
//! command line overrides.
use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Deserialize)]
pub struct App {
    /// Log level applied to every crate of the workspace.
    pub level: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: String,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Server,
}

#[derive(Debug, Parser)]
#[command(name = "splitledger", about = "Shared-expense settlement server")]
struct Args {
    /// Optional config file path (TOML, extension may be omitted).
    #[arg(long)]
    config: Option<String>,
    /// Override log level (e.g. debug).
    #[arg(long)]
    level: Option<String>,
    /// Override listening port.
    #[arg(long)]
    port: Option<u16>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let args = Args::parse();
        let path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

        let mut settings: Settings = Self::builder(path)?.build()?.try_deserialize()?;
        if let Some(level) = args.level {
            settings.app.level = level;
        }
        if let Some(port) = args.port {
            settings.server.port = port;
        }

        Ok(settings)
    }

    fn builder(
        path: &str,
    ) -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("app.level", "info")?
            .set_default("server.bind", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.database", "memory")?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("SPLITLEDGER").separator("__")))
    }
}
