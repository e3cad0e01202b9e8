// ABOUTME: Environment-driven configuration for the labrack CLI
// ABOUTME: Reads LABRACK_* variables with sensible defaults for paths and tuning knobs

use std::env;
use std::path::PathBuf;

use labrack_orchestrator::DEFAULT_SNAPSHOT_RETENTION;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{0} is not a valid number: {1}")]
    InvalidNumber(&'static str, String),
    #[error("Home directory not found; set LABRACK_DATABASE_PATH and LABRACK_COURSES_PATH explicitly")]
    NoHomeDir,
}

/// Everything the CLI needs to reach the control planes it drives
pub struct CliConfig {
    pub database_path: PathBuf,
    pub courses_path: PathBuf,
    pub fabric_url: String,
    pub fabric_token: String,
    pub region: String,
    /// Local administrator password baked into every lab instance. Fixed per
    /// deployment so gateway bindings keep working across snapshot restores.
    pub admin_password: String,
    pub gateway_url: String,
    pub gateway_username: String,
    pub gateway_password: String,
    pub directory_url: String,
    pub directory_token: String,
    pub identity_domain: String,
    pub lab_role_id: String,
    pub lab_policy_id: String,
    pub snapshot_retention: usize,
}

impl CliConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_path = match env::var("LABRACK_DATABASE_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_data_file("labrack.db")?,
        };
        let courses_path = match env::var("LABRACK_COURSES_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_data_file("courses.json")?,
        };

        let snapshot_retention = match env::var("LABRACK_SNAPSHOT_RETENTION") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                ConfigError::InvalidNumber("LABRACK_SNAPSHOT_RETENTION", raw.clone())
            })?,
            Err(_) => DEFAULT_SNAPSHOT_RETENTION,
        };

        Ok(Self {
            database_path,
            courses_path,
            fabric_url: required("LABRACK_FABRIC_URL")?,
            fabric_token: required("LABRACK_FABRIC_TOKEN")?,
            region: env::var("LABRACK_REGION").unwrap_or_else(|_| "eastus".to_string()),
            admin_password: required("LABRACK_ADMIN_PASSWORD")?,
            gateway_url: required("LABRACK_GATEWAY_URL")?,
            gateway_username: required("LABRACK_GATEWAY_USERNAME")?,
            gateway_password: required("LABRACK_GATEWAY_PASSWORD")?,
            directory_url: required("LABRACK_DIRECTORY_URL")?,
            directory_token: required("LABRACK_DIRECTORY_TOKEN")?,
            identity_domain: required("LABRACK_IDENTITY_DOMAIN")?,
            lab_role_id: required("LABRACK_LAB_ROLE_ID")?,
            lab_policy_id: required("LABRACK_LAB_POLICY_ID")?,
            snapshot_retention,
        })
    }
}

impl std::fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliConfig")
            .field("database_path", &self.database_path)
            .field("courses_path", &self.courses_path)
            .field("fabric_url", &self.fabric_url)
            .field("fabric_token", &"<redacted>")
            .field("region", &self.region)
            .field("admin_password", &"<redacted>")
            .field("gateway_url", &self.gateway_url)
            .field("gateway_username", &self.gateway_username)
            .field("gateway_password", &"<redacted>")
            .field("directory_url", &self.directory_url)
            .field("directory_token", &"<redacted>")
            .field("identity_domain", &self.identity_domain)
            .field("lab_role_id", &self.lab_role_id)
            .field("lab_policy_id", &self.lab_policy_id)
            .field("snapshot_retention", &self.snapshot_retention)
            .finish()
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn default_data_file(file: &str) -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".labrack").join(file))
}
