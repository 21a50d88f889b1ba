use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::status_bar::LogRotation;
use crate::Result;

/// Environment file read before looking up credentials
pub const SECRETS_FILE: &str = "secrets.env";
pub const LOGIN_VAR: &str = "LOGIN";
pub const PASSWORD_VAR: &str = "PASSWORD";

pub fn read_config<P: AsRef<Path>>(path: P) -> Result<ConfigFile> {
    let contents = fs::read_to_string(path).with_context(|| "Failed to read config file")?;
    let config: ConfigFile = serde_yml::from_str(&contents)
        .with_context(|| "Could not parse config (There is most likely an error in the config)")?;
    debug!("Read config for login: {:?}", config.login);
    Ok(config)
}

/// Contents of the config file, every entry is optional
#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    pub ignore_existing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_max_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_backups: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_filters: Option<Vec<String>>,
}

/// Values given on the command line, they win over the config file
#[derive(Debug, Default)]
pub struct Overrides {
    pub destination: Option<PathBuf>,
    pub ignore_existing: bool,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// Where the run log goes
#[derive(Debug, Clone, PartialEq)]
pub struct RunLog {
    pub path: PathBuf,
    pub rotation: LogRotation,
}

/// Everything a sync run needs
#[derive(Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub destination: PathBuf,
    pub ignore_existing: bool,
    pub run_log: Option<RunLog>,
    pub file_filters: Vec<Regex>,
}

impl Config {
    /// Combines config file, command line and environment
    ///
    /// `env` looks up a variable, credentials missing from the file are read
    /// from `LOGIN` and `PASSWORD`.
    pub fn resolve<E>(file: ConfigFile, overrides: Overrides, env: E) -> Result<Config>
    where
        E: Fn(&str) -> Option<String>,
    {
        let login = file
            .login
            .or_else(|| env(LOGIN_VAR))
            .filter(|login| !login.is_empty())
            .ok_or_else(|| anyhow!("{} and {} must be set", LOGIN_VAR, PASSWORD_VAR))?;
        let password = file
            .password
            .or_else(|| env(PASSWORD_VAR))
            .filter(|password| !password.is_empty())
            .ok_or_else(|| anyhow!("{} and {} must be set", LOGIN_VAR, PASSWORD_VAR))?;

        let destination = overrides
            .destination
            .or(file.destination)
            .ok_or_else(|| anyhow!("No destination folder provided. See -h for help"))?;

        let file_filters = file
            .file_filters
            .unwrap_or_default()
            .iter()
            .map(|filter| {
                Regex::new(filter).with_context(|| format!("Invalid file filter: {}", filter))
            })
            .collect::<Result<Vec<_>>>()?;

        let run_log = file.log_file.map(|path| {
            let default = LogRotation::default();
            RunLog {
                path,
                rotation: LogRotation {
                    max_bytes: file.log_max_bytes.unwrap_or(default.max_bytes),
                    backups: file.log_backups.unwrap_or(default.backups),
                },
            }
        });

        Ok(Config {
            credentials: Credentials { login, password },
            destination,
            ignore_existing: overrides.ignore_existing || file.ignore_existing,
            run_log,
            file_filters,
        })
    }

    /// Loads the config for a sync run
    ///
    /// Without an explicit path the default config is used if it exists,
    /// otherwise everything has to come from the command line and environment.
    pub fn load(config_path: Option<&Path>, default_path: &Path, overrides: Overrides) -> Result<Config> {
        let file = match config_path {
            Some(path) => read_config(path)?,
            None if default_path.exists() => read_config(default_path)?,
            None => {
                debug!("No config file found, using command line and environment only");
                ConfigFile::default()
            }
        };

        load_secrets(Path::new(SECRETS_FILE))?;

        Config::resolve(file, overrides, |name| std::env::var(name).ok())
    }
}

/// Loads `path` into the environment, a missing secrets file is fine
fn load_secrets(path: &Path) -> Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!("Loaded secrets from {}", path.display());
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to read secrets file {}", path.display())),
    }
}
