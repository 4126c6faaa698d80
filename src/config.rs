use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_COMMANDS: &str = "\
id
date
top -bn1
ps auxfww
vmstat 1 10
iostat 1 10
free -m
df -h
#if which apachectl
links -dump http://127.0.0.1/server-status
";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub remote_shell: RemoteShellConfig,
    #[serde(default, with = "humantime_opt")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteShellConfig {
    #[serde(default = "default_remote_program")]
    pub program: String,
    #[serde(default = "default_remote_args")]
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            hosts: Vec::new(),
            shell: default_shell(),
            remote_shell: RemoteShellConfig::default(),
            timeout: None,
        }
    }
}

impl Default for RemoteShellConfig {
    fn default() -> Self {
        Self {
            program: default_remote_program(),
            args: default_remote_args(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to read commands from stdin: {0}")]
    Stdin(std::io::Error),
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid settings: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shell.trim().is_empty() {
            return Err(ConfigError::Validation("shell must not be empty".to_string()));
        }
        if self.remote_shell.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "remote_shell.program must not be empty".to_string(),
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output_dir must not be empty".to_string(),
            ));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::Validation(
                "timeout must be greater than zero".to_string(),
            ));
        }
        validate_hosts(&self.hosts)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../hostsnap.yaml.example")
    }
}

fn validate_hosts(hosts: &[String]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for host in hosts {
        if host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "hosts[*] must not be empty".to_string(),
            ));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "host '{host}' must not contain whitespace"
            )));
        }
        if !seen.insert(host.as_str()) {
            return Err(ConfigError::Validation(format!(
                "host '{host}' is listed more than once"
            )));
        }
    }
    Ok(())
}

/// Reads the command list: built-in when `path` is `None`, stdin for `-`.
pub fn load_commands(path: Option<&str>) -> Result<String, ConfigError> {
    match path {
        None => Ok(DEFAULT_COMMANDS.to_string()),
        Some("-") => read_commands_from(io::stdin().lock()),
        Some(path) => fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        }),
    }
}

fn read_commands_from(mut reader: impl Read) -> Result<String, ConfigError> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(ConfigError::Stdin)?;
    Ok(text)
}

pub fn parse_timeout(value: &str) -> Result<Duration, String> {
    let timeout = humantime::parse_duration(value).map_err(|err| err.to_string())?;
    if timeout.is_zero() {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(timeout)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./hostsnap-logs")
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_remote_program() -> String {
    "ssh".to_string()
}

fn default_remote_args() -> Vec<String> {
    vec!["-o".to_string(), "BatchMode=yes".to_string()]
}

mod humantime_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&humantime::format_duration(*d).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|v| humantime::parse_duration(&v).map_err(serde::de::Error::custom))
            .transpose()
    }
}
