use std::env;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_LOG_FILTER: &str = "filmorate=debug,actix_web=info";

const BIND: &str = "FILMORATE_BIND";
const DB: &str = "FILMORATE_DB";
const AUTO_CONFIRM_FRIENDS: &str = "FILMORATE_AUTO_CONFIRM_FRIENDS";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be true or false, got {value:?}")]
    InvalidBool { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    /// Where the sled database lives. `None` opens a temporary one.
    pub db_path: Option<PathBuf>,
    /// Friend requests become friendships right away.
    pub auto_confirm_friends: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1:8080".to_owned(),
            db_path: None,
            auto_confirm_friends: false,
        }
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: value.to_owned(),
        }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(bind) = lookup(BIND) {
            config.bind = bind;
        }
        config.db_path = lookup(DB).filter(|p| !p.is_empty()).map(PathBuf::from);
        if let Some(value) = lookup(AUTO_CONFIRM_FRIENDS) {
            config.auto_confirm_friends = parse_bool(AUTO_CONFIRM_FRIENDS, &value)?;
        }
        Ok(config)
    }

    pub fn open_db(&self) -> sled::Result<sled::Db> {
        match &self.db_path {
            Some(path) => sled::open(path),
            None => sled::Config::new().temporary(true).open(),
        }
    }
}
