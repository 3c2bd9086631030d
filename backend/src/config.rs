//! Runtime configuration from the environment.
//!
//! A `.env` file in the working directory is loaded first (if present),
//! then the `EXPVIEW_*` variables are read. CLI flags override the result.

use std::env;
use std::path::PathBuf;

use crate::api::logs::log_warning;
use crate::session::DEFAULT_SESSION_DIR;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub const PORT_VAR: &str = "EXPVIEW_PORT";
pub const SESSION_DIR_VAR: &str = "EXPVIEW_SESSION_DIR";
pub const MAX_UPLOAD_VAR: &str = "EXPVIEW_MAX_UPLOAD_BYTES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub session_dir: PathBuf,
    /// Request body limit for `POST /api/upload`.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Load `.env` and read the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_or(PORT_VAR, lookup(PORT_VAR), defaults.port);
        let max_upload_bytes =
            parse_or(MAX_UPLOAD_VAR, lookup(MAX_UPLOAD_VAR), defaults.max_upload_bytes);
        let session_dir = lookup(SESSION_DIR_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.session_dir);

        Self {
            port,
            session_dir,
            max_upload_bytes,
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn with_session_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.session_dir = dir;
        }
        self
    }
}

fn parse_or<T: std::str::FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            log_warning(format!("Ignoring invalid {}='{}', using default", key, raw));
            default
        }
    }
}
