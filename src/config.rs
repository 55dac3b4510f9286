//! Explicit, once-built configuration.
//!
//! The original's process-wide configuration singleton is replaced here
//! with a plain value built once from the environment and threaded
//! through constructors from then on, the same shape as `main.rs`'s
//! `get_call_server_port()`, generalized to the full key table below.

use std::collections::HashMap;
use std::env;

use crate::errors::ConfigError;

/// Operating mode. Selects defaults downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Debug,
    Production,
}

/// Embedded vs. client/server database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dbms {
    Sqlite,
    Mysql,
}

/// Every environment-configurable option the engine and its collaborators
/// read, with the same defaults as the original `Config.DEFAULT_VALUES`.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub server_host: String,
    pub server_port: u16,
    pub data_location: String,
    pub dbms: Dbms,
    pub sqlite_file: String,
    pub mysql_hostname: String,
    pub mysql_port: u16,
    pub mysql_database: String,
    pub mysql_username: String,
    pub mysql_password: String,
    pub path_logfile: String,
    pub dsn: String,
    pub release: String,
}

impl Config {
    fn defaults() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("MODE", "production"),
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "1239"),
            ("DATA_LOCATION", "data/"),
            ("DBMS", "mysql"),
            ("SQLITE_FILE", "data.db"),
            ("MYSQL_HOSTNAME", "localhost"),
            ("MYSQL_PORT", "3306"),
            ("MYSQL_DATABASE", "hub"),
            ("MYSQL_USERNAME", "hub"),
            ("MYSQL_PASSWORD", "hub"),
            ("PATH_LOGFILE", "./"),
            ("DSN", ""),
            ("RELEASE", ""),
        ])
    }

    fn lookup(key: &str, defaults: &HashMap<&'static str, &'static str>) -> String {
        env::var(key).unwrap_or_else(|_| defaults[key].to_string())
    }

    /// Build configuration from the process environment, falling back to
    /// the documented defaults for anything unset. Fails fast on the two
    /// fatal conditions: unknown DBMS, unknown mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::defaults();

        let mode = match Self::lookup("MODE", &defaults).as_str() {
            "debug" => Mode::Debug,
            "production" => Mode::Production,
            other => return Err(ConfigError::UnknownMode(other.to_string())),
        };

        let dbms = match Self::lookup("DBMS", &defaults).as_str() {
            "sqlite" => Dbms::Sqlite,
            "mysql" => Dbms::Mysql,
            other => return Err(ConfigError::UnknownDbms(other.to_string())),
        };

        let server_port = parse_port(&Self::lookup("SERVER_PORT", &defaults))?;
        let mysql_port = parse_port(&Self::lookup("MYSQL_PORT", &defaults))?;

        Ok(Self {
            mode,
            server_host: Self::lookup("SERVER_HOST", &defaults),
            server_port,
            data_location: Self::lookup("DATA_LOCATION", &defaults),
            dbms,
            sqlite_file: Self::lookup("SQLITE_FILE", &defaults),
            mysql_hostname: Self::lookup("MYSQL_HOSTNAME", &defaults),
            mysql_port,
            mysql_database: Self::lookup("MYSQL_DATABASE", &defaults),
            mysql_username: Self::lookup("MYSQL_USERNAME", &defaults),
            mysql_password: Self::lookup("MYSQL_PASSWORD", &defaults),
            path_logfile: Self::lookup("PATH_LOGFILE", &defaults),
            dsn: Self::lookup("DSN", &defaults),
            release: Self::lookup("RELEASE", &defaults),
        })
    }
}

/// Port strings must be non-negative decimal and fit in a `u16`:
/// `""`, `"abc"`, `"-1"`, `"65536"` are rejected; `"0"`, `"65535"` are
/// accepted.
fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::InvalidPort(raw.to_string()));
    }
    raw.parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_ports() {
        for bad in ["", "abc", "-1", "65536"] {
            assert!(parse_port(bad).is_err(), "expected '{bad}' to be rejected");
        }
    }

    #[test]
    fn accepts_boundary_ports() {
        assert_eq!(parse_port("0").unwrap(), 0);
        assert_eq!(parse_port("65535").unwrap(), 65535);
    }
}
