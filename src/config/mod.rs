//! Backend Configuration
//!
//! Each backend has one structured configuration record that converts to and from a
//! CLI-like argument string:
//!
//! ```text
//! -d ";" -ns "::" -f /tmp/db -e 1
//! ```
//!
//! ## Parsing Rules
//!
//! Tokens are read left to right. A recognized flag followed by a value consumes both.
//! Anything else ends the option list:
//!
//! - a recognized flag with no value left, or an unknown `-flag`, logs a warning and
//!   stops, keeping what was parsed so far
//! - a token that does not start with `-` stops silently (it is treated as the start
//!   of trailing input)
//!
//! Numeric values that do not parse are skipped and the field keeps its default.
//!
//! ## Serialization
//!
//! Only fields that differ from their default are written, in a fixed per-backend
//! order, so `parse(to_config_string(c)) == c` for every configuration.

pub mod args;

use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

/// Default delimiter between rendered values.
pub const DEFAULT_DELIMITER: &str = "\n";

/// Default separator between namespace segments of a key.
pub const DEFAULT_NS_SEPARATOR: &str = ":";

/// Settings shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseConfig {
    /// Delimiter appended after each rendered value (`-d`)
    pub delimiter: String,
    /// Namespace separator inside keys (`-ns`)
    pub ns_separator: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            ns_separator: DEFAULT_NS_SEPARATOR.to_string(),
        }
    }
}

impl BaseConfig {
    /// Applies `-d` or `-ns`. Returns false for any other flag.
    pub fn apply(&mut self, flag: &str, value: &str) -> bool {
        match flag {
            "-d" => self.delimiter = value.to_string(),
            "-ns" => self.ns_separator = value.to_string(),
            _ => return false,
        }
        true
    }

    /// Appends the non-default shared fields.
    pub fn push_args(&self, args: &mut Vec<String>) {
        if self.delimiter != DEFAULT_DELIMITER {
            push_pair(args, "-d", &self.delimiter);
        }
        if self.ns_separator != DEFAULT_NS_SEPARATOR {
            push_pair(args, "-ns", &self.ns_separator);
        }
    }
}

/// A backend's configuration record.
pub trait BackendConfig: Default + Clone + PartialEq + fmt::Debug + Send + 'static {
    /// Shared settings.
    fn base(&self) -> &BaseConfig;

    /// Applies one `flag value` pair.
    ///
    /// Returns false only if the flag is not recognized. A recognized numeric flag
    /// with an unparsable value returns true and leaves the field unchanged.
    fn apply(&mut self, flag: &str, value: &str) -> bool;

    /// Flag/value tokens for every non-default field, in a fixed order.
    fn args(&self) -> Vec<String>;

    /// Builds a configuration from already split tokens.
    fn from_args<S: AsRef<str>>(tokens: &[S]) -> Self {
        parse_options(tokens)
    }

    /// Parses a configuration string.
    fn parse(input: &str) -> Result<Self> {
        let tokens = args::split_args(input).map_err(|e| Error::ConfigParse(e.to_string()))?;
        Ok(Self::from_args(&tokens))
    }

    /// Serializes to a configuration string that [`BackendConfig::parse`] accepts.
    fn to_config_string(&self) -> String {
        args::join_args(&self.args())
    }

    fn delimiter(&self) -> &str {
        &self.base().delimiter
    }

    fn ns_separator(&self) -> &str {
        &self.base().ns_separator
    }
}

/// The shared option loop behind [`BackendConfig::from_args`].
pub fn parse_options<C: BackendConfig, S: AsRef<str>>(tokens: &[S]) -> C {
    let mut config = C::default();

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_ref();
        let is_last = i + 1 == tokens.len();

        if !is_last && config.apply(token, tokens[i + 1].as_ref()) {
            i += 2;
            continue;
        }

        if token.starts_with('-') {
            warn!(
                option = token,
                "Unrecognized option or bad number of args, stopping option parsing"
            );
        }
        break;
    }

    config
}

/// Parses `value` into `field`, leaving the field unchanged on failure.
fn apply_number<T: FromStr>(field: &mut T, flag: &str, value: &str) -> bool {
    match value.parse() {
        Ok(parsed) => *field = parsed,
        Err(_) => debug!(option = flag, value, "Ignoring non-numeric option value"),
    }
    true
}

fn push_pair(args: &mut Vec<String>, flag: &str, value: impl ToString) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

// ============================================================================
// Memory
// ============================================================================

/// Configuration of the in-process backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryConfig {
    pub base: BaseConfig,
    /// Maximum number of keys (`-m`); 0 means unlimited
    pub max_keys: u64,
}

impl BackendConfig for MemoryConfig {
    fn base(&self) -> &BaseConfig {
        &self.base
    }

    fn apply(&mut self, flag: &str, value: &str) -> bool {
        match flag {
            "-m" => apply_number(&mut self.max_keys, flag, value),
            _ => self.base.apply(flag, value),
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        self.base.push_args(&mut args);
        if self.max_keys != 0 {
            push_pair(&mut args, "-m", self.max_keys);
        }
        args
    }
}

// ============================================================================
// Embedded
// ============================================================================

/// Environment flag bits of the embedded backend (`-e`).
pub mod env_flags {
    /// Open the database read-only; it must already exist
    pub const READ_ONLY: u32 = 0x1;
    /// Use a throwaway database that is removed when closed
    pub const TEMPORARY: u32 = 0x2;
}

/// Default database path of the embedded backend.
pub const DEFAULT_EMBEDDED_PATH: &str = "~/kvbridge.sled";

/// Configuration of the on-disk embedded backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedConfig {
    pub base: BaseConfig,
    /// Database path (`-f`), stored exactly as given
    pub path: String,
    /// Environment flags (`-e`), see [`env_flags`]
    pub env_flags: u32,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig::default(),
            path: DEFAULT_EMBEDDED_PATH.to_string(),
            env_flags: 0,
        }
    }
}

impl EmbeddedConfig {
    pub fn is_read_only(&self) -> bool {
        self.env_flags & env_flags::READ_ONLY != 0
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        if read_only {
            self.env_flags |= env_flags::READ_ONLY;
        } else {
            self.env_flags &= !env_flags::READ_ONLY;
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.env_flags & env_flags::TEMPORARY != 0
    }

    /// The path with a leading `~/` expanded from `$HOME`.
    pub fn resolved_path(&self) -> PathBuf {
        match (self.path.strip_prefix("~/"), std::env::var_os("HOME")) {
            (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
            _ => PathBuf::from(&self.path),
        }
    }
}

impl BackendConfig for EmbeddedConfig {
    fn base(&self) -> &BaseConfig {
        &self.base
    }

    fn apply(&mut self, flag: &str, value: &str) -> bool {
        match flag {
            "-f" => {
                self.path = value.to_string();
                true
            }
            "-e" => apply_number(&mut self.env_flags, flag, value),
            _ => self.base.apply(flag, value),
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        self.base.push_args(&mut args);
        if self.path != DEFAULT_EMBEDDED_PATH {
            push_pair(&mut args, "-f", &self.path);
        }
        if self.env_flags != 0 {
            push_pair(&mut args, "-e", self.env_flags);
        }
        args
    }
}

// ============================================================================
// Remote
// ============================================================================

/// Configuration of the TCP backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base: BaseConfig,
    /// Server host (`-h`)
    pub host: String,
    /// Server port (`-p`)
    pub port: u16,
    /// Password sent with AUTH on connect (`-a`)
    pub password: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig::default(),
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
        }
    }
}

impl RemoteConfig {
    /// `host:port` as accepted by `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl BackendConfig for RemoteConfig {
    fn base(&self) -> &BaseConfig {
        &self.base
    }

    fn apply(&mut self, flag: &str, value: &str) -> bool {
        match flag {
            "-h" => {
                self.host = value.to_string();
                true
            }
            "-p" => apply_number(&mut self.port, flag, value),
            "-a" => {
                self.password = Some(value.to_string());
                true
            }
            _ => self.base.apply(flag, value),
        }
    }

    fn args(&self) -> Vec<String> {
        let defaults = Self::default();
        let mut args = Vec::new();
        self.base.push_args(&mut args);
        if self.host != defaults.host {
            push_pair(&mut args, "-h", &self.host);
        }
        if self.port != defaults.port {
            push_pair(&mut args, "-p", self.port);
        }
        if let Some(password) = &self.password {
            push_pair(&mut args, "-a", password);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_serialize_to_nothing() {
        assert_eq!(MemoryConfig::default().to_config_string(), "");
        assert_eq!(EmbeddedConfig::default().to_config_string(), "");
        assert_eq!(RemoteConfig::default().to_config_string(), "");
    }

    #[test]
    fn test_embedded_delimiter_and_path() {
        let config = EmbeddedConfig::parse(r#"-d ";" -f "/tmp/db""#).unwrap();
        assert_eq!(config.delimiter(), ";");
        assert_eq!(config.path, "/tmp/db");
        assert_eq!(config.args(), vec!["-d", ";", "-f", "/tmp/db"]);
    }

    #[test]
    fn test_round_trip_every_backend() {
        let memory = MemoryConfig {
            base: BaseConfig {
                delimiter: " | ".to_string(),
                ns_separator: "::".to_string(),
            },
            max_keys: 1000,
        };
        assert_eq!(MemoryConfig::parse(&memory.to_config_string()).unwrap(), memory);

        let mut embedded = EmbeddedConfig {
            path: "/var/lib/my db".to_string(),
            ..Default::default()
        };
        embedded.set_read_only(true);
        assert_eq!(
            EmbeddedConfig::parse(&embedded.to_config_string()).unwrap(),
            embedded
        );

        let remote = RemoteConfig {
            host: "db.internal".to_string(),
            port: 8888,
            password: Some("s3cr\"t".to_string()),
            ..Default::default()
        };
        assert_eq!(RemoteConfig::parse(&remote.to_config_string()).unwrap(), remote);
    }

    #[test]
    fn test_unknown_flag_stops_and_keeps_prefix() {
        let config = EmbeddedConfig::parse("-d ; -x 1 -f /tmp/db").unwrap();
        assert_eq!(config.delimiter(), ";");
        assert_eq!(config.path, DEFAULT_EMBEDDED_PATH);
    }

    #[test]
    fn test_non_flag_token_ends_options() {
        let config = RemoteConfig::parse("-p 7000 GET key -h other").unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_valued_flag_in_last_position() {
        let config = RemoteConfig::parse("-h example.com -p").unwrap();
        assert_eq!(config.host, "example.com");
        assert_eq!(config.port, 6379);
    }

    #[test]
    fn test_bad_number_keeps_default_and_continues() {
        let config = EmbeddedConfig::parse("-e lots -f /tmp/x").unwrap();
        assert_eq!(config.env_flags, 0);
        assert_eq!(config.path, "/tmp/x");

        let config = MemoryConfig::parse("-m -5").unwrap();
        assert_eq!(config.max_keys, 0);
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert!(matches!(
            EmbeddedConfig::parse(r#"-f "/tmp/db"#),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_env_flags() {
        let config = EmbeddedConfig::parse("-e 3").unwrap();
        assert!(config.is_read_only());
        assert!(config.is_temporary());

        let mut config = config;
        config.set_read_only(false);
        assert_eq!(config.env_flags, env_flags::TEMPORARY);
    }

    #[test]
    fn test_home_expansion_keeps_literal_path() {
        let config = EmbeddedConfig::default();
        assert_eq!(config.path, "~/kvbridge.sled");
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(config.resolved_path(), PathBuf::from(home).join("kvbridge.sled"));
        }

        let absolute = EmbeddedConfig::parse("-f /data/x").unwrap();
        assert_eq!(absolute.resolved_path(), PathBuf::from("/data/x"));
    }

    #[test]
    fn test_remote_address() {
        let config = RemoteConfig::parse("-h 10.0.0.5 -p 6380 -a hunter2").unwrap();
        assert_eq!(config.address(), "10.0.0.5:6380");
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }
}
