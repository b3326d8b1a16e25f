//! Concrete Backends
//!
//! The closed set of backends, each a zero-sized type implementing
//! [`Backend`](crate::connection::Backend):
//!
//! | Backend      | Native handle     | Storage                        |
//! |--------------|-------------------|--------------------------------|
//! | [`Memory`]   | [`MemoryStore`]   | in-process ordered map         |
//! | [`Embedded`] | [`EmbeddedStore`] | on-disk `sled` database        |
//! | [`Remote`]   | [`RemoteClient`]  | Redis-style server over TCP    |
//!
//! [`Session`] picks one of them at runtime.

pub mod embedded;
pub mod memory;
pub mod pattern;
pub mod remote;

pub use embedded::{Embedded, EmbeddedStore};
pub use memory::{Memory, MemoryStore, StoreStats};
pub use remote::{Remote, RemoteClient};

use crate::commands::Executor;
use crate::config::BackendConfig;
use crate::connection::{Backend, Connection};
use crate::error::{Error, Result};
use crate::tree::{ResultTree, TreeObserver};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifies one of the concrete backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Memory,
    Embedded,
    Remote,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Memory,
        BackendKind::Embedded,
        BackendKind::Remote,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Embedded => "embedded",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::ConfigParse(format!("unknown backend '{}'", s)))
    }
}

/// Renders INFO output: `# Section` headers followed by `key:value` lines.
///
/// With `section` set, only the matching section (case-insensitive) is rendered;
/// an unknown section renders nothing.
pub fn format_info(sections: &[(&str, Vec<(&str, String)>)], section: Option<&str>) -> String {
    let mut info = String::new();
    for (name, fields) in sections {
        if section.is_some_and(|s| !s.eq_ignore_ascii_case(name)) {
            continue;
        }
        if !info.is_empty() {
            info.push_str("\r\n");
        }
        info.push_str(&format!("# {}\r\n", name));
        for (key, value) in fields {
            info.push_str(&format!("{}:{}\r\n", key, value));
        }
    }
    info
}

/// A connected executor over a backend chosen at runtime.
pub enum Session {
    Memory(Executor<Memory>),
    Embedded(Executor<Embedded>),
    Remote(Executor<Remote>),
}

impl Session {
    /// Parses `config` for the `kind` backend and connects.
    pub fn connect(kind: BackendKind, config: &str) -> Result<Self> {
        Ok(match kind {
            BackendKind::Memory => Session::Memory(open_executor::<Memory>(config)?),
            BackendKind::Embedded => Session::Embedded(open_executor::<Embedded>(config)?),
            BackendKind::Remote => Session::Remote(open_executor::<Remote>(config)?),
        })
    }

    /// Installs an observer on every tree produced from now on.
    pub fn with_observer(self, observer: Arc<dyn TreeObserver>) -> Self {
        match self {
            Session::Memory(e) => Session::Memory(e.with_observer(observer)),
            Session::Embedded(e) => Session::Embedded(e.with_observer(observer)),
            Session::Remote(e) => Session::Remote(e.with_observer(observer)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Session::Memory(_) => BackendKind::Memory,
            Session::Embedded(_) => BackendKind::Embedded,
            Session::Remote(_) => BackendKind::Remote,
        }
    }

    pub fn execute(&mut self, line: &str) -> ResultTree {
        match self {
            Session::Memory(e) => e.execute(line),
            Session::Embedded(e) => e.execute(line),
            Session::Remote(e) => e.execute(line),
        }
    }

    /// The active configuration as an argument string.
    pub fn config_string(&self) -> String {
        match self {
            Session::Memory(e) => e.connection().config().to_config_string(),
            Session::Embedded(e) => e.connection().config().to_config_string(),
            Session::Remote(e) => e.connection().config().to_config_string(),
        }
    }

    pub fn is_connected(&self) -> bool {
        match self {
            Session::Memory(e) => e.connection().is_connected(),
            Session::Embedded(e) => e.connection().is_connected(),
            Session::Remote(e) => e.connection().is_connected(),
        }
    }

    pub fn disconnect(&mut self) -> Result<()> {
        match self {
            Session::Memory(e) => e.connection_mut().disconnect(),
            Session::Embedded(e) => e.connection_mut().disconnect(),
            Session::Remote(e) => e.connection_mut().disconnect(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("kind", &self.kind())
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn open_executor<B: Backend>(config: &str) -> Result<Executor<B>> {
    let config = B::Config::parse(config)?;
    Ok(Executor::new(Connection::open(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!("Embedded".parse::<BackendKind>().unwrap(), BackendKind::Embedded);
        assert_eq!(BackendKind::Remote.to_string(), "remote");
        assert!(matches!(
            "lmdb".parse::<BackendKind>(),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_format_info_sections() {
        let sections = [
            ("Server", vec![("version", "1".to_string())]),
            ("Stats", vec![("calls", "2".to_string()), ("hits", "3".to_string())]),
        ];

        assert_eq!(
            format_info(&sections, None),
            "# Server\r\nversion:1\r\n\r\n# Stats\r\ncalls:2\r\nhits:3\r\n"
        );
        assert_eq!(
            format_info(&sections, Some("stats")),
            "# Stats\r\ncalls:2\r\nhits:3\r\n"
        );
        assert_eq!(format_info(&sections, Some("nope")), "");
    }

    #[test]
    fn test_memory_session() {
        let mut session = Session::connect(BackendKind::Memory, "-d ; -m 10").unwrap();
        assert_eq!(session.kind(), BackendKind::Memory);
        assert_eq!(session.config_string(), "-d ; -m 10");

        assert!(session.execute("SET k v").is_ok());
        assert_eq!(session.execute("GET k").to_text(), "v;");

        session.disconnect().unwrap();
        assert!(!session.is_connected());
        assert_eq!(session.execute("GET k").error(), Some(&Error::NotConnected));
    }

    #[test]
    fn test_bad_config_string_is_rejected() {
        assert!(matches!(
            Session::connect(BackendKind::Memory, "-d \"unterminated"),
            Err(Error::ConfigParse(_))
        ));
    }
}
