//! Connection lifecycle and the backend contract.

use crate::backends::BackendKind;
use crate::commands::CommandTable;
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use tracing::{info, warn};

/// One concrete backend: how to open and close its native handle, what its
/// configuration looks like, and which commands it supports.
pub trait Backend: Sized + 'static {
    /// Configuration record parsed from the backend's argument string
    type Config: BackendConfig;

    /// Native handle owned by a connected [`Connection`]
    type Handle: Send;

    const KIND: BackendKind;

    /// Creates a native handle. Failures are reported as `Error::Connect`.
    fn open(config: &Self::Config) -> Result<Self::Handle>;

    /// Releases a native handle.
    fn close(handle: Self::Handle) -> Result<()>;

    /// The backend's immutable command table.
    fn commands() -> &'static CommandTable<Self>;

    /// Whether write commands must be rejected for this configuration.
    fn is_read_only(_config: &Self::Config) -> bool {
        false
    }
}

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Exclusive owner of one backend-native handle.
pub struct Connection<B: Backend> {
    config: B::Config,
    handle: Option<B::Handle>,
}

impl<B: Backend> Connection<B> {
    /// Creates a disconnected connection with the default configuration.
    pub fn new() -> Self {
        Self {
            config: B::Config::default(),
            handle: None,
        }
    }

    /// Creates a connection and connects it with `config`.
    pub fn open(config: B::Config) -> Result<Self> {
        let mut conn = Self::new();
        conn.connect(config)?;
        Ok(conn)
    }

    /// Opens the native handle.
    ///
    /// On success the connection adopts `config`. If already connected, returns
    /// `AlreadyConnected` and leaves both the handle and the configuration untouched.
    pub fn connect(&mut self, config: B::Config) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::AlreadyConnected);
        }

        let handle = B::open(&config)?;
        info!(backend = %B::KIND, config = %config.to_config_string(), "Connected");
        self.config = config;
        self.handle = Some(handle);
        Ok(())
    }

    /// Releases the native handle.
    ///
    /// The connection is disconnected afterwards even if the release failed; that
    /// failure is still returned.
    pub fn disconnect(&mut self) -> Result<()> {
        let handle = self.handle.take().ok_or(Error::NotConnected)?;
        info!(backend = %B::KIND, "Disconnected");
        B::close(handle)
    }

    /// The native handle, for handlers to call primitives on.
    pub fn native(&mut self) -> Result<&mut B::Handle> {
        self.handle.as_mut().ok_or(Error::NotConnected)
    }

    pub fn state(&self) -> ConnectionState {
        if self.handle.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        B::is_read_only(&self.config)
    }

    pub fn config(&self) -> &B::Config {
        &self.config
    }

    pub fn delimiter(&self) -> &str {
        self.config.delimiter()
    }

    pub fn ns_separator(&self) -> &str {
        self.config.ns_separator()
    }

    pub fn kind(&self) -> BackendKind {
        B::KIND
    }
}

impl<B: Backend> Default for Connection<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Drop for Connection<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = B::close(handle) {
                warn!(backend = %B::KIND, error = %e, "Failed to release handle on drop");
            }
        }
    }
}

impl<B: Backend> std::fmt::Debug for Connection<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &B::KIND)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Memory;
    use crate::config::MemoryConfig;
    use crate::connection::KeyValueOps;

    #[test]
    fn test_primitives_require_connection() {
        let mut conn = Connection::<Memory>::new();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(matches!(conn.native(), Err(Error::NotConnected)));
        assert_eq!(conn.disconnect(), Err(Error::NotConnected));
    }

    #[test]
    fn test_connect_disconnect_cycle() {
        let mut conn = Connection::<Memory>::new();
        conn.connect(MemoryConfig::default()).unwrap();
        assert!(conn.is_connected());
        conn.disconnect().unwrap();
        assert!(!conn.is_connected());

        // A second cycle gets a fresh handle
        conn.connect(MemoryConfig::default()).unwrap();
        assert_eq!(conn.native().unwrap().key_count().unwrap(), 0);
    }

    #[test]
    fn test_connect_twice_keeps_handle_and_config() {
        let mut conn = Connection::<Memory>::open(MemoryConfig::parse("-d ;").unwrap()).unwrap();
        conn.native().unwrap().set("k", "v").unwrap();

        let other = MemoryConfig::parse("-d |").unwrap();
        assert_eq!(conn.connect(other), Err(Error::AlreadyConnected));
        assert_eq!(conn.delimiter(), ";");
        assert_eq!(
            conn.native().unwrap().get("k").unwrap().as_deref(),
            Some("v")
        );
    }

    #[test]
    fn test_default_delimiter_before_connect() {
        let conn = Connection::<Memory>::default();
        assert_eq!(conn.delimiter(), "\n");
        assert_eq!(conn.ns_separator(), ":");
        assert!(!conn.is_read_only());
    }
}
