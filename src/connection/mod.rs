//! Connection Module
//!
//! A [`Connection`] owns one backend-native handle and guards every use of it behind a
//! two-state lifecycle.
//!
//! ## State Machine
//!
//! ```text
//!                  connect(config) ok
//!  ┌──────────────┐ ─────────────────────> ┌─────────────┐
//!  │ Disconnected │                        │  Connected  │ ──┐ connect(..)
//!  └──────────────┘ <───────────────────── └─────────────┘ <─┘ AlreadyConnected
//!                      disconnect()
//! ```
//!
//! While disconnected, [`Connection::native`] fails with `NotConnected`, so no handler
//! can reach the backend.
//!
//! ## Capabilities
//!
//! Primitive operations are grouped into traits in [`ops`] and implemented by each
//! backend's native handle. Which traits a handle implements decides which commands
//! its backend registers.
//!
//! ## Example
//!
//! ```
//! use kvbridge::backends::Memory;
//! use kvbridge::config::MemoryConfig;
//! use kvbridge::connection::{Connection, KeyValueOps};
//!
//! let mut conn = Connection::<Memory>::new();
//! conn.connect(MemoryConfig::default()).unwrap();
//! conn.native().unwrap().set("name", "Ariz").unwrap();
//! assert_eq!(conn.native().unwrap().get("name").unwrap().as_deref(), Some("Ariz"));
//! conn.disconnect().unwrap();
//! ```

pub mod ops;
pub mod state;

pub use ops::{ExpireOps, HashOps, KeyValueOps, QueueOps, SetOps, ZSetOps};
pub use state::{Backend, Connection, ConnectionState};
