//! # kvbridge - One Command Pipeline over Many Key-Value Backends
//!
//! kvbridge runs Redis-style text commands against heterogeneous key-value backends
//! through a single execution pipeline, and captures every result as a typed,
//! hierarchical value tree.
//!
//! ## Features
//!
//! - **Uniform commands**: the same `GET`, `HSET`, `ZRANGE`, `QPUSH` ... across backends
//! - **Three backends**: in-process memory, on-disk `sled`, and Redis-style servers over TCP
//! - **Validated dispatch**: arity, read-only and capability checks before any backend call
//! - **Result trees**: typed [`Value`] nodes, text rendering and change observers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              kvbridge                                   │
//! │                                                                         │
//! │  input line ───> ┌─────────────┐    ┌─────────────┐    ┌─────────────┐  │
//! │                  │  Executor   │───>│CommandTable │───>│  handlers   │  │
//! │                  │ (split,     │    │ (per        │    │ (convert,   │  │
//! │                  │  validate)  │    │  backend)   │    │  call)      │  │
//! │                  └──────┬──────┘    └─────────────┘    └──────┬──────┘  │
//! │                         │                                     │         │
//! │                         ▼                                     ▼         │
//! │                  ┌─────────────┐              ┌──────────────────────┐  │
//! │                  │ ResultTree  │◄── Values ───│  Connection<B>       │  │
//! │                  │ (arena)     │              │  ┌──────┐┌────────┐  │  │
//! │                  └─────────────┘              │  │memory││embedded│  │  │
//! │                                               │  └──────┘└────────┘  │  │
//! │                                               │  ┌──────────────┐    │  │
//! │                                               │  │remote (RESP) │    │  │
//! │                                               │  └──────────────┘    │  │
//! │                                               └──────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use kvbridge::backends::{BackendKind, Session};
//!
//! let mut session = Session::connect(BackendKind::Memory, "-d ,").unwrap();
//! session.execute("HSET user:1 name Ariz");
//! session.execute("HSET user:1 lang Rust");
//!
//! let tree = session.execute("HGETALL user:1");
//! assert!(tree.is_ok());
//! assert_eq!(tree.to_text(), "lang Rust,name Ariz,");
//! ```
//!
//! ## Module Overview
//!
//! - [`value`]: result value model
//! - [`config`]: per-backend configuration and argument-string parsing
//! - [`connection`]: connection lifecycle and primitive capability traits
//! - [`backends`]: memory, embedded and remote backends, plus [`Session`]
//! - [`commands`]: command tables, handlers and the executor
//! - [`tree`]: result trees
//! - [`protocol`]: RESP codec used by the remote backend
//! - [`probe`]: asynchronous connectivity checks
//!
//! [`Session`]: backends::Session

pub mod backends;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod probe;
pub mod protocol;
pub mod tree;
pub mod value;

pub use backends::{BackendKind, Session};
pub use commands::Executor;
pub use connection::{Backend, Connection, ConnectionState};
pub use error::{Error, Result};
pub use tree::{NodeId, ResultTree, TreeObserver};
pub use value::Value;

/// Version of kvbridge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
