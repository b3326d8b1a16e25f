//! Error Types
//!
//! Every failure the pipeline can produce is a variant of [`Error`]. Nothing here is
//! fatal to the process: the executor records errors on the result tree and the
//! caller decides what to do with them.
//!
//! ## Where Each Error Comes From
//!
//! ```text
//! config string ──> ConfigParse
//! connect()     ──> Connect, AlreadyConnected
//! command line  ──> Syntax, UnknownCommand, WrongArity, ReadOnly
//! handler       ──> Conversion, NotConnected, Backend
//! ```
//!
//! Configuration, arity and capability errors are all detected before any backend
//! call is made.

use thiserror::Error;

/// Errors produced by configuration parsing, connections and command execution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The configuration token stream is malformed (e.g. unbalanced quotes)
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// The backend handle could not be created
    #[error("connect error: {0}")]
    Connect(String),

    /// A primitive was invoked while disconnected
    #[error("not connected")]
    NotConnected,

    /// `connect` was invoked on a live connection
    #[error("already connected")]
    AlreadyConnected,

    /// The command line's quoting could not be split into tokens
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The command name is not in the backend's command table
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// The argument count is outside the command's bounds
    #[error("wrong number of arguments for '{command}' command (got {got})")]
    WrongArity { command: String, got: usize },

    /// A write command was issued against a read-only connection
    #[error("'{0}' is not allowed on a read-only connection")]
    ReadOnly(String),

    /// The backend reported a failure; carries the backend's own message
    #[error("{0}")]
    Backend(String),

    /// An argument token could not be converted to the type the command needs
    #[error("invalid {expected} argument: '{token}'")]
    Conversion {
        token: String,
        expected: &'static str,
    },
}

impl Error {
    /// Shorthand for a backend failure.
    pub fn backend(msg: impl Into<String>) -> Self {
        Error::Backend(msg.into())
    }

    /// Returns true if this error was raised before any backend call could happen.
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            Error::Syntax(_)
                | Error::UnknownCommand(_)
                | Error::WrongArity { .. }
                | Error::ReadOnly(_)
        )
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
