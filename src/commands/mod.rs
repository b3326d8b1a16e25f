//! Command Layer
//!
//! Maps a textual command line to a handler call against a [`Connection`] and
//! collects the output in a result tree.
//!
//! ## Architecture
//!
//! ```text
//! input line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │    Executor     │  split, look up, validate
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  CommandTable   │  per-backend, built once
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    handlers     │  convert args, call primitives, push Values
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Connection    │  backend-native handle
//! └─────────────────┘
//! ```
//!
//! [`Connection`]: crate::connection::Connection

pub mod executor;
pub mod handler;
pub mod table;

pub use executor::Executor;
pub use table::{Access, Arity, Command, CommandTable, Handler, Output};

use crate::error::{Error, Result};

/// Converts a signed integer argument.
pub fn parse_i64(token: &str) -> Result<i64> {
    token.parse().map_err(|_| Error::Conversion {
        token: token.to_string(),
        expected: "integer",
    })
}

/// Converts a non-negative integer argument.
pub fn parse_u64(token: &str) -> Result<u64> {
    token.parse().map_err(|_| Error::Conversion {
        token: token.to_string(),
        expected: "non-negative integer",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integers() {
        assert_eq!(parse_i64("-42"), Ok(-42));
        assert_eq!(parse_u64("42"), Ok(42));
        assert_eq!(
            parse_u64("-1"),
            Err(Error::Conversion {
                token: "-1".to_string(),
                expected: "non-negative integer",
            })
        );
        assert!(parse_i64("").is_err());
        assert!(parse_i64("1.5").is_err());
        assert!(parse_i64("99999999999999999999").is_err());
    }
}
