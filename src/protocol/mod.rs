//! RESP Codec
//!
//! The minimal request/reply codec the remote backend needs: requests are encoded
//! as arrays of bulk strings, replies are parsed incrementally from the socket.
//!
//! - `types`: the [`RespValue`] frame enum, serialization and conversion to `Value`
//! - `parser`: incremental reply parser and the [`ReplyBuffer`] read buffer
//!
//! ## Example
//!
//! ```
//! use kvbridge::protocol::{ReplyBuffer, RespValue};
//!
//! let request = RespValue::command(["GET", "name"]).serialize();
//! assert!(request.starts_with(b"*2\r\n"));
//!
//! let mut replies = ReplyBuffer::new();
//! replies.extend(b"$4\r\nAriz\r\n");
//! let reply = replies.next_frame().unwrap().unwrap();
//! assert_eq!(reply.as_str(), Some("Ariz"));
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, ParseResult, ReplyBuffer, RespParser};
pub use types::RespValue;
