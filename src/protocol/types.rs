//! RESP Frames
//!
//! The remote backend speaks RESP, the request/reply format of Redis-style servers.
//! Requests are always arrays of bulk strings; replies may be any frame type.
//!
//! ## Wire Format
//!
//! | Prefix | Frame         | Example                          |
//! |--------|---------------|----------------------------------|
//! | `+`    | Simple string | `+OK\r\n`                        |
//! | `-`    | Error         | `-ERR unknown command\r\n`       |
//! | `:`    | Integer       | `:1000\r\n`                      |
//! | `$`    | Bulk string   | `$5\r\nhello\r\n`, null `$-1\r\n`|
//! | `*`    | Array         | `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n` |

use crate::value::Value;
use bytes::Bytes;
use std::fmt;

/// The CRLF terminator ending every RESP line
pub const CRLF: &[u8] = b"\r\n";

/// RESP type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// One RESP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+<string>\r\n`
    SimpleString(String),

    /// `-<message>\r\n`
    Error(String),

    /// `:<integer>\r\n`
    Integer(i64),

    /// `$<length>\r\n<data>\r\n`
    BulkString(Bytes),

    /// Null bulk string (`$-1`) or null array (`*-1`)
    Null,

    /// `*<count>\r\n<frames...>`
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// Builds a request: an array of bulk strings, command name first.
    ///
    /// ```
    /// use kvbridge::protocol::RespValue;
    ///
    /// let request = RespValue::command(["GET", "name"]);
    /// assert_eq!(request.serialize(), b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
    /// ```
    pub fn command<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RespValue::Array(
            parts
                .into_iter()
                .map(|p| RespValue::BulkString(Bytes::copy_from_slice(p.as_ref().as_bytes())))
                .collect(),
        )
    }

    /// Serializes the frame to its wire format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the frame into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            RespValue::Array(values) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// The text of a simple or (UTF-8) bulk string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Converts a reply frame into a result [`Value`].
    ///
    /// Bulk strings that are not valid UTF-8 are converted lossily.
    pub fn into_value(self) -> Value {
        match self {
            RespValue::SimpleString(s) => Value::String(s),
            RespValue::Error(msg) => Value::Error(msg),
            RespValue::Integer(n) => Value::Integer(n),
            RespValue::BulkString(data) => {
                Value::String(String::from_utf8_lossy(&data).into_owned())
            }
            RespValue::Null => Value::Null,
            RespValue::Array(items) => {
                Value::Array(items.into_iter().map(RespValue::into_value).collect())
            }
        }
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "+{}", s),
            RespValue::Error(s) => write!(f, "-{}", s),
            RespValue::Integer(n) => write!(f, ":{}", n),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{:?}", s),
                Err(_) => write!(f, "<{} bytes>", data.len()),
            },
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialize() {
        let request = RespValue::command(["SET", "user:101", "Ariz"]);
        assert_eq!(
            request.serialize(),
            b"*3\r\n$3\r\nSET\r\n$8\r\nuser:101\r\n$4\r\nAriz\r\n"
        );
    }

    #[test]
    fn test_command_with_spaces_and_empty_args() {
        let request = RespValue::command(["SET", "k", "hello world", ""]);
        assert_eq!(
            request.serialize(),
            b"*4\r\n$3\r\nSET\r\n$1\r\nk\r\n$11\r\nhello world\r\n$0\r\n\r\n"
        );
    }

    #[test]
    fn test_scalar_serialize() {
        assert_eq!(RespValue::SimpleString("OK".into()).serialize(), b"+OK\r\n");
        assert_eq!(RespValue::Error("ERR x".into()).serialize(), b"-ERR x\r\n");
        assert_eq!(RespValue::Integer(-42).serialize(), b":-42\r\n");
        assert_eq!(RespValue::Null.serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_into_value() {
        let reply = RespValue::Array(vec![
            RespValue::bulk_string("17"),
            RespValue::Array(vec![RespValue::bulk_string("a"), RespValue::Null]),
            RespValue::Integer(3),
        ]);
        assert_eq!(
            reply.into_value(),
            Value::array(vec![
                Value::string("17"),
                Value::array(vec![Value::string("a"), Value::Null]),
                Value::integer(3),
            ])
        );
        assert_eq!(
            RespValue::Error("ERR nope".into()).into_value(),
            Value::error("ERR nope")
        );
    }

    #[test]
    fn test_display() {
        let reply = RespValue::Array(vec![
            RespValue::SimpleString("OK".into()),
            RespValue::bulk_string("a b"),
            RespValue::Integer(1),
        ]);
        assert_eq!(reply.to_string(), "[+OK \"a b\" :1]");
    }
}
