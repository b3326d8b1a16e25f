//! Command Table
//!
//! Each backend owns one immutable [`CommandTable`], built once on first use. The
//! table maps an uppercase command name to its [`Command`] descriptor: arity bounds,
//! required access and the handler function.
//!
//! Tables are assembled from capability groups. A group can only be added when the
//! backend's native handle implements the matching trait, so a backend cannot
//! advertise a command it has no primitive for:
//!
//! ```text
//! CommandTable::new()
//!     .with_key_value()   // B::Handle: KeyValueOps
//!     .with_hash()        // B::Handle: HashOps
//!     ...
//! ```

use crate::commands::handler;
use crate::connection::{
    Backend, Connection, ExpireOps, HashOps, KeyValueOps, QueueOps, SetOps, ZSetOps,
};
use crate::error::Result;
use crate::tree::{NodeId, ResultTree};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;

/// Access a command needs from its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Inclusive bounds on the number of arguments (the command name excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    /// `None` means unbounded
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exact(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

/// Where a handler writes its results: the children of one tree node.
pub struct Output<'a> {
    tree: &'a mut ResultTree,
    parent: NodeId,
    delimiter: String,
}

impl<'a> Output<'a> {
    pub fn new(tree: &'a mut ResultTree, parent: NodeId, delimiter: impl Into<String>) -> Self {
        Self {
            tree,
            parent,
            delimiter: delimiter.into(),
        }
    }

    /// Attaches `value` as the next child, using the connection's delimiter.
    pub fn push(&mut self, value: Value) -> Option<NodeId> {
        self.tree
            .attach_child(self.parent, value, self.delimiter.as_str())
    }

    /// Replaces the value of a node this output pushed earlier.
    pub fn update(&mut self, node: NodeId, value: Value) -> bool {
        self.tree.set_value(node, value)
    }

    /// Number of values pushed so far.
    pub fn len(&self) -> usize {
        self.tree.children(self.parent).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handler signature shared by every command.
pub type Handler<B> = fn(&mut Connection<B>, &[String], &mut Output<'_>) -> Result<()>;

/// Descriptor of one command.
pub struct Command<B: Backend> {
    /// Uppercase command name
    pub name: &'static str,
    pub arity: Arity,
    pub access: Access,
    /// One-line usage summary shown by HELP
    pub usage: &'static str,
    pub handler: Handler<B>,
}

impl<B: Backend> fmt::Debug for Command<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("access", &self.access)
            .finish()
    }
}

/// Registry of the commands a backend supports, keyed by uppercase name.
pub struct CommandTable<B: Backend> {
    commands: HashMap<&'static str, Command<B>>,
}

impl<B: Backend> CommandTable<B> {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers `command`.
    ///
    /// # Panics
    ///
    /// Panics if a command with the same name is already registered.
    pub fn with(mut self, command: Command<B>) -> Self {
        let name = command.name;
        let previous = self.commands.insert(name, command);
        assert!(previous.is_none(), "command {} registered twice", name);
        self
    }

    fn register(
        self,
        name: &'static str,
        arity: Arity,
        access: Access,
        usage: &'static str,
        handler: Handler<B>,
    ) -> Self {
        self.with(Command {
            name,
            arity,
            access,
            usage,
            handler,
        })
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&Command<B>> {
        self.commands.get(name.to_ascii_uppercase().as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names in alphabetical order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<B: Backend> Default for CommandTable<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for CommandTable<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTable")
            .field("backend", &B::KIND)
            .field("commands", &self.names())
            .finish()
    }
}

impl<B: Backend> CommandTable<B>
where
    B::Handle: KeyValueOps,
{
    /// Strings, keyspace and session commands, plus HELP.
    pub fn with_key_value(self) -> Self {
        use Access::{Read, Write};
        self.register("GET", Arity::exact(1), Read, "GET key", handler::get)
            .register("SET", Arity::exact(2), Write, "SET key value", handler::set)
            .register("DEL", Arity::at_least(1), Write, "DEL key [key ...]", handler::del)
            .register(
                "MULTI_DEL",
                Arity::at_least(1),
                Write,
                "MULTI_DEL key [key ...]",
                handler::del,
            )
            .register("RENAME", Arity::exact(2), Write, "RENAME key newkey", handler::rename)
            .register("KEYS", Arity::exact(3), Read, "KEYS start end limit", handler::keys)
            .register("RSCAN", Arity::exact(3), Read, "RSCAN start end limit", handler::rscan)
            .register(
                "SCAN",
                Arity::range(1, 5),
                Read,
                "SCAN cursor [MATCH pattern] [COUNT count]",
                handler::scan,
            )
            .register("DBKCOUNT", Arity::exact(0), Read, "DBKCOUNT", handler::dbkcount)
            .register("FLUSHDB", Arity::exact(0), Write, "FLUSHDB", handler::flushdb)
            .register("INFO", Arity::range(0, 1), Read, "INFO [section]", handler::info)
            .register("INCR", Arity::range(1, 2), Write, "INCR key [by]", handler::incr)
            .register("MGET", Arity::at_least(1), Read, "MGET key [key ...]", handler::mget)
            .register(
                "MSET",
                Arity::at_least(2),
                Write,
                "MSET key value [key value ...]",
                handler::mset,
            )
            .register("HELP", Arity::range(0, 1), Read, "HELP [command]", handler::help)
            .register("QUIT", Arity::exact(0), Read, "QUIT", handler::quit)
    }
}

impl<B: Backend> CommandTable<B>
where
    B::Handle: ExpireOps,
{
    pub fn with_expire(self) -> Self {
        use Access::{Read, Write};
        self.register("SETX", Arity::exact(3), Write, "SETX key value ttl", handler::setx)
            .register("EXPIRE", Arity::exact(2), Write, "EXPIRE key ttl", handler::expire)
            .register("TTL", Arity::exact(1), Read, "TTL key", handler::ttl)
    }
}

impl<B: Backend> CommandTable<B>
where
    B::Handle: HashOps,
{
    pub fn with_hash(self) -> Self {
        use Access::{Read, Write};
        self.register("HGET", Arity::exact(2), Read, "HGET key field", handler::hget)
            .register("HSET", Arity::exact(3), Write, "HSET key field value", handler::hset)
            .register("HDEL", Arity::exact(2), Write, "HDEL key field", handler::hdel)
            .register("HGETALL", Arity::exact(1), Read, "HGETALL key", handler::hgetall)
            .register("HSIZE", Arity::exact(1), Read, "HSIZE key", handler::hsize)
            .register("HCLEAR", Arity::exact(1), Write, "HCLEAR key", handler::hclear)
            .register("HINCR", Arity::exact(3), Write, "HINCR key field by", handler::hincr)
            .register("HKEYS", Arity::exact(4), Read, "HKEYS key start end limit", handler::hkeys)
            .register("HSCAN", Arity::exact(4), Read, "HSCAN key start end limit", handler::hscan)
            .register(
                "HRSCAN",
                Arity::exact(4),
                Read,
                "HRSCAN key start end limit",
                handler::hrscan,
            )
            .register(
                "MULTI_HGET",
                Arity::at_least(2),
                Read,
                "MULTI_HGET key field [field ...]",
                handler::multi_hget,
            )
            .register(
                "MULTI_HSET",
                Arity::at_least(3),
                Write,
                "MULTI_HSET key field value [field value ...]",
                handler::multi_hset,
            )
    }
}

impl<B: Backend> CommandTable<B>
where
    B::Handle: SetOps,
{
    pub fn with_set(self) -> Self {
        use Access::{Read, Write};
        self
            .register(
                "SADD",
                Arity::at_least(2),
                Write,
                "SADD key member [member ...]",
                handler::sadd,
            )
            .register(
                "SREM",
                Arity::at_least(2),
                Write,
                "SREM key member [member ...]",
                handler::srem,
            )
            .register("SMEMBERS", Arity::exact(1), Read, "SMEMBERS key", handler::smembers)
            .register("SCARD", Arity::exact(1), Read, "SCARD key", handler::scard)
    }
}

impl<B: Backend> CommandTable<B>
where
    B::Handle: ZSetOps,
{
    pub fn with_zset(self) -> Self {
        use Access::{Read, Write};
        self.register("ZSET", Arity::exact(3), Write, "ZSET key member score", handler::zset)
            .register("ZGET", Arity::exact(2), Read, "ZGET key member", handler::zget)
            .register("ZDEL", Arity::exact(2), Write, "ZDEL key member", handler::zdel)
            .register("ZINCR", Arity::exact(3), Write, "ZINCR key member by", handler::zincr)
            .register("ZSIZE", Arity::exact(1), Read, "ZSIZE key", handler::zsize)
            .register("ZCLEAR", Arity::exact(1), Write, "ZCLEAR key", handler::zclear)
            .register("ZRANGE", Arity::exact(3), Read, "ZRANGE key offset limit", handler::zrange)
            .register(
                "ZRRANGE",
                Arity::exact(3),
                Read,
                "ZRRANGE key offset limit",
                handler::zrrange,
            )
            .register("ZRANK", Arity::exact(2), Read, "ZRANK key member", handler::zrank)
            .register("ZRRANK", Arity::exact(2), Read, "ZRRANK key member", handler::zrrank)
            .register("ZKEYS", Arity::exact(4), Read, "ZKEYS key min max limit", handler::zkeys)
            .register("ZSCAN", Arity::exact(4), Read, "ZSCAN key min max limit", handler::zscan)
            .register("ZRSCAN", Arity::exact(4), Read, "ZRSCAN key max min limit", handler::zrscan)
            .register(
                "MULTI_ZGET",
                Arity::at_least(2),
                Read,
                "MULTI_ZGET key member [member ...]",
                handler::multi_zget,
            )
            .register(
                "MULTI_ZSET",
                Arity::at_least(3),
                Write,
                "MULTI_ZSET key member score [member score ...]",
                handler::multi_zset,
            )
            .register(
                "MULTI_ZDEL",
                Arity::at_least(2),
                Write,
                "MULTI_ZDEL key member [member ...]",
                handler::multi_zdel,
            )
    }
}

impl<B: Backend> CommandTable<B>
where
    B::Handle: QueueOps,
{
    pub fn with_queue(self) -> Self {
        use Access::{Read, Write};
        self
            .register(
                "QPUSH",
                Arity::at_least(2),
                Write,
                "QPUSH key value [value ...]",
                handler::qpush,
            )
            .register("QPOP", Arity::exact(1), Write, "QPOP key", handler::qpop)
            .register("QSLICE", Arity::exact(3), Read, "QSLICE key begin end", handler::qslice)
            .register("QSIZE", Arity::exact(1), Read, "QSIZE key", handler::qsize)
            .register("QCLEAR", Arity::exact(1), Write, "QCLEAR key", handler::qclear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Embedded, Memory, Remote};

    #[test]
    fn test_arity_bounds() {
        assert!(Arity::exact(2).accepts(2));
        assert!(!Arity::exact(2).accepts(1));
        assert!(!Arity::exact(2).accepts(3));
        assert!(Arity::range(1, 5).accepts(5));
        assert!(!Arity::range(1, 5).accepts(0));
        assert!(Arity::at_least(2).accepts(1000));
        assert!(!Arity::at_least(2).accepts(1));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = Memory::commands();
        assert_eq!(table.get("get").map(|c| c.name), Some("GET"));
        assert_eq!(table.get("HgEtAlL").map(|c| c.name), Some("HGETALL"));
        assert!(table.get("FOOBAR").is_none());
    }

    #[test]
    fn test_tables_follow_capabilities() {
        let memory = Memory::commands();
        let embedded = Embedded::commands();
        let remote = Remote::commands();

        for name in ["SETX", "EXPIRE", "TTL", "ZSET", "ZRANGE", "ZRRANGE", "ZRANK"] {
            assert!(memory.contains(name), "{}", name);
            assert!(!embedded.contains(name), "{}", name);
            assert!(remote.contains(name), "{}", name);
        }
        for name in ["GET", "RSCAN", "MULTI_DEL", "HSET", "HKEYS", "HRSCAN", "MULTI_HSET"] {
            assert!(embedded.contains(name), "{}", name);
        }
        for name in ["SADD", "QPUSH", "HELP", "QUIT"] {
            assert!(embedded.contains(name), "{}", name);
        }
        for name in ["PING", "SELECT", "AUTH"] {
            assert!(remote.contains(name), "{}", name);
            assert!(!memory.contains(name), "{}", name);
        }
        assert_eq!(remote.len(), memory.len() + 3);
    }

    #[test]
    fn test_access_levels() {
        let table = Memory::commands();
        assert_eq!(table.get("GET").map(|c| c.access), Some(Access::Read));
        assert_eq!(table.get("QPOP").map(|c| c.access), Some(Access::Write));
        assert_eq!(table.get("FLUSHDB").map(|c| c.access), Some(Access::Write));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_registration_panics() {
        let _ = CommandTable::<Memory>::new().with_key_value().with_key_value();
    }
}
