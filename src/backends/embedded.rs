//! On-Disk Embedded Backend
//!
//! [`EmbeddedStore`] keeps its data in a `sled` database at the configured path.
//!
//! ## Layout
//!
//! The default tree is the keyspace: every key maps to a one-byte type tag, followed
//! by the payload for strings. Containers keep their items in a tree of their own:
//!
//! ```text
//! default tree   "name"  -> 's' "Ariz"
//!                "user"  -> 'h'
//!                "jobs"  -> 'q'
//! "hash:user"    "age"   -> "30"
//! "queue:jobs"   seq(0)  -> "first"
//!                seq(1)  -> "second"
//! ```
//!
//! Queue items are keyed by an `i64` sequence number with its sign bit flipped,
//! stored big-endian, so byte order matches numeric order. A container whose last
//! item is removed is dropped together with its key.
//!
//! ## Environment Flags
//!
//! `READ_ONLY` requires the database to exist and rejects every write;
//! `TEMPORARY` opens a throwaway database that is deleted when closed.

use crate::backends::pattern::{scan_sorted, DEFAULT_SCAN_COUNT};
use crate::backends::{format_info, BackendKind};
use crate::commands::CommandTable;
use crate::config::EmbeddedConfig;
use crate::connection::ops::slice_bounds;
use crate::connection::{Backend, HashOps, KeyValueOps, QueueOps, SetOps};
use crate::error::{Error, Result};
use sled::{Db, Tree};
use std::ops::Bound;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::debug;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Type tags stored as the first byte of every keyspace value.
const STRING: u8 = b's';
const HASH: u8 = b'h';
const SET: u8 = b'e';
const QUEUE: u8 = b'q';

/// The on-disk backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Embedded;

impl Backend for Embedded {
    type Config = EmbeddedConfig;
    type Handle = EmbeddedStore;

    const KIND: BackendKind = BackendKind::Embedded;

    fn open(config: &EmbeddedConfig) -> Result<EmbeddedStore> {
        EmbeddedStore::open(config)
    }

    fn close(handle: EmbeddedStore) -> Result<()> {
        handle.db.flush().map_err(storage_error)?;
        Ok(())
    }

    fn commands() -> &'static CommandTable<Self> {
        static TABLE: OnceLock<CommandTable<Embedded>> = OnceLock::new();
        TABLE.get_or_init(|| {
            CommandTable::new()
                .with_key_value()
                .with_hash()
                .with_set()
                .with_queue()
        })
    }

    fn is_read_only(config: &EmbeddedConfig) -> bool {
        config.is_read_only()
    }
}

fn storage_error(e: sled::Error) -> Error {
    Error::backend(format!("ERR storage: {}", e))
}

fn decode(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::backend("ERR stored data is not valid UTF-8"))
}

fn tree_name(tag: u8, key: &str) -> Option<String> {
    let prefix = match tag {
        HASH => "hash",
        SET => "set",
        QUEUE => "queue",
        _ => return None,
    };
    Some(format!("{}:{}", prefix, key))
}

/// Map an `i64` sequence number to sortable big-endian bytes.
fn seq_to_key(seq: i64) -> [u8; 8] {
    ((seq as u64) ^ (1 << 63)).to_be_bytes()
}

fn key_to_seq(k: &[u8]) -> i64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&k[..8]);
    (u64::from_be_bytes(b) ^ (1 << 63)) as i64
}

/// Native handle of the [`Embedded`] backend.
pub struct EmbeddedStore {
    db: Db,
    path: PathBuf,
    read_only: bool,
    temporary: bool,
}

impl EmbeddedStore {
    /// Opens the database described by `config`.
    pub fn open(config: &EmbeddedConfig) -> Result<Self> {
        let path = config.resolved_path();
        let sled_config = if config.is_temporary() {
            sled::Config::new().temporary(true)
        } else {
            if config.is_read_only() && !path.exists() {
                return Err(Error::Connect(format!(
                    "{}: database does not exist",
                    path.display()
                )));
            }
            sled::Config::new().path(&path)
        };

        let db = sled_config
            .open()
            .map_err(|e| Error::Connect(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Opened embedded database");

        Ok(Self {
            db,
            path,
            read_only: config.is_read_only(),
            temporary: config.is_temporary(),
        })
    }

    fn writable(&self) -> Result<()> {
        if self.read_only {
            Err(Error::backend("READONLY database was opened read-only"))
        } else {
            Ok(())
        }
    }

    fn tag_of(&self, key: &str) -> Result<Option<u8>> {
        Ok(self
            .db
            .get(key)
            .map_err(storage_error)?
            .and_then(|v| v.first().copied()))
    }

    /// The container tree at `key`, or `None` if the key does not exist.
    fn container(&self, key: &str, tag: u8) -> Result<Option<Tree>> {
        match self.tag_of(key)? {
            None => Ok(None),
            Some(t) if t == tag => self.open_container(key, tag).map(Some),
            Some(_) => Err(Error::backend(WRONG_TYPE)),
        }
    }

    /// The container tree at `key`, created if missing.
    fn container_or_create(&self, key: &str, tag: u8) -> Result<Tree> {
        match self.tag_of(key)? {
            None => {
                self.db.insert(key, &[tag][..]).map_err(storage_error)?;
                self.open_container(key, tag)
            }
            Some(t) if t == tag => self.open_container(key, tag),
            Some(_) => Err(Error::backend(WRONG_TYPE)),
        }
    }

    fn open_container(&self, key: &str, tag: u8) -> Result<Tree> {
        let name = tree_name(tag, key).ok_or_else(|| Error::backend(WRONG_TYPE))?;
        self.db.open_tree(name).map_err(storage_error)
    }

    /// Drops the container and its key once it holds no items.
    fn release_if_empty(&self, key: &str, tag: u8, tree: &Tree) -> Result<()> {
        if tree.is_empty() {
            self.remove_key(key, tag)?;
        }
        Ok(())
    }

    /// Removes `key` and, for containers, its tree.
    fn remove_key(&self, key: &str, tag: u8) -> Result<()> {
        self.db.remove(key).map_err(storage_error)?;
        if let Some(name) = tree_name(tag, key) {
            self.db.drop_tree(name).map_err(storage_error)?;
        }
        Ok(())
    }

    fn string_value(&self, key: &str) -> Result<Option<String>> {
        match self.db.get(key).map_err(storage_error)? {
            None => Ok(None),
            Some(v) if v.first() == Some(&STRING) => decode(&v[1..]).map(Some),
            Some(_) => Err(Error::backend(WRONG_TYPE)),
        }
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        if let Some(tag) = self.tag_of(key)? {
            if tag != STRING {
                self.remove_key(key, tag)?;
            }
        }
        let mut encoded = Vec::with_capacity(value.len() + 1);
        encoded.push(STRING);
        encoded.extend_from_slice(value.as_bytes());
        self.db.insert(key, encoded).map_err(storage_error)?;
        Ok(())
    }

    fn bounds(tree: &Tree) -> Result<Option<(i64, i64)>> {
        let first = tree.first().map_err(storage_error)?;
        let last = tree.last().map_err(storage_error)?;
        Ok(match (first, last) {
            (Some((head, _)), Some((tail, _))) => Some((key_to_seq(&head), key_to_seq(&tail))),
            _ => None,
        })
    }

    fn decode_pairs(tree: &Tree) -> Result<Vec<(String, String)>> {
        tree.iter()
            .map(|item| {
                let (k, v) = item.map_err(storage_error)?;
                Ok((decode(&k)?, decode(&v)?))
            })
            .collect()
    }

    fn decode_keys(tree: &Tree) -> Result<Vec<String>> {
        tree.iter()
            .keys()
            .map(|k| decode(&k.map_err(storage_error)?))
            .collect()
    }
}

impl std::fmt::Debug for EmbeddedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedStore")
            .field("path", &self.path)
            .field("read_only", &self.read_only)
            .field("temporary", &self.temporary)
            .finish()
    }
}

impl KeyValueOps for EmbeddedStore {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.string_value(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.writable()?;
        self.put_string(key, value)
    }

    fn delete(&mut self, keys: &[String]) -> Result<Vec<String>> {
        self.writable()?;
        let mut deleted = Vec::new();
        for key in keys {
            if let Some(tag) = self.tag_of(key)? {
                self.remove_key(key, tag)?;
                deleted.push(key.clone());
            }
        }
        Ok(deleted)
    }

    fn rename(&mut self, key: &str, new_key: &str) -> Result<()> {
        self.writable()?;
        let value = self
            .db
            .get(key)
            .map_err(storage_error)?
            .ok_or_else(|| Error::backend("ERR no such key"))?;
        if key == new_key {
            return Ok(());
        }
        if let Some(tag) = self.tag_of(new_key)? {
            self.remove_key(new_key, tag)?;
        }

        let tag = value.first().copied().unwrap_or(STRING);
        if tag != STRING {
            let source = self.open_container(key, tag)?;
            let target = self.open_container(new_key, tag)?;
            for item in source.iter() {
                let (k, v) = item.map_err(storage_error)?;
                target.insert(k, v).map_err(storage_error)?;
            }
        }
        self.db.insert(new_key, value).map_err(storage_error)?;
        self.remove_key(key, tag)
    }

    fn keys(&mut self, start: &str, end: &str, limit: u64) -> Result<Vec<String>> {
        if !start.is_empty() && !end.is_empty() && start > end {
            return Ok(Vec::new());
        }
        let lower = if start.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(start.as_bytes())
        };
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(end.as_bytes())
        };

        let limit = if limit == 0 { usize::MAX } else { limit as usize };
        self.db
            .range::<&[u8], _>((lower, upper))
            .keys()
            .take(limit)
            .map(|k| decode(&k.map_err(storage_error)?))
            .collect()
    }

    fn scan(&mut self, cursor: u64, pattern: &str, count: u64) -> Result<(u64, Vec<String>)> {
        let count = if count == 0 { DEFAULT_SCAN_COUNT } else { count };

        // One key past the window tells whether the iteration is complete
        let window = self
            .db
            .iter()
            .keys()
            .skip(cursor as usize)
            .take(count as usize + 1)
            .map(|k| decode(&k.map_err(storage_error)?))
            .collect::<Result<Vec<_>>>()?;

        let (next, keys) = scan_sorted(window, 0, pattern, count);
        Ok((if next == 0 { 0 } else { cursor + next }, keys))
    }

    fn key_count(&mut self) -> Result<u64> {
        Ok(self.db.len() as u64)
    }

    fn flush_db(&mut self) -> Result<()> {
        self.writable()?;
        for item in self.db.iter() {
            let (k, v) = item.map_err(storage_error)?;
            let key = decode(&k)?;
            if let Some(name) = v.first().and_then(|tag| tree_name(*tag, &key)) {
                self.db.drop_tree(name).map_err(storage_error)?;
            }
        }
        self.db.clear().map_err(storage_error)
    }

    fn info(&mut self, section: Option<&str>) -> Result<String> {
        let size = self.db.size_on_disk().map_err(storage_error)?;
        Ok(format_info(
            &[
                (
                    "Server",
                    vec![
                        ("kvbridge_version", crate::VERSION.to_string()),
                        ("backend", BackendKind::Embedded.to_string()),
                        ("path", self.path.display().to_string()),
                        ("read_only", u8::from(self.read_only).to_string()),
                        ("temporary", u8::from(self.temporary).to_string()),
                    ],
                ),
                ("Keyspace", vec![("db0", format!("keys={}", self.db.len()))]),
                ("Storage", vec![("size_on_disk", size.to_string())]),
            ],
            section,
        ))
    }

    fn incr(&mut self, key: &str, by: i64) -> Result<i64> {
        self.writable()?;
        let current = match self.string_value(key)? {
            Some(s) => s
                .parse::<i64>()
                .map_err(|_| Error::backend("ERR value is not an integer or out of range"))?,
            None => 0,
        };
        let value = current
            .checked_add(by)
            .ok_or_else(|| Error::backend("ERR increment or decrement would overflow"))?;
        self.put_string(key, &value.to_string())?;
        Ok(value)
    }

    fn quit(&mut self) -> Result<()> {
        Ok(())
    }
}

impl HashOps for EmbeddedStore {
    fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>> {
        let Some(tree) = self.container(key, HASH)? else {
            return Ok(None);
        };
        match tree.get(field).map_err(storage_error)? {
            Some(v) => decode(&v).map(Some),
            None => Ok(None),
        }
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.writable()?;
        let tree = self.container_or_create(key, HASH)?;
        let previous = tree
            .insert(field, value.as_bytes())
            .map_err(storage_error)?;
        Ok(previous.is_none())
    }

    fn hdel(&mut self, key: &str, field: &str) -> Result<bool> {
        self.writable()?;
        let Some(tree) = self.container(key, HASH)? else {
            return Ok(false);
        };
        let removed = tree.remove(field).map_err(storage_error)?.is_some();
        self.release_if_empty(key, HASH, &tree)?;
        Ok(removed)
    }

    fn hgetall(&mut self, key: &str) -> Result<Vec<(String, String)>> {
        match self.container(key, HASH)? {
            Some(tree) => Self::decode_pairs(&tree),
            None => Ok(Vec::new()),
        }
    }

    fn hsize(&mut self, key: &str) -> Result<u64> {
        Ok(self
            .container(key, HASH)?
            .map(|t| t.len() as u64)
            .unwrap_or(0))
    }

    fn hclear(&mut self, key: &str) -> Result<u64> {
        self.writable()?;
        let Some(tree) = self.container(key, HASH)? else {
            return Ok(0);
        };
        let removed = tree.len() as u64;
        self.remove_key(key, HASH)?;
        Ok(removed)
    }

    fn hincr(&mut self, key: &str, field: &str, by: i64) -> Result<i64> {
        self.writable()?;
        let tree = self.container_or_create(key, HASH)?;
        let current = match tree.get(field).map_err(storage_error)? {
            Some(v) => decode(&v)?
                .parse::<i64>()
                .map_err(|_| Error::backend("ERR hash value is not an integer"))?,
            None => 0,
        };
        let value = current
            .checked_add(by)
            .ok_or_else(|| Error::backend("ERR increment or decrement would overflow"))?;
        tree.insert(field, value.to_string().as_bytes())
            .map_err(storage_error)?;
        Ok(value)
    }
}

impl SetOps for EmbeddedStore {
    fn sadd(&mut self, key: &str, members: &[String]) -> Result<u64> {
        self.writable()?;
        let tree = self.container_or_create(key, SET)?;
        let mut added = 0;
        for member in members {
            if tree
                .insert(member.as_bytes(), &b""[..])
                .map_err(storage_error)?
                .is_none()
            {
                added += 1;
            }
        }
        Ok(added)
    }

    fn srem(&mut self, key: &str, members: &[String]) -> Result<u64> {
        self.writable()?;
        let Some(tree) = self.container(key, SET)? else {
            return Ok(0);
        };
        let mut removed = 0;
        for member in members {
            if tree
                .remove(member.as_bytes())
                .map_err(storage_error)?
                .is_some()
            {
                removed += 1;
            }
        }
        self.release_if_empty(key, SET, &tree)?;
        Ok(removed)
    }

    fn smembers(&mut self, key: &str) -> Result<Vec<String>> {
        match self.container(key, SET)? {
            Some(tree) => Self::decode_keys(&tree),
            None => Ok(Vec::new()),
        }
    }

    fn scard(&mut self, key: &str) -> Result<u64> {
        Ok(self
            .container(key, SET)?
            .map(|t| t.len() as u64)
            .unwrap_or(0))
    }
}

impl QueueOps for EmbeddedStore {
    fn qpush(&mut self, key: &str, values: &[String]) -> Result<u64> {
        self.writable()?;
        let tree = self.container_or_create(key, QUEUE)?;
        let mut next = Self::bounds(&tree)?.map(|(_, tail)| tail + 1).unwrap_or(0);
        for value in values {
            tree.insert(seq_to_key(next), value.as_bytes())
                .map_err(storage_error)?;
            next += 1;
        }
        Ok(tree.len() as u64)
    }

    fn qpop(&mut self, key: &str) -> Result<Option<String>> {
        self.writable()?;
        let Some(tree) = self.container(key, QUEUE)? else {
            return Ok(None);
        };
        let popped = tree.pop_min().map_err(storage_error)?;
        self.release_if_empty(key, QUEUE, &tree)?;
        popped.map(|(_, v)| decode(&v)).transpose()
    }

    fn qslice(&mut self, key: &str, begin: i64, end: i64) -> Result<Vec<String>> {
        let Some(tree) = self.container(key, QUEUE)? else {
            return Ok(Vec::new());
        };
        let Some((from, to)) = slice_bounds(tree.len(), begin, end) else {
            return Ok(Vec::new());
        };
        tree.iter()
            .values()
            .skip(from)
            .take(to - from + 1)
            .map(|v| decode(&v.map_err(storage_error)?))
            .collect()
    }

    fn qsize(&mut self, key: &str) -> Result<u64> {
        Ok(self
            .container(key, QUEUE)?
            .map(|t| t.len() as u64)
            .unwrap_or(0))
    }

    fn qclear(&mut self, key: &str) -> Result<u64> {
        self.writable()?;
        let Some(tree) = self.container(key, QUEUE)? else {
            return Ok(0);
        };
        let removed = tree.len() as u64;
        self.remove_key(key, QUEUE)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn open_temp() -> (TempDir, EmbeddedStore) {
        let dir = TempDir::new().unwrap();
        let config = EmbeddedConfig {
            path: dir.path().join("db").display().to_string(),
            ..Default::default()
        };
        let store = EmbeddedStore::open(&config).unwrap();
        (dir, store)
    }

    #[test]
    fn test_seq_keys_sort_numerically() {
        assert!(seq_to_key(-1) < seq_to_key(0));
        assert!(seq_to_key(0) < seq_to_key(1));
        assert!(seq_to_key(i64::MIN) < seq_to_key(i64::MAX));
        assert_eq!(key_to_seq(&seq_to_key(-42)), -42);
    }

    #[test]
    fn test_strings_and_keys() {
        let (_dir, mut store) = open_temp();
        for key in ["0", "a", "ab", "b", "ba"] {
            store.set(key, "v").unwrap();
        }
        assert_eq!(store.get("ab").unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("zz").unwrap(), None);
        assert_eq!(store.keys("a", "b", 10).unwrap(), strings(&["a", "ab", "b"]));
        assert_eq!(store.keys("", "", 2).unwrap(), strings(&["0", "a"]));
        assert!(store.keys("b", "a", 0).unwrap().is_empty());
        assert_eq!(store.key_count().unwrap(), 5);
    }

    #[test]
    fn test_delete_rename_incr() {
        let (_dir, mut store) = open_temp();
        store.set("a", "1").unwrap();
        assert_eq!(store.incr("a", 4).unwrap(), 5);
        assert_eq!(store.incr("fresh", -1).unwrap(), -1);

        store.rename("a", "b").unwrap();
        assert_eq!(store.get("b").unwrap().as_deref(), Some("5"));
        assert_eq!(store.rename("a", "c"), Err(Error::backend("ERR no such key")));

        assert_eq!(store.delete(&strings(&["b", "nope"])).unwrap(), strings(&["b"]));
    }

    #[test]
    fn test_hash_and_type_checks() {
        let (_dir, mut store) = open_temp();
        assert!(store.hset("user", "name", "Ariz").unwrap());
        assert!(!store.hset("user", "name", "Ariz K").unwrap());
        assert_eq!(store.hincr("user", "age", 30).unwrap(), 30);
        assert_eq!(
            store.hgetall("user").unwrap(),
            vec![
                ("age".to_string(), "30".to_string()),
                ("name".to_string(), "Ariz K".to_string())
            ]
        );
        assert_eq!(store.get("user"), Err(Error::backend(WRONG_TYPE)));
        assert_eq!(store.key_count().unwrap(), 1);

        assert!(store.hdel("user", "name").unwrap());
        assert!(store.hdel("user", "age").unwrap());
        assert_eq!(store.key_count().unwrap(), 0);
    }

    #[test]
    fn test_rename_moves_container() {
        let (_dir, mut store) = open_temp();
        store.sadd("old", &strings(&["x", "y"])).unwrap();
        store.rename("old", "new").unwrap();
        assert!(store.smembers("old").unwrap().is_empty());
        assert_eq!(store.smembers("new").unwrap(), strings(&["x", "y"]));
    }

    #[test]
    fn test_set_ops() {
        let (_dir, mut store) = open_temp();
        assert_eq!(store.sadd("s", &strings(&["b", "a", "a"])).unwrap(), 2);
        assert_eq!(store.scard("s").unwrap(), 2);
        assert_eq!(store.srem("s", &strings(&["a", "z"])).unwrap(), 1);
        assert_eq!(store.smembers("s").unwrap(), strings(&["b"]));
    }

    #[test]
    fn test_queue_ops() {
        let (_dir, mut store) = open_temp();
        assert_eq!(store.qpush("q", &strings(&["a", "b"])).unwrap(), 2);
        assert_eq!(store.qpush("q", &strings(&["c"])).unwrap(), 3);
        assert_eq!(store.qslice("q", 1, -1).unwrap(), strings(&["b", "c"]));
        assert_eq!(store.qpop("q").unwrap().as_deref(), Some("a"));
        assert_eq!(store.qsize("q").unwrap(), 2);
        assert_eq!(store.qclear("q").unwrap(), 2);
        assert_eq!(store.qpop("q").unwrap(), None);
        assert_eq!(store.key_count().unwrap(), 0);
    }

    #[test]
    fn test_scan_and_flush() {
        let (_dir, mut store) = open_temp();
        for i in 0..12 {
            store.set(&format!("k{:02}", i), "v").unwrap();
        }
        store.hset("h", "f", "v").unwrap();

        let (next, keys) = store.scan(0, "k*", 10).unwrap();
        assert_eq!(next, 10);
        assert_eq!(keys.len(), 9); // "h" sorts first
        let (next, keys) = store.scan(next, "k*", 10).unwrap();
        assert_eq!(next, 0);
        assert_eq!(keys, strings(&["k09", "k10", "k11"]));

        store.flush_db().unwrap();
        assert_eq!(store.key_count().unwrap(), 0);
        assert_eq!(store.hsize("h").unwrap(), 0);
    }

    #[test]
    fn test_read_only() {
        let dir = TempDir::new().unwrap();
        let mut config = EmbeddedConfig {
            path: dir.path().join("missing").display().to_string(),
            ..Default::default()
        };
        config.set_read_only(true);
        assert!(matches!(EmbeddedStore::open(&config), Err(Error::Connect(_))));
        assert!(Embedded::is_read_only(&config));

        let existing = dir.path().join("existing");
        std::fs::create_dir(&existing).unwrap();
        config.path = existing.display().to_string();
        let mut store = EmbeddedStore::open(&config).unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        assert!(matches!(store.set("k", "w"), Err(Error::Backend(_))));
        assert!(matches!(store.flush_db(), Err(Error::Backend(_))));
    }

    #[test]
    fn test_temporary() {
        let config = EmbeddedConfig::parse("-e 2").unwrap();
        let mut store = EmbeddedStore::open(&config).unwrap();
        store.set("k", "v").unwrap();
        assert_eq!(store.key_count().unwrap(), 1);
    }
}
