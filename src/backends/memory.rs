//! In-Process Backend
//!
//! [`MemoryStore`] keeps every key in one ordered map owned by its connection. Values
//! are typed (string, hash, set, sorted set, queue); using a key as the wrong type is
//! a `WRONGTYPE` backend error, as in Redis.
//!
//! ## Expiry
//!
//! Keys carry an optional deadline. Expired keys are dropped lazily: a key is checked
//! when it is touched, and whole-keyspace operations (KEYS, SCAN, DBKCOUNT) purge every
//! expired key first.
//!
//! ## Capacity
//!
//! With `-m max_keys` set, creating a key beyond the limit fails; updates to existing
//! keys always succeed.

use crate::backends::pattern::scan_sorted;
use crate::backends::{format_info, BackendKind};
use crate::commands::CommandTable;
use crate::config::MemoryConfig;
use crate::connection::ops::{in_key_range, slice_bounds};
use crate::connection::{Backend, ExpireOps, HashOps, KeyValueOps, QueueOps, SetOps, ZSetOps};
use crate::error::{Error, Result};
use std::collections::btree_map::Entry as MapEntry;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const NOT_INTEGER: &str = "ERR value is not an integer or out of range";
const OVERFLOW: &str = "ERR increment or decrement would overflow";
const INVALID_EXPIRE: &str = "ERR invalid expire time";

/// The in-process backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Memory;

impl Backend for Memory {
    type Config = MemoryConfig;
    type Handle = MemoryStore;

    const KIND: BackendKind = BackendKind::Memory;

    fn open(config: &MemoryConfig) -> Result<MemoryStore> {
        Ok(MemoryStore::with_max_keys(config.max_keys))
    }

    fn close(_handle: MemoryStore) -> Result<()> {
        Ok(())
    }

    fn commands() -> &'static CommandTable<Self> {
        static TABLE: OnceLock<CommandTable<Memory>> = OnceLock::new();
        TABLE.get_or_init(|| {
            CommandTable::new()
                .with_key_value()
                .with_expire()
                .with_hash()
                .with_set()
                .with_zset()
                .with_queue()
        })
    }
}

/// Typed payload of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Data {
    String(String),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
    ZSet(BTreeMap<String, i64>),
    Queue(VecDeque<String>),
}

impl Data {
    fn type_name(&self) -> &'static str {
        match self {
            Data::String(_) => "string",
            Data::Hash(_) => "hash",
            Data::Set(_) => "set",
            Data::ZSet(_) => "zset",
            Data::Queue(_) => "queue",
        }
    }

    /// Containers that became empty are removed along with their key.
    fn is_empty_container(&self) -> bool {
        match self {
            Data::String(_) => false,
            Data::Hash(h) => h.is_empty(),
            Data::Set(s) => s.is_empty(),
            Data::ZSet(z) => z.is_empty(),
            Data::Queue(q) => q.is_empty(),
        }
    }
}

/// A stored value with optional expiry time.
#[derive(Debug, Clone)]
struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Data) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    #[inline]
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

/// Operation counters of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Every primitive invoked on the store
    pub calls: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
    /// Keys dropped because they expired
    pub expired: u64,
}

/// Native handle of the [`Memory`] backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Entry>,
    max_keys: u64,
    stats: StoreStats,
    created_at: Option<Instant>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_keys(0)
    }

    /// Creates a store holding at most `max_keys` keys (0 = unlimited).
    pub fn with_max_keys(max_keys: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_keys,
            stats: StoreStats::default(),
            created_at: Some(Instant::now()),
        }
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Type of the value at `key`, or "none".
    pub fn key_type(&mut self, key: &str) -> &'static str {
        self.read(key).map(Data::type_name).unwrap_or("none")
    }

    fn record_call(&mut self) {
        self.stats.calls += 1;
    }

    fn is_full(&self) -> bool {
        self.max_keys != 0 && self.entries.len() as u64 >= self.max_keys
    }

    /// Drops `key` if it has expired.
    fn purge(&mut self, key: &str) {
        if self.entries.get(key).is_some_and(Entry::is_expired) {
            self.entries.remove(key);
            self.stats.expired += 1;
        }
    }

    fn purge_all(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired());
        self.stats.expired += (before - self.entries.len()) as u64;
    }

    fn read(&mut self, key: &str) -> Option<&Data> {
        self.purge(key);
        self.entries.get(key).map(|e| &e.data)
    }

    fn existing_mut(&mut self, key: &str) -> Option<&mut Data> {
        self.purge(key);
        self.entries.get_mut(key).map(|e| &mut e.data)
    }

    /// The entry at `key`, created from `init` if missing.
    fn write(&mut self, key: &str, init: fn() -> Data) -> Result<&mut Entry> {
        self.purge(key);
        let full = self.is_full();
        let max_keys = self.max_keys;
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(e) => Ok(e.into_mut()),
            MapEntry::Vacant(_) if full => Err(capacity_error(max_keys)),
            MapEntry::Vacant(e) => Ok(e.insert(Entry::new(init()))),
        }
    }

    /// Stores `data` at `key`, replacing any value and expiry.
    fn insert(&mut self, key: &str, data: Data) -> Result<&mut Entry> {
        self.purge(key);
        if !self.entries.contains_key(key) && self.is_full() {
            return Err(capacity_error(self.max_keys));
        }
        let entry = match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(e) => {
                let entry = e.into_mut();
                *entry = Entry::new(data);
                entry
            }
            MapEntry::Vacant(e) => e.insert(Entry::new(data)),
        };
        Ok(entry)
    }

    fn remove_if_empty(&mut self, key: &str) {
        if self
            .entries
            .get(key)
            .is_some_and(|e| e.data.is_empty_container())
        {
            self.entries.remove(key);
        }
    }

    fn hash(&mut self, key: &str) -> Result<Option<&BTreeMap<String, String>>> {
        match self.read(key) {
            None => Ok(None),
            Some(Data::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(Error::backend(WRONG_TYPE)),
        }
    }

    fn hash_mut(&mut self, key: &str) -> Result<&mut BTreeMap<String, String>> {
        match &mut self.write(key, || Data::Hash(BTreeMap::new()))?.data {
            Data::Hash(h) => Ok(h),
            _ => Err(Error::backend(WRONG_TYPE)),
        }
    }

    fn set_members(&mut self, key: &str) -> Result<Option<&BTreeSet<String>>> {
        match self.read(key) {
            None => Ok(None),
            Some(Data::Set(s)) => Ok(Some(s)),
            Some(_) => Err(Error::backend(WRONG_TYPE)),
        }
    }

    fn set_mut(&mut self, key: &str) -> Result<&mut BTreeSet<String>> {
        match &mut self.write(key, || Data::Set(BTreeSet::new()))?.data {
            Data::Set(s) => Ok(s),
            _ => Err(Error::backend(WRONG_TYPE)),
        }
    }

    fn zset_scores(&mut self, key: &str) -> Result<Option<&BTreeMap<String, i64>>> {
        match self.read(key) {
            None => Ok(None),
            Some(Data::ZSet(z)) => Ok(Some(z)),
            Some(_) => Err(Error::backend(WRONG_TYPE)),
        }
    }

    fn zset_mut(&mut self, key: &str) -> Result<&mut BTreeMap<String, i64>> {
        match &mut self.write(key, || Data::ZSet(BTreeMap::new()))?.data {
            Data::ZSet(z) => Ok(z),
            _ => Err(Error::backend(WRONG_TYPE)),
        }
    }

    fn queue(&mut self, key: &str) -> Result<Option<&VecDeque<String>>> {
        match self.read(key) {
            None => Ok(None),
            Some(Data::Queue(q)) => Ok(Some(q)),
            Some(_) => Err(Error::backend(WRONG_TYPE)),
        }
    }

    fn queue_mut(&mut self, key: &str) -> Result<&mut VecDeque<String>> {
        match &mut self.write(key, || Data::Queue(VecDeque::new()))?.data {
            Data::Queue(q) => Ok(q),
            _ => Err(Error::backend(WRONG_TYPE)),
        }
    }

    /// Removes a container of the given type, returning its size.
    fn clear_container(&mut self, key: &str, len: fn(&Data) -> Option<usize>) -> Result<u64> {
        let Some(data) = self.read(key) else {
            return Ok(0);
        };
        let removed = len(data).ok_or_else(|| Error::backend(WRONG_TYPE))?;
        self.entries.remove(key);
        Ok(removed as u64)
    }
}

/// Deadline `ttl_secs` from now; fails instead of overflowing the clock.
fn deadline(ttl_secs: u64) -> Result<Instant> {
    Instant::now()
        .checked_add(Duration::from_secs(ttl_secs))
        .ok_or_else(|| Error::backend(INVALID_EXPIRE))
}

fn capacity_error(max_keys: u64) -> Error {
    Error::backend(format!("OOM maximum number of keys ({}) reached", max_keys))
}

fn parse_integer(s: &str, message: &str) -> Result<i64> {
    s.parse().map_err(|_| Error::backend(message))
}

impl KeyValueOps for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.record_call();
        self.stats.get_ops += 1;
        match self.read(key) {
            None => Ok(None),
            Some(Data::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(Error::backend(WRONG_TYPE)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.record_call();
        self.stats.set_ops += 1;
        self.insert(key, Data::String(value.to_string()))?;
        Ok(())
    }

    fn delete(&mut self, keys: &[String]) -> Result<Vec<String>> {
        self.record_call();
        self.stats.del_ops += 1;
        let mut deleted = Vec::new();
        for key in keys {
            self.purge(key);
            if self.entries.remove(key.as_str()).is_some() {
                deleted.push(key.clone());
            }
        }
        Ok(deleted)
    }

    fn rename(&mut self, key: &str, new_key: &str) -> Result<()> {
        self.record_call();
        self.purge(key);
        let entry = self
            .entries
            .remove(key)
            .ok_or_else(|| Error::backend("ERR no such key"))?;
        self.entries.insert(new_key.to_string(), entry);
        Ok(())
    }

    fn keys(&mut self, start: &str, end: &str, limit: u64) -> Result<Vec<String>> {
        self.record_call();
        self.purge_all();
        let limit = if limit == 0 { usize::MAX } else { limit as usize };
        Ok(self
            .entries
            .keys()
            .filter(|k| in_key_range(k, start, end))
            .take(limit)
            .cloned()
            .collect())
    }

    fn scan(&mut self, cursor: u64, pattern: &str, count: u64) -> Result<(u64, Vec<String>)> {
        self.record_call();
        self.purge_all();
        Ok(scan_sorted(self.entries.keys(), cursor, pattern, count))
    }

    fn key_count(&mut self) -> Result<u64> {
        self.record_call();
        self.purge_all();
        Ok(self.entries.len() as u64)
    }

    fn flush_db(&mut self) -> Result<()> {
        self.record_call();
        self.entries.clear();
        Ok(())
    }

    fn info(&mut self, section: Option<&str>) -> Result<String> {
        self.record_call();
        self.purge_all();
        let uptime = self.created_at.map(|t| t.elapsed().as_secs()).unwrap_or(0);
        let expires = self
            .entries
            .values()
            .filter(|e| e.expires_at.is_some())
            .count();
        let stats = self.stats;

        Ok(format_info(
            &[
                (
                    "Server",
                    vec![
                        ("kvbridge_version", crate::VERSION.to_string()),
                        ("backend", BackendKind::Memory.to_string()),
                        ("uptime_in_seconds", uptime.to_string()),
                        ("max_keys", self.max_keys.to_string()),
                    ],
                ),
                (
                    "Keyspace",
                    vec![(
                        "db0",
                        format!("keys={},expires={}", self.entries.len(), expires),
                    )],
                ),
                (
                    "Stats",
                    vec![
                        ("total_calls", stats.calls.to_string()),
                        ("get_ops", stats.get_ops.to_string()),
                        ("set_ops", stats.set_ops.to_string()),
                        ("del_ops", stats.del_ops.to_string()),
                        ("expired_keys", stats.expired.to_string()),
                    ],
                ),
            ],
            section,
        ))
    }

    fn incr(&mut self, key: &str, by: i64) -> Result<i64> {
        self.record_call();
        let entry = self.write(key, || Data::String("0".to_string()))?;
        let Data::String(current) = &mut entry.data else {
            return Err(Error::backend(WRONG_TYPE));
        };

        let value = parse_integer(current, NOT_INTEGER)?
            .checked_add(by)
            .ok_or_else(|| Error::backend(OVERFLOW))?;
        *current = value.to_string();
        Ok(value)
    }

    fn quit(&mut self) -> Result<()> {
        self.record_call();
        Ok(())
    }
}

impl ExpireOps for MemoryStore {
    fn set_with_ttl(&mut self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.record_call();
        self.stats.set_ops += 1;
        let expires_at = deadline(ttl_secs)?;
        let entry = self.insert(key, Data::String(value.to_string()))?;
        entry.expires_at = Some(expires_at);
        Ok(())
    }

    fn expire(&mut self, key: &str, ttl_secs: u64) -> Result<bool> {
        self.record_call();
        self.purge(key);
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(deadline(ttl_secs)?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ttl(&mut self, key: &str) -> Result<i64> {
        self.record_call();
        self.purge(key);
        Ok(match self.entries.get(key) {
            None => -2,
            Some(Entry {
                expires_at: None, ..
            }) => -1,
            Some(Entry {
                expires_at: Some(exp),
                ..
            }) => {
                let remaining = exp.saturating_duration_since(Instant::now());
                i64::try_from((remaining.as_millis() + 500) / 1000).unwrap_or(i64::MAX)
            }
        })
    }
}

impl HashOps for MemoryStore {
    fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>> {
        self.record_call();
        Ok(self.hash(key)?.and_then(|h| h.get(field).cloned()))
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.record_call();
        Ok(self
            .hash_mut(key)?
            .insert(field.to_string(), value.to_string())
            .is_none())
    }

    fn hdel(&mut self, key: &str, field: &str) -> Result<bool> {
        self.record_call();
        let removed = match self.existing_mut(key) {
            None => false,
            Some(Data::Hash(h)) => h.remove(field).is_some(),
            Some(_) => return Err(Error::backend(WRONG_TYPE)),
        };
        self.remove_if_empty(key);
        Ok(removed)
    }

    fn hgetall(&mut self, key: &str) -> Result<Vec<(String, String)>> {
        self.record_call();
        Ok(self
            .hash(key)?
            .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn hsize(&mut self, key: &str) -> Result<u64> {
        self.record_call();
        Ok(self.hash(key)?.map(|h| h.len() as u64).unwrap_or(0))
    }

    fn hclear(&mut self, key: &str) -> Result<u64> {
        self.record_call();
        self.clear_container(key, |data| match data {
            Data::Hash(h) => Some(h.len()),
            _ => None,
        })
    }

    fn hincr(&mut self, key: &str, field: &str, by: i64) -> Result<i64> {
        self.record_call();
        let hash = self.hash_mut(key)?;
        let current = match hash.get(field) {
            Some(v) => parse_integer(v, "ERR hash value is not an integer")?,
            None => 0,
        };
        let value = current
            .checked_add(by)
            .ok_or_else(|| Error::backend(OVERFLOW))?;
        hash.insert(field.to_string(), value.to_string());
        Ok(value)
    }
}

impl SetOps for MemoryStore {
    fn sadd(&mut self, key: &str, members: &[String]) -> Result<u64> {
        self.record_call();
        let set = self.set_mut(key)?;
        Ok(members.iter().filter(|m| set.insert(m.to_string())).count() as u64)
    }

    fn srem(&mut self, key: &str, members: &[String]) -> Result<u64> {
        self.record_call();
        let removed = match self.existing_mut(key) {
            None => 0,
            Some(Data::Set(s)) => members.iter().filter(|m| s.remove(m.as_str())).count(),
            Some(_) => return Err(Error::backend(WRONG_TYPE)),
        };
        self.remove_if_empty(key);
        Ok(removed as u64)
    }

    fn smembers(&mut self, key: &str) -> Result<Vec<String>> {
        self.record_call();
        Ok(self
            .set_members(key)?
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn scard(&mut self, key: &str) -> Result<u64> {
        self.record_call();
        Ok(self.set_members(key)?.map(|s| s.len() as u64).unwrap_or(0))
    }
}

impl ZSetOps for MemoryStore {
    fn zset(&mut self, key: &str, member: &str, score: i64) -> Result<bool> {
        self.record_call();
        Ok(self
            .zset_mut(key)?
            .insert(member.to_string(), score)
            .is_none())
    }

    fn zget(&mut self, key: &str, member: &str) -> Result<Option<i64>> {
        self.record_call();
        Ok(self.zset_scores(key)?.and_then(|z| z.get(member).copied()))
    }

    fn zdel(&mut self, key: &str, member: &str) -> Result<bool> {
        self.record_call();
        let removed = match self.existing_mut(key) {
            None => false,
            Some(Data::ZSet(z)) => z.remove(member).is_some(),
            Some(_) => return Err(Error::backend(WRONG_TYPE)),
        };
        self.remove_if_empty(key);
        Ok(removed)
    }

    fn zincr(&mut self, key: &str, member: &str, by: i64) -> Result<i64> {
        self.record_call();
        let zset = self.zset_mut(key)?;
        let score = zset.entry(member.to_string()).or_insert(0);
        *score = score
            .checked_add(by)
            .ok_or_else(|| Error::backend(OVERFLOW))?;
        Ok(*score)
    }

    fn zsize(&mut self, key: &str) -> Result<u64> {
        self.record_call();
        Ok(self.zset_scores(key)?.map(|z| z.len() as u64).unwrap_or(0))
    }

    fn zclear(&mut self, key: &str) -> Result<u64> {
        self.record_call();
        self.clear_container(key, |data| match data {
            Data::ZSet(z) => Some(z.len()),
            _ => None,
        })
    }

    fn zrange(&mut self, key: &str, offset: u64, limit: u64) -> Result<Vec<(String, i64)>> {
        self.record_call();
        let Some(zset) = self.zset_scores(key)? else {
            return Ok(Vec::new());
        };

        let mut pairs: Vec<(String, i64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
        pairs.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let limit = if limit == 0 { usize::MAX } else { limit as usize };
        Ok(pairs.into_iter().skip(offset as usize).take(limit).collect())
    }
}

impl QueueOps for MemoryStore {
    fn qpush(&mut self, key: &str, values: &[String]) -> Result<u64> {
        self.record_call();
        let queue = self.queue_mut(key)?;
        queue.extend(values.iter().cloned());
        Ok(queue.len() as u64)
    }

    fn qpop(&mut self, key: &str) -> Result<Option<String>> {
        self.record_call();
        let popped = match self.existing_mut(key) {
            None => None,
            Some(Data::Queue(q)) => q.pop_front(),
            Some(_) => return Err(Error::backend(WRONG_TYPE)),
        };
        self.remove_if_empty(key);
        Ok(popped)
    }

    fn qslice(&mut self, key: &str, begin: i64, end: i64) -> Result<Vec<String>> {
        self.record_call();
        let Some(queue) = self.queue(key)? else {
            return Ok(Vec::new());
        };
        Ok(match slice_bounds(queue.len(), begin, end) {
            Some((from, to)) => queue.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    fn qsize(&mut self, key: &str) -> Result<u64> {
        self.record_call();
        Ok(self.queue(key)?.map(|q| q.len() as u64).unwrap_or(0))
    }

    fn qclear(&mut self, key: &str) -> Result<u64> {
        self.record_call();
        self.clear_container(key, |data| match data {
            Data::Queue(q) => Some(q.len()),
            _ => None,
        })
    }
}
