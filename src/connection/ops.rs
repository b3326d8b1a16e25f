//! Capability traits implemented by backend-native handles.
//!
//! | Trait         | memory | embedded | remote |
//! |---------------|--------|----------|--------|
//! | `KeyValueOps` | yes    | yes      | yes    |
//! | `ExpireOps`   | yes    | no       | yes    |
//! | `HashOps`     | yes    | yes      | yes    |
//! | `SetOps`      | yes    | yes      | yes    |
//! | `ZSetOps`     | yes    | no       | yes    |
//! | `QueueOps`    | yes    | yes      | yes    |
//!
//! All methods take `&mut self`: a handle serves one command at a time.
//!
//! Reverse listings, range scans and multi-item calls have default bodies built on
//! the core primitives; a backend overrides them when its native API does better.

use crate::error::Result;

/// Plain string keys plus database-wide operations.
pub trait KeyValueOps {
    fn get(&mut self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Deletes `keys`, returning the ones that existed.
    fn delete(&mut self, keys: &[String]) -> Result<Vec<String>>;

    /// Moves `key` to `new_key`, overwriting it. Fails if `key` does not exist.
    fn rename(&mut self, key: &str, new_key: &str) -> Result<()>;

    /// Keys `k` with `start <= k <= end` in ascending order.
    ///
    /// An empty bound is unbounded; `limit` 0 means no limit.
    fn keys(&mut self, start: &str, end: &str, limit: u64) -> Result<Vec<String>>;

    /// Keys `k` with `end <= k <= start` in descending order.
    fn rkeys(&mut self, start: &str, end: &str, limit: u64) -> Result<Vec<String>> {
        let mut keys = self.keys(end, start, 0)?;
        keys.reverse();
        apply_limit(&mut keys, limit);
        Ok(keys)
    }

    /// Incremental iteration in key order.
    ///
    /// `cursor` is the number of keys already examined. Returns the next cursor
    /// (0 once the iteration is complete) and the keys matching the glob `pattern`
    /// among the next `count` examined.
    fn scan(&mut self, cursor: u64, pattern: &str, count: u64) -> Result<(u64, Vec<String>)>;

    /// Number of keys of every type.
    fn key_count(&mut self) -> Result<u64>;

    fn flush_db(&mut self) -> Result<()>;

    /// Human-readable backend information.
    fn info(&mut self, section: Option<&str>) -> Result<String>;

    /// Adds `by` to the integer stored at `key` (missing keys start at 0).
    fn incr(&mut self, key: &str, by: i64) -> Result<i64>;

    /// Ends the session with the backend.
    fn quit(&mut self) -> Result<()>;
}

/// Time-to-live on keys.
pub trait ExpireOps {
    /// Sets a value that expires after `ttl_secs` seconds.
    fn set_with_ttl(&mut self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Returns false if the key does not exist.
    fn expire(&mut self, key: &str, ttl_secs: u64) -> Result<bool>;

    /// Remaining seconds; -2 if the key does not exist, -1 if it has no expiry.
    fn ttl(&mut self, key: &str) -> Result<i64>;
}

pub trait HashOps {
    fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>>;

    /// Returns true if the field was created, false if it was updated.
    fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<bool>;

    /// Returns true if the field existed.
    fn hdel(&mut self, key: &str, field: &str) -> Result<bool>;

    /// All `(field, value)` pairs, ordered by field.
    fn hgetall(&mut self, key: &str) -> Result<Vec<(String, String)>>;

    fn hsize(&mut self, key: &str) -> Result<u64>;

    /// Removes the hash, returning how many fields it had.
    fn hclear(&mut self, key: &str) -> Result<u64>;

    fn hincr(&mut self, key: &str, field: &str, by: i64) -> Result<i64>;

    /// Pairs whose field `f` has `start <= f <= end`, ascending; empty bounds are open.
    fn hscan(
        &mut self,
        key: &str,
        start: &str,
        end: &str,
        limit: u64,
    ) -> Result<Vec<(String, String)>> {
        let mut pairs: Vec<_> = self
            .hgetall(key)?
            .into_iter()
            .filter(|(field, _)| in_key_range(field, start, end))
            .collect();
        apply_limit(&mut pairs, limit);
        Ok(pairs)
    }

    /// Pairs whose field `f` has `end <= f <= start`, descending.
    fn hrscan(
        &mut self,
        key: &str,
        start: &str,
        end: &str,
        limit: u64,
    ) -> Result<Vec<(String, String)>> {
        let mut pairs = self.hscan(key, end, start, 0)?;
        pairs.reverse();
        apply_limit(&mut pairs, limit);
        Ok(pairs)
    }

    /// Fields of [`HashOps::hscan`].
    fn hkeys(&mut self, key: &str, start: &str, end: &str, limit: u64) -> Result<Vec<String>> {
        Ok(self
            .hscan(key, start, end, limit)?
            .into_iter()
            .map(|(field, _)| field)
            .collect())
    }

    fn multi_hget(&mut self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        fields.iter().map(|field| self.hget(key, field)).collect()
    }

    /// Returns how many fields were created.
    fn multi_hset(&mut self, key: &str, pairs: &[(String, String)]) -> Result<u64> {
        let mut created = 0;
        for (field, value) in pairs {
            created += u64::from(self.hset(key, field, value)?);
        }
        Ok(created)
    }
}

pub trait SetOps {
    /// Returns how many members were newly added.
    fn sadd(&mut self, key: &str, members: &[String]) -> Result<u64>;

    /// Returns how many members were removed.
    fn srem(&mut self, key: &str, members: &[String]) -> Result<u64>;

    /// Members in ascending order.
    fn smembers(&mut self, key: &str) -> Result<Vec<String>>;

    fn scard(&mut self, key: &str) -> Result<u64>;
}

/// Sorted sets with integer scores.
pub trait ZSetOps {
    /// Returns true if the member was created, false if its score was updated.
    fn zset(&mut self, key: &str, member: &str, score: i64) -> Result<bool>;

    fn zget(&mut self, key: &str, member: &str) -> Result<Option<i64>>;

    /// Returns true if the member existed.
    fn zdel(&mut self, key: &str, member: &str) -> Result<bool>;

    fn zincr(&mut self, key: &str, member: &str, by: i64) -> Result<i64>;

    fn zsize(&mut self, key: &str) -> Result<u64>;

    /// Removes the sorted set, returning how many members it had.
    fn zclear(&mut self, key: &str) -> Result<u64>;

    /// Up to `limit` `(member, score)` pairs starting at `offset`, ordered by
    /// ascending score then member. `limit` 0 means no limit.
    fn zrange(&mut self, key: &str, offset: u64, limit: u64) -> Result<Vec<(String, i64)>>;

    /// [`ZSetOps::zrange`] over the reversed order: descending score, ties by
    /// descending member.
    fn zrrange(&mut self, key: &str, offset: u64, limit: u64) -> Result<Vec<(String, i64)>> {
        let mut pairs = self.zrange(key, 0, 0)?;
        pairs.reverse();
        let limit = if limit == 0 { usize::MAX } else { limit as usize };
        Ok(pairs.into_iter().skip(offset as usize).take(limit).collect())
    }

    /// Position of `member` in ascending order, or `None` if it is absent.
    fn zrank(&mut self, key: &str, member: &str) -> Result<Option<u64>> {
        Ok(self
            .zrange(key, 0, 0)?
            .iter()
            .position(|(m, _)| m == member)
            .map(|p| p as u64))
    }

    /// Position of `member` in descending order.
    fn zrrank(&mut self, key: &str, member: &str) -> Result<Option<u64>> {
        Ok(self
            .zrrange(key, 0, 0)?
            .iter()
            .position(|(m, _)| m == member)
            .map(|p| p as u64))
    }

    /// Pairs with `min <= score <= max`, ascending.
    fn zscan(&mut self, key: &str, min: i64, max: i64, limit: u64) -> Result<Vec<(String, i64)>> {
        let mut pairs: Vec<_> = self
            .zrange(key, 0, 0)?
            .into_iter()
            .filter(|(_, score)| (min..=max).contains(score))
            .collect();
        apply_limit(&mut pairs, limit);
        Ok(pairs)
    }

    /// Pairs with `min <= score <= max`, descending.
    fn zrscan(&mut self, key: &str, max: i64, min: i64, limit: u64) -> Result<Vec<(String, i64)>> {
        let mut pairs = self.zscan(key, min, max, 0)?;
        pairs.reverse();
        apply_limit(&mut pairs, limit);
        Ok(pairs)
    }

    /// Members of [`ZSetOps::zscan`].
    fn zkeys(&mut self, key: &str, min: i64, max: i64, limit: u64) -> Result<Vec<String>> {
        Ok(self
            .zscan(key, min, max, limit)?
            .into_iter()
            .map(|(member, _)| member)
            .collect())
    }

    fn multi_zget(&mut self, key: &str, members: &[String]) -> Result<Vec<Option<i64>>> {
        members.iter().map(|member| self.zget(key, member)).collect()
    }

    /// Returns how many members were created.
    fn multi_zset(&mut self, key: &str, pairs: &[(String, i64)]) -> Result<u64> {
        let mut created = 0;
        for (member, score) in pairs {
            created += u64::from(self.zset(key, member, *score)?);
        }
        Ok(created)
    }

    /// Returns how many members were removed.
    fn multi_zdel(&mut self, key: &str, members: &[String]) -> Result<u64> {
        let mut removed = 0;
        for member in members {
            removed += u64::from(self.zdel(key, member)?);
        }
        Ok(removed)
    }
}

/// FIFO queues: push at the back, pop from the front.
pub trait QueueOps {
    /// Returns the queue length after the push.
    fn qpush(&mut self, key: &str, values: &[String]) -> Result<u64>;

    fn qpop(&mut self, key: &str) -> Result<Option<String>>;

    /// Items between `begin` and `end` inclusive; negative indices count from the back.
    fn qslice(&mut self, key: &str, begin: i64, end: i64) -> Result<Vec<String>>;

    fn qsize(&mut self, key: &str) -> Result<u64>;

    /// Removes the queue, returning how many items it had.
    fn qclear(&mut self, key: &str) -> Result<u64>;
}

/// Resolves an inclusive `[begin, end]` slice with negative indices against `len`.
///
/// Returns `None` when the slice is empty.
pub fn slice_bounds(len: usize, begin: i64, end: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let begin = if begin < 0 { len + begin } else { begin }.max(0);
    let end = if end < 0 { len + end } else { end }.min(len - 1);

    if begin > end || begin >= len {
        None
    } else {
        Some((begin as usize, end as usize))
    }
}

/// Keeps at most `limit` items; 0 keeps everything.
pub fn apply_limit<T>(items: &mut Vec<T>, limit: u64) {
    if limit > 0 {
        items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }
}

/// Whether `key` falls inside the `[start, end]` range used by `keys`.
pub fn in_key_range(key: &str, start: &str, end: &str) -> bool {
    (start.is_empty() || key >= start) && (end.is_empty() || key <= end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_bounds() {
        assert_eq!(slice_bounds(5, 0, -1), Some((0, 4)));
        assert_eq!(slice_bounds(5, 1, 2), Some((1, 2)));
        assert_eq!(slice_bounds(5, -2, -1), Some((3, 4)));
        assert_eq!(slice_bounds(5, -100, 100), Some((0, 4)));
        assert_eq!(slice_bounds(5, 3, 1), None);
        assert_eq!(slice_bounds(5, 5, 10), None);
        assert_eq!(slice_bounds(0, 0, -1), None);
    }

    #[test]
    fn test_key_range() {
        assert!(in_key_range("ab", "a", "b"));
        assert!(in_key_range("a", "a", "b"));
        assert!(in_key_range("b", "a", "b"));
        assert!(!in_key_range("ba", "a", "b"));
        assert!(in_key_range("zzz", "", ""));
        assert!(in_key_range("0", "", "a"));
    }

    #[test]
    fn test_apply_limit() {
        let mut items = vec![1, 2, 3];
        apply_limit(&mut items, 0);
        assert_eq!(items, vec![1, 2, 3]);
        apply_limit(&mut items, 2);
        assert_eq!(items, vec![1, 2]);
        apply_limit(&mut items, 10);
        assert_eq!(items, vec![1, 2]);
    }
}
