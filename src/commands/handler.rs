//! Command Handlers
//!
//! One function per command, generic over the backend. Each handler converts its
//! argument tokens, calls the connection's primitives and pushes the results as
//! [`Value`]s. Arity has already been checked by the executor, so handlers index
//! `args` directly.
//!
//! ## Output Shapes
//!
//! | Result          | Value                                   |
//! |-----------------|-----------------------------------------|
//! | acknowledgement | `String("OK")`                          |
//! | count / flag    | `Integer`                               |
//! | missing value   | `Null`                                  |
//! | key listing     | `Array` of `String`                     |
//! | SCAN            | `Array[String(cursor), Array(keys)]`    |
//! | multi-get       | `Array`, `Null` for each missing item   |
//! | HGETALL, HSCAN  | `Hash`                                  |
//! | SMEMBERS        | `Set`                                   |
//! | ZRANGE, ZSCAN   | `ZSet` with `Integer` scores            |
//! | ZRANK           | `Integer`, or `Null` for a non-member   |

use crate::backends::pattern::DEFAULT_SCAN_COUNT;
use crate::commands::table::Output;
use crate::commands::{parse_i64, parse_u64};
use crate::connection::{
    Backend, Connection, ExpireOps, HashOps, KeyValueOps, QueueOps, SetOps, ZSetOps,
};
use crate::error::{Error, Result};
use crate::value::Value;

fn flag(b: bool) -> Value {
    Value::Integer(i64::from(b))
}

fn count(n: u64) -> Value {
    Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

fn hash_value(pairs: Vec<(String, String)>) -> Value {
    Value::hash(
        pairs
            .into_iter()
            .map(|(field, value)| (field, Value::String(value)))
            .collect(),
    )
}

fn zset_value(pairs: Vec<(String, i64)>) -> Value {
    Value::zset(
        pairs
            .into_iter()
            .map(|(member, score)| (member, Value::Integer(score)))
            .collect(),
    )
}

/// Arguments after the key must come in pairs.
fn check_pairs(command: &str, args: &[String]) -> Result<()> {
    if args.len() % 2 == 0 {
        Ok(())
    } else {
        Err(Error::WrongArity {
            command: command.to_string(),
            got: args.len(),
        })
    }
}

/// An empty score bound is open.
fn score_bound(token: &str, open: i64) -> Result<i64> {
    if token.is_empty() {
        Ok(open)
    } else {
        parse_i64(token)
    }
}

// ============================================================================
// Strings and keyspace
// ============================================================================

/// GET key
pub fn get<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    let value = conn.native()?.get(&args[0])?;
    out.push(Value::optional_string(value));
    Ok(())
}

/// SET key value
pub fn set<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    conn.native()?.set(&args[0], &args[1])?;
    out.push(Value::ok());
    Ok(())
}

/// DEL key [key ...]
///
/// Keys are deleted one at a time and the count node is updated after each one, so
/// a failure part-way leaves the number of keys already deleted in the output.
pub fn del<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    let native = conn.native()?;
    let node = out.push(count(0));
    let mut deleted = 0;
    for key in args {
        if native.delete(std::slice::from_ref(key))?.is_empty() {
            continue;
        }
        deleted += 1;
        if let Some(node) = node {
            out.update(node, count(deleted));
        }
    }
    Ok(())
}

/// RENAME key newkey
pub fn rename<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    conn.native()?.rename(&args[0], &args[1])?;
    out.push(Value::ok());
    Ok(())
}

/// KEYS start end limit
pub fn keys<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    let limit = parse_u64(&args[2])?;
    let keys = conn.native()?.keys(&args[0], &args[1], limit)?;
    out.push(Value::string_array(keys));
    Ok(())
}

/// RSCAN start end limit
pub fn rscan<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    let limit = parse_u64(&args[2])?;
    let keys = conn.native()?.rkeys(&args[0], &args[1], limit)?;
    out.push(Value::string_array(keys));
    Ok(())
}

/// SCAN cursor [MATCH pattern] [COUNT count]
pub fn scan<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    let cursor = parse_u64(&args[0])?;
    let mut pattern = "*";
    let mut count = DEFAULT_SCAN_COUNT;

    let mut options = args[1..].iter();
    while let Some(option) = options.next() {
        let value = options.next().ok_or_else(|| Error::WrongArity {
            command: "SCAN".to_string(),
            got: args.len(),
        })?;
        match option.to_ascii_uppercase().as_str() {
            "MATCH" => pattern = value.as_str(),
            "COUNT" => count = parse_u64(value)?.max(1),
            _ => {
                return Err(Error::Conversion {
                    token: option.clone(),
                    expected: "SCAN option (MATCH or COUNT)",
                })
            }
        }
    }

    let (next, keys) = conn.native()?.scan(cursor, pattern, count)?;
    out.push(Value::array(vec![
        Value::String(next.to_string()),
        Value::string_array(keys),
    ]));
    Ok(())
}

/// DBKCOUNT
pub fn dbkcount<B: Backend>(
    conn: &mut Connection<B>,
    _args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    let n = conn.native()?.key_count()?;
    out.push(count(n));
    Ok(())
}

/// FLUSHDB
pub fn flushdb<B: Backend>(
    conn: &mut Connection<B>,
    _args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    conn.native()?.flush_db()?;
    out.push(Value::ok());
    Ok(())
}

/// INFO [section]
pub fn info<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    let section = args.first().map(String::as_str);
    let info = conn.native()?.info(section)?;
    out.push(Value::String(info));
    Ok(())
}

/// INCR key [by]
pub fn incr<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    let by = match args.get(1) {
        Some(token) => parse_i64(token)?,
        None => 1,
    };
    let n = conn.native()?.incr(&args[0], by)?;
    out.push(Value::Integer(n));
    Ok(())
}

/// MGET key [key ...]
pub fn mget<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    let native = conn.native()?;
    let values = args
        .iter()
        .map(|key| native.get(key).map(Value::optional_string))
        .collect::<Result<Vec<_>>>()?;
    out.push(Value::array(values));
    Ok(())
}

/// MSET key value [key value ...]
pub fn mset<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    check_pairs("MSET", args)?;
    let native = conn.native()?;
    for pair in args.chunks_exact(2) {
        native.set(&pair[0], &pair[1])?;
    }
    out.push(Value::ok());
    Ok(())
}

/// HELP [command]
///
/// Reads only the static command table, so it works while disconnected.
pub fn help<B: Backend>(
    _conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()> {
    let table = B::commands();
    let text = match args.first() {
        Some(name) => table
            .get(name)
            .map(|command| command.usage.to_string())
            .ok_or_else(|| Error::UnknownCommand(name.clone()))?,
        None => table.names().join(" "),
    };
    out.push(Value::String(text));
    Ok(())
}

/// QUIT
pub fn quit<B: Backend>(
    conn: &mut Connection<B>,
    _args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: KeyValueOps,
{
    conn.native()?.quit()?;
    out.push(Value::ok());
    Ok(())
}

// ============================================================================
// Expiry
// ============================================================================

/// SETX key value ttl
pub fn setx<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ExpireOps,
{
    let ttl = parse_u64(&args[2])?;
    conn.native()?.set_with_ttl(&args[0], &args[1], ttl)?;
    out.push(Value::ok());
    Ok(())
}

/// EXPIRE key ttl
pub fn expire<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ExpireOps,
{
    let ttl = parse_u64(&args[1])?;
    let existed = conn.native()?.expire(&args[0], ttl)?;
    out.push(flag(existed));
    Ok(())
}

/// TTL key
pub fn ttl<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ExpireOps,
{
    let remaining = conn.native()?.ttl(&args[0])?;
    out.push(Value::Integer(remaining));
    Ok(())
}

// ============================================================================
// Hashes
// ============================================================================

/// HGET key field
pub fn hget<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let value = conn.native()?.hget(&args[0], &args[1])?;
    out.push(Value::optional_string(value));
    Ok(())
}

/// HSET key field value
pub fn hset<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let created = conn.native()?.hset(&args[0], &args[1], &args[2])?;
    out.push(flag(created));
    Ok(())
}

/// HDEL key field
pub fn hdel<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let removed = conn.native()?.hdel(&args[0], &args[1])?;
    out.push(flag(removed));
    Ok(())
}

/// HGETALL key
pub fn hgetall<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let pairs = conn.native()?.hgetall(&args[0])?;
    out.push(hash_value(pairs));
    Ok(())
}

/// HSIZE key
pub fn hsize<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let n = conn.native()?.hsize(&args[0])?;
    out.push(count(n));
    Ok(())
}

/// HCLEAR key
pub fn hclear<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let n = conn.native()?.hclear(&args[0])?;
    out.push(count(n));
    Ok(())
}

/// HINCR key field by
pub fn hincr<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let by = parse_i64(&args[2])?;
    let n = conn.native()?.hincr(&args[0], &args[1], by)?;
    out.push(Value::Integer(n));
    Ok(())
}

/// HKEYS key start end limit
pub fn hkeys<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let limit = parse_u64(&args[3])?;
    let fields = conn.native()?.hkeys(&args[0], &args[1], &args[2], limit)?;
    out.push(Value::string_array(fields));
    Ok(())
}

/// HSCAN key start end limit
pub fn hscan<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let limit = parse_u64(&args[3])?;
    let pairs = conn.native()?.hscan(&args[0], &args[1], &args[2], limit)?;
    out.push(hash_value(pairs));
    Ok(())
}

/// HRSCAN key start end limit
pub fn hrscan<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let limit = parse_u64(&args[3])?;
    let pairs = conn.native()?.hrscan(&args[0], &args[1], &args[2], limit)?;
    out.push(hash_value(pairs));
    Ok(())
}

/// MULTI_HGET key field [field ...]
pub fn multi_hget<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    let values = conn.native()?.multi_hget(&args[0], &args[1..])?;
    out.push(Value::array(
        values.into_iter().map(Value::optional_string).collect(),
    ));
    Ok(())
}

/// MULTI_HSET key field value [field value ...]
pub fn multi_hset<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: HashOps,
{
    check_pairs("MULTI_HSET", &args[1..])?;
    let pairs: Vec<(String, String)> = args[1..]
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    conn.native()?.multi_hset(&args[0], &pairs)?;
    out.push(Value::ok());
    Ok(())
}

// ============================================================================
// Sets
// ============================================================================

/// SADD key member [member ...]
pub fn sadd<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: SetOps,
{
    let added = conn.native()?.sadd(&args[0], &args[1..])?;
    out.push(count(added));
    Ok(())
}

/// SREM key member [member ...]
pub fn srem<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: SetOps,
{
    let removed = conn.native()?.srem(&args[0], &args[1..])?;
    out.push(count(removed));
    Ok(())
}

/// SMEMBERS key
pub fn smembers<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: SetOps,
{
    let members = conn.native()?.smembers(&args[0])?;
    out.push(Value::set(members.into_iter().map(Value::String).collect()));
    Ok(())
}

/// SCARD key
pub fn scard<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: SetOps,
{
    let n = conn.native()?.scard(&args[0])?;
    out.push(count(n));
    Ok(())
}

// ============================================================================
// Sorted sets
// ============================================================================

/// ZSET key member score
pub fn zset<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let score = parse_i64(&args[2])?;
    let created = conn.native()?.zset(&args[0], &args[1], score)?;
    out.push(flag(created));
    Ok(())
}

/// ZGET key member
pub fn zget<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let score = conn.native()?.zget(&args[0], &args[1])?;
    out.push(score.map_or(Value::Null, Value::Integer));
    Ok(())
}

/// ZDEL key member
pub fn zdel<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let removed = conn.native()?.zdel(&args[0], &args[1])?;
    out.push(flag(removed));
    Ok(())
}

/// ZINCR key member by
pub fn zincr<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let by = parse_i64(&args[2])?;
    let score = conn.native()?.zincr(&args[0], &args[1], by)?;
    out.push(Value::Integer(score));
    Ok(())
}

/// ZSIZE key
pub fn zsize<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let n = conn.native()?.zsize(&args[0])?;
    out.push(count(n));
    Ok(())
}

/// ZCLEAR key
pub fn zclear<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let n = conn.native()?.zclear(&args[0])?;
    out.push(count(n));
    Ok(())
}

/// ZRANGE key offset limit
pub fn zrange<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let offset = parse_u64(&args[1])?;
    let limit = parse_u64(&args[2])?;
    let pairs = conn.native()?.zrange(&args[0], offset, limit)?;
    out.push(zset_value(pairs));
    Ok(())
}

/// ZRRANGE key offset limit
pub fn zrrange<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let offset = parse_u64(&args[1])?;
    let limit = parse_u64(&args[2])?;
    let pairs = conn.native()?.zrrange(&args[0], offset, limit)?;
    out.push(zset_value(pairs));
    Ok(())
}

/// ZRANK key member
pub fn zrank<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let rank = conn.native()?.zrank(&args[0], &args[1])?;
    out.push(rank.map_or(Value::Null, count));
    Ok(())
}

/// ZRRANK key member
pub fn zrrank<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let rank = conn.native()?.zrrank(&args[0], &args[1])?;
    out.push(rank.map_or(Value::Null, count));
    Ok(())
}

/// ZKEYS key min max limit
pub fn zkeys<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let min = score_bound(&args[1], i64::MIN)?;
    let max = score_bound(&args[2], i64::MAX)?;
    let limit = parse_u64(&args[3])?;
    let members = conn.native()?.zkeys(&args[0], min, max, limit)?;
    out.push(Value::string_array(members));
    Ok(())
}

/// ZSCAN key min max limit
pub fn zscan<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let min = score_bound(&args[1], i64::MIN)?;
    let max = score_bound(&args[2], i64::MAX)?;
    let limit = parse_u64(&args[3])?;
    let pairs = conn.native()?.zscan(&args[0], min, max, limit)?;
    out.push(zset_value(pairs));
    Ok(())
}

/// ZRSCAN key max min limit
pub fn zrscan<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let max = score_bound(&args[1], i64::MAX)?;
    let min = score_bound(&args[2], i64::MIN)?;
    let limit = parse_u64(&args[3])?;
    let pairs = conn.native()?.zrscan(&args[0], max, min, limit)?;
    out.push(zset_value(pairs));
    Ok(())
}

/// MULTI_ZGET key member [member ...]
pub fn multi_zget<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    let scores = conn.native()?.multi_zget(&args[0], &args[1..])?;
    out.push(Value::array(
        scores
            .into_iter()
            .map(|score| score.map_or(Value::Null, Value::Integer))
            .collect(),
    ));
    Ok(())
}

/// MULTI_ZSET key member score [member score ...]
///
/// Every score is converted before the first write.
pub fn multi_zset<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    check_pairs("MULTI_ZSET", &args[1..])?;
    let pairs = args[1..]
        .chunks_exact(2)
        .map(|pair| Ok((pair[0].clone(), parse_i64(&pair[1])?)))
        .collect::<Result<Vec<_>>>()?;
    conn.native()?.multi_zset(&args[0], &pairs)?;
    out.push(Value::ok());
    Ok(())
}

/// MULTI_ZDEL key member [member ...]
pub fn multi_zdel<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: ZSetOps,
{
    conn.native()?.multi_zdel(&args[0], &args[1..])?;
    out.push(Value::ok());
    Ok(())
}

// ============================================================================
// Queues
// ============================================================================

/// QPUSH key value [value ...]
pub fn qpush<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: QueueOps,
{
    let len = conn.native()?.qpush(&args[0], &args[1..])?;
    out.push(count(len));
    Ok(())
}

/// QPOP key
pub fn qpop<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: QueueOps,
{
    let item = conn.native()?.qpop(&args[0])?;
    out.push(Value::optional_string(item));
    Ok(())
}

/// QSLICE key begin end
pub fn qslice<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: QueueOps,
{
    let begin = parse_i64(&args[1])?;
    let end = parse_i64(&args[2])?;
    let items = conn.native()?.qslice(&args[0], begin, end)?;
    out.push(Value::string_array(items));
    Ok(())
}

/// QSIZE key
pub fn qsize<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: QueueOps,
{
    let n = conn.native()?.qsize(&args[0])?;
    out.push(count(n));
    Ok(())
}

/// QCLEAR key
pub fn qclear<B: Backend>(
    conn: &mut Connection<B>,
    args: &[String],
    out: &mut Output<'_>,
) -> Result<()>
where
    B::Handle: QueueOps,
{
    let n = conn.native()?.qclear(&args[0])?;
    out.push(count(n));
    Ok(())
}
