//! TCP Backend
//!
//! [`RemoteClient`] talks to a Redis-style server over one blocking TCP stream. Every
//! primitive is one (or, for the clear and multi-key deletes, a few) request/reply
//! round trips:
//!
//! ```text
//! primitive ──> RespValue::command([...]) ──> socket ──> ReplyBuffer ──> RespValue
//! ```
//!
//! Error replies from the server become `Error::Backend` with the server's message
//! unchanged. There are no timeouts or retries: a dead server shows up as an I/O
//! error on the next call. A reply that cannot be parsed leaves the stream at an
//! unknown position, so the client shuts it down and refuses further calls.
//!
//! The server's native semantics are kept where they differ from the local backends:
//! `SCAN` cursors are the server's own, and queues are server lists.

use crate::backends::BackendKind;
use crate::commands::{parse_u64, Access, Arity, Command, CommandTable, Output};
use crate::config::RemoteConfig;
use crate::connection::ops::in_key_range;
use crate::connection::{
    Backend, Connection, ExpireOps, HashOps, KeyValueOps, QueueOps, SetOps, ZSetOps,
};
use crate::error::{Error, Result};
use crate::protocol::{ReplyBuffer, RespValue};
use crate::value::Value;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::OnceLock;
use tracing::{debug, trace};

/// The TCP backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Remote;

impl Backend for Remote {
    type Config = RemoteConfig;
    type Handle = RemoteClient;

    const KIND: BackendKind = BackendKind::Remote;

    fn open(config: &RemoteConfig) -> Result<RemoteClient> {
        RemoteClient::connect(config)
    }

    fn close(handle: RemoteClient) -> Result<()> {
        handle.shutdown()
    }

    fn commands() -> &'static CommandTable<Self> {
        static TABLE: OnceLock<CommandTable<Remote>> = OnceLock::new();
        TABLE.get_or_init(|| {
            CommandTable::new()
                .with_key_value()
                .with_expire()
                .with_hash()
                .with_set()
                .with_zset()
                .with_queue()
                .with(Command {
                    name: "PING",
                    arity: Arity::exact(0),
                    access: Access::Read,
                    usage: "PING",
                    handler: ping,
                })
                .with(Command {
                    name: "SELECT",
                    arity: Arity::exact(1),
                    access: Access::Read,
                    usage: "SELECT index",
                    handler: select,
                })
                .with(Command {
                    name: "AUTH",
                    arity: Arity::exact(1),
                    access: Access::Read,
                    usage: "AUTH password",
                    handler: auth,
                })
        })
    }
}

/// PING: round trip to the server.
fn ping(conn: &mut Connection<Remote>, _args: &[String], out: &mut Output<'_>) -> Result<()> {
    let reply = conn.native()?.ping()?;
    out.push(Value::String(reply));
    Ok(())
}

/// SELECT index: switches the server-side database.
fn select(conn: &mut Connection<Remote>, args: &[String], out: &mut Output<'_>) -> Result<()> {
    let index = parse_u64(&args[0])?;
    conn.native()?.select(index)?;
    out.push(Value::ok());
    Ok(())
}

/// AUTH password
fn auth(conn: &mut Connection<Remote>, args: &[String], out: &mut Output<'_>) -> Result<()> {
    conn.native()?.auth(&args[0])?;
    out.push(Value::ok());
    Ok(())
}

const OUT_OF_SYNC: &str = "ERR connection is out of sync after a protocol error";

/// Native handle of the [`Remote`] backend: one blocking TCP stream.
#[derive(Debug)]
pub struct RemoteClient {
    stream: TcpStream,
    replies: ReplyBuffer,
    address: String,
    /// Set once a reply failed to parse.
    poisoned: bool,
}

impl RemoteClient {
    /// Connects, authenticates when a password is configured, then checks the
    /// server with PING. Any failure along the way is `Error::Connect`.
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        let address = config.address();
        let stream = TcpStream::connect(&address)
            .map_err(|e| Error::Connect(format!("{}: {}", address, e)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::Connect(format!("{}: {}", address, e)))?;

        let mut client = Self {
            stream,
            replies: ReplyBuffer::new(),
            address,
            poisoned: false,
        };

        if let Some(password) = &config.password {
            client
                .auth(password)
                .map_err(|e| Error::Connect(format!("{}: {}", client.address, e)))?;
        }
        client
            .ping()
            .map_err(|e| Error::Connect(format!("{}: {}", client.address, e)))?;

        debug!(address = %client.address, "Remote handshake complete");
        Ok(client)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sends PING and returns the server's reply text.
    pub fn ping(&mut self) -> Result<String> {
        let reply = self.call(["PING"])?;
        text_of(&reply)
    }

    pub fn auth(&mut self, password: &str) -> Result<()> {
        self.call_ok(["AUTH", password])
    }

    /// Switches to database `index` on the server.
    pub fn select(&mut self, index: u64) -> Result<()> {
        self.call_ok(["SELECT", &index.to_string()])
    }

    /// Sends one request and reads its reply.
    ///
    /// Error replies are returned as `Error::Backend`.
    pub fn call<I, S>(&mut self, parts: I) -> Result<RespValue>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.poisoned {
            return Err(Error::backend(OUT_OF_SYNC));
        }
        let request = RespValue::command(parts);
        trace!(address = %self.address, request = %request, "Sending request");
        self.stream
            .write_all(&request.serialize())
            .map_err(io_error)?;

        let reply = self.read_reply()?;
        trace!(address = %self.address, reply = %reply, "Received reply");
        match reply {
            RespValue::Error(msg) => Err(Error::Backend(msg)),
            reply => Ok(reply),
        }
    }

    fn read_reply(&mut self) -> Result<RespValue> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.replies.next_frame() {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(e) => {
                    self.replies.clear();
                    self.poisoned = true;
                    if let Err(err) = self.stream.shutdown(Shutdown::Both) {
                        debug!(
                            address = %self.address,
                            error = %err,
                            "Shutdown after protocol error failed"
                        );
                    }
                    return Err(Error::backend(format!("ERR protocol: {}", e)));
                }
            }

            let n = self.stream.read(&mut chunk).map_err(io_error)?;
            if n == 0 {
                return Err(Error::backend("ERR connection closed by server"));
            }
            self.replies.extend(&chunk[..n]);
        }
    }

    fn shutdown(self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // The server may already have closed its side (e.g. after QUIT)
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }

    fn call_integer<I, S>(&mut self, parts: I) -> Result<i64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let reply = self.call(parts)?;
        reply.as_integer().ok_or_else(|| unexpected(&reply))
    }

    fn call_count<I, S>(&mut self, parts: I) -> Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.call_integer(parts)?.max(0) as u64)
    }

    fn call_optional_string<I, S>(&mut self, parts: I) -> Result<Option<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.call(parts)? {
            RespValue::Null => Ok(None),
            reply => reply
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| unexpected(&reply)),
        }
    }

    fn call_strings<I, S>(&mut self, parts: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.call(parts)? {
            RespValue::Null => Ok(Vec::new()),
            RespValue::Array(items) => items.iter().map(text_of).collect(),
            reply => Err(unexpected(&reply)),
        }
    }

    /// Flat `[k1, v1, k2, v2, ...]` reply as pairs.
    fn call_pairs<I, S>(&mut self, parts: I) -> Result<Vec<(String, String)>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let flat = self.call_strings(parts)?;
        if flat.len() % 2 != 0 {
            return Err(Error::backend("ERR protocol: odd number of elements in pair reply"));
        }
        let mut items = flat.into_iter();
        let mut pairs = Vec::new();
        while let (Some(k), Some(v)) = (items.next(), items.next()) {
            pairs.push((k, v));
        }
        Ok(pairs)
    }

    fn call_rank<I, S>(&mut self, parts: I) -> Result<Option<u64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.call(parts)? {
            RespValue::Null => Ok(None),
            reply => reply
                .as_integer()
                .map(|rank| Some(rank.max(0) as u64))
                .ok_or_else(|| unexpected(&reply)),
        }
    }

    fn call_scored<I, S>(&mut self, parts: I) -> Result<Vec<(String, i64)>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.call_pairs(parts)?
            .into_iter()
            .map(|(member, score)| Ok((member, parse_score(&score)?)))
            .collect()
    }

    fn call_ok<I, S>(&mut self, parts: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.call(parts).map(|_| ())
    }

    /// Size of a container followed by its deletion.
    fn clear_with(&mut self, size_command: &str, key: &str) -> Result<u64> {
        let size = self.call_count([size_command, key])?;
        if size > 0 {
            self.call_ok(["DEL", key])?;
        }
        Ok(size)
    }
}

fn io_error(e: std::io::Error) -> Error {
    Error::backend(format!("ERR io: {}", e))
}

fn unexpected(reply: &RespValue) -> Error {
    Error::backend(format!("ERR unexpected reply: {}", reply))
}

fn text_of(reply: &RespValue) -> Result<String> {
    reply
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| unexpected(reply))
}

/// `command key item...` request parts.
fn with_items<'a>(
    command: &'a str,
    key: &'a str,
    items: &'a [String],
) -> impl Iterator<Item = &'a str> {
    [command, key]
        .into_iter()
        .chain(items.iter().map(String::as_str))
}

/// Inclusive stop index for a server range starting at `offset`.
fn range_stop(offset: u64, limit: u64) -> i64 {
    if limit == 0 {
        -1
    } else {
        offset.saturating_add(limit - 1).min(i64::MAX as u64) as i64
    }
}

fn parse_score(text: &str) -> Result<i64> {
    text.parse()
        .map_err(|_| Error::backend(format!("ERR score is not an integer: {}", text)))
}

impl KeyValueOps for RemoteClient {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.call_optional_string(["GET", key])
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.call_ok(["SET", key, value])
    }

    fn delete(&mut self, keys: &[String]) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for key in keys {
            if self.call_integer(["DEL", key.as_str()])? > 0 {
                deleted.push(key.clone());
            }
        }
        Ok(deleted)
    }

    fn rename(&mut self, key: &str, new_key: &str) -> Result<()> {
        self.call_ok(["RENAME", key, new_key])
    }

    fn keys(&mut self, start: &str, end: &str, limit: u64) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .call_strings(["KEYS", "*"])?
            .into_iter()
            .filter(|k| in_key_range(k, start, end))
            .collect();
        keys.sort();
        if limit > 0 {
            keys.truncate(limit as usize);
        }
        Ok(keys)
    }

    fn scan(&mut self, cursor: u64, pattern: &str, count: u64) -> Result<(u64, Vec<String>)> {
        let cursor = cursor.to_string();
        let count = count.to_string();
        let reply = self.call(["SCAN", &cursor, "MATCH", pattern, "COUNT", &count])?;

        let parts = reply.clone().into_array().ok_or_else(|| unexpected(&reply))?;
        let [next, keys] = <[RespValue; 2]>::try_from(parts).map_err(|_| unexpected(&reply))?;
        let next = text_of(&next)?
            .parse()
            .map_err(|_| unexpected(&reply))?;
        let keys = keys
            .into_array()
            .ok_or_else(|| unexpected(&reply))?
            .iter()
            .map(text_of)
            .collect::<Result<Vec<_>>>()?;
        Ok((next, keys))
    }

    fn key_count(&mut self) -> Result<u64> {
        self.call_count(["DBSIZE"])
    }

    fn flush_db(&mut self) -> Result<()> {
        self.call_ok(["FLUSHDB"])
    }

    fn info(&mut self, section: Option<&str>) -> Result<String> {
        let reply = match section {
            Some(section) => self.call(["INFO", section])?,
            None => self.call(["INFO"])?,
        };
        text_of(&reply)
    }

    fn incr(&mut self, key: &str, by: i64) -> Result<i64> {
        self.call_integer(["INCRBY", key, &by.to_string()])
    }

    fn quit(&mut self) -> Result<()> {
        self.call_ok(["QUIT"])
    }
}

impl ExpireOps for RemoteClient {
    fn set_with_ttl(&mut self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.call_ok(["SETEX", key, &ttl_secs.to_string(), value])
    }

    fn expire(&mut self, key: &str, ttl_secs: u64) -> Result<bool> {
        Ok(self.call_integer(["EXPIRE", key, &ttl_secs.to_string()])? == 1)
    }

    fn ttl(&mut self, key: &str) -> Result<i64> {
        self.call_integer(["TTL", key])
    }
}

impl HashOps for RemoteClient {
    fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>> {
        self.call_optional_string(["HGET", key, field])
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        Ok(self.call_integer(["HSET", key, field, value])? == 1)
    }

    fn hdel(&mut self, key: &str, field: &str) -> Result<bool> {
        Ok(self.call_integer(["HDEL", key, field])? > 0)
    }

    fn hgetall(&mut self, key: &str) -> Result<Vec<(String, String)>> {
        let mut pairs = self.call_pairs(["HGETALL", key])?;
        pairs.sort();
        Ok(pairs)
    }

    fn hsize(&mut self, key: &str) -> Result<u64> {
        self.call_count(["HLEN", key])
    }

    fn hclear(&mut self, key: &str) -> Result<u64> {
        self.clear_with("HLEN", key)
    }

    fn hincr(&mut self, key: &str, field: &str, by: i64) -> Result<i64> {
        self.call_integer(["HINCRBY", key, field, &by.to_string()])
    }

    fn multi_hget(&mut self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        match self.call(with_items("HMGET", key, fields))? {
            RespValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    RespValue::Null => Ok(None),
                    item => text_of(item).map(Some),
                })
                .collect(),
            reply => Err(unexpected(&reply)),
        }
    }

    fn multi_hset(&mut self, key: &str, pairs: &[(String, String)]) -> Result<u64> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let mut parts = vec!["HSET", key];
        for (field, value) in pairs {
            parts.push(field);
            parts.push(value);
        }
        self.call_count(parts)
    }
}

impl SetOps for RemoteClient {
    fn sadd(&mut self, key: &str, members: &[String]) -> Result<u64> {
        self.call_count(with_items("SADD", key, members))
    }

    fn srem(&mut self, key: &str, members: &[String]) -> Result<u64> {
        self.call_count(with_items("SREM", key, members))
    }

    fn smembers(&mut self, key: &str) -> Result<Vec<String>> {
        let mut members = self.call_strings(["SMEMBERS", key])?;
        members.sort();
        Ok(members)
    }

    fn scard(&mut self, key: &str) -> Result<u64> {
        self.call_count(["SCARD", key])
    }
}

impl ZSetOps for RemoteClient {
    fn zset(&mut self, key: &str, member: &str, score: i64) -> Result<bool> {
        Ok(self.call_integer(["ZADD", key, &score.to_string(), member])? == 1)
    }

    fn zget(&mut self, key: &str, member: &str) -> Result<Option<i64>> {
        self.call_optional_string(["ZSCORE", key, member])?
            .map(|score| parse_score(&score))
            .transpose()
    }

    fn zdel(&mut self, key: &str, member: &str) -> Result<bool> {
        Ok(self.call_integer(["ZREM", key, member])? > 0)
    }

    fn zincr(&mut self, key: &str, member: &str, by: i64) -> Result<i64> {
        let reply = self.call(["ZINCRBY", key, &by.to_string(), member])?;
        parse_score(&text_of(&reply)?)
    }

    fn zsize(&mut self, key: &str) -> Result<u64> {
        self.call_count(["ZCARD", key])
    }

    fn zclear(&mut self, key: &str) -> Result<u64> {
        self.clear_with("ZCARD", key)
    }

    fn zrange(&mut self, key: &str, offset: u64, limit: u64) -> Result<Vec<(String, i64)>> {
        let stop = range_stop(offset, limit).to_string();
        let offset = offset.to_string();
        self.call_scored(["ZRANGE", key, &offset, &stop, "WITHSCORES"])
    }

    fn zrrange(&mut self, key: &str, offset: u64, limit: u64) -> Result<Vec<(String, i64)>> {
        let stop = range_stop(offset, limit).to_string();
        let offset = offset.to_string();
        self.call_scored(["ZREVRANGE", key, &offset, &stop, "WITHSCORES"])
    }

    fn zrank(&mut self, key: &str, member: &str) -> Result<Option<u64>> {
        self.call_rank(["ZRANK", key, member])
    }

    fn zrrank(&mut self, key: &str, member: &str) -> Result<Option<u64>> {
        self.call_rank(["ZREVRANK", key, member])
    }

    fn multi_zset(&mut self, key: &str, pairs: &[(String, i64)]) -> Result<u64> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let scores: Vec<String> = pairs.iter().map(|(_, score)| score.to_string()).collect();
        let mut parts = vec!["ZADD", key];
        for ((member, _), score) in pairs.iter().zip(&scores) {
            parts.push(score);
            parts.push(member);
        }
        self.call_count(parts)
    }

    fn multi_zdel(&mut self, key: &str, members: &[String]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.call_count(with_items("ZREM", key, members))
    }
}

impl QueueOps for RemoteClient {
    fn qpush(&mut self, key: &str, values: &[String]) -> Result<u64> {
        self.call_count(with_items("RPUSH", key, values))
    }

    fn qpop(&mut self, key: &str) -> Result<Option<String>> {
        self.call_optional_string(["LPOP", key])
    }

    fn qslice(&mut self, key: &str, begin: i64, end: i64) -> Result<Vec<String>> {
        self.call_strings(["LRANGE", key, &begin.to_string(), &end.to_string()])
    }

    fn qsize(&mut self, key: &str) -> Result<u64> {
        self.call_count(["LLEN", key])
    }

    fn qclear(&mut self, key: &str) -> Result<u64> {
        self.clear_with("LLEN", key)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::commands::Executor;
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Starts a one-connection server that expects each request in order and
    /// answers with the scripted raw reply. The PING handshake is prepended.
    pub(crate) fn scripted_server(
        steps: Vec<(Vec<&'static str>, &'static str)>,
    ) -> (RemoteConfig, JoinHandle<()>) {
        let mut script = vec![(vec!["PING"], "+PONG\r\n")];
        script.extend(steps);
        scripted_server_raw(script)
    }

    pub(crate) fn scripted_server_raw(
        script: Vec<(Vec<&'static str>, &'static str)>,
    ) -> (RemoteConfig, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut requests = ReplyBuffer::new();
            let mut chunk = [0u8; 1024];
            for (expected, reply) in script {
                let request = loop {
                    if let Some(frame) = requests.next_frame().unwrap() {
                        break frame;
                    }
                    let n = socket.read(&mut chunk).unwrap();
                    assert!(n > 0, "client hung up before sending {:?}", expected);
                    requests.extend(&chunk[..n]);
                };
                assert_eq!(request, RespValue::command(expected));
                socket.write_all(reply.as_bytes()).unwrap();
            }
        });

        let config = RemoteConfig {
            port,
            ..RemoteConfig::default()
        };
        (config, handle)
    }

    #[test]
    fn test_get_set_round_trips() {
        let (config, server) = scripted_server(vec![
            (vec!["SET", "user:1", "Ariz"], "+OK\r\n"),
            (vec!["GET", "user:1"], "$4\r\nAriz\r\n"),
            (vec!["GET", "missing"], "$-1\r\n"),
        ]);

        let mut client = Remote::open(&config).unwrap();
        client.set("user:1", "Ariz").unwrap();
        assert_eq!(client.get("user:1").unwrap(), Some("Ariz".to_string()));
        assert_eq!(client.get("missing").unwrap(), None);
        Remote::close(client).unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_auth_is_sent_before_ping() {
        let (mut config, server) = scripted_server_raw(vec![
            (vec!["AUTH", "secret"], "+OK\r\n"),
            (vec!["PING"], "+PONG\r\n"),
        ]);
        config.password = Some("secret".to_string());

        let client = Remote::open(&config).unwrap();
        Remote::close(client).unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_failed_auth_is_a_connect_error() {
        let (mut config, server) = scripted_server_raw(vec![(
            vec!["AUTH", "wrong"],
            "-WRONGPASS invalid username-password pair\r\n",
        )]);
        config.password = Some("wrong".to_string());

        match Remote::open(&config) {
            Err(Error::Connect(msg)) => assert!(msg.contains("WRONGPASS")),
            other => panic!("expected connect error, got {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_refused_connection_is_a_connect_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = RemoteConfig {
            port,
            ..RemoteConfig::default()
        };
        assert!(matches!(Remote::open(&config), Err(Error::Connect(_))));
    }

    #[test]
    fn test_server_errors_are_verbatim() {
        let (config, server) = scripted_server(vec![(
            vec!["INCRBY", "name", "1"],
            "-ERR value is not an integer or out of range\r\n",
        )]);

        let mut client = Remote::open(&config).unwrap();
        assert_eq!(
            client.incr("name", 1),
            Err(Error::backend("ERR value is not an integer or out of range"))
        );
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn test_keys_filters_and_sorts_locally() {
        let (config, server) = scripted_server(vec![(
            vec!["KEYS", "*"],
            "*4\r\n$1\r\nc\r\n$2\r\nab\r\n$1\r\na\r\n$1\r\nb\r\n",
        )]);

        let mut client = Remote::open(&config).unwrap();
        assert_eq!(client.keys("a", "b", 0).unwrap(), vec!["a", "ab", "b"]);
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn test_scan_reply() {
        let (config, server) = scripted_server(vec![(
            vec!["SCAN", "0", "MATCH", "user:*", "COUNT", "10"],
            "*2\r\n$2\r\n17\r\n*2\r\n$6\r\nuser:1\r\n$6\r\nuser:2\r\n",
        )]);

        let mut client = Remote::open(&config).unwrap();
        let (next, keys) = client.scan(0, "user:*", 10).unwrap();
        assert_eq!(next, 17);
        assert_eq!(keys, vec!["user:1", "user:2"]);
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn test_delete_reports_existing_keys() {
        let (config, server) = scripted_server(vec![
            (vec!["DEL", "a"], ":1\r\n"),
            (vec!["DEL", "b"], ":0\r\n"),
        ]);

        let mut client = Remote::open(&config).unwrap();
        let deleted = client
            .delete(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(deleted, vec!["a"]);
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn test_hash_and_zset_replies() {
        let (config, server) = scripted_server(vec![
            (
                vec!["HGETALL", "h"],
                "*4\r\n$1\r\ny\r\n$1\r\n2\r\n$1\r\nx\r\n$1\r\n1\r\n",
            ),
            (vec!["ZRANGE", "z", "1", "2", "WITHSCORES"], "*2\r\n$1\r\nb\r\n$1\r\n5\r\n"),
            (vec!["ZSCORE", "z", "nope"], "$-1\r\n"),
            (vec!["ZCARD", "z"], ":3\r\n"),
            (vec!["DEL", "z"], ":1\r\n"),
        ]);

        let mut client = Remote::open(&config).unwrap();
        assert_eq!(
            client.hgetall("h").unwrap(),
            vec![
                ("x".to_string(), "1".to_string()),
                ("y".to_string(), "2".to_string())
            ]
        );
        assert_eq!(client.zrange("z", 1, 2).unwrap(), vec![("b".to_string(), 5)]);
        assert_eq!(client.zget("z", "nope").unwrap(), None);
        assert_eq!(client.zclear("z").unwrap(), 3);
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn test_queue_commands_map_to_lists() {
        let (config, server) = scripted_server(vec![
            (vec!["RPUSH", "q", "a", "b"], ":2\r\n"),
            (vec!["LPOP", "q"], "$1\r\na\r\n"),
            (vec!["LRANGE", "q", "0", "-1"], "*1\r\n$1\r\nb\r\n"),
            (vec!["LLEN", "q"], ":0\r\n"),
        ]);

        let mut client = Remote::open(&config).unwrap();
        assert_eq!(client.qpush("q", &["a".to_string(), "b".to_string()]).unwrap(), 2);
        assert_eq!(client.qpop("q").unwrap(), Some("a".to_string()));
        assert_eq!(client.qslice("q", 0, -1).unwrap(), vec!["b"]);
        assert_eq!(client.qclear("q").unwrap(), 0);
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn test_reverse_ranks_and_multi_commands() {
        let (config, server) = scripted_server(vec![
            (vec!["ZREVRANGE", "z", "0", "1", "WITHSCORES"], "*2\r\n$1\r\nc\r\n$1\r\n3\r\n"),
            (vec!["ZRANK", "z", "a"], ":0\r\n"),
            (vec!["ZREVRANK", "z", "nope"], "$-1\r\n"),
            (vec!["ZADD", "z", "1", "a", "2", "b"], ":1\r\n"),
            (vec!["ZREM", "z", "a", "b"], ":2\r\n"),
            (vec!["HSET", "h", "f1", "1", "f2", "2"], ":2\r\n"),
            (vec!["HMGET", "h", "f1", "zz"], "*2\r\n$1\r\n1\r\n$-1\r\n"),
        ]);

        let mut client = Remote::open(&config).unwrap();
        assert_eq!(client.zrrange("z", 0, 2).unwrap(), vec![("c".to_string(), 3)]);
        assert_eq!(client.zrank("z", "a").unwrap(), Some(0));
        assert_eq!(client.zrrank("z", "nope").unwrap(), None);
        let scored = [("a".to_string(), 1), ("b".to_string(), 2)];
        assert_eq!(client.multi_zset("z", &scored).unwrap(), 1);
        assert_eq!(client.multi_zdel("z", &["a".to_string(), "b".to_string()]).unwrap(), 2);
        let fields = [
            ("f1".to_string(), "1".to_string()),
            ("f2".to_string(), "2".to_string()),
        ];
        assert_eq!(client.multi_hset("h", &fields).unwrap(), 2);
        assert_eq!(
            client.multi_hget("h", &["f1".to_string(), "zz".to_string()]).unwrap(),
            vec![Some("1".to_string()), None]
        );
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn test_select_and_auth_commands() {
        let (config, server) = scripted_server(vec![
            (vec!["SELECT", "2"], "+OK\r\n"),
            (vec!["AUTH", "secret"], "-ERR invalid password\r\n"),
        ]);

        let mut executor = Executor::new(Connection::<Remote>::open(config).unwrap());
        let tree = executor.execute("SELECT 2");
        assert!(tree.is_ok());
        assert_eq!(tree.outputs().cloned().collect::<Vec<_>>(), vec![Value::ok()]);

        let tree = executor.execute("SELECT two");
        assert!(matches!(tree.error(), Some(Error::Conversion { .. })));

        let tree = executor.execute("AUTH secret");
        assert_eq!(tree.error(), Some(&Error::backend("ERR invalid password")));
        assert!(tree.children(tree.root()).is_empty());
        drop(executor);
        server.join().unwrap();
    }

    #[test]
    fn test_ttl_overflow_reply_is_verbatim() {
        let (config, server) = scripted_server(vec![
            (
                vec!["SETEX", "k", "18446744073709551615", "v"],
                "-ERR invalid expire time in 'setex' command\r\n",
            ),
            (
                vec!["EXPIRE", "k", "18446744073709551615"],
                "-ERR invalid expire time in 'expire' command\r\n",
            ),
        ]);

        let mut client = Remote::open(&config).unwrap();
        assert_eq!(
            client.set_with_ttl("k", "v", u64::MAX),
            Err(Error::backend("ERR invalid expire time in 'setex' command"))
        );
        assert_eq!(
            client.expire("k", u64::MAX),
            Err(Error::backend("ERR invalid expire time in 'expire' command"))
        );
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn test_non_text_ping_reply_fails_connect() {
        let (config, server) = scripted_server_raw(vec![(vec!["PING"], ":1\r\n")]);
        assert!(matches!(Remote::open(&config), Err(Error::Connect(_))));
        server.join().unwrap();
    }

    #[test]
    fn test_unparsable_reply_stops_the_client() {
        let (config, server) = scripted_server(vec![(vec!["GET", "k"], "@bad\r\n")]);
        let mut client = Remote::open(&config).unwrap();

        match client.get("k") {
            Err(Error::Backend(msg)) => assert!(msg.starts_with("ERR protocol")),
            other => panic!("expected protocol error, got {:?}", other),
        }
        assert_eq!(client.get("k"), Err(Error::backend(OUT_OF_SYNC)));
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn test_closed_socket_is_a_backend_error() {
        let (config, server) = scripted_server(vec![]);
        let mut client = Remote::open(&config).unwrap();
        server.join().unwrap();

        assert!(matches!(client.get("k"), Err(Error::Backend(_))));
    }
}
