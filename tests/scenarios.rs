//! End-to-end scenarios through `Session`, one per backend.

use kvbridge::backends::{BackendKind, Session};
use kvbridge::config::args::quote;
use kvbridge::protocol::{ReplyBuffer, RespValue};
use kvbridge::{Error, Value};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

fn outputs(session: &mut Session, line: &str) -> Vec<Value> {
    let tree = session.execute(line);
    assert!(tree.is_ok(), "{}: {:?}", line, tree.error());
    tree.outputs().cloned().collect()
}

#[test]
fn memory_session_workflow() {
    let mut session = Session::connect(BackendKind::Memory, "").unwrap();

    assert_eq!(outputs(&mut session, "SET user:101 Ariz"), vec![Value::ok()]);
    assert_eq!(outputs(&mut session, "MSET user:102 Bo user:103 Cy"), vec![Value::ok()]);
    assert_eq!(
        outputs(&mut session, "KEYS user: user:~ 10"),
        vec![Value::string_array(["user:101", "user:102", "user:103"])]
    );
    assert_eq!(outputs(&mut session, "DBKCOUNT"), vec![Value::integer(3)]);
    assert_eq!(outputs(&mut session, "DEL user:101 nope"), vec![Value::integer(1)]);
    assert_eq!(outputs(&mut session, "RENAME user:102 user:200"), vec![Value::ok()]);
    assert_eq!(outputs(&mut session, "GET user:102"), vec![Value::Null]);

    assert_eq!(outputs(&mut session, "SETX token abc 100"), vec![Value::ok()]);
    let ttl = outputs(&mut session, "TTL token")[0].as_integer().unwrap();
    assert!((99..=100).contains(&ttl));
    assert_eq!(outputs(&mut session, "TTL user:200"), vec![Value::integer(-1)]);
    assert_eq!(outputs(&mut session, "TTL nope"), vec![Value::integer(-2)]);

    assert_eq!(outputs(&mut session, "SADD tags rust kv rust"), vec![Value::integer(2)]);
    assert_eq!(
        outputs(&mut session, "SMEMBERS tags"),
        vec![Value::set(vec![Value::string("kv"), Value::string("rust")])]
    );

    assert_eq!(outputs(&mut session, "FLUSHDB"), vec![Value::ok()]);
    assert_eq!(
        outputs(&mut session, "SMEMBERS tags"),
        vec![Value::set(Vec::new())]
    );
    assert_eq!(session.execute("SMEMBERS tags").to_text(), "(empty set)\n");
}

#[test]
fn memory_session_errors() {
    let mut session = Session::connect(BackendKind::Memory, "-m 1").unwrap();

    let tree = session.execute("FOOBAR");
    assert_eq!(tree.error(), Some(&Error::UnknownCommand("FOOBAR".to_string())));
    assert!(tree.children(tree.root()).is_empty());

    let tree = session.execute("HINCR h f lots");
    assert!(matches!(tree.error(), Some(Error::Conversion { .. })));

    assert!(session.execute("SET a 1").is_ok());
    let tree = session.execute("SET b 2");
    assert!(matches!(tree.error(), Some(Error::Backend(_))));
    assert!(session.execute("SET a 2").is_ok());
}

#[test]
fn embedded_session_persists_containers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kv.sled");
    let config = format!("-d ; -f {}", quote(&path.to_string_lossy()));

    let mut session = Session::connect(BackendKind::Embedded, &config).unwrap();
    assert_eq!(session.config_string(), config);

    assert_eq!(outputs(&mut session, "HSET user:1 name Ariz"), vec![Value::integer(1)]);
    assert_eq!(outputs(&mut session, "QPUSH jobs a b c"), vec![Value::integer(3)]);
    assert_eq!(outputs(&mut session, "QPOP jobs"), vec![Value::string("a")]);
    assert_eq!(session.execute("QSLICE jobs 0 -1").to_text(), "b;c;");
    assert_eq!(session.execute("HGETALL user:1").to_text(), "name Ariz;");

    let tree = session.execute("ZSET board a 1");
    assert_eq!(tree.error(), Some(&Error::UnknownCommand("ZSET".to_string())));

    session.disconnect().unwrap();
    assert_eq!(
        session.execute("GET anything").error(),
        Some(&Error::NotConnected)
    );
    assert_eq!(session.disconnect(), Err(Error::NotConnected));
}

#[test]
fn embedded_read_only_needs_existing_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing");
    let config = format!("-e 1 -f {}", quote(&path.to_string_lossy()));

    assert!(matches!(
        Session::connect(BackendKind::Embedded, &config),
        Err(Error::Connect(_))
    ));
}

#[test]
fn remote_session_against_scripted_server() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let script: Vec<(Vec<&str>, &str)> = vec![
        (vec!["PING"], "+PONG\r\n"),
        (vec!["PING"], "+PONG\r\n"),
        (vec!["SET", "greeting", "hello world"], "+OK\r\n"),
        (vec!["ZADD", "board", "7", "ariz"], ":1\r\n"),
        (
            vec!["ZRANGE", "board", "0", "-1", "WITHSCORES"],
            "*2\r\n$4\r\nariz\r\n$1\r\n7\r\n",
        ),
        (
            vec!["HSET", "h", "f", "v"],
            "-WRONGTYPE Operation against a key holding the wrong kind of value\r\n",
        ),
        (vec!["QUIT"], "+OK\r\n"),
    ];

    let server = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut requests = ReplyBuffer::new();
        let mut chunk = [0u8; 1024];
        for (expected, reply) in script {
            let request = loop {
                if let Some(frame) = requests.next_frame().unwrap() {
                    break frame;
                }
                let n = socket.read(&mut chunk).unwrap();
                assert!(n > 0);
                requests.extend(&chunk[..n]);
            };
            assert_eq!(request, RespValue::command(expected));
            socket.write_all(reply.as_bytes()).unwrap();
        }
    });

    let mut session = Session::connect(BackendKind::Remote, &format!("-p {}", port)).unwrap();

    assert_eq!(outputs(&mut session, "PING"), vec![Value::string("PONG")]);
    assert_eq!(
        outputs(&mut session, "SET greeting \"hello world\""),
        vec![Value::ok()]
    );
    assert_eq!(outputs(&mut session, "ZSET board ariz 7"), vec![Value::integer(1)]);
    assert_eq!(
        outputs(&mut session, "ZRANGE board 0 0"),
        vec![Value::zset(vec![("ariz".to_string(), Value::integer(7))])]
    );

    let tree = session.execute("HSET h f v");
    assert_eq!(
        tree.error(),
        Some(&Error::backend(
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        ))
    );

    assert_eq!(outputs(&mut session, "QUIT"), vec![Value::ok()]);
    server.join().unwrap();
    session.disconnect().unwrap();
}
