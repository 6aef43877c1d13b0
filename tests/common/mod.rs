//! A minimal in-process Redis used by the integration tests.
//!
//! Supports GET, SET, INCR, DEL, WATCH, UNWATCH, MULTI, EXEC and DISCARD on
//! a store shared by every connection. Keys starting with `moved:` answer
//! with a MOVED redirect, the way a cluster node that does not own the slot
//! would.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use bytes::Bytes;
use redis_txn::proto::codec::{Decoder, Encoder};
use redis_txn::Reply;

#[derive(Default)]
struct Store {
    values: HashMap<Bytes, Bytes>,
    versions: HashMap<Bytes, u64>,
}

impl Store {
    fn version(&self, key: &Bytes) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn touch(&mut self, key: &Bytes) {
        *self.versions.entry(key.clone()).or_insert(0) += 1;
    }
}

#[derive(Default)]
struct Session {
    queue: Option<Vec<Vec<Bytes>>>,
    watched: HashMap<Bytes, u64>,
    dirty: bool,
}

/// Starts the server on an ephemeral port and returns its address.
pub fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let store = Arc::new(Mutex::new(Store::default()));

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let store = Arc::clone(&store);
            thread::spawn(move || serve(stream, store));
        }
    });

    addr
}

/// Starts a server that accepts connections and never answers.
pub fn start_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            held.push(stream);
        }
    });
    addr
}

/// Starts a server that answers the first command with `raw` and closes.
pub fn start_raw_server(raw: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(raw);
        }
    });
    addr
}

fn serve(mut stream: TcpStream, store: Arc<Mutex<Store>>) {
    let mut decoder = Decoder::new();
    let mut encoder = Encoder::new();
    let mut session = Session::default();
    let mut buf = [0u8; 4096];

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        decoder.append(&buf[..n]);

        while let Ok(Some(request)) = decoder.decode() {
            let args = command_args(request);
            let reply = handle(&args, &mut session, &store);
            encoder.encode(&reply);
        }

        if stream.write_all(&encoder.take()).is_err() {
            return;
        }
    }
}

fn command_args(request: Reply) -> Vec<Bytes> {
    match request {
        Reply::Array(array) => array
            .iter()
            .filter_map(|arg| match arg {
                Reply::BulkString(b) => Some(b.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn name(args: &[Bytes]) -> String {
    args.first()
        .map(|n| String::from_utf8_lossy(n).to_ascii_uppercase())
        .unwrap_or_default()
}

fn status(s: &str) -> Reply {
    Reply::Status(s.to_string())
}

fn error(s: &str) -> Reply {
    Reply::Error(s.to_string())
}

fn handle(args: &[Bytes], session: &mut Session, store: &Mutex<Store>) -> Reply {
    let cmd = name(args);

    if let Some(queue) = session.queue.as_mut() {
        match cmd.as_str() {
            "MULTI" => return error("ERR MULTI calls can not be nested"),
            "WATCH" => return error("ERR WATCH inside MULTI is not allowed"),
            "EXEC" | "DISCARD" => {}
            "GET" | "SET" | "INCR" | "DEL" => {
                if let Some(key) = args.get(1) {
                    if key.starts_with(b"moved:") {
                        session.dirty = true;
                        return error("MOVED 866 127.0.0.1:7002");
                    }
                }
                queue.push(args.to_vec());
                return status("QUEUED");
            }
            _ => {
                session.dirty = true;
                return error(&format!("ERR unknown command '{}'", cmd));
            }
        }
    }

    let mut store = store.lock().unwrap();
    match cmd.as_str() {
        "MULTI" => {
            session.queue = Some(Vec::new());
            session.dirty = false;
            status("OK")
        }
        "EXEC" => {
            let Some(queue) = session.queue.take() else {
                return error("ERR EXEC without MULTI");
            };
            let watched = std::mem::take(&mut session.watched);
            if session.dirty {
                return error("EXECABORT Transaction discarded because of previous errors.");
            }
            if watched.iter().any(|(k, v)| store.version(k) != *v) {
                return Reply::Nil;
            }
            Reply::from(
                queue
                    .iter()
                    .map(|args| run(args, &mut store))
                    .collect::<Vec<_>>(),
            )
        }
        "DISCARD" => {
            if session.queue.take().is_none() {
                return error("ERR DISCARD without MULTI");
            }
            session.watched.clear();
            status("OK")
        }
        "WATCH" => {
            for key in &args[1..] {
                let version = store.version(key);
                session.watched.insert(key.clone(), version);
            }
            status("OK")
        }
        "UNWATCH" => {
            session.watched.clear();
            status("OK")
        }
        _ => run(args, &mut store),
    }
}

fn run(args: &[Bytes], store: &mut Store) -> Reply {
    let cmd = name(args);
    let key = args.get(1).cloned().unwrap_or_default();
    match cmd.as_str() {
        "GET" => store
            .values
            .get(&key)
            .cloned()
            .map(Reply::BulkString)
            .unwrap_or(Reply::Nil),
        "SET" => {
            let value = args.get(2).cloned().unwrap_or_default();
            store.values.insert(key.clone(), value);
            store.touch(&key);
            status("OK")
        }
        "DEL" => {
            let removed = store.values.remove(&key).is_some();
            store.touch(&key);
            Reply::Integer(i64::from(removed))
        }
        "INCR" => {
            let current = store
                .values
                .get(&key)
                .map(|v| String::from_utf8_lossy(v).parse::<i64>());
            let next = match current {
                None => 1,
                Some(Ok(n)) => n + 1,
                Some(Err(_)) => {
                    return error("ERR value is not an integer or out of range");
                }
            };
            store
                .values
                .insert(key.clone(), Bytes::from(next.to_string()));
            store.touch(&key);
            Reply::Integer(next)
        }
        _ => error(&format!("ERR unknown command '{}'", cmd)),
    }
}
