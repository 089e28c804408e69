use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bkv_adapter::{AdapterConfig, AdapterError, KvAdapter, TtlState};
use bkv_proto::{encode_frame, parse_frame, Frame};
use bytes::{Bytes, BytesMut};
use tracing::Level;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Scripted RESP server: reads `expected` commands, lets the handler pick
/// each reply.
fn spawn_server(expected: usize, handler: fn(usize, &[Vec<u8>]) -> Frame) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("timeout");

        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        for idx in 0..expected {
            let args = loop {
                if let Some((frame, used)) = parse_frame(&buf).expect("parse") {
                    buf.drain(..used);
                    break command_args(frame);
                }
                let n = stream.read(&mut chunk).expect("read");
                assert!(n > 0, "client hung up early");
                buf.extend_from_slice(&chunk[..n]);
            };

            let mut out = BytesMut::new();
            encode_frame(&handler(idx, &args), &mut out);
            stream.write_all(&out).expect("write");
        }
    });

    addr
}

fn command_args(frame: Frame) -> Vec<Vec<u8>> {
    match frame {
        Frame::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Frame::Bulk(data) => data.to_vec(),
                other => panic!("unexpected command element: {other:?}"),
            })
            .collect(),
        other => panic!("unexpected command frame: {other:?}"),
    }
}

fn adapter_for(addr: String) -> KvAdapter {
    let mut config = AdapterConfig::new(addr);
    config.connect_timeout = Some(Duration::from_secs(1));
    config.read_timeout = Some(Duration::from_secs(1));
    config.write_timeout = Some(Duration::from_secs(1));
    KvAdapter::connect(config).expect("connect")
}

#[test]
fn end_to_end_scenario() {
    let addr = spawn_server(6, |idx, args| match idx {
        0 => {
            assert_eq!(args, [b"SET".to_vec(), b"x".to_vec(), b"1".to_vec()]);
            Frame::Simple("OK".to_string())
        }
        1 => {
            assert_eq!(args[0], b"GET");
            Frame::Bulk(Bytes::from_static(b"1"))
        }
        2 => {
            assert_eq!(args, [b"EXPIRE".to_vec(), b"x".to_vec(), b"10".to_vec()]);
            Frame::Integer(1)
        }
        3 => {
            assert_eq!(args[0], b"TTL");
            Frame::Integer(7)
        }
        4 => {
            assert_eq!(args[0], b"DEL");
            Frame::Integer(1)
        }
        _ => {
            assert_eq!(args[0], b"GET");
            Frame::Null
        }
    });

    let adapter = adapter_for(addr);
    adapter.set(b"x", b"1").expect("set");
    assert_eq!(
        adapter.get(b"x").into_value().expect("get"),
        Some(Bytes::from_static(b"1"))
    );
    adapter.expire(b"x", 10).expect("expire");
    match adapter.ttl(b"x").into_value().expect("ttl") {
        TtlState::ExpiresIn(remaining) => {
            assert!(remaining > Duration::ZERO && remaining <= Duration::from_secs(10));
        }
        other => panic!("expected a live ttl, got {other:?}"),
    }
    adapter.del(b"x").expect("del");
    assert_eq!(adapter.get(b"x").into_value().expect("get"), None);
}

#[test]
fn missing_key_reads_as_absent() {
    let addr = spawn_server(1, |_, args| {
        assert_eq!(args[0], b"GET");
        Frame::Null
    });

    let adapter = adapter_for(addr);
    assert_eq!(adapter.get(b"never-set").into_value().expect("get"), None);
}

#[test]
fn ttl_sentinels_reach_the_caller() {
    let addr = spawn_server(2, |idx, args| {
        assert_eq!(args[0], b"TTL");
        if idx == 0 {
            Frame::Integer(-1)
        } else {
            Frame::Integer(-2)
        }
    });

    let adapter = adapter_for(addr);
    assert_eq!(adapter.ttl(b"a").into_value().expect("ttl"), TtlState::NoExpiry);
    assert_eq!(adapter.ttl(b"b").into_value().expect("ttl"), TtlState::Missing);
}

#[test]
fn server_errors_propagate_synchronously() {
    let addr = spawn_server(1, |_, _| Frame::Error("ERR wrongtype".to_string()));

    let adapter = adapter_for(addr);
    match adapter.get(b"x").into_value() {
        Err(AdapterError::Server(message)) => assert!(message.contains("wrongtype")),
        other => panic!("expected a server error, got {other:?}"),
    }
}

#[test]
fn dispatch_passes_arbitrary_commands_through() {
    let addr = spawn_server(1, |_, args| {
        assert_eq!(args, [b"INCR".to_vec(), b"counter".to_vec()]);
        Frame::Integer(2)
    });

    let adapter = adapter_for(addr);
    let reply = adapter
        .dispatch("INCR", &[b"counter"])
        .into_value()
        .expect("dispatch");
    assert_eq!(reply, Frame::Integer(2));
}

#[test]
fn tcp_scheme_is_accepted() {
    let addr = spawn_server(1, |_, args| {
        assert_eq!(args[0], b"GET");
        Frame::Null
    });

    let mut config = AdapterConfig::new(format!("tcp://{addr}"));
    config.connect_timeout = Some(Duration::from_secs(1));
    config.read_timeout = Some(Duration::from_secs(1));
    let adapter = KvAdapter::connect(config).expect("connect via tcp scheme");
    assert_eq!(adapter.get(b"x").into_value().expect("get"), None);
}

/// Counts info-level events so the expire announcement is checkable.
struct CountInfoEvents(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for CountInfoEvents {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::INFO {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn expire_emits_exactly_one_info_record() {
    let addr = spawn_server(1, |_, args| {
        assert_eq!(args, [b"EXPIRE".to_vec(), b"x".to_vec(), b"10".to_vec()]);
        Frame::Integer(1)
    });
    let adapter = adapter_for(addr);

    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(CountInfoEvents(count.clone()));
    tracing::subscriber::with_default(subscriber, || {
        adapter.expire(b"x", 10).expect("expire");
    });
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
