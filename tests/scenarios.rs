//! End-to-end scenario tests (S1-S8 of the design ledger) driven through
//! the public crate API against the in-memory transport double.

use std::io::Write;
use std::sync::Arc;

use hss::cache::ContentCache;
use hss::config::ServerConfig;
use hss::dispatch::{reference, HandlerContext, HandlerOutcome, UrlDispatchTable};
use hss::session::{MemoryTransport, RequestEngine};
use hss::transport::{Endpoint, Method, Request, TransportProto};
use hss::Cli;

fn engine_with_root(root: &std::path::Path, cache_limit: usize) -> Arc<RequestEngine> {
    let config = Arc::new(ServerConfig::builder().www_root(root).cache_limit(cache_limit).build().unwrap());
    let dispatch = Arc::new(UrlDispatchTable::new());
    let cache = ContentCache::new(config.cache_limit);
    RequestEngine::new(cache, dispatch, config)
}

fn write(root: &std::path::Path, name: &str, size: usize, byte: u8) {
    std::fs::File::create(root.join(name)).unwrap().write_all(&vec![byte; size]).unwrap();
}

// S1: handler hit replies synchronously with the registered body.
#[test]
fn s1_handler_hit_sync() {
    let config = Arc::new(ServerConfig::builder().enable_url_handlers(true).build().unwrap());
    let dispatch = Arc::new(UrlDispatchTable::new());
    dispatch
        .register(Method::Get, "/version", reference::version as fn(&HandlerContext) -> HandlerOutcome)
        .unwrap();
    let cache = ContentCache::new(config.cache_limit);
    let engine = RequestEngine::new(cache, dispatch, config);

    let id = engine.accept(0, Box::new(MemoryTransport::new(0)));
    engine.rx(id, Request { method: Method::Get, target: "/version".to_string() });
    assert_eq!(engine.session_count(), 1);
    engine.cleanup(id);
    assert_eq!(engine.session_count(), 0);
}

// S2: file miss then hit — second GET must be served from cache, not disk.
#[test]
fn s2_file_miss_then_hit() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.html", 100, b'x');
    let engine = engine_with_root(dir.path(), 1 << 20);

    let id0 = engine.accept(0, Box::new(MemoryTransport::new(0)));
    engine.rx(id0, Request { method: Method::Get, target: "/a.html".to_string() });
    assert_eq!(engine.cache().entry_count(), 1);
    assert_eq!(engine.cache().size(), 100);
    engine.cleanup(id0);
    assert_eq!(engine.cache().entry_count(), 1, "releasing a session must not evict");

    let id1 = engine.accept(0, Box::new(MemoryTransport::new(1)));
    engine.rx(id1, Request { method: Method::Get, target: "/a.html".to_string() });
    assert_eq!(engine.cache().entry_count(), 1, "second GET must hit, not allocate again");
    assert_eq!(engine.cache().size(), 100);
    engine.cleanup(id1);
}

// S3: sequential GETs with releases between evict the oldest entry once
// the cache is over its limit.
#[test]
fn s3_eviction() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.html", 200, b'a');
    write(dir.path(), "b.html", 200, b'b');
    write(dir.path(), "c.html", 200, b'c');
    let engine = engine_with_root(dir.path(), 256);

    for (n, name) in ["/a.html", "/b.html", "/c.html"].into_iter().enumerate() {
        let id = engine.accept(0, Box::new(MemoryTransport::new(n as u64)));
        engine.rx(id, Request { method: Method::Get, target: name.to_string() });
        engine.cleanup(id); // release between requests
    }

    assert_eq!(engine.cache().size(), 400);
    assert_eq!(engine.cache().evictions(), 1);
    let files: Vec<_> = engine.cache().snapshot().into_iter().map(|e| e.filename).collect();
    assert_eq!(files.len(), 2);
    assert!(!files.iter().any(|f| f.ends_with("a.html")), "a.html should have been evicted");
    assert!(files.iter().any(|f| f.ends_with("b.html")));
    assert!(files.iter().any(|f| f.ends_with("c.html")));
    // b is the LRU tail: oldest of the two surviving entries
    assert!(engine.cache().snapshot()[0].filename.ends_with("b.html"));
}

// S4: an in-use entry is never chosen for eviction even when the cache
// is over its limit.
#[test]
fn s4_eviction_skips_in_use() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.html", 200, b'a');
    write(dir.path(), "b.html", 200, b'b');
    write(dir.path(), "c.html", 200, b'c');
    let engine = engine_with_root(dir.path(), 256);

    // hold /a open across the whole scenario (simulates a concurrent
    // in-flight session)
    let id0 = engine.accept(0, Box::new(MemoryTransport::new(0)));
    engine.rx(id0, Request { method: Method::Get, target: "/a.html".to_string() });
    // deliberately do not cleanup id0 — keeps the cache handle pinned

    let id1 = engine.accept(0, Box::new(MemoryTransport::new(1)));
    engine.rx(id1, Request { method: Method::Get, target: "/b.html".to_string() });
    engine.cleanup(id1);

    let id2 = engine.accept(0, Box::new(MemoryTransport::new(2)));
    engine.rx(id2, Request { method: Method::Get, target: "/c.html".to_string() });
    engine.cleanup(id2);

    let files: Vec<_> = engine.cache().snapshot().into_iter().map(|e| e.filename).collect();
    assert!(files.iter().any(|f| f.ends_with("a.html")), "pinned entry must survive");
    assert!(engine.cache().size() <= 400);

    engine.cleanup(id0);
}

// S5: a directory request that only resolves via `<path>/index.html`
// comes back as a 301 redirect to the trailing-slash form, not a served
// body.
#[test]
fn s5_index_fallback_redirects() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("dir")).unwrap();
    write(&dir.path().join("dir"), "index.html", 100, b'i');
    let engine = engine_with_root(dir.path(), 1 << 20);

    let id = engine.accept(
        0,
        Box::new(MemoryTransport::new(0).with_endpoint(Endpoint {
            local_ip: "10.0.0.1".to_string(),
            local_port: 80,
            proto: TransportProto::Tcp,
        })),
    );
    engine.rx(id, Request { method: Method::Get, target: "/dir".to_string() });
    assert_eq!(engine.cache().entry_count(), 1, "only the index.html attempt should acquire");

    let sent = engine
        .with_session_transport(id, |t| {
            let mt = t.as_any().downcast_ref::<MemoryTransport>().unwrap();
            String::from_utf8(mt.peek_outbound()).unwrap()
        })
        .unwrap();
    assert!(sent.starts_with("HTTP/1.1 301 Moved Permanently"));
    assert!(sent.contains("Location: http://10.0.0.1/dir/index.html"));

    engine.cleanup(id);
}

// S6: a non-GET/POST method is rejected with 405 and never touches the
// cache.
#[test]
fn s6_method_not_allowed_does_not_touch_cache() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.html", 100, b'a');
    let engine = engine_with_root(dir.path(), 1 << 20);

    let id = engine.accept(0, Box::new(MemoryTransport::new(0)));
    engine.rx(id, Request { method: Method::Other, target: "/a.html".to_string() });
    assert_eq!(engine.cache().entry_count(), 0);
}

// S7: an Async handler's eventual reply is delivered through
// AsyncReplySink after the triggering rx call has returned.
#[tokio::test]
async fn s7_async_handler_hand_off() {
    let config = Arc::new(ServerConfig::builder().enable_url_handlers(true).build().unwrap());
    let dispatch = Arc::new(UrlDispatchTable::new());
    dispatch
        .register(Method::Get, "/slow", reference::slow_async as fn(&HandlerContext) -> HandlerOutcome)
        .unwrap();
    let cache = ContentCache::new(config.cache_limit);
    let engine = RequestEngine::new(cache, dispatch, config);

    let id = engine.accept(0, Box::new(MemoryTransport::new(0)));
    engine.rx(id, Request { method: Method::Get, target: "/slow".to_string() });
    assert_eq!(engine.session_count(), 1, "session stays alive awaiting the async reply");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    // the handler's spawned task has now called back through send_data;
    // cleanup should find the session still present (reply landed, did
    // not drop it) and removable.
    engine.cleanup(id);
    assert_eq!(engine.session_count(), 0);
}

// S8: CLI validation — missing root/handlers and undersized cache both
// fail, and a second start while running is rejected without disturbing
// the first instance.
#[test]
fn s8_cli_validation() {
    let cli = Cli::new();
    assert!(cli.execute("http static server").is_err());
    assert!(cli.execute("http static server www-root /srv cache-size 1K").is_err());

    cli.execute("http static server url-handlers").unwrap();
    let first = cli.server().unwrap();
    assert!(cli.execute("http static server url-handlers").is_err());
    assert!(Arc::ptr_eq(&first, &cli.server().unwrap()));
}
