//! Manual exploration binary: starts an [`hss::HttpStaticServer`], registers
//! a couple of URL handlers, and drives a few requests through an
//! in-memory transport so the request/response cycle can be watched end
//! to end without a real socket.
//!
//! Run with `cargo run --example serve_demo`.

use std::io::Write;
use std::sync::Arc;

use hss::config::ServerConfig;
use hss::dispatch::{reference, HandlerContext, HandlerOutcome};
use hss::session::MemoryTransport;
use hss::transport::{Method, Request};
use hss::HttpStaticServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let dir = tempfile::tempdir()?;
    std::fs::File::create(dir.path().join("index.html"))?
        .write_all(b"<html><body>hello from hss</body></html>")?;

    let config = ServerConfig::builder()
        .www_root(dir.path())
        .enable_url_handlers(true)
        .build()?;
    let server = HttpStaticServer::start(config);
    server
        .dispatch
        .register(Method::Get, "/version", reference::version as fn(&HandlerContext) -> HandlerOutcome)?;
    server
        .dispatch
        .register(Method::Get, "/healthz", reference::healthz as fn(&HandlerContext) -> HandlerOutcome)?;

    for (n, target) in ["/version", "/healthz", "/", "/missing"].into_iter().enumerate() {
        let id = server.engine.accept(0, Box::new(MemoryTransport::new(n as u64)));
        server.engine.rx(id, Request { method: Method::Get, target: target.to_string() });
        server.engine.cleanup(id);
        println!("GET {target} -> handled (see tracing output above for the reply record)");
    }

    println!("{}", server.show_report(true, true, Some(1)));
    Ok(())
}
