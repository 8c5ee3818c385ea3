//! `hss` — an embeddable static HTTP server core.
//!
//! This crate provides the parts of a static file server that are worth
//! getting right in a host networking stack: a concurrent content cache
//! with reference-counted LRU eviction, a URL dispatch table for
//! in-process handlers, and a per-session event-driven request/response
//! state machine. Transport (TCP/TLS/QUIC framing) and HTTP header
//! parsing live outside this crate, behind the [`transport::Transport`]
//! trait — see `demos/` for a runnable example against an in-memory
//! transport double.
//!
//! Modeled on a VPP host stack's `http_static` plugin: one process-wide
//! cache shared by worker-homed sessions, a single lock serializing the
//! cache's miss path, and a line-oriented CLI grammar instead of a
//! conventional argv parser (§6 of the design notes).

pub mod cache;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod session;
pub mod transport;

use std::sync::Arc;

use parking_lot::Mutex;

use cache::ContentCache;
use cli::CliCommand;
use config::ServerConfig;
use dispatch::UrlDispatchTable;
use error::{CliError, ServerError};
use session::RequestEngine;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// An owned, running instance of the server: its configuration, its URL
/// dispatch table, and the request engine wired to a fresh [`ContentCache`].
///
/// Replaces the original's single process-wide `hss_main` global with an
/// explicit struct the start command owns and hands out by `Arc` (§9
/// design notes, "Global mutable state").
pub struct HttpStaticServer {
    pub config: Arc<ServerConfig>,
    pub dispatch: Arc<UrlDispatchTable>,
    pub engine: Arc<RequestEngine>,
}

impl HttpStaticServer {
    pub fn start(config: ServerConfig) -> Arc<Self> {
        let config = Arc::new(config);
        let dispatch = Arc::new(UrlDispatchTable::new());
        let cache = ContentCache::new(config.cache_limit);
        let engine = RequestEngine::new(cache, Arc::clone(&dispatch), Arc::clone(&config));
        Arc::new(Self { config, dispatch, engine })
    }

    /// Textual report backing `show http static server [cache] [sessions]`.
    pub fn show_report(&self, cache: bool, sessions: bool, verbose: Option<u8>) -> String {
        let mut out = String::new();
        if cache {
            let c = self.engine.cache();
            out.push_str(&format!(
                "cache: {} entries, {}/{} bytes, {} evictions\n",
                c.entry_count(),
                c.size(),
                c.limit(),
                c.evictions()
            ));
            if verbose.unwrap_or(0) > 0 {
                for entry in c.snapshot() {
                    out.push_str(&format!(
                        "  {} {} bytes inuse={}\n",
                        entry.filename, entry.size, entry.inuse
                    ));
                }
            }
        }
        if sessions {
            out.push_str(&format!("sessions: {}\n", self.engine.session_count()));
        }
        out
    }

    /// Machine-readable equivalent of [`Self::show_report`]'s cache
    /// section, for hosts that want to expose `show` over an API instead
    /// of a terminal.
    pub fn cache_snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.engine.cache().snapshot())
    }

    /// Textual report backing `clear http static cache`.
    pub fn clear_cache_report(&self) -> String {
        let busy = self.engine.cache().clear();
        if busy > 0 {
            format!("Note: {busy} busy items still in cache")
        } else {
            "cache cleared".to_string()
        }
    }
}

/// Parses and runs CLI grammar lines against at most one running
/// [`HttpStaticServer`] at a time, matching the host REPL's model of a
/// single static-server instance per process.
#[derive(Default)]
pub struct Cli {
    server: Mutex<Option<Arc<HttpStaticServer>>>,
}

impl Cli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(&self) -> Option<Arc<HttpStaticServer>> {
        self.server.lock().clone()
    }

    /// Parses and executes one line, returning the textual response the
    /// host's REPL would print.
    pub fn execute(&self, line: &str) -> anyhow::Result<String> {
        let command = cli::parse(line)?;
        match command {
            CliCommand::Start(config) => {
                let mut guard = self.server.lock();
                if guard.is_some() {
                    return Err(CliError::Server(ServerError::AlreadyRunning).into());
                }
                *guard = Some(HttpStaticServer::start(config));
                Ok("http static server started".to_string())
            }
            CliCommand::Show { cache, sessions, verbose } => {
                let guard = self.server.lock();
                let server =
                    guard.as_ref().ok_or_else(|| anyhow::anyhow!("http static server not running"))?;
                Ok(server.show_report(cache, sessions, verbose))
            }
            CliCommand::ClearCache => {
                let guard = self.server.lock();
                let server =
                    guard.as_ref().ok_or_else(|| anyhow::anyhow!("http static server not running"))?;
                Ok(server.clear_cache_report())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_while_running_fails_without_tearing_down_first() {
        let cli = Cli::new();
        cli.execute("http static server url-handlers").unwrap();
        let first = cli.server().unwrap();
        let err = cli.execute("http static server url-handlers").unwrap_err();
        assert!(err.to_string().contains("already running"));
        assert!(Arc::ptr_eq(&first, &cli.server().unwrap()));
    }

    #[test]
    fn show_before_start_is_an_error() {
        let cli = Cli::new();
        assert!(cli.execute("show http static server").is_err());
    }

    #[test]
    fn clear_before_start_is_an_error() {
        let cli = Cli::new();
        assert!(cli.execute("clear http static cache").is_err());
    }

    #[test]
    fn start_then_show_reports_empty_cache() {
        let cli = Cli::new();
        cli.execute("http static server url-handlers").unwrap();
        let report = cli.execute("show http static server cache").unwrap();
        assert!(report.contains("cache: 0 entries"));
    }

    #[test]
    fn cache_snapshot_json_round_trips_through_serde() {
        let cli = Cli::new();
        cli.execute("http static server url-handlers").unwrap();
        let json = cli.server().unwrap().cache_snapshot_json().unwrap();
        assert_eq!(json, "[]");
    }

    #[test]
    fn clear_reports_no_busy_items_when_cache_is_empty() {
        let cli = Cli::new();
        cli.execute("http static server url-handlers").unwrap();
        let report = cli.execute("clear http static cache").unwrap();
        assert_eq!(report, "cache cleared");
    }
}
