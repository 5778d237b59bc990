//! Shared utilities for relay integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use axum::Router;
use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use url::Url;

use http_relay::config::RelayConfig;
use http_relay::http::HttpServer;
use http_relay::lifecycle::Shutdown;
use http_relay::relay::{OutboundRequest, ProxyResponse, ResponseHead, ResponseSink, Transport, TransportError};

/// What the transport double saw for one outbound call.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub content_length: Option<u64>,
}

type Script = Box<dyn Fn() -> Result<ProxyResponse, TransportError> + Send + Sync>;

/// Transport double returning a scripted response and recording every call.
pub struct ScriptedTransport {
    script: Script,
    delay: Option<Duration>,
    calls: AtomicUsize,
    captured: Mutex<Vec<CapturedRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn() -> Result<ProxyResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            delay: None,
            calls: AtomicUsize::new(0),
            captured: Mutex::new(Vec::new()),
        })
    }

    /// Wait `delay` before answering; used to exercise the request timeout.
    pub fn delayed<F>(delay: Duration, script: F) -> Arc<Self>
    where
        F: Fn() -> Result<ProxyResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            captured: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> CapturedRequest {
        self.captured.lock().unwrap().last().cloned().expect("no outbound request captured")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<ProxyResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let body = match request.body {
            Some(body) => Some(axum::body::to_bytes(body, usize::MAX).await.unwrap()),
            None => None,
        };
        self.captured.lock().unwrap().push(CapturedRequest {
            method: request.method.to_http(),
            url: request.url,
            headers: request.headers,
            body,
            content_length: request.content_length,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.script)()
    }
}

/// Sink that keeps everything written to it.
#[derive(Default)]
pub struct RecordingSink {
    pub head: Option<ResponseHead>,
    pub writes: usize,
    pub body: Vec<u8>,
    pub finished: bool,
    /// Fail writes after this many succeeded, simulating a caller that hangs up.
    pub fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> u16 {
        self.head.as_ref().map(|h| h.status.as_u16()).unwrap_or(0)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.as_ref()?.headers.get(name)?.to_str().ok()
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn send_head(&mut self, head: ResponseHead) -> io::Result<()> {
        self.head = Some(head);
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        if self.fail_after.is_some_and(|n| self.writes >= n) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "caller hung up"));
        }
        self.writes += 1;
        self.body.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }

    fn is_committed(&self) -> bool {
        self.head.is_some()
    }
}

/// Serve `app` on an ephemeral local port, acting as the relay target.
pub async fn start_upstream(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A relay server running on an ephemeral port.
///
/// Keep it alive for the duration of the test; `updates` feeds the server's
/// reload loop the way the config watcher does.
pub struct RelayHandle {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<RelayConfig>,
}

pub async fn start_relay(config: RelayConfig) -> RelayHandle {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config).unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    RelayHandle { addr, shutdown, updates }
}

/// Client that neither follows redirects nor picks up proxy settings from
/// the environment.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Relay URL for `target`, percent-encoding the target.
pub fn relay_url(relay: SocketAddr, target: &str) -> String {
    let mut url = Url::parse(&format!("http://{}/proxy", relay)).unwrap();
    url.query_pairs_mut().append_pair("url", target);
    url.to_string()
}
