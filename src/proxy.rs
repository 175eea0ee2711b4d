//! Peer-side proxy: serves tunneled requests out of the write channel.
//!
//! The proxy is the mirror image of the connection. It consumes raw
//! request-channel messages, regroups them per correlation identifier,
//! hands each completed envelope to a [`RequestHandler`], and streams the
//! response back over the notification channel as frames under the same
//! identifier. Handler failures and unparseable envelopes become HTTP
//! error responses rather than dropped exchanges, so the remote caller
//! always learns the outcome before its deadline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::http::{HttpRequest, HttpResponse};
use crate::mtu::DEFAULT_MAX_PAYLOAD;
use crate::protocol::{fragment, CorrelationId, Frame};

/// Default pause between notification writes, mirroring the inter-write
/// throttle on the request path.
pub const DEFAULT_NOTIFY_DELAY: Duration = Duration::from_millis(10);

/// Outcome of handling one tunneled request.
pub type HandlerResult =
    Result<HttpResponse, Box<dyn std::error::Error + Send + Sync>>;

/// Application logic behind the proxy.
///
/// Implemented automatically for async functions taking an
/// [`HttpRequest`]:
///
/// ```ignore
/// async fn echo(request: HttpRequest) -> HandlerResult {
///     Ok(HttpResponse::new(200, "OK").body(request.body))
/// }
///
/// let proxy = TunnelProxy::spawn(Arc::new(echo), requests, notify, ProxyConfig::default());
/// ```
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce the response for one reassembled request.
    ///
    /// An `Err` is reported to the remote caller as a 500 response
    /// carrying the error text; it does not stop the proxy.
    async fn handle(&self, request: HttpRequest) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> RequestHandler for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, request: HttpRequest) -> HandlerResult {
        (self)(request).await
    }
}

/// Tunables for a [`TunnelProxy`].
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Per-message payload ceiling used when fragmenting responses. Must
    /// match what the transport granted the remote side.
    pub max_payload: usize,
    /// Pause between notification writes.
    pub notify_delay: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
            notify_delay: DEFAULT_NOTIFY_DELAY,
        }
    }
}

/// Serves tunneled HTTP exchanges arriving on a request channel.
///
/// Reassembly state lives inside one consumer task, so concurrent frame
/// arrival cannot interleave within a single exchange. Completed requests
/// are served on their own tasks; a slow handler does not block regrouping
/// of other exchanges.
pub struct TunnelProxy {
    task: JoinHandle<()>,
    stats: ProxyStats,
}

impl TunnelProxy {
    /// Start serving `requests`, answering over `notify`.
    ///
    /// The proxy stops when the request channel closes or the proxy is
    /// dropped; exchanges already in flight run to completion either way.
    pub fn spawn(
        handler: Arc<dyn RequestHandler>,
        requests: mpsc::UnboundedReceiver<Bytes>,
        notify: mpsc::UnboundedSender<Bytes>,
        config: ProxyConfig,
    ) -> Self {
        let stats = ProxyStats::new();
        let task = tokio::spawn(serve_loop(
            handler,
            requests,
            notify,
            config,
            stats.clone(),
        ));
        Self { task, stats }
    }

    /// Counters for this proxy.
    pub fn stats(&self) -> ProxyStats {
        self.stats.clone()
    }

    /// Stop consuming requests. Idempotent.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for TunnelProxy {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve_loop(
    handler: Arc<dyn RequestHandler>,
    mut requests: mpsc::UnboundedReceiver<Bytes>,
    notify: mpsc::UnboundedSender<Bytes>,
    config: ProxyConfig,
    stats: ProxyStats,
) {
    let mut partial: HashMap<CorrelationId, BytesMut> = HashMap::new();

    while let Some(data) = requests.recv().await {
        let frame = match Frame::decode(&data) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed request frame");
                continue;
            }
        };

        if frame.is_first() {
            // A fresh FIRST discards any stale partial under the same
            // identifier (a retried request after a caller timeout).
            partial.insert(frame.id, BytesMut::new());
        }

        if frame.is_last() {
            let Some(mut buffer) = partial.remove(&frame.id) else {
                tracing::debug!(id = %frame.id, "dropping terminal frame for unknown exchange");
                continue;
            };
            buffer.extend_from_slice(frame.payload());
            let message = buffer.freeze();

            stats.inner.pending.fetch_add(1, Ordering::Relaxed);
            tokio::spawn(serve_exchange(
                handler.clone(),
                frame.id,
                message,
                notify.clone(),
                config.clone(),
                stats.clone(),
            ));
        } else {
            match partial.get_mut(&frame.id) {
                Some(buffer) => buffer.extend_from_slice(frame.payload()),
                None => {
                    tracing::debug!(id = %frame.id, "dropping continuation for unknown exchange");
                }
            }
        }
    }

    tracing::debug!("request channel closed, proxy stopping");
}

/// Serve one completed exchange: parse, handle, fragment, notify.
async fn serve_exchange(
    handler: Arc<dyn RequestHandler>,
    id: CorrelationId,
    message: Bytes,
    notify: mpsc::UnboundedSender<Bytes>,
    config: ProxyConfig,
    stats: ProxyStats,
) {
    let response = match HttpRequest::parse(&message) {
        Ok(request) => {
            tracing::debug!(%id, method = %request.method, target = %request.target, "serving request");
            match handler.handle(request).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(%id, error = %err, "handler failed");
                    error_response(500, "Internal Server Error", &err.to_string())
                }
            }
        }
        Err(err) => {
            tracing::warn!(%id, error = %err, "unparseable request envelope");
            error_response(400, "Bad Request", &err.to_string())
        }
    };

    match fragment(id, &response.serialize(), config.max_payload) {
        Ok(frames) => {
            for (i, frame) in frames.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(config.notify_delay).await;
                }
                if notify.send(Bytes::from(frame.encode())).is_err() {
                    tracing::debug!(%id, "notification channel closed mid-response");
                    break;
                }
            }
        }
        Err(err) => {
            tracing::warn!(%id, error = %err, "cannot fragment response");
        }
    }

    stats.inner.pending.fetch_sub(1, Ordering::Relaxed);
    stats.inner.served.fetch_add(1, Ordering::Relaxed);
}

fn error_response(status: u16, reason: &str, detail: &str) -> HttpResponse {
    let body = Bytes::from(format!("{detail}\n"));
    HttpResponse::new(status, reason)
        .header("Content-Type", "text/plain")
        .header("Content-Length", body.len().to_string())
        .body(body)
}

/// Shared counters for a running proxy. Cheap to clone.
#[derive(Clone)]
pub struct ProxyStats {
    inner: Arc<StatsInner>,
}

struct StatsInner {
    started_at: Instant,
    served: AtomicU64,
    pending: AtomicUsize,
}

impl ProxyStats {
    fn new() -> Self {
        Self {
            inner: Arc::new(StatsInner {
                started_at: Instant::now(),
                served: AtomicU64::new(0),
                pending: AtomicUsize::new(0),
            }),
        }
    }

    /// Exchanges accepted but not yet fully answered.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.load(Ordering::Relaxed)
    }

    /// Exchanges answered since the proxy started, error responses
    /// included.
    pub fn requests_served(&self) -> u64 {
        self.inner.served.load(Ordering::Relaxed)
    }

    /// Snapshot for the status endpoint.
    pub fn report(&self) -> StatusReport {
        StatusReport {
            status: "ok",
            uptime_secs: self.inner.started_at.elapsed().as_secs(),
            pending_requests: self.pending_requests(),
            requests_served: self.requests_served(),
        }
    }
}

/// Liveness snapshot, serialized as JSON for out-of-band health reads.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Always `"ok"` while the proxy is running.
    pub status: &'static str,
    /// Seconds since the proxy started.
    pub uptime_secs: u64,
    /// Exchanges currently being served.
    pub pending_requests: usize,
    /// Total exchanges answered.
    pub requests_served: u64,
}

impl StatusReport {
    /// Serialize to a JSON object.
    pub fn to_json(&self) -> String {
        // Serialization of this struct cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
