//! HTTP tunneling over narrow, asymmetric transports.
//!
//! `bletun` carries complete HTTP request/response exchanges across a
//! channel pair that offers nothing but small writes and small
//! notifications: a write-only request channel and a notify-only response
//! channel, each limited to a per-message payload ceiling negotiated at
//! connection time. Envelopes are fragmented into frames tagged with a
//! 16-byte correlation identifier and FIRST/LAST flags, so multiple
//! requests can be in flight concurrently and responses are matched back
//! to their callers regardless of arrival interleaving.
//!
//! # Architecture
//!
//! ```text
//!  caller ──fetch()──► Connection ──frames──► Transport (request channel)
//!                         │  ▲
//!              correlation│  │oneshot
//!                  table  │  │completion
//!                         ▼  │
//!                 reassembly task ◄──notifications── Transport (response channel)
//! ```
//!
//! - [`Connection`] owns the send path: fragment, throttle, write, then
//!   wait on a per-request completion with a deadline.
//! - A single reassembly task consumes the notification queue and
//!   regroups frames through the correlation table; malformed or unknown
//!   frames are logged and dropped.
//! - [`transport::Transport`] is the seam to the physical channels;
//!   establishing them (discovery, pairing, subscription) is out of
//!   scope here.
//! - [`proxy::TunnelProxy`] is the other end of the wire: it reassembles
//!   requests, invokes application logic, and streams responses back.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bletun::proxy::{ProxyConfig, TunnelProxy};
//! use bletun::transport::ChannelTransport;
//! use bletun::{Connection, HttpRequest, HttpResponse};
//!
//! async fn echo(request: HttpRequest) -> bletun::proxy::HandlerResult {
//!     Ok(HttpResponse::new(200, "OK").body(request.body))
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let (transport, requests) = ChannelTransport::new(Some(100));
//! let (notify_tx, notify_rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! let _proxy = TunnelProxy::spawn(
//!     Arc::new(echo),
//!     requests,
//!     notify_tx,
//!     ProxyConfig { max_payload: 100, ..ProxyConfig::default() },
//! );
//!
//! let connection = Connection::connect(Arc::new(transport), notify_rx);
//! let response = connection
//!     .fetch(&HttpRequest::new("POST", "/echo").body(&b"ping"[..]))
//!     .await
//!     .unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(&response.body[..], b"ping");
//! # });
//! ```

pub mod error;
pub mod http;
pub mod mtu;
pub mod protocol;
pub mod proxy;
pub mod transport;

mod connection;
mod reassembly;
mod table;

pub use connection::{
    Connection, ConnectionBuilder, DEFAULT_RESPONSE_TIMEOUT, DEFAULT_WRITE_DELAY,
};
pub use error::{ProtocolError, Result, TunnelError};
pub use http::{HttpRequest, HttpResponse};
