//! HTTP envelope serialization and parsing.
//!
//! Only what the tunnel needs to delimit a message: a request or status
//! line, headers up to the first blank line, remaining bytes as the body.
//! Header keys are matched case-insensitively, emission order is
//! preserved, and duplicates are allowed. No chunked transfer-encoding.

use bytes::Bytes;

use crate::error::ProtocolError;

const CRLF: &str = "\r\n";
const HEAD_BODY_SEPARATOR: &[u8] = b"\r\n\r\n";

/// An HTTP request to be tunneled.
///
/// # Example
///
/// ```
/// use bletun::http::HttpRequest;
///
/// let request = HttpRequest::new("POST", "/api/scan")
///     .header("Content-Type", "application/json")
///     .body(&br#"{"iface":"wlan0"}"#[..]);
///
/// let wire = request.serialize();
/// assert!(wire.starts_with(b"POST /api/scan HTTP/1.1\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method (`GET`, `POST`, ...).
    pub method: String,
    /// Request target: path plus optional query string.
    pub target: String,
    headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Bytes,
}

impl HttpRequest {
    /// Create a request with no headers and an empty body.
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Convenience constructor for a `GET` request.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new("GET", target)
    }

    /// Append a header. Duplicate names are allowed; emission order is
    /// the order of insertion.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// All headers in emission order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value for `name`, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// Serialize to wire bytes: request line, headers, blank line, body.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(format!("{} {} HTTP/1.1{CRLF}", self.method, self.target).as_bytes());
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}{CRLF}").as_bytes());
        }
        out.extend_from_slice(CRLF.as_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    /// Parse a reassembled request envelope.
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        let invalid = |reason: &str| ProtocolError::InvalidRequest(reason.to_string());

        let (head, body) = split_envelope(buf).ok_or_else(|| invalid("missing blank line"))?;
        let mut lines = head.split(CRLF);
        let request_line = lines.next().ok_or_else(|| invalid("empty request"))?;

        let mut parts = request_line.splitn(3, ' ');
        let method = parts.next().filter(|m| !m.is_empty());
        let target = parts.next();
        let version = parts.next();
        let (method, target) = match (method, target, version) {
            (Some(m), Some(t), Some(_)) => (m, t),
            _ => return Err(invalid("malformed request line")),
        };

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            headers: parse_headers(lines),
            body,
        })
    }
}

/// An HTTP response reassembled from the notification channel.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Numeric status code.
    pub status: u16,
    /// Reason phrase from the status line.
    pub reason: String,
    headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response with no headers and an empty body.
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header (duplicates allowed, order preserved).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// All headers in emission order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value for `name`, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// Serialize to wire bytes: status line, headers, blank line, body.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(format!("HTTP/1.1 {} {}{CRLF}", self.status, self.reason).as_bytes());
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}{CRLF}").as_bytes());
        }
        out.extend_from_slice(CRLF.as_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    /// Parse a reassembled response envelope.
    ///
    /// Expects `HTTP/1.1 CODE REASON`, headers until the first blank line,
    /// and the remaining bytes as the body.
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        let invalid = |reason: &str| ProtocolError::InvalidResponse(reason.to_string());

        let (head, body) = split_envelope(buf).ok_or_else(|| invalid("missing blank line"))?;
        let mut lines = head.split(CRLF);
        let status_line = lines.next().ok_or_else(|| invalid("empty response"))?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().filter(|v| v.starts_with("HTTP/"));
        let code = parts.next().and_then(|c| c.parse::<u16>().ok());
        let (_, status) = match (version, code) {
            (Some(v), Some(c)) => (v, c),
            _ => return Err(invalid("malformed status line")),
        };
        let reason = parts.next().unwrap_or("").to_string();

        Ok(Self {
            status,
            reason,
            headers: parse_headers(lines),
            body,
        })
    }
}

/// Split an envelope at the first blank line. The head must be valid
/// UTF-8; the body is carried as raw bytes.
fn split_envelope(buf: &[u8]) -> Option<(&str, Bytes)> {
    let pos = buf
        .windows(HEAD_BODY_SEPARATOR.len())
        .position(|window| window == HEAD_BODY_SEPARATOR)?;
    let head = std::str::from_utf8(&buf[..pos]).ok()?;
    let body = Bytes::copy_from_slice(&buf[pos + HEAD_BODY_SEPARATOR.len()..]);
    Some((head, body))
}

/// Parse `Name: Value` lines; lines without a colon are skipped.
fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<(String, String)> {
    lines
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn header_lookup<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
