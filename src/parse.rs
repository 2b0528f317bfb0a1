use std::str::FromStr;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use n0_error::{Result, StackResultExt, StdResultExt, ensure_any};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Upper bound on the request header section we will buffer.
pub(crate) const HEADER_SECTION_MAX_LENGTH: usize = 8192;

/// Initial capacity for the framing buffer.
const INITIAL_CAPACITY: usize = 4 * 1024;

/// Host and port of an origin server.
#[derive(Debug, Clone, derive_more::Display)]
#[display("{host}:{port}")]
pub struct Authority {
    /// Hostname or IP literal without scheme.
    pub host: String,
    /// Port number, defaulted to 80 when the source string carried none.
    pub port: u16,
}

impl FromStr for Authority {
    type Err = n0_error::AnyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_host_str(s)
    }
}

impl Authority {
    /// Parses a `host` or `host:port` string, appending port 80 when absent.
    pub fn from_host_str(s: &str) -> Result<Self> {
        let uri = Uri::from_str(&format!("http://{s}")).std_context("Invalid host")?;
        let authority = uri.authority().context("Missing host")?;
        ensure_any!(!authority.host().is_empty(), "Empty host");
        Ok(Self {
            host: authority.host().to_string(),
            port: authority.port_u16().unwrap_or(80),
        })
    }

    /// The address string handed to the dialer.
    pub(crate) fn to_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A client request framed from raw socket bytes.
///
/// Accepts both origin-form targets (`GET /path`, host taken from the `Host`
/// header) and absolute-form targets (`GET http://host/path`, host taken from
/// the request target), since HTTP clients speak absolute-form to forward
/// proxies.
#[derive(Debug)]
pub struct HttpRequest {
    /// HTTP method from the request line.
    pub method: Method,
    /// Origin-form path sent onward to the origin server.
    pub path: String,
    /// Origin host, possibly without a port.
    pub host: String,
    /// Raw header map as received.
    pub headers: HeaderMap<HeaderValue>,
    /// Request body, bounded by the declared `Content-Length`.
    pub body: Bytes,
}

impl HttpRequest {
    /// Reads from `reader` until a complete header section is buffered, then
    /// frames the request and reads the body up to `Content-Length`.
    ///
    /// A body cut short by EOF is kept as-is; the relay forwards whatever
    /// arrived.
    pub async fn read(reader: &mut (impl AsyncRead + Unpin)) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(INITIAL_CAPACITY);
        let (header_len, mut request) = loop {
            if let Some(parsed) = Self::parse_with_len(&buf)? {
                break parsed;
            }
            ensure_any!(
                buf.len() < HEADER_SECTION_MAX_LENGTH,
                "Request header section exceeds buffer limit"
            );
            let n = reader.read_buf(&mut buf).await.anyerr()?;
            ensure_any!(n > 0, "Connection closed before end of request header section");
        };

        let declared = content_length(&request.headers).unwrap_or(0);
        let mut body = buf.split_off(header_len);
        while body.len() < declared {
            let n = reader.read_buf(&mut body).await.anyerr()?;
            if n == 0 {
                break;
            }
        }
        body.truncate(declared);
        request.body = body.freeze();
        Ok(request)
    }

    /// Parses a request from a buffer and returns `None` when incomplete.
    ///
    /// Returns the length of the header section and the request (body unset).
    pub fn parse_with_len(buf: &[u8]) -> Result<Option<(usize, Self)>> {
        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut req = httparse::Request::new(&mut headers);
        match req.parse(buf).std_context("Invalid HTTP request")? {
            httparse::Status::Partial => Ok(None),
            httparse::Status::Complete(header_len) => {
                Self::from_parts(req).map(|req| Some((header_len, req)))
            }
        }
    }

    fn from_parts(req: httparse::Request) -> Result<Self> {
        let method_str = req.method.context("Missing HTTP method")?;
        let method: Method = method_str.parse().std_context("Invalid HTTP method")?;
        let target = req.path.context("Missing request target")?;
        let headers = HeaderMap::from_iter(req.headers.iter().flat_map(|h| {
            let value = HeaderValue::from_bytes(h.value).ok()?;
            let name = http::HeaderName::from_bytes(h.name.as_bytes()).ok()?;
            Some((name, value))
        }));

        let uri = Uri::from_str(target).std_context("Invalid request target")?;
        let (path, host) = if uri.scheme().is_some() {
            // Absolute-form: the host lives in the request target.
            let authority = uri.authority().context("Missing authority in request target")?;
            let path = uri
                .path_and_query()
                .map(|pq| pq.to_string())
                .unwrap_or_else(|| "/".to_string());
            (path, authority.as_str().to_string())
        } else {
            let host = headers
                .get(http::header::HOST)
                .and_then(|v| v.to_str().ok())
                .context("Missing Host header")?
                .to_string();
            (target.to_string(), host)
        };

        Ok(Self {
            method,
            path,
            host,
            headers,
            body: Bytes::new(),
        })
    }

    /// Serializes the minimal request the proxy sends to the origin.
    ///
    /// `Connection: close` is forced exactly once, overriding any
    /// client-supplied value; the `Host` header is rewritten from the framed
    /// host. All other headers are carried over unchanged.
    pub fn to_origin_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());
        out.extend_from_slice(format!("{} {} HTTP/1.1\r\n", self.method, self.path).as_bytes());
        out.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        for (name, value) in self.headers.iter() {
            if name == http::header::HOST || name == http::header::CONNECTION {
                continue;
            }
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"Connection: close\r\n\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// A response parsed from captured relay bytes.
///
/// Only the prefetch pipeline constructs this; the relay itself forwards the
/// raw bytes without ever framing them.
#[derive(Debug)]
pub struct HttpResponse {
    /// Status code from the response line.
    pub status: StatusCode,
    /// Raw header map as received.
    pub headers: HeaderMap<HeaderValue>,
}

impl HttpResponse {
    /// Parses a response from a buffer and returns `None` when incomplete.
    ///
    /// Returns the length of the header section and the response; the body
    /// starts at that offset in the buffer.
    pub fn parse_with_len(buf: &[u8]) -> Result<Option<(usize, Self)>> {
        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut res = httparse::Response::new(&mut headers);
        match res.parse(buf).std_context("Invalid HTTP response")? {
            httparse::Status::Partial => Ok(None),
            httparse::Status::Complete(header_len) => {
                let code = res.code.context("Missing response status code")?;
                let status = StatusCode::from_u16(code).std_context("Invalid response status code")?;
                let headers = HeaderMap::from_iter(res.headers.iter().flat_map(|h| {
                    let value = HeaderValue::from_bytes(h.value).ok()?;
                    let name = http::HeaderName::from_bytes(h.name.as_bytes()).ok()?;
                    Some((name, value))
                }));
                Ok(Some((header_len, HttpResponse { status, headers })))
            }
        }
    }

    /// The declared `Content-Type`, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// The declared `Content-Encoding`, if any.
    pub fn content_encoding(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
    }
}

/// Parses the declared `Content-Length`, if present and well-formed.
pub(crate) fn content_length(headers: &HeaderMap<HeaderValue>) -> Option<usize> {
    headers
        .get(http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
