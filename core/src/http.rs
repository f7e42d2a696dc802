//! HTTP transport seam.
//!
//! # Design
//! The core describes outbound requests as plain data (`HttpRequest`) and
//! receives plain data back (`HttpResponse`). Executing the round trip is
//! the job of a `Transport`, which keeps TLS, timeouts and pooling out of
//! the core and lets tests run without a network.
//!
//! Request bodies are either fully encoded (`RequestBody::Full`) or produced
//! while the transport reads them (`RequestBody::Stream`). Multipart uploads
//! use the streaming form so attachments are never held in memory at once.
//!
//! The response body is a separate `ResponseBody` value so that reading it
//! is its own fallible step. Consuming it with `read_all` drains it;
//! dropping it releases it.

use std::fmt;
use std::future::Future;
use std::io::{self, Read};

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::error::TransportError;

/// An HTTP request described as plain data.
///
/// Built by `Requester`. Headers may hold several values per key.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Outbound request body.
pub enum RequestBody {
    /// Encoded in full before sending.
    Full(Bytes),
    /// Produced while it is read. Read it once, to the end, from a thread
    /// that may block; an error means the body could not be completed and
    /// must not be sent as if it were.
    Stream(Box<dyn Read + Send>),
}

impl RequestBody {
    /// The encoded bytes of a `Full` body.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RequestBody::Full(bytes) => Some(bytes),
            RequestBody::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, RequestBody::Stream(_))
    }

    /// Read the whole body into memory, draining a stream on the blocking pool.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            RequestBody::Full(bytes) => Ok(bytes),
            RequestBody::Stream(mut reader) => tokio::task::spawn_blocking(move || {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            })
            .await
            .map_err(io::Error::other)?,
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Full(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Full(Bytes::from(bytes))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            RequestBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// An HTTP response as returned by a `Transport`.
///
/// `body` has not been read yet; see `ResponseBody`.
#[derive(Debug, Clone)]
pub struct HttpResponse<B = Bytes> {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: B,
}

/// A response body that can be read to the end exactly once.
pub trait ResponseBody: Send {
    fn read_all(self) -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}

impl ResponseBody for Bytes {
    async fn read_all(self) -> Result<Bytes, TransportError> {
        Ok(self)
    }
}

impl ResponseBody for Vec<u8> {
    async fn read_all(self) -> Result<Bytes, TransportError> {
        Ok(Bytes::from(self))
    }
}

impl ResponseBody for String {
    async fn read_all(self) -> Result<Bytes, TransportError> {
        Ok(Bytes::from(self))
    }
}

/// Performs one HTTP exchange.
///
/// Implementations must not retry; the requester relies on one `send` being
/// one network attempt.
pub trait Transport: Send + Sync {
    type Body: ResponseBody;

    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse<Self::Body>, TransportError>> + Send;
}

/// The stock transport, backed by a `reqwest::Client`.
///
/// Configure timeouts, TLS or proxies on the `reqwest::Client` and pass it to
/// `with_client`.
#[cfg(feature = "reqwest")]
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
    type Body = reqwest::Response;

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse<Self::Body>, TransportError> {
        let response = self
            .client
            .request(request.method, request.url.as_str())
            .headers(request.headers)
            .body(into_reqwest_body(request.body))
            .send()
            .await
            .map_err(TransportError::new)?;

        Ok(HttpResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            body: response,
        })
    }
}

/// Chunks of a streamed body waiting for reqwest to send them.
#[cfg(feature = "reqwest")]
const STREAM_QUEUE: usize = 4;

#[cfg(feature = "reqwest")]
const STREAM_CHUNK: usize = 64 * 1024;

#[cfg(feature = "reqwest")]
fn into_reqwest_body(body: RequestBody) -> reqwest::Body {
    match body {
        RequestBody::Full(bytes) => reqwest::Body::from(bytes),
        RequestBody::Stream(reader) => {
            let (tx, rx) = tokio::sync::mpsc::channel(STREAM_QUEUE);
            tokio::task::spawn_blocking(move || pump(reader, tx));
            reqwest::Body::wrap_stream(tokio_stream::wrappers::ReceiverStream::new(rx))
        }
    }
}

/// Move `reader` into `tx` chunk by chunk until it ends, fails, or reqwest
/// stops listening.
#[cfg(feature = "reqwest")]
fn pump(mut reader: Box<dyn Read + Send>, tx: tokio::sync::mpsc::Sender<io::Result<Bytes>>) {
    let mut buf = vec![0; STREAM_CHUNK];
    loop {
        let chunk = match reader.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => Err(err),
        };
        let failed = chunk.is_err();
        if tx.blocking_send(chunk).is_err() || failed {
            return;
        }
    }
}

#[cfg(feature = "reqwest")]
impl ResponseBody for reqwest::Response {
    async fn read_all(self) -> Result<Bytes, TransportError> {
        self.bytes().await.map_err(TransportError::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_bodies_read_back_unchanged() {
        let bytes = Bytes::from_static(b"{\"data\":null}");
        assert_eq!(bytes.clone().read_all().await.unwrap(), bytes);
        assert_eq!(
            b"raw".to_vec().read_all().await.unwrap(),
            Bytes::from_static(b"raw")
        );
        assert_eq!(
            "text".to_string().read_all().await.unwrap(),
            Bytes::from_static(b"text")
        );
    }

    #[tokio::test]
    async fn streamed_body_collects_in_order() {
        let reader = io::Cursor::new(b"streamed body".to_vec()).chain(&b" tail"[..]);
        let body = RequestBody::Stream(Box::new(reader));
        assert!(body.is_stream());
        assert!(body.as_bytes().is_none());
        assert_eq!(
            body.collect().await.unwrap(),
            Bytes::from_static(b"streamed body tail")
        );
    }

    #[tokio::test]
    async fn failing_stream_fails_collect() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("gone"))
            }
        }

        let err = RequestBody::Stream(Box::new(Broken)).collect().await.unwrap_err();
        assert_eq!(err.to_string(), "gone");
    }

    #[test]
    fn full_body_exposes_its_bytes() {
        let body = RequestBody::from(b"{}".to_vec());
        assert_eq!(body.as_bytes().unwrap(), &Bytes::from_static(b"{}"));
        assert_eq!(format!("{body:?}"), "Full(2)");
    }
}
