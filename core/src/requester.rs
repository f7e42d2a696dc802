//! Request dispatch: encoding, sending and decoding.
//!
//! # Design
//! One `request` call is one transport round trip. The client's multipart
//! flag alone picks the encoding; attached files only matter for the
//! up-front check that multipart is enabled.
//!
//! The two encodings weigh a non-200 status against a bad body differently:
//! - JSON: a body that fails to decode under a non-200 status reports the
//!   status; under 200 it reports the decode error.
//! - Multipart: a body that fails to *read* under a non-200 status reports
//!   the status; a body that reads but fails to decode is always a decode
//!   error.
//!
//! Multipart forms are streamed: a blocking task writes the form into a
//! bounded pipe while the transport reads it, so attachments are read once,
//! in order, and never held in memory together.

use std::fmt;
use std::future::Future;
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::time::Duration;

use http::header::{ACCEPT, CONNECTION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::client::Client;
use crate::error::RequestError;
use crate::http::{HttpRequest, HttpResponse, RequestBody, ResponseBody, Transport};
use crate::multipart::MultipartWriter;
use crate::pipe;
use crate::request::{File, Request};
use crate::response::Response;
use crate::types::{Query, QueryVariables};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Chunks of multipart body in flight between the encoder and the transport.
const BODY_QUEUE: usize = 4;

/// Encoder writes are coalesced up to this many bytes per chunk.
const BODY_CHUNK: usize = 64 * 1024;

/// Wire shape of a JSON-encoded request. `variables` is `null` when unset.
#[derive(Serialize)]
struct JsonBody<'a> {
    query: &'a Query,
    variables: Option<&'a QueryVariables>,
}

/// Sends `Request`s through a `Client` and decodes `Response<D, E>`.
pub struct Requester<T, D, E = Value> {
    client: Client<T>,
    _types: PhantomData<fn() -> (D, E)>,
}

impl<T, D, E> Requester<T, D, E> {
    pub fn new(client: Client<T>) -> Self {
        Self {
            client,
            _types: PhantomData,
        }
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }
}

impl<T, D, E> Requester<T, D, E>
where
    T: Transport,
    D: DeserializeOwned,
    E: DeserializeOwned,
{
    /// Send `req` and decode the reply.
    ///
    /// Dropping the returned future aborts the call.
    pub async fn request(&self, req: Request) -> Result<Response<D, E>, RequestError> {
        let (query, vars, files, headers) = req.into_parts();
        if !files.is_empty() && !self.client.uses_multipart_form() {
            return Err(RequestError::InvalidInput);
        }

        if self.client.uses_multipart_form() {
            self.request_multipart(query, vars, files, headers).await
        } else {
            self.request_json(&query, vars, headers).await
        }
    }

    /// Like `request`, failing with `Timeout` if no reply arrives within `timeout`.
    pub async fn request_with_timeout(
        &self,
        req: Request,
        timeout: Duration,
    ) -> Result<Response<D, E>, RequestError> {
        match tokio::time::timeout(timeout, self.request(req)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(?timeout, "graphql request timed out");
                Err(RequestError::Timeout(timeout))
            }
        }
    }

    /// Like `request`, failing with `Cancelled` as soon as `cancelled` completes.
    pub async fn request_until<F>(
        &self,
        req: Request,
        cancelled: F,
    ) -> Result<Response<D, E>, RequestError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = cancelled => {
                debug!("graphql request cancelled");
                Err(RequestError::Cancelled)
            }
            result = self.request(req) => result,
        }
    }

    async fn request_json(
        &self,
        query: &Query,
        vars: Option<QueryVariables>,
        headers: HeaderMap,
    ) -> Result<Response<D, E>, RequestError> {
        let payload = JsonBody {
            query,
            variables: vars.as_ref().filter(|vars| !vars.is_empty()),
        };
        let body = serde_json::to_vec(&payload).map_err(RequestError::Encode)?;

        debug!(
            endpoint = self.client.endpoint(),
            bytes = body.len(),
            "sending graphql request as json"
        );
        let headers = self.outbound_headers(HeaderValue::from_static(JSON_CONTENT_TYPE), &headers);
        let response = self.send(RequestBody::from(body), headers).await?;

        let status = response.status;
        let body = response
            .body
            .read_all()
            .await
            .map_err(RequestError::ReadBody)?;
        trace!(status, bytes = body.len(), "graphql response received");

        match decode(&body) {
            Ok(decoded) => Ok(decoded),
            Err(err) if status != 200 => {
                warn!(status, error = %err, "undecodable graphql response");
                Err(RequestError::Request { status })
            }
            Err(err) => Err(RequestError::Decode(err)),
        }
    }

    /// Stream the form to the transport while a blocking task encodes it.
    ///
    /// An encoding failure wins over the transport outcome unless it was
    /// caused by the transport dropping the body.
    async fn request_multipart(
        &self,
        query: Query,
        vars: Option<QueryVariables>,
        files: Vec<File>,
        headers: HeaderMap,
    ) -> Result<Response<D, E>, RequestError> {
        let file_count = files.len();
        let (pipe_writer, pipe_reader) = pipe::pipe(BODY_QUEUE);
        let pipe_status = pipe_writer.status();
        let form = MultipartWriter::new(BufWriter::with_capacity(BODY_CHUNK, pipe_writer));
        let content_type = HeaderValue::from_str(&form.form_data_content_type())
            .map_err(|err| RequestError::CloseWriter(io::Error::new(io::ErrorKind::InvalidData, err)))?;

        let encoder = tokio::task::spawn_blocking(move || {
            let finished = encode_multipart(form, &query, vars, files).and_then(|buffered| {
                buffered
                    .into_inner()
                    .map_err(|err| RequestError::CloseWriter(err.into_error()))?
                    .finish()
                    .map_err(RequestError::CloseWriter)
            });
            match finished {
                Err(_) if pipe_status.is_broken() => Ok(()),
                finished => finished,
            }
        });

        debug!(
            endpoint = self.client.endpoint(),
            files = file_count,
            "streaming graphql request as multipart form"
        );
        let headers = self.outbound_headers(content_type, &headers);
        let sent = self
            .send(RequestBody::Stream(Box::new(pipe_reader)), headers)
            .await;

        match encoder.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(error = %err, "multipart encoding failed");
                return Err(err);
            }
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => return Err(RequestError::Cancelled),
        }
        let response = sent?;

        let status = response.status;
        let body = match response.body.read_all().await {
            Ok(body) => body,
            Err(err) if status != 200 => {
                warn!(status, error = %err, "unreadable graphql response");
                return Err(RequestError::Request { status });
            }
            Err(err) => return Err(RequestError::ReadBody(err)),
        };
        trace!(status, bytes = body.len(), "graphql response received");

        decode(&body).map_err(RequestError::Decode)
    }

    /// Computed headers first, then every caller header appended after them.
    fn outbound_headers(&self, content_type: HeaderValue, extra: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(extra.len() + 3);
        headers.insert(CONTENT_TYPE, content_type);
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        if self.client.closes_request() {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }
        for (name, value) in extra {
            headers.append(name.clone(), value.clone());
        }
        headers
    }

    async fn send(
        &self,
        body: RequestBody,
        headers: HeaderMap,
    ) -> Result<HttpResponse<T::Body>, RequestError> {
        let request = HttpRequest {
            method: Method::POST,
            url: self.client.endpoint().to_string(),
            headers,
            body,
        };
        self.client
            .transport()
            .send(request)
            .await
            .map_err(RequestError::Transport)
    }
}

/// Decode a reply body. A bare `null` is an empty response.
fn decode<D, E>(body: &[u8]) -> Result<Response<D, E>, serde_json::Error>
where
    D: DeserializeOwned,
    E: DeserializeOwned,
{
    serde_json::from_slice::<Option<Response<D, E>>>(body).map(Option::unwrap_or_default)
}

/// Write the form: `query`, then `variables` if any, then each file in
/// order, then the closing boundary. Returns the drained writer.
fn encode_multipart<W: Write>(
    mut writer: MultipartWriter<W>,
    query: &Query,
    vars: Option<QueryVariables>,
    files: Vec<File>,
) -> Result<W, RequestError> {
    writer
        .write_field("query", query.as_str())
        .map_err(RequestError::WriteField)?;

    if let Some(vars) = vars.filter(|vars| !vars.is_empty()) {
        let field = writer
            .create_form_field("variables")
            .map_err(RequestError::CreateVariablesField)?;
        serde_json::to_writer(field, &vars).map_err(RequestError::EncodeVariablesField)?;
    }

    for mut file in files {
        let mut part = writer
            .create_form_file(&file.field, &file.name)
            .map_err(RequestError::CreateFile)?;
        io::copy(&mut file.reader, &mut part).map_err(RequestError::Copy)?;
        trace!(field = %file.field, name = %file.name, "attachment copied");
    }

    writer.close().map_err(RequestError::CloseWriter)
}

impl<T, D, E> Clone for Requester<T, D, E> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _types: PhantomData,
        }
    }
}

impl<T, D, E> fmt::Debug for Requester<T, D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester")
            .field("client", &self.client)
            .finish()
    }
}
