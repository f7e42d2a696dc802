//! Typed GraphQL-over-HTTP client core.
//!
//! # Overview
//! Turns a `Request` (query, variables, file attachments, headers) into one
//! outbound `HttpRequest`, hands it to a caller-supplied `Transport`, and
//! decodes the reply into `Response<D, E>` where `D` is the shape of `data`
//! and `E` the shape of each error's `extensions`.
//!
//! # Design
//! - `Client` holds the endpoint, the transport and two flags (multipart
//!   form support, close-after-request). It carries no mutable state.
//! - `Requester` is a thin typed facade over a `Client`. It picks the JSON
//!   or multipart encoding, sends exactly one request, and maps every local
//!   and remote failure onto `RequestError`. Multipart forms are streamed to
//!   the transport as they are encoded.
//! - The transport sits behind a trait, so tests can swap in an in-memory
//!   one and production code uses `ReqwestTransport`.
//! - GraphQL errors inside a decodable response are data, never `Err`.

pub mod client;
pub mod error;
pub mod http;
pub mod multipart;
mod pipe;
pub mod request;
pub mod requester;
pub mod response;
pub mod types;

pub use crate::client::{Client, ClientBuilder};
pub use crate::error::{ConfigError, RequestError, TransportError};
#[cfg(feature = "reqwest")]
pub use crate::http::ReqwestTransport;
pub use crate::http::{HttpRequest, HttpResponse, RequestBody, ResponseBody, Transport};
pub use crate::request::{File, Request};
pub use crate::requester::Requester;
pub use crate::response::{GraphError, Location, PathSegment, Response};
pub use crate::types::{Query, QueryVariables};
