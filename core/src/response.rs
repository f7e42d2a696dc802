//! GraphQL response envelope.
//!
//! # Design
//! `Response<D, E>` is generic over the `data` shape and the shape of each
//! error's `extensions`. Partial success is normal in GraphQL, so `data`
//! and `errors` are independent: either, both or neither may be present.
//! Servers commonly send `"errors": null`; that decodes as an empty list.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A decoded GraphQL response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "D: Serialize, E: Serialize",
    deserialize = "D: Deserialize<'de>, E: Deserialize<'de>"
))]
pub struct Response<D, E = Value> {
    #[serde(default)]
    pub data: Option<D>,

    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub errors: Vec<GraphError<E>>,
}

/// No data and no errors, the reply to a bare `null` body.
impl<D, E> Default for Response<D, E> {
    fn default() -> Self {
        Self {
            data: None,
            errors: Vec::new(),
        }
    }
}

impl<D, E> Response<D, E> {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Data present and no errors.
    pub fn is_success(&self) -> bool {
        self.data.is_some() && self.errors.is_empty()
    }

    pub fn first_error(&self) -> Option<&GraphError<E>> {
        self.errors.first()
    }

    /// `Err` with every GraphQL error if there is at least one, otherwise the data.
    pub fn into_result(self) -> Result<Option<D>, Vec<GraphError<E>>> {
        if self.errors.is_empty() {
            Ok(self.data)
        } else {
            Err(self.errors)
        }
    }
}

/// An entry of a response's `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "E: Serialize", deserialize = "E: Deserialize<'de>"))]
pub struct GraphError<E = Value> {
    pub message: String,

    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub locations: Vec<Location>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<E>,
}

impl<E> GraphError<E> {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
        }
    }

    pub fn with_extensions(mut self, extensions: E) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn extensions(&self) -> Option<&E> {
        self.extensions.as_ref()
    }
}

impl<E> fmt::Display for GraphError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graphql: {}", self.message)
    }
}

impl<E: fmt::Debug> std::error::Error for GraphError<E> {}

/// A position in the query document, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// One step of an error `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

fn null_as_empty<'de, De, T>(deserializer: De) -> Result<Vec<T>, De::Error>
where
    De: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
