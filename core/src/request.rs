//! The per-call request value.

use std::fmt;
use std::io::Read;

use http::header::{HeaderValue, IntoHeaderName};
use http::HeaderMap;
use serde::Serialize;
use serde_json::Value;

use crate::types::{Query, QueryVariables};

/// A file to upload with a multipart request.
///
/// The reader is consumed once, front to back, while the form is encoded.
pub struct File {
    pub field: String,
    pub name: String,
    pub reader: Box<dyn Read + Send>,
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("field", &self.field)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A GraphQL request: query, variables, file attachments and headers.
///
/// Files are only accepted by clients built with `use_multipart_form`.
#[derive(Debug)]
pub struct Request {
    query: Query,
    vars: Option<QueryVariables>,
    files: Vec<File>,
    headers: HeaderMap,
}

impl Request {
    pub fn new(query: impl Into<Query>) -> Self {
        Self {
            query: query.into(),
            vars: None,
            files: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Set a variable.
    pub fn var(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.vars
            .get_or_insert_with(QueryVariables::new)
            .insert(key, value.into());
        self
    }

    /// Set a variable from any serializable value.
    pub fn try_var(
        &mut self,
        key: impl Into<String>,
        value: impl Serialize,
    ) -> Result<&mut Self, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        Ok(self.var(key, value))
    }

    pub fn vars(&self) -> Option<&QueryVariables> {
        self.vars.as_ref()
    }

    /// Attach a file to upload.
    ///
    /// `reader` is read once, on a blocking thread, while the form is being
    /// sent; it is not buffered whole.
    pub fn file(
        &mut self,
        field: impl Into<String>,
        name: impl Into<String>,
        reader: impl Read + Send + 'static,
    ) -> &mut Self {
        self.files.push(File {
            field: field.into(),
            name: name.into(),
            reader: Box::new(reader),
        });
        self
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Append a header value, keeping any values already set for `name`.
    pub fn header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) -> &mut Self {
        self.headers.append(name, value);
        self
    }

    /// Replace every value of `name` with `value`.
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub(crate) fn into_parts(self) -> (Query, Option<QueryVariables>, Vec<File>, HeaderMap) {
        (self.query, self.vars, self.files, self.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::AUTHORIZATION;
    use serde_json::json;

    #[test]
    fn new_request_has_no_variables() {
        let req = Request::new("query {}");
        assert_eq!(req.query().as_str(), "query {}");
        assert!(req.vars().is_none());
        assert!(req.files().is_empty());
        assert!(req.headers().is_empty());
    }

    #[test]
    fn var_sets_value() {
        let mut req = Request::new("query {}");
        req.var("username", "testUser").var("limit", 10);
        let vars = req.vars().unwrap();
        assert_eq!(vars.get("username"), Some(&json!("testUser")));
        assert_eq!(vars.get("limit"), Some(&json!(10)));
    }

    #[test]
    fn try_var_serializes_structs() {
        #[derive(Serialize)]
        struct Filter {
            active: bool,
        }

        let mut req = Request::new("query {}");
        req.try_var("filter", Filter { active: true }).unwrap();
        assert_eq!(req.vars().unwrap().get("filter"), Some(&json!({"active": true})));
    }

    #[test]
    fn header_appends_and_set_header_replaces() {
        let mut req = Request::new("query {}");
        req.header("x-trace", HeaderValue::from_static("a"))
            .header("x-trace", HeaderValue::from_static("b"));
        assert_eq!(req.headers().get_all("x-trace").iter().count(), 2);

        req.set_header("x-trace", HeaderValue::from_static("c"));
        let values: Vec<_> = req.headers().get_all("x-trace").iter().collect();
        assert_eq!(values, vec![&HeaderValue::from_static("c")]);

        req.set_header(AUTHORIZATION, HeaderValue::from_static("Bearer token"));
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer token");
    }

    #[test]
    fn files_keep_insertion_order() {
        let mut req = Request::new("mutation {}");
        req.file("first", "a.txt", &b"aaa"[..])
            .file("second", "b.txt", &b"bbb"[..]);
        let names: Vec<_> = req.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(req.files()[0].field, "first");
    }
}
