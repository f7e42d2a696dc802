//! Client configuration.
//!
//! # Design
//! `Client` is built once and shared. It holds the endpoint, the transport
//! (behind an `Arc`, so clones are cheap) and two behavioral flags read by
//! `Requester`. Nothing in it changes after `build`, so any number of
//! concurrent calls can use the same client without locking.

use std::fmt;
use std::sync::Arc;

use http::Uri;

use crate::error::ConfigError;
#[cfg(feature = "reqwest")]
use crate::http::ReqwestTransport;
use crate::requester::Requester;

pub struct Client<T> {
    endpoint: String,
    transport: Arc<T>,
    use_multipart_form: bool,
    close_request: bool,
}

#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport> {
    /// A client using the stock `ReqwestTransport` and JSON bodies.
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        Self::builder(endpoint).build()
    }

    pub fn builder(endpoint: &str) -> ClientBuilder<ReqwestTransport> {
        ClientBuilder::with_transport(endpoint, ReqwestTransport::new())
    }
}

impl<T> Client<T> {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether requests are sent as `multipart/form-data` (required for files).
    pub fn uses_multipart_form(&self) -> bool {
        self.use_multipart_form
    }

    /// Whether each request asks the server to close the connection afterwards.
    pub fn closes_request(&self) -> bool {
        self.close_request
    }

    /// A typed requester over this client.
    pub fn requester<D, E>(&self) -> Requester<T, D, E> {
        Requester::new(self.clone())
    }
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            transport: Arc::clone(&self.transport),
            use_multipart_form: self.use_multipart_form,
            close_request: self.close_request,
        }
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .field("use_multipart_form", &self.use_multipart_form)
            .field("close_request", &self.close_request)
            .finish_non_exhaustive()
    }
}

/// Builder for `Client`.
#[derive(Debug)]
pub struct ClientBuilder<T> {
    endpoint: String,
    transport: T,
    use_multipart_form: bool,
    close_request: bool,
}

impl<T> ClientBuilder<T> {
    pub fn with_transport(endpoint: &str, transport: T) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            transport,
            use_multipart_form: false,
            close_request: false,
        }
    }

    /// Replace the transport, keeping the other settings.
    pub fn transport<U>(self, transport: U) -> ClientBuilder<U> {
        ClientBuilder {
            endpoint: self.endpoint,
            transport,
            use_multipart_form: self.use_multipart_form,
            close_request: self.close_request,
        }
    }

    /// Send requests as `multipart/form-data`, enabling file uploads.
    pub fn use_multipart_form(mut self) -> Self {
        self.use_multipart_form = true;
        self
    }

    /// Send `Connection: close` with every request.
    pub fn immediately_close_request(mut self) -> Self {
        self.close_request = true;
        self
    }

    /// Validate the endpoint and build the client.
    ///
    /// The endpoint must be an absolute URI with a scheme and a host.
    pub fn build(self) -> Result<Client<T>, ConfigError> {
        let uri = match self.endpoint.parse::<Uri>() {
            Ok(uri) => uri,
            Err(source) => {
                return Err(ConfigError::InvalidEndpoint {
                    reason: source.to_string(),
                    endpoint: self.endpoint,
                    source: Some(source),
                })
            }
        };
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: self.endpoint,
                reason: "missing scheme or host".to_string(),
                source: None,
            });
        }
        Ok(Client {
            endpoint: self.endpoint,
            transport: Arc::new(self.transport),
            use_multipart_form: self.use_multipart_form,
            close_request: self.close_request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::http::{HttpRequest, HttpResponse, Transport};
    use bytes::Bytes;
    use std::error::Error as _;

    struct NullTransport;

    impl Transport for NullTransport {
        type Body = Bytes;

        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse<Bytes>, TransportError> {
            Err(TransportError::new("unreachable"))
        }
    }

    #[test]
    fn defaults_to_json_and_keep_alive() {
        let client = ClientBuilder::with_transport("http://localhost:3000/graphql", NullTransport)
            .build()
            .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:3000/graphql");
        assert!(!client.uses_multipart_form());
        assert!(!client.closes_request());
    }

    #[test]
    fn flags_are_applied() {
        let client = ClientBuilder::with_transport("http://localhost/graphql", NullTransport)
            .use_multipart_form()
            .immediately_close_request()
            .build()
            .unwrap();
        assert!(client.uses_multipart_form());
        assert!(client.closes_request());
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let err = ClientBuilder::with_transport("not a url", NullTransport)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { ref endpoint, .. } if endpoint == "not a url"));
        assert!(err.source().is_some());
    }

    #[test]
    fn relative_endpoints_are_rejected() {
        for endpoint in ["localhost", "/graphql", "localhost:3000"] {
            let err = ClientBuilder::with_transport(endpoint, NullTransport)
                .build()
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("invalid endpoint {endpoint:?}: missing scheme or host")
            );
            assert!(err.source().is_none());
        }
    }

    #[test]
    fn configuration_is_readable_without_a_transport() {
        #[derive(Debug)]
        struct Placeholder;

        let client = ClientBuilder::with_transport("https://api.example.com/graphql", Placeholder)
            .use_multipart_form()
            .build()
            .unwrap();
        assert_eq!(client.endpoint(), "https://api.example.com/graphql");
        assert!(client.uses_multipart_form());
        assert!(!client.closes_request());
        assert!(format!("{client:?}").contains("api.example.com"));
    }

    #[test]
    fn clones_share_the_transport() {
        let client = ClientBuilder::with_transport("http://localhost/graphql", NullTransport)
            .build()
            .unwrap();
        let other = client.clone();
        assert!(std::ptr::eq(client.transport(), other.transport()));
    }

    #[cfg(feature = "reqwest")]
    #[test]
    fn stock_client_uses_reqwest() {
        let client = Client::new("http://localhost/graphql").unwrap();
        assert!(!client.uses_multipart_form());
        let client = Client::builder("http://localhost/graphql")
            .use_multipart_form()
            .build()
            .unwrap();
        assert!(client.uses_multipart_form());
    }
}
