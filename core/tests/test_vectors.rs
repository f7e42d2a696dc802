//! Verify JSON-strategy requests against the vectors in `test-vectors/`.
//!
//! Each case names the request inputs, the exact wire request expected, a
//! simulated reply, and either the decoded result or the error text.

use std::sync::Mutex;

use bytes::Bytes;
use gql_core::{
    ClientBuilder, HttpRequest, HttpResponse, Request, Requester, Transport, TransportError,
};
use http::{HeaderMap, HeaderValue, Method};
use serde::Deserialize;
use serde_json::Value;

const ENDPOINT: &str = "http://localhost:3000/graphql";

#[derive(Debug, Deserialize, PartialEq)]
struct TestData {
    something: String,
}

/// Replays one simulated response and keeps the request it was sent.
struct VectorTransport {
    status: u16,
    body: String,
    sent: Mutex<Option<HttpRequest>>,
}

impl Transport for VectorTransport {
    type Body = Bytes;

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse<Bytes>, TransportError> {
        *self.sent.lock().unwrap() = Some(request);
        Ok(HttpResponse {
            status: self.status,
            headers: HeaderMap::new(),
            body: Bytes::from(self.body.clone()),
        })
    }
}

fn header_pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .map(|pairs| {
            pairs
                .iter()
                .map(|pair| {
                    let pair = pair.as_array().unwrap();
                    (
                        pair[0].as_str().unwrap().to_string(),
                        pair[1].as_str().unwrap().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn json_request_vectors() {
    let raw = include_str!("../../test-vectors/json_requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["simulated_response"];
        let transport = VectorTransport {
            status: sim["status"].as_u64().unwrap() as u16,
            body: sim["body"].as_str().unwrap().to_string(),
            sent: Mutex::new(None),
        };
        let requester: Requester<_, TestData> = ClientBuilder::with_transport(ENDPOINT, transport)
            .build()
            .unwrap()
            .requester();

        let mut request = Request::new(case["query"].as_str().unwrap());
        if let Some(vars) = case["variables"].as_object() {
            for (key, value) in vars {
                request.var(key.as_str(), value.clone());
            }
        }
        for (key, value) in header_pairs(&case["headers"]) {
            request.header(
                http::HeaderName::from_bytes(key.as_bytes()).unwrap(),
                HeaderValue::from_str(&value).unwrap(),
            );
        }

        let result = requester.request(request).await;

        // Verify the outbound request
        let sent = requester
            .client()
            .transport()
            .sent
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| panic!("{name}: nothing was sent"));
        let expected_req = &case["expected_request"];
        assert_eq!(sent.method, Method::POST, "{name}: method");
        assert_eq!(sent.url, ENDPOINT, "{name}: url");
        assert_eq!(
            String::from_utf8(sent.body.as_bytes().unwrap().to_vec()).unwrap(),
            expected_req["body"].as_str().unwrap(),
            "{name}: body"
        );
        let sent_headers: Vec<(String, String)> = sent
            .headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap().to_string()))
            .collect();
        assert_eq!(sent_headers, header_pairs(&expected_req["headers"]), "{name}: headers");

        // Verify the decoded outcome
        if let Some(expected) = case["expected_error"].as_str() {
            let err = result.expect_err(name);
            assert_eq!(err.to_string(), expected, "{name}: error");
        } else if let Some(prefix) = case["expected_error_prefix"].as_str() {
            let err = result.expect_err(name);
            assert!(err.to_string().starts_with(prefix), "{name}: error {err}");
        } else {
            let response = result.unwrap_or_else(|err| panic!("{name}: {err}"));
            let expected = &case["expected_result"];
            let expected_data: Option<TestData> =
                serde_json::from_value(expected["data"].clone()).unwrap();
            assert_eq!(response.data, expected_data, "{name}: data");

            let messages: Vec<&str> = response.errors.iter().map(|e| e.message()).collect();
            let expected_messages: Vec<&str> = expected["error_messages"]
                .as_array()
                .unwrap()
                .iter()
                .map(|m| m.as_str().unwrap())
                .collect();
            assert_eq!(messages, expected_messages, "{name}: errors");
        }
    }
}
