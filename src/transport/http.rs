//! Terminal executor: the stage that actually talks to the network.

use super::{Body, Request, Response, Transport, TransportError};

/// Blocking HTTP executor at the bottom of every pipeline. Timeout and
/// cancellation semantics are whatever the underlying client carries;
/// interceptors above must not reinterpret them.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("Forge CLI ", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let Request {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method, url).headers(headers);
        builder = match body {
            Body::Empty => builder,
            Body::Bytes(bytes) => builder.body(bytes),
            Body::Reader(reader) => builder.body(reqwest::blocking::Body::new(reader)),
        };

        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        Ok(Response {
            status,
            headers,
            url,
            body: Box::new(response),
        })
    }
}
