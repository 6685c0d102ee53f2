use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, trace};

use crate::transport::{HttpResponse, Transport, TransportFailure};

const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// `Transport` over a pooled reqwest client bound to one camera endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .context("building http client")?;

        debug!(base_url = %base_url, "camera http transport initialized");

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportFailure {
    // A connect timeout reports both is_connect and is_timeout; timeout wins.
    if err.is_timeout() {
        TransportFailure::timeout(err)
    } else if err.is_connect() {
        TransportFailure::connect(err)
    } else {
        TransportFailure::other(err)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<HttpResponse, TransportFailure> {
        let url = self.url(path);
        trace!(url = %url, body_len = body.len(), "sending POST to camera");

        let resp = self
            .client
            .post(&url)
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(map_reqwest_error)?;

        debug!(
            url = %url,
            status_code = %status,
            body_len = bytes.len(),
            "received response from camera"
        );

        Ok(HttpResponse::new(status, bytes.to_vec()))
    }
}
