use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, Url};

use relay_protocol::{HttpMethod, RelayRequest, RelaySender, RequestId};

use crate::config::BackgroundConfig;
use crate::error::{parse_error_message, FetchError};
use crate::pump::pump;

/// Performs relayed requests on behalf of the UI context.
#[derive(Debug)]
pub struct Fetcher {
    http: Client,
    config: BackgroundConfig,
}

impl Fetcher {
    pub fn new(config: BackgroundConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(FetchError::Client)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &BackgroundConfig {
        &self.config
    }

    pub fn build_headers(&self, request: &RelayRequest) -> Result<HeaderMap, FetchError> {
        let mut out = HeaderMap::new();
        for (key, value) in self.config.merged_headers(&request.options.headers) {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| FetchError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    FetchError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &RelayRequest,
    ) -> Result<reqwest::RequestBuilder, FetchError> {
        let url = Url::parse(&request.url)
            .map_err(|error| FetchError::InvalidUrl(format!("{}: {error}", request.url)))?;
        let headers = self.build_headers(request)?;

        let mut builder = self
            .http
            .request(method(request.options.method), url)
            .headers(headers);
        if let Some(body) = &request.options.body {
            builder = builder.body(body.clone());
        }
        Ok(builder)
    }

    /// Sends the request and rejects non-success statuses.
    pub async fn send(&self, request: &RelayRequest) -> Result<Response, FetchError> {
        let response = self
            .build_request(request)?
            .send()
            .await
            .map_err(FetchError::Request)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(FetchError::Status(status, parse_error_message(status, &body)))
    }

    /// Runs one relayed exchange to completion and resolves `sender` exactly once.
    pub async fn perform(&self, request_id: RequestId, request: RelayRequest, sender: RelaySender) {
        tracing::debug!(
            request_id,
            url = %request.url,
            stream = request.stream,
            "performing relayed request"
        );

        let response = match self.send(&request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(request_id, error = %error, "relayed request failed");
                sender.fail(error.kind(), error.to_string());
                return;
            }
        };

        if request.stream {
            match pump(response.bytes_stream(), sender).await {
                Ok(summary) => tracing::debug!(
                    request_id,
                    chunks = summary.chunks,
                    bytes = summary.bytes,
                    "relayed stream finished"
                ),
                Err(message) => tracing::warn!(request_id, %message, "relayed stream aborted"),
            }
            return;
        }

        match read_json(response).await {
            Ok(data) => sender.succeed(data),
            Err(error) => {
                tracing::warn!(request_id, error = %error, "relayed response unreadable");
                sender.fail(error.kind(), error.to_string());
            }
        }
    }
}

async fn read_json(response: Response) -> Result<serde_json::Value, FetchError> {
    let bytes = response.bytes().await.map_err(FetchError::Body)?;
    serde_json::from_slice(&bytes).map_err(|error| FetchError::NotJson(error.to_string()))
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}
