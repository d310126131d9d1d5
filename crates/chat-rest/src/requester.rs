//! reqwest-backed [`HttpExecutor`]

use crate::executor::{HttpExecutor, TransportError};
use crate::request::{RestRequest, RestResponse};
use async_trait::async_trait;
use chat_common::{ApiConfig, ClientConfig, RestError, RestResult};
use chat_core::Method;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::trace;

/// Sends compiled routes to the REST API
#[derive(Debug, Clone)]
pub struct Requester {
    http: reqwest::Client,
    api: ApiConfig,
}

impl Requester {
    /// Build an HTTP client carrying the configured credentials
    pub fn new(config: &ClientConfig) -> RestResult<Self> {
        let mut authorization =
            HeaderValue::from_str(&config.account_type.authorization(&config.api.token))
                .map_err(|_| RestError::Config("token is not a valid header value".to_string()))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.api.user_agent.as_str())
            .timeout(config.api.request_timeout())
            .build()
            .map_err(|e| RestError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api: config.api.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.api.base_url
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl HttpExecutor for Requester {
    async fn execute(&self, request: &RestRequest) -> Result<RestResponse, TransportError> {
        let route = request.route();
        let url = self.api.url_for(route.path());

        let mut builder = self.http.request(http_method(route.method()), &url);
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        for (name, value) in request.headers() {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        trace!(route = %route, status, bytes = body.len(), "Received response");
        Ok(RestResponse::new(status, headers, body.to_vec()))
    }
}
