use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use http::header::USER_AGENT;
use tracing::debug;
use wreq::{Client, Method, Proxy};

use codexgate_common::AppConfig;
use codexgate_provider_core::{
    Headers, HttpMethod, UpstreamBody, UpstreamClient, UpstreamFailure, UpstreamHttpRequest,
    UpstreamHttpResponse, UpstreamTransportErrorKind, header_get,
};

pub const DEFAULT_USER_AGENT: &str = concat!("codexgate/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub proxy: Option<String>,
    pub connect_timeout: Duration,
    /// Upper bound for a whole exchange; long agent turns can stream for minutes.
    pub request_timeout: Duration,
    /// Gap allowed between two body chunks.
    pub stream_idle_timeout: Duration,
    /// Sent only when the caller did not provide one.
    pub user_agent: String,
}

impl UpstreamClientConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            proxy: config.proxy.clone(),
            ..Self::default()
        }
    }
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60 * 60),
            stream_idle_timeout: Duration::from_secs(120),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// One wreq pool shared by backend calls, token refreshes and prompt downloads.
#[derive(Clone)]
pub struct WreqUpstreamClient {
    client: Client,
    user_agent: String,
}

impl WreqUpstreamClient {
    pub fn new(config: &UpstreamClientConfig) -> Result<Self, wreq::Error> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .read_timeout(config.stream_idle_timeout);
        if let Some(proxy) = config
            .proxy
            .as_deref()
            .map(str::trim)
            .filter(|proxy| !proxy.is_empty())
        {
            builder = builder.proxy(Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            user_agent: config.user_agent.clone(),
        })
    }
}

impl UpstreamClient for WreqUpstreamClient {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>
    {
        Box::pin(async move {
            debug!(
                event = "wreq_send",
                method = req.method.as_str(),
                url = %req.url,
                stream = req.is_stream
            );
            let mut builder = self.client.request(wreq_method(req.method), &req.url);
            for (name, value) in with_user_agent(req.headers, &self.user_agent) {
                builder = builder.header(name, value);
            }
            if let Some(body) = req.body {
                builder = builder.body(body);
            }

            let resp = builder.send().await.map_err(transport_failure)?;
            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect::<Headers>();

            // Streams stay lazy: dropping the body drops the connection.
            let body = if req.is_stream {
                UpstreamBody::Stream(
                    resp.bytes_stream()
                        .map(|chunk| chunk.map_err(transport_failure))
                        .boxed(),
                )
            } else {
                UpstreamBody::Bytes(resp.bytes().await.map_err(transport_failure)?)
            };
            Ok(UpstreamHttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}

fn wreq_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn with_user_agent(mut headers: Headers, user_agent: &str) -> Headers {
    if header_get(&headers, USER_AGENT.as_str()).is_none() {
        headers.push((USER_AGENT.as_str().to_string(), user_agent.to_string()));
    }
    headers
}

fn transport_failure(err: wreq::Error) -> UpstreamFailure {
    let message = err.to_string();
    let lowered = message.to_ascii_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|needle| lowered.contains(needle));

    let kind = if err.is_timeout() {
        if mentions(&["read", "idle"]) {
            UpstreamTransportErrorKind::ReadTimeout
        } else {
            UpstreamTransportErrorKind::Timeout
        }
    } else if mentions(&["dns", "resolve"]) && err.is_connect() {
        UpstreamTransportErrorKind::Dns
    } else if mentions(&["tls", "ssl", "certificate"]) {
        UpstreamTransportErrorKind::Tls
    } else if err.is_connect() || err.is_connection_reset() {
        UpstreamTransportErrorKind::Connect
    } else {
        UpstreamTransportErrorKind::Other
    };
    UpstreamFailure { kind, message }
}
