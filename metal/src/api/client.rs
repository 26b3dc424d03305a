use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::connect::{encode_envelope, EndStreamMessage, EnvelopeDecoder};
use super::error::{ApiError, RpcErrorBody};

const CONNECT_PROTOCOL_VERSION: &str = "Connect-Protocol-Version";

/// metalstack.cloud API client speaking the Connect protocol with JSON payloads
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    config: ClientConfig,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Upper bound for a unary call. Streams are only bounded while connecting.
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("terraform-provider-metal/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Server stream of decoded messages
pub type MessageStream<T> = BoxStream<'static, Result<T, ApiError>>;

struct StreamState {
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: EnvelopeDecoder,
    finished: bool,
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(api_url: &str, api_token: &str) -> Result<Self, ApiError> {
        Self::with_config(api_url, api_token, ClientConfig::default())
    }

    pub fn with_config(
        api_url: &str,
        api_token: &str,
        config: ClientConfig,
    ) -> Result<Self, ApiError> {
        let parsed = url::Url::parse(api_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", api_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "{}: unsupported scheme {}",
                api_url,
                parsed.scheme()
            )));
        }

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: api_url.trim_end_matches('/').to_string(),
                auth_header: format!("Bearer {}", api_token),
                config,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    fn procedure_url(&self, procedure: &str) -> String {
        format!("{}/{}", self.inner.base_url, procedure)
    }

    /// Call a request/response procedure such as `api.v1.IPService/Get`
    pub async fn unary<Req, Resp>(&self, procedure: &str, request: &Req) -> Result<Resp, ApiError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        tracing::debug!(procedure, "calling remote procedure");

        let response = self
            .inner
            .http_client
            .post(self.procedure_url(procedure))
            .header(AUTHORIZATION, &self.inner.auth_header)
            .header(USER_AGENT, &self.inner.config.user_agent)
            .header(CONNECT_PROTOCOL_VERSION, "1")
            .timeout(Duration::from_secs(self.inner.config.timeout_seconds))
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        tracing::trace!(procedure, body = %text, "remote procedure response");

        serde_json::from_str(&text)
            .map_err(|e| ApiError::Parse(format!("{}: {}", procedure, e)))
    }

    /// Open a server-streaming procedure
    ///
    /// The returned stream ends cleanly only when the server sends its
    /// end-of-stream message without an error. A body that stops early yields
    /// [`ApiError::UnexpectedEof`].
    pub async fn server_stream<Req, Resp>(
        &self,
        procedure: &str,
        request: &Req,
    ) -> Result<MessageStream<Resp>, ApiError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Send + 'static,
    {
        tracing::debug!(procedure, "opening server stream");

        let payload =
            serde_json::to_vec(request).map_err(|e| ApiError::Parse(e.to_string()))?;

        let response = self
            .inner
            .http_client
            .post(self.procedure_url(procedure))
            .header(AUTHORIZATION, &self.inner.auth_header)
            .header(USER_AGENT, &self.inner.config.user_agent)
            .header(CONNECT_PROTOCOL_VERSION, "1")
            .header(CONTENT_TYPE, "application/connect+json")
            .body(encode_envelope(0, &payload))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let state = StreamState {
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
            decoder: EnvelopeDecoder::new(),
            finished: false,
        };

        Ok(stream::unfold(state, next_message::<Resp>).boxed())
    }

    fn map_transport_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.inner.config.timeout_seconds)
        } else {
            ApiError::Request(error)
        }
    }

    async fn error_from_response(response: reqwest::Response) -> ApiError {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Unauthenticated;
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return ApiError::Request(e),
        };

        match serde_json::from_str::<RpcErrorBody>(&text) {
            Ok(body) if !body.code.is_empty() => body.into(),
            _ => ApiError::Rpc {
                code: code_for_status(status).to_string(),
                message: if text.is_empty() {
                    status.to_string()
                } else {
                    text
                },
            },
        }
    }

    /// Cluster service operations
    pub fn cluster(&self) -> super::cluster::ClusterApi<'_> {
        super::cluster::ClusterApi::new(self)
    }

    /// IP service operations
    pub fn ip(&self) -> super::ip::IpApi<'_> {
        super::ip::IpApi::new(self)
    }

    /// Volume service operations
    pub fn volume(&self) -> super::volume::VolumeApi<'_> {
        super::volume::VolumeApi::new(self)
    }

    /// Snapshot service operations
    pub fn snapshot(&self) -> super::snapshot::SnapshotApi<'_> {
        super::snapshot::SnapshotApi::new(self)
    }

    /// Asset service operations
    pub fn asset(&self) -> super::asset::AssetApi<'_> {
        super::asset::AssetApi::new(self)
    }

    /// Method service operations
    pub fn method(&self) -> super::method::MethodApi<'_> {
        super::method::MethodApi::new(self)
    }
}

async fn next_message<Resp: DeserializeOwned>(
    mut state: StreamState,
) -> Option<(Result<Resp, ApiError>, StreamState)> {
    if state.finished {
        return None;
    }

    loop {
        match state.decoder.next_envelope() {
            Err(e) => {
                state.finished = true;
                return Some((Err(e), state));
            }
            Ok(Some(envelope)) if envelope.is_end_stream() => {
                state.finished = true;
                let outcome =
                    EndStreamMessage::parse(&envelope.payload).and_then(EndStreamMessage::into_result);
                return match outcome {
                    Ok(()) => None,
                    Err(e) => Some((Err(e), state)),
                };
            }
            Ok(Some(envelope)) => {
                let message = serde_json::from_slice(&envelope.payload)
                    .map_err(|e| ApiError::Parse(e.to_string()));
                return Some((message, state));
            }
            Ok(None) => {}
        }

        match state.body.next().await {
            Some(Ok(chunk)) => state.decoder.push(&chunk),
            Some(Err(e)) => {
                tracing::debug!(error = %e, "stream body interrupted");
                state.finished = true;
                return Some((Err(ApiError::UnexpectedEof), state));
            }
            None => {
                state.finished = true;
                return Some((Err(ApiError::UnexpectedEof), state));
            }
        }
    }
}

/// Connect error code for a reply that carried no error body
fn code_for_status(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "internal",
        401 => "unauthenticated",
        403 => "permission_denied",
        404 => "unimplemented",
        429 | 502 | 503 | 504 => "unavailable",
        _ => "unknown",
    }
}
