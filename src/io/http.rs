use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, LOCATION, RANGE};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response, StatusCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::{Origin, Url};

use super::{ChunkStream, RangeResponse, RangeSource, check_bounds, clip_stream};
use crate::error::{Error, Result, TransportError};
use crate::zip::ByteRange;

/// HTTP Basic authentication credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Knobs for [`HttpRangeSource`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after a timeout or connection failure, per request. Zero
    /// means a single attempt.
    pub max_retries: u32,
    /// Redirects followed per request before giving up.
    pub max_redirects: u32,
    pub credentials: Option<Credentials>,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 10,
            max_redirects: 5,
            credentials: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// One step of the request loop: where to send the request next and how
/// much redirect and retry budget is left.
///
/// Values are never mutated; each redirect or retry produces a new attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    location: Url,
    /// Origin the credentials were given for.
    origin: Origin,
    redirects_left: u32,
    retries: u32,
    max_retries: u32,
}

impl FetchAttempt {
    /// First attempt at `location`, which is also the trusted origin.
    pub fn new(location: Url, options: &HttpOptions) -> Self {
        Self {
            origin: location.origin(),
            location,
            redirects_left: options.max_redirects,
            retries: 0,
            max_retries: options.max_retries,
        }
    }

    /// Same attempt, trusting `origin` instead of the location's own.
    pub fn with_origin(self, origin: Origin) -> Self {
        Self { origin, ..self }
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Whether credentials may go to the current location: only while it
    /// has the trusted scheme, host and port.
    pub fn sends_credentials(&self) -> bool {
        self.location.origin() == self.origin
    }

    /// Number of retries spent so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Follow a `Location` header, which may be relative to the current URL.
    pub fn redirected(&self, target: &str) -> Result<Self> {
        let location = self
            .location
            .join(target)
            .map_err(|_| TransportError::BadRedirect)?;
        if self.redirects_left == 0 {
            return Err(TransportError::TooManyRedirects(location.to_string()).into());
        }
        Ok(Self {
            location,
            redirects_left: self.redirects_left - 1,
            ..self.clone()
        })
    }

    /// The next attempt at the same location, or `None` once the retry
    /// budget is spent.
    pub fn retried(&self) -> Option<Self> {
        if self.retries >= self.max_retries {
            return None;
        }
        Some(Self {
            retries: self.retries + 1,
            ..self.clone()
        })
    }
}

/// Where the resource ended up after redirects, and its size.
#[derive(Debug)]
struct Probe {
    location: Url,
    length: u64,
}

/// HTTP Range source for remote ZIP files
pub struct HttpRangeSource {
    client: Client,
    url: Url,
    options: HttpOptions,
    probe: OnceCell<Probe>,
    transferred_bytes: Arc<AtomicU64>,
}

impl HttpRangeSource {
    /// Create a new HTTP Range source.
    ///
    /// No request is sent until the length or a range is first needed.
    pub fn new(url: &str, options: HttpOptions) -> Result<Self> {
        let url = Url::parse(url).map_err(TransportError::from)?;
        let client = Client::builder()
            .timeout(options.timeout)
            .redirect(Policy::none())
            .user_agent(options.user_agent.as_str())
            .build()
            .map_err(TransportError::from)?;

        Ok(Self {
            client,
            url,
            options,
            probe: OnceCell::new(),
            transferred_bytes: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get total body bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Send HEAD once to learn the final location, verify Range support and
    /// get the file size.
    async fn probe(&self) -> Result<&Probe> {
        self.probe
            .get_or_try_init(|| async {
                let (resp, location) = self.send(Method::HEAD, &self.url, None).await?;

                if !resp.status().is_success() {
                    return Err(status_error(&resp, &location));
                }

                // Check if server supports Range requests
                let accept_ranges = resp
                    .headers()
                    .get(ACCEPT_RANGES)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none");

                if !accept_ranges.contains("bytes") {
                    return Err(TransportError::RangeUnsupported.into());
                }

                // HEAD carries no body, so read Content-Length from the header itself
                let length = resp
                    .headers()
                    .get(CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
                    .ok_or(TransportError::MissingContentLength)?;

                debug!(%location, length, "probed remote archive");
                Ok::<_, Error>(Probe { location, length })
            })
            .await
    }

    /// Send one request, following redirects and retrying transient
    /// connection failures. Returns the response and the URL that produced it.
    async fn send(
        &self,
        method: Method,
        url: &Url,
        range: Option<ByteRange>,
    ) -> Result<(Response, Url)> {
        let mut attempt =
            FetchAttempt::new(url.clone(), &self.options).with_origin(self.url.origin());

        loop {
            let mut request = self
                .client
                .request(method.clone(), attempt.location().clone());
            if let Some(range) = range {
                request = request.header(RANGE, range.to_header());
            }
            if let Some(credentials) = &self.options.credentials {
                if attempt.sends_credentials() {
                    request =
                        request.basic_auth(&credentials.username, credentials.password.as_ref());
                } else {
                    debug!(location = %attempt.location(), "dropping credentials for foreign origin");
                }
            }

            match request.send().await {
                Ok(resp) if is_redirect(resp.status()) => {
                    let target = resp
                        .headers()
                        .get(LOCATION)
                        .and_then(|v| v.to_str().ok())
                        .ok_or(TransportError::BadRedirect)?;
                    attempt = attempt.redirected(target)?;
                    debug!(status = %resp.status(), location = %attempt.location(), "following redirect");
                }
                Ok(resp) => return Ok((resp, attempt.location().clone())),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    attempt = attempt
                        .retried()
                        .ok_or_else(|| TransportError::RetriesExhausted(e.to_string()))?;
                    warn!(
                        "Connection error, retry {}/{}: {}",
                        attempt.retries(),
                        self.options.max_retries,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * attempt.retries() as u64))
                        .await;
                }
                Err(e) => return Err(TransportError::from(e).into()),
            }
        }
    }
}

#[async_trait]
impl RangeSource for HttpRangeSource {
    async fn length(&self) -> Result<u64> {
        Ok(self.probe().await?.length)
    }

    async fn fetch(&self, range: ByteRange) -> Result<RangeResponse> {
        let probe = self.probe().await?;
        check_bounds(range, probe.length)?;
        if range.is_empty() {
            return Ok(RangeResponse::partial(Default::default()));
        }

        let expected = range.len() as usize;
        let mut body = BytesMut::with_capacity(expected);
        let mut status = StatusCode::PARTIAL_CONTENT;
        let mut headers = Default::default();

        // Some servers cut long ranges short; ask again for whatever is missing.
        while body.len() < expected {
            let current = ByteRange::new(range.start + body.len() as u64, range.end);
            debug!(url = %probe.location, range = %current.to_header(), "fetching");

            let (resp, location) = self.send(Method::GET, &probe.location, Some(current)).await?;
            status = resp.status();
            if status != StatusCode::PARTIAL_CONTENT && status != StatusCode::OK {
                return Err(status_error(&resp, &location));
            }
            headers = resp.headers().clone();

            let bytes = resp.bytes().await.map_err(TransportError::from)?;
            self.transferred_bytes
                .fetch_add(bytes.len() as u64, Ordering::Relaxed);

            if status == StatusCode::OK {
                // Range ignored: the whole resource came back.
                return Ok(RangeResponse {
                    status: status.as_u16(),
                    headers,
                    body: bytes,
                });
            }
            if bytes.is_empty() {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("empty body for {}", current.to_header()),
                ))
                .into());
            }

            let take = bytes.len().min(expected - body.len());
            body.extend_from_slice(&bytes[..take]);
        }

        Ok(RangeResponse {
            status: status.as_u16(),
            headers,
            body: body.freeze(),
        })
    }

    async fn fetch_stream(&self, range: ByteRange) -> Result<ChunkStream> {
        let probe = self.probe().await?;
        check_bounds(range, probe.length)?;
        debug!(url = %probe.location, range = %range.to_header(), "streaming");

        let (resp, location) = self.send(Method::GET, &probe.location, Some(range)).await?;
        let status = resp.status();
        if status != StatusCode::PARTIAL_CONTENT && status != StatusCode::OK {
            return Err(status_error(&resp, &location));
        }

        let counter = self.transferred_bytes.clone();
        let chunks: ChunkStream = resp
            .bytes_stream()
            .map(move |chunk| -> Result<Bytes> {
                let chunk = chunk.map_err(|e| Error::from(TransportError::from(e)))?;
                counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                Ok(chunk)
            })
            .boxed();

        if status == StatusCode::OK {
            Ok(clip_stream(chunks, range))
        } else {
            Ok(chunks)
        }
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn status_error(resp: &Response, location: &Url) -> Error {
    TransportError::Status {
        status: resp.status().as_u16(),
        url: location.to_string(),
    }
    .into()
}
