use std::io::Read;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use http::{HeaderMap, Method, StatusCode};

use crate::body::RequestBody;
use crate::error::TransportErrorKind;

pub(crate) const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
pub(crate) const MAX_REDIRECTS: u32 = 10;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything a transport needs to perform one round-trip.
#[derive(Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
    pub verify_tls: bool,
    pub follow_redirects: bool,
}

pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Box<dyn Read + Send>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            headers,
            body: Box::new(body),
        }
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum TransportError {
    Build(http::Error),
    Timeout,
    Failed {
        kind: TransportErrorKind,
        source: BoxError,
    },
}

/// Performs a single HTTP round-trip. TLS and connection reuse are the
/// implementation's business; cookies are handled by the caller. Redirects are
/// followed only when `follow_redirects` is set: requests with a cookie jar
/// follow them hop by hop themselves and pass `false`.
///
/// Response body reads that hit the timeout must fail with
/// [`std::io::ErrorKind::TimedOut`].
pub trait Transport: Send + Sync {
    fn round_trip(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

static DEFAULT_TRANSPORT: LazyLock<Arc<dyn Transport>> =
    LazyLock::new(|| Arc::new(UreqTransport::new(DEFAULT_USER_AGENT)));

/// The process-wide `ureq` transport shared by requests that do not pick one.
pub fn default_transport() -> Arc<dyn Transport> {
    Arc::clone(&DEFAULT_TRANSPORT)
}

#[cfg(feature = "tls-rustls")]
const TLS_PROVIDER: ureq::tls::TlsProvider = ureq::tls::TlsProvider::Rustls;
#[cfg(not(feature = "tls-rustls"))]
const TLS_PROVIDER: ureq::tls::TlsProvider = ureq::tls::TlsProvider::NativeTls;

fn make_agent(user_agent: &str, verify_tls: bool) -> ureq::Agent {
    let tls_config = ureq::tls::TlsConfig::builder()
        .provider(TLS_PROVIDER)
        .disable_verification(!verify_tls)
        .build();
    let config = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects_will_error(false)
        .user_agent(user_agent)
        .tls_config(tls_config)
        .build();
    config.new_agent()
}

/// [`Transport`] backed by a pair of `ureq` agents, one verifying
/// certificates and one not.
#[derive(Clone)]
pub struct UreqTransport {
    verified: ureq::Agent,
    insecure: ureq::Agent,
}

impl UreqTransport {
    pub fn new(user_agent: &str) -> Self {
        Self {
            verified: make_agent(user_agent, true),
            insecure: make_agent(user_agent, false),
        }
    }

    fn agent(&self, verify_tls: bool) -> &ureq::Agent {
        if verify_tls {
            &self.verified
        } else {
            &self.insecure
        }
    }

    fn run_configured_request<S: ureq::AsSendBody>(
        agent: &ureq::Agent,
        request: ureq::http::Request<S>,
        timeout: Option<Duration>,
        follow_redirects: bool,
    ) -> Result<TransportResponse, TransportError> {
        let max_redirects = if follow_redirects { MAX_REDIRECTS } else { 0 };
        let configured_request = agent
            .configure_request(request)
            .timeout_global(timeout)
            .max_redirects(max_redirects)
            .build();

        let response = agent.run(configured_request).map_err(|source| match source {
            ureq::Error::Timeout(_) => TransportError::Timeout,
            other => TransportError::Failed {
                kind: classify_ureq_transport_error(&other),
                source: Box::new(other),
            },
        })?;
        let (parts, body) = response.into_parts();
        Ok(TransportResponse::new(
            parts.status,
            parts.headers,
            UreqBodyReader {
                reader: body.into_reader(),
            },
        ))
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn round_trip(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
            timeout,
            verify_tls,
            follow_redirects,
        } = request;

        let mut builder = ureq::http::Request::builder().method(method).uri(url);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }

        let agent = self.agent(verify_tls);
        match body {
            RequestBody::Empty => {
                let request = builder
                    .body(Vec::new())
                    .map_err(TransportError::Build)?;
                Self::run_configured_request(agent, request, timeout, follow_redirects)
            }
            RequestBody::Buffered(bytes) => {
                let request = builder
                    .body(bytes.to_vec())
                    .map_err(TransportError::Build)?;
                Self::run_configured_request(agent, request, timeout, follow_redirects)
            }
            RequestBody::Reader(reader) => {
                let request = builder
                    .body(ureq::SendBody::from_owned_reader(reader))
                    .map_err(TransportError::Build)?;
                Self::run_configured_request(agent, request, timeout, follow_redirects)
            }
        }
    }
}

struct UreqBodyReader {
    reader: ureq::BodyReader<'static>,
}

impl Read for UreqBodyReader {
    fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buffer).map_err(|source| {
            if matches!(wrapped_ureq_error(&source), Some(ureq::Error::Timeout(_))) {
                std::io::Error::new(std::io::ErrorKind::TimedOut, source)
            } else {
                source
            }
        })
    }
}

fn wrapped_ureq_error(io_error: &std::io::Error) -> Option<&ureq::Error> {
    io_error
        .get_ref()
        .and_then(|source| source.downcast_ref::<ureq::Error>())
}

pub(crate) fn classify_ureq_transport_error(error: &ureq::Error) -> TransportErrorKind {
    match error {
        ureq::Error::HostNotFound => TransportErrorKind::Dns,
        ureq::Error::Tls(_) => TransportErrorKind::Tls,
        #[cfg(feature = "tls-rustls")]
        ureq::Error::Rustls(_) => TransportErrorKind::Tls,
        #[cfg(feature = "tls-native")]
        ureq::Error::NativeTls(_) => TransportErrorKind::Tls,
        ureq::Error::ConnectProxyFailed(_) | ureq::Error::ConnectionFailed => {
            TransportErrorKind::Connect
        }
        ureq::Error::Io(source) => match source.kind() {
            std::io::ErrorKind::NotFound => TransportErrorKind::Dns,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::AddrNotAvailable => TransportErrorKind::Connect,
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof => TransportErrorKind::Read,
            _ => TransportErrorKind::Other,
        },
        _ => TransportErrorKind::Other,
    }
}
