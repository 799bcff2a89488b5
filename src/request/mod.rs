use std::io::Read;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::body::RequestBody;
use crate::context::Context;
use crate::cookies::PersistentCookieJar;
use crate::error::Error;
use crate::logger::Logger;
use crate::options::RequestSettings;
use crate::response::ResponseHead;
use crate::transport::Transport;
use crate::util::{append_query_pairs, lock_unpoisoned, resolve_url};

mod accessors;
mod configure;
mod execute;

/// A single lazily-executed HTTP request.
///
/// Configuration calls (`with_*`) take the request by value and hand it back,
/// so they chain. Terminal accessors ([`bytes`](Self::bytes),
/// [`text`](Self::text), [`json`](Self::json), [`status`](Self::status), ...)
/// take `&self`: the first one performs the round-trip, later ones (from any
/// thread) reuse its result. The first error the request hits is kept and
/// returned by every later call.
///
/// ```no_run
/// use std::time::Duration;
///
/// use chainreq::Request;
///
/// let text = Request::new("GET", "https://httpbin.org/get")
///     .with_query("a", "1")
///     .with_timeout(Duration::from_secs(10))
///     .text()?;
/// println!("{text}");
/// # Ok::<(), chainreq::Error>(())
/// ```
pub struct Request {
    method: Method,
    url: String,
    error: OnceLock<Error>,
    full_url: OnceLock<String>,
    exchange: Mutex<Exchange>,
    body: Mutex<BodyState>,
}

pub(crate) struct RequestConfig {
    pub(crate) base_url: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) query_pairs: Vec<(String, String)>,
    pub(crate) body: RequestBody,
    pub(crate) timeout: Option<Duration>,
    pub(crate) context: Context,
    pub(crate) verify_tls: bool,
    pub(crate) follow_redirects: bool,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cookie_jar: Option<Arc<PersistentCookieJar>>,
}

impl RequestConfig {
    fn from_settings(settings: RequestSettings) -> Self {
        Self {
            base_url: settings.base_url,
            headers: settings.headers,
            query_pairs: Vec::new(),
            body: RequestBody::Empty,
            timeout: settings.timeout,
            context: settings.context,
            verify_tls: settings.verify_tls,
            follow_redirects: settings.follow_redirects,
            logger: settings.logger,
            transport: settings.transport,
            cookie_jar: None,
        }
    }

    fn resolve_full_url(&self, target: &str) -> Result<url::Url, Error> {
        let mut url = resolve_url(self.base_url.as_deref(), target)?;
        append_query_pairs(&mut url, &self.query_pairs);
        Ok(url)
    }
}

struct Exchange {
    config: RequestConfig,
    sent: bool,
    head: Option<ResponseHead>,
}

struct PendingBody {
    reader: Box<dyn Read + Send>,
    context: Context,
    timeout: Option<Duration>,
    deadline_bound: bool,
    logger: Arc<dyn Logger>,
}

#[derive(Default)]
struct BodyState {
    pending: Option<PendingBody>,
    bytes: Option<Bytes>,
}

impl Request {
    /// Creates a request with library defaults.
    ///
    /// `method` accepts a [`Method`] or anything that parses into one; an
    /// invalid method string becomes the request's error.
    pub fn new<M>(method: M, url: impl Into<String>) -> Self
    where
        Method: TryFrom<M>,
        <Method as TryFrom<M>>::Error: Into<http::Error>,
    {
        Self::from_settings(method, url, RequestSettings::default())
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub(crate) fn from_settings<M>(
        method: M,
        url: impl Into<String>,
        settings: RequestSettings,
    ) -> Self
    where
        Method: TryFrom<M>,
        <Method as TryFrom<M>>::Error: Into<http::Error>,
    {
        let url = url.into();
        let error = OnceLock::new();
        let method = match Method::try_from(method) {
            Ok(method) => method,
            Err(source) => {
                let source: http::Error = source.into();
                let _ = error.set(Error::InvalidMethod {
                    method: source.to_string(),
                });
                Method::GET
            }
        };
        if url.trim().is_empty() {
            let _ = error.set(Error::InvalidUri { uri: url.clone() });
        }

        Self {
            method,
            url,
            error,
            full_url: OnceLock::new(),
            exchange: Mutex::new(Exchange {
                config: RequestConfig::from_settings(settings),
                sent: false,
                head: None,
            }),
            body: Mutex::new(BodyState::default()),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target exactly as given to the constructor.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The URL with configured query parameters merged in.
    ///
    /// Once the request has been sent this is the cached URL it went to;
    /// before that it is a preview of the current configuration. Falls back
    /// to the raw target when it cannot be resolved.
    pub fn full_url(&self) -> String {
        if let Some(full_url) = self.full_url.get() {
            return full_url.clone();
        }
        let exchange = lock_unpoisoned(&self.exchange);
        if let Some(full_url) = self.full_url.get() {
            return full_url.clone();
        }
        exchange
            .config
            .resolve_full_url(&self.url)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| self.url.clone())
    }

    pub fn timeout(&self) -> Option<Duration> {
        lock_unpoisoned(&self.exchange).config.timeout
    }

    pub fn context(&self) -> Context {
        lock_unpoisoned(&self.exchange).config.context.clone()
    }

    pub fn request_headers(&self) -> HeaderMap {
        lock_unpoisoned(&self.exchange).config.headers.clone()
    }

    /// The sticky error, if the request has failed.
    pub fn error(&self) -> Option<&Error> {
        self.error.get()
    }

    pub fn is_sent(&self) -> bool {
        lock_unpoisoned(&self.exchange).sent
    }

    /// Records `error` as the request's error unless one is already set.
    pub fn fail(self, error: Error) -> Self {
        let _ = self.error.set(error);
        self
    }

    /// Records `error` unless one is already set and returns whichever error
    /// ends up stored.
    fn record_error(&self, error: Error) -> Error {
        self.error.get_or_init(|| error).clone()
    }

    fn sticky_error(&self) -> Result<(), Error> {
        match self.error.get() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn display_url(&self) -> String {
        self.full_url
            .get()
            .cloned()
            .unwrap_or_else(|| self.url.clone())
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("full_url", &self.full_url.get())
            .field("error", &self.error.get())
            .finish_non_exhaustive()
    }
}
