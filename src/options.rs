use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use http::header::USER_AGENT;

use crate::context::Context;
use crate::error::Error;
use crate::logger::{Logger, tracing_logger};
use crate::transport::{Transport, default_transport};
use crate::util::{parse_header_name, parse_header_value, timeout_setting};

/// Defaults a [`Request`](crate::Request) starts from.
#[derive(Clone)]
pub struct RequestSettings {
    pub(crate) base_url: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) timeout: Option<Duration>,
    pub(crate) context: Context,
    pub(crate) verify_tls: bool,
    pub(crate) follow_redirects: bool,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) transport: Arc<dyn Transport>,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: HeaderMap::new(),
            timeout: None,
            context: Context::background(),
            verify_tls: true,
            follow_redirects: true,
            logger: tracing_logger(),
            transport: default_transport(),
        }
    }
}

impl std::fmt::Debug for RequestSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RequestSettings")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("verify_tls", &self.verify_tls)
            .field("follow_redirects", &self.follow_redirects)
            .finish_non_exhaustive()
    }
}

impl RequestSettings {
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// Applies `options` in order and stops at the first failure.
    pub fn apply(mut self, options: &[RequestOption]) -> Result<Self, Error> {
        for option in options {
            self = option.apply(self)?;
        }
        Ok(self)
    }
}

type OptionFn = dyn Fn(RequestSettings) -> Result<RequestSettings, Error> + Send + Sync;

/// A reusable transformation of [`RequestSettings`].
///
/// Options are shared by every request a [`Factory`](crate::Factory) or
/// [`Session`](crate::Session) creates, so they must not depend on call order
/// beyond the order they were listed in.
#[derive(Clone)]
pub struct RequestOption {
    apply: Arc<OptionFn>,
}

impl std::fmt::Debug for RequestOption {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("RequestOption").finish_non_exhaustive()
    }
}

impl RequestOption {
    pub fn from_fn<F>(apply: F) -> Self
    where
        F: Fn(RequestSettings) -> Result<RequestSettings, Error> + Send + Sync + 'static,
    {
        Self {
            apply: Arc::new(apply),
        }
    }

    pub fn apply(&self, settings: RequestSettings) -> Result<RequestSettings, Error> {
        (self.apply)(settings)
    }

    /// `Duration::ZERO` means no timeout.
    pub fn timeout(timeout: Duration) -> Self {
        Self::from_fn(move |mut settings| {
            settings.timeout = timeout_setting(timeout);
            Ok(settings)
        })
    }

    pub fn context(context: Context) -> Self {
        Self::from_fn(move |mut settings| {
            settings.context = context.clone();
            Ok(settings)
        })
    }

    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        Self::from_fn(move |mut settings| {
            let header_name = parse_header_name(&name)?;
            let header_value = parse_header_value(&name, &value)?;
            settings.headers.append(header_name, header_value);
            Ok(settings)
        })
    }

    pub fn headers<K, V, I>(headers: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect::<Vec<(String, String)>>();
        Self::from_fn(move |mut settings| {
            for (name, value) in &headers {
                let header_name = parse_header_name(name)?;
                let header_value = parse_header_value(name, value)?;
                settings.headers.append(header_name, header_value);
            }
            Ok(settings)
        })
    }

    pub fn user_agent(user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        Self::from_fn(move |mut settings| {
            let value = parse_header_value(USER_AGENT.as_str(), &user_agent)?;
            settings.headers.insert(USER_AGENT, value);
            Ok(settings)
        })
    }

    /// Relative request targets are joined onto `base_url`.
    pub fn base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self::from_fn(move |mut settings| {
            let parsed = url::Url::parse(&base_url).map_err(|_| Error::InvalidUri {
                uri: base_url.clone(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(Error::InvalidUri {
                    uri: base_url.clone(),
                });
            }
            settings.base_url = Some(base_url.clone());
            Ok(settings)
        })
    }

    pub fn logger(logger: Arc<dyn Logger>) -> Self {
        Self::from_fn(move |mut settings| {
            settings.logger = Arc::clone(&logger);
            Ok(settings)
        })
    }

    pub fn transport(transport: Arc<dyn Transport>) -> Self {
        Self::from_fn(move |mut settings| {
            settings.transport = Arc::clone(&transport);
            Ok(settings)
        })
    }

    pub fn ignore_ssl(ignore: bool) -> Self {
        Self::from_fn(move |mut settings| {
            settings.verify_tls = !ignore;
            Ok(settings)
        })
    }

    pub fn redirect(follow: bool) -> Self {
        Self::from_fn(move |mut settings| {
            settings.follow_redirects = follow;
            Ok(settings)
        })
    }
}
