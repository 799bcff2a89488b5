use std::io::{ErrorKind, Read};
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, WWW_AUTHENTICATE};
use http::{HeaderMap, Method, StatusCode};
use tracing::debug;

use crate::body::RequestBody;
use crate::context::Context;
use crate::cookies::PersistentCookieJar;
use crate::error::{Error, TimeoutPhase};
use crate::response::ResponseHead;
use crate::transport::{MAX_REDIRECTS, TransportError, TransportRequest, TransportResponse};
use crate::util::{
    MAX_LOG_BODY_LEN, is_http, lock_unpoisoned, parse_header_value, redact_uri_for_logs,
    truncate_body,
};

use super::{PendingBody, Request, RequestConfig};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Effective transport timeout and whether the context deadline set it.
fn effective_timeout(timeout: Option<Duration>, context: &Context) -> (Option<Duration>, bool) {
    match (timeout, context.remaining()) {
        (Some(timeout), Some(remaining)) if remaining < timeout => (Some(remaining), true),
        (Some(timeout), _) => (Some(timeout), false),
        (None, Some(remaining)) => (Some(remaining), true),
        (None, None) => (None, false),
    }
}

fn timeout_ms(timeout: Option<Duration>) -> u128 {
    timeout.map_or(0, |timeout| timeout.as_millis())
}

impl Request {
    /// Performs the round-trip unless it already happened.
    ///
    /// Holds the exchange lock for the whole call, so concurrent callers wait
    /// for the first one and then observe its outcome.
    pub(super) fn ensure_sent(&self) -> Result<(), Error> {
        self.sticky_error()?;

        let mut exchange = lock_unpoisoned(&self.exchange);
        if exchange.sent {
            debug!(
                method = %self.method,
                url = %redact_uri_for_logs(&self.display_url()),
                "request already sent"
            );
            return self.sticky_error();
        }
        exchange.sent = true;

        let outcome = self.send(&mut exchange.config);
        match outcome {
            Ok((head, pending)) => {
                exchange.head = Some(head);
                lock_unpoisoned(&self.body).pending = Some(pending);
                Ok(())
            }
            Err(error) => Err(self.record_error(error)),
        }
    }

    fn send(&self, config: &mut RequestConfig) -> Result<(ResponseHead, PendingBody), Error> {
        let outcome = config.resolve_full_url(&self.url).and_then(|url| {
            let full_url = self.full_url.get_or_init(|| url.to_string()).clone();
            self.round_trip(config, url, &full_url)
        });

        if let Some(jar) = &config.cookie_jar {
            save_cookie_jar(jar, config);
        }
        outcome
    }

    fn round_trip(
        &self,
        config: &mut RequestConfig,
        url: url::Url,
        full_url: &str,
    ) -> Result<(ResponseHead, PendingBody), Error> {
        let context = config.context.clone();
        self.check_context(&context, full_url)?;

        let started = Instant::now();
        let (timeout, deadline_bound) = effective_timeout(config.timeout, &context);
        // With a jar attached, redirects are followed here so that every hop
        // stores its cookies and sends the ones that apply to it.
        let follow_hops = config.follow_redirects && config.cookie_jar.is_some();

        let redacted = redact_uri_for_logs(full_url);
        config.logger.info(
            &context,
            format_args!("chainreq request {} {redacted}", self.method),
        );

        let mut hop = Hop {
            method: self.method.clone(),
            url,
            headers: config.headers.clone(),
            body: mem::take(&mut config.body),
        };
        let mut redirects = 0;
        let response = loop {
            let replay = if follow_hops {
                hop.body.try_clone()
            } else {
                None
            };
            let mut headers = hop.headers.clone();
            if let Some(cookie_header) = config
                .cookie_jar
                .as_ref()
                .and_then(|jar| jar.cookie_header(&hop.url))
            {
                headers.append(COOKIE, parse_header_value(COOKIE.as_str(), &cookie_header)?);
            }

            let remaining = timeout.map(|timeout| timeout.saturating_sub(started.elapsed()));
            let outcome = if remaining.is_some_and(|remaining| remaining.is_zero()) {
                Err(TransportError::Timeout)
            } else {
                config.transport.round_trip(TransportRequest {
                    method: hop.method.clone(),
                    url: hop.url.to_string(),
                    headers,
                    body: mem::take(&mut hop.body),
                    timeout: remaining,
                    verify_tls: config.verify_tls,
                    follow_redirects: config.follow_redirects && !follow_hops,
                })
            };
            let outcome = self
                .check_context(&context, full_url)
                .and_then(|()| {
                    outcome.map_err(|source| {
                        self.transport_error(source, timeout, deadline_bound, full_url)
                    })
                });
            let response = match outcome {
                Ok(response) => response,
                Err(error) => {
                    config.logger.error(
                        &context,
                        format_args!(
                            "chainreq request {} {redacted} failed: {error}",
                            self.method
                        ),
                    );
                    return Err(error);
                }
            };

            if let Some(jar) = &config.cookie_jar {
                jar.store_response_cookies(&hop.url, &response.headers);
            }
            if !follow_hops || redirects == MAX_REDIRECTS {
                break response;
            }
            let Some(next) = hop.redirect(&response, replay) else {
                break response;
            };
            debug!(
                method = %next.method,
                status = response.status.as_u16(),
                url = %redact_uri_for_logs(next.url.as_str()),
                "following redirect"
            );
            redirects += 1;
            hop = next;
        };

        let head = ResponseHead::new(response.status, response.headers, full_url.to_owned());
        let pending = PendingBody {
            reader: response.body,
            context,
            timeout,
            deadline_bound,
            logger: Arc::clone(&config.logger),
        };
        Ok((head, pending))
    }

    fn check_context(&self, context: &Context, full_url: &str) -> Result<(), Error> {
        if context.is_cancelled() {
            return Err(Error::Cancelled {
                method: self.method.clone(),
                uri: full_url.to_owned(),
            });
        }
        if context.is_expired() {
            return Err(Error::DeadlineExceeded {
                method: self.method.clone(),
                uri: full_url.to_owned(),
            });
        }
        Ok(())
    }

    fn transport_error(
        &self,
        source: TransportError,
        timeout: Option<Duration>,
        deadline_bound: bool,
        full_url: &str,
    ) -> Error {
        match source {
            TransportError::Build(source) => Error::RequestBuild {
                method: self.method.clone(),
                uri: full_url.to_owned(),
                source: Arc::new(source),
            },
            TransportError::Timeout if deadline_bound => Error::DeadlineExceeded {
                method: self.method.clone(),
                uri: full_url.to_owned(),
            },
            TransportError::Timeout => Error::Timeout {
                phase: TimeoutPhase::Transport,
                timeout_ms: timeout_ms(timeout),
                method: self.method.clone(),
                uri: full_url.to_owned(),
            },
            TransportError::Failed { kind, source } => Error::Transport {
                kind,
                method: self.method.clone(),
                uri: full_url.to_owned(),
                source: Arc::from(source),
            },
        }
    }

    /// Buffers the response body unless it already has been.
    pub(super) fn ensure_body_read(&self) -> Result<Bytes, Error> {
        self.ensure_sent()?;

        let mut body = lock_unpoisoned(&self.body);
        if let Some(bytes) = &body.bytes {
            return Ok(bytes.clone());
        }
        self.sticky_error()?;

        let Some(pending) = body.pending.take() else {
            return self.sticky_error().map(|()| Bytes::new());
        };
        match self.read_body(pending) {
            Ok(bytes) => {
                body.bytes = Some(bytes.clone());
                Ok(bytes)
            }
            Err(error) => Err(self.record_error(error)),
        }
    }

    fn read_body(&self, pending: PendingBody) -> Result<Bytes, Error> {
        let PendingBody {
            mut reader,
            context,
            timeout,
            deadline_bound,
            logger,
        } = pending;
        let uri = self.display_url();

        let mut buffer = Vec::new();
        let mut chunk = vec![0_u8; READ_CHUNK_SIZE];
        let outcome = loop {
            if context.is_cancelled() {
                break Err(Error::Cancelled {
                    method: self.method.clone(),
                    uri: uri.clone(),
                });
            }
            if context.is_expired() {
                break Err(Error::DeadlineExceeded {
                    method: self.method.clone(),
                    uri: uri.clone(),
                });
            }
            match reader.read(&mut chunk) {
                Ok(0) => break Ok(Bytes::from(buffer)),
                Ok(read) => buffer.extend_from_slice(&chunk[..read]),
                Err(source) if source.kind() == ErrorKind::Interrupted => {}
                Err(source) if source.kind() == ErrorKind::TimedOut => {
                    break Err(if deadline_bound {
                        Error::DeadlineExceeded {
                            method: self.method.clone(),
                            uri: uri.clone(),
                        }
                    } else {
                        Error::Timeout {
                            phase: TimeoutPhase::ResponseBody,
                            timeout_ms: timeout_ms(timeout),
                            method: self.method.clone(),
                            uri: uri.clone(),
                        }
                    });
                }
                Err(source) => {
                    break Err(Error::ReadBody {
                        method: self.method.clone(),
                        uri: uri.clone(),
                        source: Arc::new(source),
                    });
                }
            }
        };

        let redacted = redact_uri_for_logs(&uri);
        match &outcome {
            Ok(bytes) => logger.info(
                &context,
                format_args!(
                    "chainreq response {} {redacted} read {} bytes: {}",
                    self.method,
                    bytes.len(),
                    truncate_body(bytes, MAX_LOG_BODY_LEN)
                ),
            ),
            Err(error) => logger.error(
                &context,
                format_args!("chainreq response {} {redacted} failed: {error}", self.method),
            ),
        }
        outcome
    }
}

/// One leg of a redirect chain.
struct Hop {
    method: Method,
    url: url::Url,
    headers: HeaderMap,
    body: RequestBody,
}

impl Hop {
    /// The request to send after a redirect `response`, or `None` when the
    /// response should be returned as it is. `replay` is a copy of the body
    /// this hop sent, if it could be made.
    fn redirect(&self, response: &TransportResponse, replay: Option<RequestBody>) -> Option<Self> {
        let location = response.headers.get(LOCATION)?.to_str().ok()?;
        let url = self.url.join(location).ok()?;
        if !is_http(&url) {
            return None;
        }

        let (method, body) = match response.status {
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER => {
                let method = match (response.status, &self.method) {
                    (_, &Method::GET | &Method::HEAD) => self.method.clone(),
                    (StatusCode::SEE_OTHER, _) => Method::GET,
                    (_, &Method::POST) => Method::GET,
                    _ => self.method.clone(),
                };
                (method, RequestBody::Empty)
            }
            StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT => {
                (self.method.clone(), replay?)
            }
            _ => return None,
        };

        let mut headers = self.headers.clone();
        if matches!(body, RequestBody::Empty) {
            headers.remove(CONTENT_TYPE);
        }
        if url.host_str() != self.url.host_str() {
            for name in [AUTHORIZATION, COOKIE, WWW_AUTHENTICATE] {
                headers.remove(name);
            }
        }
        Some(Self {
            method,
            url,
            headers,
            body,
        })
    }
}

fn save_cookie_jar(jar: &PersistentCookieJar, config: &RequestConfig) {
    if let Err(error) = jar.save() {
        config.logger.error(
            &config.context,
            format_args!("chainreq failed to save cookies: {error}"),
        );
    }
}
