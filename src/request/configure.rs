use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::body::{MultipartWriter, RequestBody};
use crate::context::Context;
use crate::cookies::PersistentCookieJar;
use crate::error::Error;
use crate::logger::Logger;
use crate::query::{QueryFields, query_pairs};
use crate::transport::Transport;
use crate::util::{get_mut_unpoisoned, parse_header_name, parse_header_value, timeout_setting};

use super::{Request, RequestConfig};

impl Request {
    /// Applies `mutate` unless the request has already failed or been sent.
    ///
    /// Changing a sent request records [`Error::AlreadySent`]; an error from
    /// `mutate` becomes the request's error.
    fn configure<F>(mut self, mutate: F) -> Self
    where
        F: FnOnce(&mut RequestConfig) -> Result<(), Error>,
    {
        if self.error.get().is_some() {
            return self;
        }

        let exchange = get_mut_unpoisoned(&mut self.exchange);
        let outcome = if exchange.sent {
            Err(Error::AlreadySent {
                method: self.method.clone(),
                uri: self
                    .full_url
                    .get()
                    .cloned()
                    .unwrap_or_else(|| self.url.clone()),
            })
        } else {
            mutate(&mut exchange.config)
        };

        if let Err(error) = outcome {
            let _ = self.error.set(error);
        }
        self
    }

    /// Appends a header; earlier values for the same name are kept.
    pub fn with_header(self, name: &str, value: &str) -> Self {
        let (name, value) = (name.to_owned(), value.to_owned());
        self.configure(move |config| {
            let header_name = parse_header_name(&name)?;
            let header_value = parse_header_value(&name, &value)?;
            config.headers.append(header_name, header_value);
            Ok(())
        })
    }

    pub fn with_headers<K, V, I>(self, headers: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.configure(move |config| {
            for (name, value) in headers {
                let (name, value) = (name.as_ref(), value.as_ref());
                let header_name = parse_header_name(name)?;
                let header_value = parse_header_value(name, value)?;
                config.headers.append(header_name, header_value);
            }
            Ok(())
        })
    }

    /// Replaces the `User-Agent` header.
    pub fn with_user_agent(self, user_agent: &str) -> Self {
        let user_agent = user_agent.to_owned();
        self.configure(move |config| {
            let value = parse_header_value(USER_AGENT.as_str(), &user_agent)?;
            config.headers.insert(USER_AGENT, value);
            Ok(())
        })
    }

    /// Adds one query pair. Pairs already in the target URL stay in front.
    pub fn with_query(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let pair = (name.into(), value.into());
        self.configure(move |config| {
            config.query_pairs.push(pair);
            Ok(())
        })
    }

    pub fn with_queries<K, V, I>(self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.configure(move |config| {
            config.query_pairs.extend(
                pairs
                    .into_iter()
                    .map(|(name, value)| (name.into(), value.into())),
            );
            Ok(())
        })
    }

    /// Adds the query pairs described by `T`'s [`QueryFields`] schema.
    pub fn with_query_struct<T: QueryFields>(self, value: &T) -> Self {
        let pairs = query_pairs(value);
        self.configure(move |config| {
            config.query_pairs.extend(pairs?);
            Ok(())
        })
    }

    /// Adds query pairs produced by `serde_urlencoded`.
    pub fn with_query_serialize<T>(self, params: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_urlencoded::to_string(params);
        self.configure(move |config| {
            let encoded = encoded.map_err(|source| Error::SerializeQuery {
                source: Arc::new(source),
            })?;
            config.query_pairs.extend(
                url::form_urlencoded::parse(encoded.as_bytes())
                    .map(|(name, value)| (name.into_owned(), value.into_owned())),
            );
            Ok(())
        })
    }

    /// Sets a raw body from bytes or a string.
    pub fn with_body(self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.configure(move |config| {
            config.body = RequestBody::Buffered(body);
            Ok(())
        })
    }

    /// Copies a borrowed slice into the body.
    pub fn with_body_slice(self, body: &[u8]) -> Self {
        self.with_body(Bytes::copy_from_slice(body))
    }

    /// Streams the body from `reader` when the request is sent.
    pub fn with_body_reader<R>(self, reader: R) -> Self
    where
        R: Read + Send + Sync + 'static,
    {
        self.configure(move |config| {
            config.body = RequestBody::Reader(Box::new(reader));
            Ok(())
        })
    }

    /// Sets the JSON encoding of `payload` as the body without touching
    /// `Content-Type`.
    pub fn with_body_json<T>(self, payload: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_vec(payload);
        self.configure(move |config| {
            let body = encoded.map_err(|source| Error::SerializeJson {
                source: Arc::new(source),
            })?;
            config.body = RequestBody::Buffered(Bytes::from(body));
            Ok(())
        })
    }

    /// JSON body plus `Content-Type: application/json`.
    pub fn with_json<T>(self, payload: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        self.with_body_json(payload).configure(|config| {
            config
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Ok(())
        })
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn with_form_urlencoded<T>(self, payload: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_urlencoded::to_string(payload);
        self.configure(move |config| {
            let encoded = encoded.map_err(|source| Error::SerializeForm {
                source: Arc::new(source),
            })?;
            config.body = RequestBody::Buffered(Bytes::from(encoded));
            config.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
            Ok(())
        })
    }

    /// `multipart/form-data` body made of plain fields.
    pub fn with_form<K, V, I>(self, fields: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.configure(move |config| {
            let mut writer = MultipartWriter::new();
            for (name, value) in fields {
                writer
                    .write_field(name.as_ref(), value.as_ref())
                    .map_err(multipart_error)?;
            }
            set_multipart(config, writer)
        })
    }

    /// `multipart/form-data` body with one file part under `file_key` followed
    /// by `params` as plain fields.
    ///
    /// The file is read into memory right away.
    pub fn with_file<R>(
        self,
        filename: &str,
        mut file: R,
        file_key: &str,
        params: &HashMap<String, String>,
    ) -> Self
    where
        R: Read,
    {
        let mut writer = MultipartWriter::new();
        let written = writer
            .write_file(file_key, filename, &mut file)
            .and_then(|()| {
                params
                    .iter()
                    .try_for_each(|(name, value)| writer.write_field(name, value))
            })
            .map_err(multipart_error);
        self.configure(move |config| {
            written?;
            set_multipart(config, writer)
        })
    }

    /// Per-request timeout covering the round-trip and the body read.
    /// `Duration::ZERO` removes the timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.configure(move |config| {
            config.timeout = timeout_setting(timeout);
            Ok(())
        })
    }

    pub fn with_context(self, context: Context) -> Self {
        self.configure(move |config| {
            config.context = context;
            Ok(())
        })
    }

    /// Skips TLS certificate verification when `ignore` is true.
    pub fn with_ignore_ssl(self, ignore: bool) -> Self {
        self.configure(move |config| {
            config.verify_tls = !ignore;
            Ok(())
        })
    }

    /// Enables or disables following redirects.
    pub fn with_redirect(self, follow: bool) -> Self {
        self.configure(move |config| {
            config.follow_redirects = follow;
            Ok(())
        })
    }

    /// Adds a `Cookie` header carrying the attached jar's cookies for `url`.
    ///
    /// Does nothing when no jar is attached or no cookie matches.
    pub fn with_url_cookie(self, url: &str) -> Self {
        let url = url.to_owned();
        self.configure(move |config| {
            let Some(jar) = config.cookie_jar.as_ref() else {
                return Ok(());
            };
            let parsed = url::Url::parse(&url).map_err(|_| Error::InvalidUri { uri: url.clone() })?;
            if let Some(cookie_header) = jar.cookie_header(&parsed) {
                let value = parse_header_value(COOKIE.as_str(), &cookie_header)?;
                config.headers.append(COOKIE, value);
            }
            Ok(())
        })
    }

    pub fn with_logger(self, logger: Arc<dyn Logger>) -> Self {
        self.configure(move |config| {
            config.logger = logger;
            Ok(())
        })
    }

    pub fn with_transport(self, transport: Arc<dyn Transport>) -> Self {
        self.configure(move |config| {
            config.transport = transport;
            Ok(())
        })
    }

    /// Attaches a cookie jar: its cookies go out with the request and the
    /// response's cookies are stored and saved back.
    pub fn with_cookie_jar(self, jar: Arc<PersistentCookieJar>) -> Self {
        self.configure(move |config| {
            config.cookie_jar = Some(jar);
            Ok(())
        })
    }
}

fn multipart_error(source: std::io::Error) -> Error {
    Error::EncodeMultipart {
        source: Arc::new(source),
    }
}

fn set_multipart(config: &mut RequestConfig, writer: MultipartWriter) -> Result<(), Error> {
    let (content_type, body) = writer.finish().map_err(multipart_error)?;
    let value = parse_header_value(CONTENT_TYPE.as_str(), &content_type)?;
    config.headers.insert(CONTENT_TYPE, value);
    config.body = RequestBody::Buffered(body);
    Ok(())
}
