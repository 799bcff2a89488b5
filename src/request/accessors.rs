use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::response::{Response, ResponseHead};
use crate::util::{MAX_ERROR_BODY_LEN, lock_unpoisoned, truncate_body};

use super::Request;

impl Request {
    /// Status line and headers, sending the request if needed. The body is
    /// left unread.
    pub fn response_head(&self) -> Result<ResponseHead, Error> {
        self.ensure_sent()?;
        let exchange = lock_unpoisoned(&self.exchange);
        match &exchange.head {
            Some(head) => Ok(head.clone()),
            None => Err(self.sticky_error().err().unwrap_or_else(|| Error::InvalidUri {
                uri: self.url.clone(),
            })),
        }
    }

    /// Head and buffered body together.
    pub fn response(&self) -> Result<Response, Error> {
        let body = self.ensure_body_read()?;
        Ok(Response::new(self.response_head()?, body))
    }

    pub fn bytes(&self) -> Result<Bytes, Error> {
        self.ensure_body_read()
    }

    /// Body as text; invalid UTF-8 is replaced.
    pub fn text(&self) -> Result<String, Error> {
        let body = self.ensure_body_read()?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Decodes the JSON body into `T`.
    ///
    /// A decode failure reports the request, the target type and a prefix of
    /// the body. It is returned to the caller but does not poison the
    /// request: the body stays available to other accessors.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = self.ensure_body_read()?;
        serde_json::from_slice(&body).map_err(|source| Error::Deserialize {
            method: self.method.clone(),
            uri: self.display_url(),
            target: std::any::type_name::<T>(),
            body: truncate_body(&body, MAX_ERROR_BODY_LEN),
            source: source.into(),
        })
    }

    /// Decodes the body as a JSON object.
    pub fn map(&self) -> Result<Map<String, Value>, Error> {
        self.json()
    }

    pub fn status(&self) -> Result<StatusCode, Error> {
        Ok(self.response_head()?.status())
    }

    pub fn response_headers(&self) -> Result<HeaderMap, Error> {
        Ok(self.response_head()?.headers().clone())
    }

    /// First value of the response header `name`.
    pub fn response_header(&self, name: &str) -> Result<Option<String>, Error> {
        Ok(self.response_head()?.header(name))
    }

    pub fn response_header_values(&self, name: &str) -> Result<Vec<String>, Error> {
        Ok(self.response_head()?.header_values(name))
    }

    /// Values of the response's `Set-Cookie` entries named `name`.
    pub fn response_cookies(&self, name: &str) -> Result<Vec<String>, Error> {
        Ok(self.response_head()?.cookies(name))
    }

    // The `must_*` accessors drop the error and return an empty value in its
    // place. The error stays readable through `error()`.

    pub fn must_bytes(&self) -> Bytes {
        self.bytes().unwrap_or_default()
    }

    pub fn must_text(&self) -> String {
        self.text().unwrap_or_default()
    }

    pub fn must_json<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.json().unwrap_or_default()
    }

    pub fn must_map(&self) -> Map<String, Value> {
        self.map().unwrap_or_default()
    }

    /// Numeric status, or `0` when the request failed.
    pub fn must_status(&self) -> u16 {
        self.status().map_or(0, |status| status.as_u16())
    }

    pub fn must_response_headers(&self) -> HeaderMap {
        self.response_headers().unwrap_or_default()
    }

    pub fn must_response_header(&self, name: &str) -> String {
        self.response_header(name)
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    pub fn must_response_header_values(&self, name: &str) -> Vec<String> {
        self.response_header_values(name).unwrap_or_default()
    }

    pub fn must_response_cookies(&self, name: &str) -> Vec<String> {
        self.response_cookies(name).unwrap_or_default()
    }
}
