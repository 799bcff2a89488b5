use http::Method;

use crate::options::{RequestOption, RequestSettings};
use crate::request::Request;

/// Applies a fixed option list to every request it creates.
///
/// Unlike a [`Session`](crate::Session) a factory keeps no cookies and is not
/// registered anywhere; clone it freely.
#[derive(Clone, Debug, Default)]
pub struct Factory {
    options: Vec<RequestOption>,
}

impl Factory {
    pub fn new(options: impl IntoIterator<Item = RequestOption>) -> Self {
        Self {
            options: options.into_iter().collect(),
        }
    }

    pub fn options(&self) -> &[RequestOption] {
        &self.options
    }

    /// Creates a request with the factory's options applied in order. The
    /// first failing option becomes the request's error.
    pub fn request<M>(&self, method: M, url: impl Into<String>) -> Request
    where
        Method: TryFrom<M>,
        <Method as TryFrom<M>>::Error: Into<http::Error>,
    {
        build_request(method, url, &self.options)
    }

    pub fn get(&self, url: impl Into<String>) -> Request {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: impl Into<String>) -> Request {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: impl Into<String>) -> Request {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> Request {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> Request {
        self.request(Method::DELETE, url)
    }
}

pub(crate) fn build_request<M>(
    method: M,
    url: impl Into<String>,
    options: &[RequestOption],
) -> Request
where
    Method: TryFrom<M>,
    <Method as TryFrom<M>>::Error: Into<http::Error>,
{
    match RequestSettings::default().apply(options) {
        Ok(settings) => Request::from_settings(method, url, settings),
        Err(error) => Request::new(method, url).fail(error),
    }
}
