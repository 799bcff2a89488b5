use bytes::Bytes;
use http::header::SET_COOKIE;
use http::{HeaderMap, StatusCode};

/// Status line and headers of a completed round-trip.
#[derive(Clone, Debug)]
pub struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
    url: String,
}

impl ResponseHead {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, url: String) -> Self {
        Self {
            status,
            headers,
            url,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The URL the request was sent to, query included.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned)
    }

    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Values of the `Set-Cookie` entries named `name`.
    pub fn cookies(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| {
                let pair = value.split(';').next()?;
                let (cookie_name, cookie_value) = pair.split_once('=')?;
                (cookie_name.trim() == name).then(|| cookie_value.trim().to_owned())
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct Response {
    head: ResponseHead,
    body: Bytes,
}

impl Response {
    pub(crate) fn new(head: ResponseHead, body: Bytes) -> Self {
        Self { head, body }
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_parts(self) -> (ResponseHead, Bytes) {
        (self.head, self.body)
    }
}
