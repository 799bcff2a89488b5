use std::sync::Arc;

use http::Method;
use thiserror::Error;

type BoxError = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Read,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Read => "read",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimeoutPhase {
    Transport,
    ResponseBody,
}

impl std::fmt::Display for TimeoutPhase {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Transport => "transport",
            Self::ResponseBody => "response_body",
        };
        formatter.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    InvalidMethod,
    InvalidUri,
    InvalidHeaderName,
    InvalidHeaderValue,
    SerializeJson,
    SerializeQuery,
    SerializeForm,
    InvalidQuerySchema,
    EncodeMultipart,
    AlreadySent,
    RequestBuild,
    Transport,
    Timeout,
    DeadlineExceeded,
    Cancelled,
    ReadBody,
    Deserialize,
    CookieStore,
    InvalidOption,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidMethod => "invalid_method",
            Self::InvalidUri => "invalid_uri",
            Self::InvalidHeaderName => "invalid_header_name",
            Self::InvalidHeaderValue => "invalid_header_value",
            Self::SerializeJson => "serialize_json",
            Self::SerializeQuery => "serialize_query",
            Self::SerializeForm => "serialize_form",
            Self::InvalidQuerySchema => "invalid_query_schema",
            Self::EncodeMultipart => "encode_multipart",
            Self::AlreadySent => "already_sent",
            Self::RequestBuild => "request_build",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Cancelled => "cancelled",
            Self::ReadBody => "read_body",
            Self::Deserialize => "deserialize",
            Self::CookieStore => "cookie_store",
            Self::InvalidOption => "invalid_option",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Every failure a [`Request`](crate::Request) can record.
///
/// Errors are cheap to clone: a request hands the same value back on every
/// call once it has failed.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid request method: {method}")]
    InvalidMethod { method: String },
    #[error("invalid request uri: {uri}")]
    InvalidUri { uri: String },
    #[error("invalid header name {name}: {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: Arc<http::header::InvalidHeaderName>,
    },
    #[error("invalid header value for {name}: {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: Arc<http::header::InvalidHeaderValue>,
    },
    #[error("failed to serialize request json: {source}")]
    SerializeJson {
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("failed to serialize request query: {source}")]
    SerializeQuery {
        #[source]
        source: Arc<serde_urlencoded::ser::Error>,
    },
    #[error("failed to serialize request form: {source}")]
    SerializeForm {
        #[source]
        source: Arc<serde_urlencoded::ser::Error>,
    },
    #[error("invalid query schema for {type_name}: {message}")]
    InvalidQuerySchema {
        type_name: &'static str,
        message: String,
    },
    #[error("failed to encode multipart body: {source}")]
    EncodeMultipart {
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("request {method} {uri} already sent, cannot change request parameters")]
    AlreadySent { method: Method, uri: String },
    #[error("failed to build http request {method} {uri}: {source}")]
    RequestBuild {
        method: Method,
        uri: String,
        #[source]
        source: Arc<http::Error>,
    },
    #[error("http transport error ({kind}) for {method} {uri}: {source}")]
    Transport {
        kind: TransportErrorKind,
        method: Method,
        uri: String,
        #[source]
        source: BoxError,
    },
    #[error("http request timed out in {phase} after {timeout_ms}ms for {method} {uri}")]
    Timeout {
        phase: TimeoutPhase,
        timeout_ms: u128,
        method: Method,
        uri: String,
    },
    #[error("http request context deadline exceeded for {method} {uri}")]
    DeadlineExceeded { method: Method, uri: String },
    #[error("http request cancelled for {method} {uri}")]
    Cancelled { method: Method, uri: String },
    #[error("failed to read response body for {method} {uri}: {source}")]
    ReadBody {
        method: Method,
        uri: String,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("{method} {uri}: failed to decode {body} into {target}: {source}")]
    Deserialize {
        method: Method,
        uri: String,
        target: &'static str,
        body: String,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("cookie store {path}: {message}")]
    CookieStore { path: String, message: String },
    #[error("invalid request option: {message}")]
    InvalidOption { message: String },
}

impl Error {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidMethod { .. } => ErrorCode::InvalidMethod,
            Self::InvalidUri { .. } => ErrorCode::InvalidUri,
            Self::InvalidHeaderName { .. } => ErrorCode::InvalidHeaderName,
            Self::InvalidHeaderValue { .. } => ErrorCode::InvalidHeaderValue,
            Self::SerializeJson { .. } => ErrorCode::SerializeJson,
            Self::SerializeQuery { .. } => ErrorCode::SerializeQuery,
            Self::SerializeForm { .. } => ErrorCode::SerializeForm,
            Self::InvalidQuerySchema { .. } => ErrorCode::InvalidQuerySchema,
            Self::EncodeMultipart { .. } => ErrorCode::EncodeMultipart,
            Self::AlreadySent { .. } => ErrorCode::AlreadySent,
            Self::RequestBuild { .. } => ErrorCode::RequestBuild,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::ReadBody { .. } => ErrorCode::ReadBody,
            Self::Deserialize { .. } => ErrorCode::Deserialize,
            Self::CookieStore { .. } => ErrorCode::CookieStore,
            Self::InvalidOption { .. } => ErrorCode::InvalidOption,
        }
    }

    /// True for both the transport timeout and an expired caller deadline.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::DeadlineExceeded { .. })
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
