use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};

use crate::error::Error;

pub(crate) const MAX_ERROR_BODY_LEN: usize = 2048;
pub(crate) const MAX_LOG_BODY_LEN: usize = 512;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn get_mut_unpoisoned<T>(mutex: &mut Mutex<T>) -> &mut T {
    match mutex.get_mut() {
        Ok(value) => value,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn parse_header_name(name: &str) -> Result<HeaderName, Error> {
    name
        .parse::<HeaderName>()
        .map_err(|source| Error::InvalidHeaderName {
            name: name.to_owned(),
            source: Arc::new(source),
        })
}

pub(crate) fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, Error> {
    value
        .parse::<HeaderValue>()
        .map_err(|source| Error::InvalidHeaderValue {
            name: name.to_owned(),
            source: Arc::new(source),
        })
}

/// A zero duration means no timeout.
pub(crate) fn timeout_setting(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

pub(crate) fn join_base_path(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let relative = path.trim_start_matches('/');
    match (base.is_empty(), relative.is_empty()) {
        (true, true) => String::new(),
        (true, false) => relative.to_owned(),
        (false, true) => base.to_owned(),
        (false, false) => format!("{base}/{relative}"),
    }
}

/// Turns a request target into an absolute http(s) URL. Targets that parse
/// as URLs on their own are used as they are; relative targets are joined
/// onto `base_url` when one is configured.
pub(crate) fn resolve_url(base_url: Option<&str>, target: &str) -> Result<url::Url, Error> {
    let (text, parsed) = match (url::Url::parse(target), base_url) {
        (Err(url::ParseError::RelativeUrlWithoutBase), Some(base_url)) => {
            let text = join_base_path(base_url, target);
            let parsed = url::Url::parse(&text);
            (text, parsed)
        }
        (parsed, _) => (target.to_owned(), parsed),
    };
    let parsed = parsed.map_err(|_| Error::InvalidUri { uri: text.clone() })?;
    if !is_http(&parsed) {
        return Err(Error::InvalidUri { uri: text });
    }
    Ok(parsed)
}

pub(crate) fn is_http(url: &url::Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

/// Keeps the pairs already present in the URL and appends `query_pairs` after
/// them, in call order.
pub(crate) fn append_query_pairs(url: &mut url::Url, query_pairs: &[(String, String)]) {
    if query_pairs.is_empty() {
        return;
    }

    let existing = url
        .query_pairs()
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect::<Vec<_>>();

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in existing.iter().chain(query_pairs) {
        serializer.append_pair(name, value);
    }
    let query = serializer.finish();
    url.set_query(Some(&query));
}

pub(crate) fn redact_uri_for_logs(uri_text: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(uri_text) else {
        return uri_text.split('?').next().unwrap_or(uri_text).to_owned();
    };

    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);
    parsed.set_query(None);
    parsed.set_fragment(None);
    parsed.to_string()
}

pub(crate) fn truncate_body(body: &[u8], max_len: usize) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= max_len {
        return text.into_owned();
    }

    let truncated: String = text.chars().take(max_len).collect();
    format!("{truncated}...(truncated)")
}
