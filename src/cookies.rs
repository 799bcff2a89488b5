use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cookie_store::{CookieStore, RawCookie};
use http::HeaderMap;
use http::header::SET_COOKIE;

use crate::error::Error;
use crate::util::lock_unpoisoned;

/// Cookie store backed by a JSON file.
///
/// Opening a path that does not exist yet starts with an empty store; the
/// file is created on the first [`save`](Self::save). A file that exists but
/// cannot be parsed is an error.
#[derive(Debug)]
pub struct PersistentCookieJar {
    path: PathBuf,
    store: Mutex<CookieStore>,
}

impl PersistentCookieJar {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let store = if path.exists() {
            let file = File::open(&path).map_err(|source| cookie_store_error(&path, source))?;
            let is_empty = file
                .metadata()
                .map(|metadata| metadata.len() == 0)
                .unwrap_or(false);
            if is_empty {
                CookieStore::default()
            } else {
                cookie_store::serde::json::load(BufReader::new(file))
                    .map_err(|source| cookie_store_error(&path, source))?
            }
        } else {
            CookieStore::default()
        };
        Ok(Self {
            path,
            store: Mutex::new(store),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name/value pairs of the unexpired cookies that apply to `url`.
    pub fn cookies(&self, url: &url::Url) -> Vec<(String, String)> {
        let store = lock_unpoisoned(&self.store);
        store
            .get_request_values(url)
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect()
    }

    /// `Cookie` header value for `url`, or `None` when nothing matches.
    pub fn cookie_header(&self, url: &url::Url) -> Option<String> {
        let cookies = self.cookies(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Records every parseable `Set-Cookie` header of a response to `url`.
    pub fn store_response_cookies(&self, url: &url::Url, headers: &HeaderMap) {
        let cookies = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| RawCookie::parse(value.to_owned()).ok())
            .collect::<Vec<_>>();
        if cookies.is_empty() {
            return;
        }
        let mut store = lock_unpoisoned(&self.store);
        store.store_response_cookies(cookies.into_iter(), url);
    }

    pub fn save(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| cookie_store_error(&self.path, source))?;
        }

        let file = File::create(&self.path).map_err(|source| cookie_store_error(&self.path, source))?;
        let mut writer = BufWriter::new(file);
        {
            let store = lock_unpoisoned(&self.store);
            cookie_store::serde::json::save(&store, &mut writer)
                .map_err(|source| cookie_store_error(&self.path, source))?;
        }
        writer
            .flush()
            .map_err(|source| cookie_store_error(&self.path, source))
    }
}

fn cookie_store_error(path: &Path, source: impl std::fmt::Display) -> Error {
    Error::CookieStore {
        path: path.display().to_string(),
        message: source.to_string(),
    }
}
