use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use http::Method;
use tracing::debug;

use crate::cookies::PersistentCookieJar;
use crate::error::Error;
use crate::factory::build_request;
use crate::options::RequestOption;
use crate::request::Request;
use crate::util::lock_unpoisoned;

static GLOBAL_REGISTRY: LazyLock<SessionRegistry> = LazyLock::new(SessionRegistry::new);

/// Maps cookie-file paths to the one [`Session`] that owns each of them.
///
/// Entries are never evicted. Most callers use [`SessionRegistry::global`]
/// through [`Session::open`]; tests and embedders can keep their own.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<PathBuf, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static Self {
        &GLOBAL_REGISTRY
    }

    /// Returns the session for `cookie_file`, creating it on first use.
    ///
    /// The cookie jar is opened while the registry lock is held, so two
    /// racing callers still get the same instance. `options` only matter to
    /// the call that creates the session.
    pub fn session(
        &self,
        cookie_file: impl AsRef<Path>,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Arc<Session> {
        let cookie_file = cookie_file.as_ref();
        let mut sessions = lock_unpoisoned(&self.sessions);
        if let Some(session) = sessions.get(cookie_file) {
            debug!(path = %cookie_file.display(), "reusing session");
            return Arc::clone(session);
        }

        let session = Arc::new(Session::create(cookie_file.to_path_buf(), options));
        sessions.insert(cookie_file.to_path_buf(), Arc::clone(&session));
        session
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Requests sharing one persistent cookie jar and a fixed option list.
///
/// Every request a session creates sends the jar's cookies, stores the
/// cookies it receives and saves the jar to disk once its round-trip ends.
/// If the jar could not be opened, every request the session creates fails
/// with that error.
#[derive(Debug)]
pub struct Session {
    cookie_file: PathBuf,
    jar: Option<Arc<PersistentCookieJar>>,
    error: Option<Error>,
    options: Vec<RequestOption>,
}

impl Session {
    /// The session registered for `cookie_file` in the process-wide registry.
    pub fn open(
        cookie_file: impl AsRef<Path>,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Arc<Self> {
        SessionRegistry::global().session(cookie_file, options)
    }

    fn create(cookie_file: PathBuf, options: impl IntoIterator<Item = RequestOption>) -> Self {
        let (jar, error) = match PersistentCookieJar::open(&cookie_file) {
            Ok(jar) => (Some(Arc::new(jar)), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            cookie_file,
            jar,
            error,
            options: options.into_iter().collect(),
        }
    }

    pub fn cookie_file(&self) -> &Path {
        &self.cookie_file
    }

    pub fn cookie_jar(&self) -> Option<&Arc<PersistentCookieJar>> {
        self.jar.as_ref()
    }

    /// Why the cookie jar failed to open, if it did.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn request<M>(&self, method: M, url: impl Into<String>) -> Request
    where
        Method: TryFrom<M>,
        <Method as TryFrom<M>>::Error: Into<http::Error>,
    {
        let request = match &self.error {
            Some(error) => Request::new(method, url).fail(error.clone()),
            None => build_request(method, url, &self.options),
        };
        match &self.jar {
            Some(jar) => request.with_cookie_jar(Arc::clone(jar)),
            None => request,
        }
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
