//! `chainreq` is a fluent, lazily-executed blocking HTTP request builder.
//!
//! A [`Request`] accumulates configuration through chained `with_*` calls and
//! performs its single round-trip the first time a terminal accessor asks for
//! the response. Results are cached, and the first error a request hits is
//! kept and handed back by every later call.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use chainreq::prelude::{Factory, Request, RequestOption, Session};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Echo {
//!     url: String,
//! }
//!
//! fn main() -> chainreq::Result<()> {
//!     let echo: Echo = Request::get("https://httpbin.org/get?a=1")
//!         .with_query("a", "2")
//!         .with_header("accept", "application/json")
//!         .with_timeout(Duration::from_secs(5))
//!         .json()?;
//!     println!("fetched {}", echo.url);
//!
//!     let api = Factory::new([
//!         RequestOption::base_url("https://httpbin.org"),
//!         RequestOption::timeout(Duration::from_secs(5)),
//!     ]);
//!     println!("status {}", api.get("/status/204").status()?);
//!
//!     let session = Session::open("/tmp/chainreq-cookies.json", []);
//!     session
//!         .get("https://httpbin.org/cookies/set?theme=dark")
//!         .status()?;
//!     println!("{}", session.get("https://httpbin.org/cookies").text()?);
//!     Ok(())
//! }
//! ```
//!
//! # Behavior
//!
//! - A request is sent at most once and its body is read at most once.
//! - Configuring a request after it was sent records [`Error::AlreadySent`].
//! - Query pairs already in the target URL come first, configured pairs follow
//!   in call order.
//! - `must_*` accessors return an empty value instead of the error.
//! - Requests with a cookie jar follow redirects hop by hop, storing the
//!   cookies each hop sets and sending the ones that apply to the next.
//! - `Duration::ZERO` as a timeout means no timeout.

#[cfg(all(not(feature = "tls-rustls"), not(feature = "tls-native")))]
compile_error!("chainreq requires one TLS backend feature: enable `tls-rustls` or `tls-native`");

mod body;
mod context;
mod cookies;
mod error;
mod factory;
mod logger;
mod options;
pub mod query;
mod request;
mod response;
mod session;
mod transport;
mod util;

pub use crate::body::RequestBody;
pub use crate::context::{CancelHandle, Context};
pub use crate::cookies::PersistentCookieJar;
pub use crate::error::{Error, ErrorCode, TimeoutPhase, TransportErrorKind};
pub use crate::factory::Factory;
pub use crate::logger::{DiscardLogger, Logger, TracingLogger, discard_logger, tracing_logger};
pub use crate::options::{RequestOption, RequestSettings};
pub use crate::query::{QueryFields, QuerySchemaBuilder, ToQueryValues};
pub use crate::request::Request;
pub use crate::response::{Response, ResponseHead};
pub use crate::session::{Session, SessionRegistry};
pub use crate::transport::{
    Transport, TransportError, TransportRequest, TransportResponse, UreqTransport,
    default_transport,
};

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        Context, Error, ErrorCode, Factory, QueryFields, QuerySchemaBuilder, Request,
        RequestOption, Result, Session, TimeoutPhase, TransportErrorKind,
    };
}

#[cfg(test)]
mod tests;
