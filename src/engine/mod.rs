//! The transport-agnostic engine contract.
//!
//! Handlers are written against the [`Request`], [`Response`], [`Header`]
//! and [`Url`] traits and never see the transport directly. A [`Server`]
//! implementation (see [`crate::standard`]) adapts some concrete transport to
//! these traits.
//!
//! Two handler conventions live here:
//! - [`Handler`]: what a server dispatches to, one call per request;
//! - [`Handle`]: the error-returning convention used to build middleware
//!   chains, assembled into a [`Handler`] by [`Chain`].

mod chain;
mod config;

pub use chain::{Chain, Handle, HandlerError, Middleware};
pub use config::Config;

use crate::{
    errors::{Error, HeaderError},
    log::Logger,
    transport::{self, BorrowedWriter},
};
use http::{Method, StatusCode, Version};
use std::{io, net::SocketAddr, sync::Arc};

/// Header fields of a request or a response.
///
/// Lookups are case-insensitive. Mutations report why they were refused
/// instead of panicking: request headers are read-only, and response
/// headers freeze once the response is committed.
pub trait Header {
    /// First value of `key`, if present and valid UTF-8.
    fn get(&self, key: &str) -> Option<&str>;

    fn contains(&self, key: &str) -> bool;

    /// Distinct header names, computed once per binding.
    fn keys(&mut self) -> &[String];

    /// Number of header values (a repeated header counts once per value).
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces every value of `key` with `value`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), HeaderError>;

    /// Appends `value` to `key`, keeping existing values.
    fn add(&mut self, key: &str, value: &str) -> Result<(), HeaderError>;

    /// Removes every value of `key`.
    fn del(&mut self, key: &str) -> Result<(), HeaderError>;
}

/// The parsed request URL.
pub trait Url {
    fn path(&self) -> &str;

    /// The query string without the leading `?`, or `""`.
    fn raw_query(&self) -> &str;

    /// First decoded value of the query parameter `name`.
    fn query_param(&mut self, name: &str) -> Option<&str>;

    /// All decoded query parameters in order of appearance.
    fn query_params(&mut self) -> &[(String, String)];
}

/// The read side of one request.
pub trait Request {
    fn is_tls(&self) -> bool;

    /// `"https"` or `"http"`.
    fn scheme(&self) -> &str;

    fn host(&self) -> &str;

    /// The request target (path and query).
    fn uri(&self) -> &str;

    fn url(&mut self) -> &mut dyn Url;

    fn header(&mut self) -> &mut dyn Header;

    fn version(&self) -> Version;

    fn content_length(&self) -> u64;

    fn user_agent(&self) -> &str;

    fn remote_address(&self) -> Option<SocketAddr>;

    fn method(&self) -> &Method;

    fn body(&self) -> &[u8];

    /// First value of the form field `name`.
    ///
    /// Form fields come from the query string and, for
    /// `application/x-www-form-urlencoded` bodies, from the body.
    fn form_value(&mut self, name: &str) -> Option<&str>;

    fn form_params(&mut self) -> &[(String, String)];

    fn cookie(&self, name: &str) -> Option<&str>;

    /// The transport request behind this adapter, if there is one.
    #[inline]
    fn native(&self) -> Option<&transport::Request> {
        None
    }
}

/// The write side of one request.
///
/// A response starts uncommitted. [`write_header`](Response::write_header)
/// or the first [`write`](Response::write) commits it; from then on the
/// status and headers are frozen and only body bytes flow.
pub trait Response {
    fn header(&mut self) -> &mut dyn Header;

    /// Sends the status line and headers. Ignored once committed.
    fn write_header(&mut self, status: StatusCode) -> io::Result<()>;

    /// Writes body bytes, committing `200 OK` first if needed.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn status(&self) -> StatusCode;

    /// Body bytes written so far.
    fn size(&self) -> u64;

    fn committed(&self) -> bool;

    fn flush(&mut self) -> io::Result<()>;

    /// The transport writer behind this adapter, if there is one.
    #[inline]
    fn native(&mut self) -> Option<BorrowedWriter<'_>> {
        None
    }

    /// The logger this response reports misuse to, if any.
    #[inline]
    fn logger(&self) -> Option<Arc<dyn Logger>> {
        None
    }
}

/// Serves one request.
///
/// Closures with the matching signature are handlers too.
pub trait Handler: Send + Sync {
    fn serve(&self, rq: &mut dyn Request, rs: &mut dyn Response);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn Request, &mut dyn Response) + Send + Sync,
{
    #[inline]
    fn serve(&self, rq: &mut dyn Request, rs: &mut dyn Response) {
        self(rq, rs)
    }
}

/// A server that runs an engine [`Handler`] on some transport.
pub trait Server {
    fn set_handler(&mut self, handler: Arc<dyn Handler>);

    fn set_logger(&mut self, logger: Arc<dyn Logger>);

    /// Binds (or takes the configured listener) and serves until shutdown.
    fn start(self) -> Result<(), Error>
    where
        Self: Sized;
}
