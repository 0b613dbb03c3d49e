//! Blocking HTTP/1.x transport: the "native" side of the engine.
//!
//! An [`HttpServer`] accepts connections on a blocking listener and serves
//! each one on its own thread. Every parsed request is handed to a
//! [`Handler`] together with a [`ResponseWriter`], in the classic
//! `serve_http(writer, request)` convention.
//!
//! # Response model
//!
//! A response writer is made of two independent parts:
//! - a mutable [`HeaderMap`] that collects the response headers, and
//! - a [`Sink`] that receives the head (status + headers) once and then the
//!   body bytes.
//!
//! [`ResponseWriter::parts`] exposes both at once, which lets adapters bind
//! the header map and the sink to different objects without aliasing.
//!
//! ```text
//!  [ request bytes ] --> parser --> Request --\
//!                                             +--> Handler::serve_http
//!  [ response bytes ] <-- Sink <-- HeaderMap -/
//! ```

pub(crate) mod connection;
pub(crate) mod parser;
pub(crate) mod server;
pub(crate) mod tls;

pub use server::{HttpServer, Shutdown};

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use std::{io, net::SocketAddr};

/// A parsed inbound request as produced by the transport.
///
/// The body has already been read in full (bounded by
/// [`ReqLimits::body_size`](crate::limits::ReqLimits::body_size)).
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
    pub tls: bool,
}

impl Request {
    /// Creates a body-less request, mostly useful in tests.
    ///
    /// # Examples
    /// ```
    /// use standard_engine::transport::Request;
    /// use http::Method;
    ///
    /// let request = Request::new(Method::GET, "/users?id=7".parse().unwrap());
    /// assert_eq!(request.uri.path(), "/users");
    /// assert!(request.body.is_empty());
    /// ```
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
            tls: false,
        }
    }

    /// Returns the `Host` header, falling back to the authority of the URI.
    #[inline]
    pub fn host(&self) -> Option<&str> {
        self.headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
    }
}

/// Receives the response head and body for one request.
///
/// The head is written at most once; later calls to [`Sink::write_head`]
/// are ignored. Body bytes may only follow the head.
pub trait Sink: Send {
    /// Writes the status line and `headers`. No-op once committed.
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()>;

    /// Appends body bytes, returning how many were accepted.
    fn write_body(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Returns `true` once the head has been written.
    fn committed(&self) -> bool;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The native response writer convention.
///
/// Only [`parts`](ResponseWriter::parts) must be implemented; the rest
/// follows the usual semantics: `write` commits an implicit `200 OK` head,
/// and `write_header` after commit does nothing.
pub trait ResponseWriter {
    fn parts(&mut self) -> (&mut HeaderMap, &mut dyn Sink);

    #[inline]
    fn header(&mut self) -> &mut HeaderMap {
        self.parts().0
    }

    #[inline]
    fn write_header(&mut self, status: StatusCode) -> io::Result<()> {
        let (headers, sink) = self.parts();
        sink.write_head(status, headers)
    }

    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let (headers, sink) = self.parts();
        if !sink.committed() {
            sink.write_head(StatusCode::OK, headers)?;
        }
        sink.write_body(buf)
    }

    #[inline]
    fn committed(&mut self) -> bool {
        self.parts().1.committed()
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        self.parts().1.flush()
    }
}

/// A [`ResponseWriter`] assembled from a borrowed header map and sink.
///
/// This is how an adapter that holds the two parts separately hands a whole
/// writer back to native code.
pub struct BorrowedWriter<'a> {
    headers: &'a mut HeaderMap,
    sink: &'a mut dyn Sink,
}

impl<'a> BorrowedWriter<'a> {
    #[inline]
    pub fn new(headers: &'a mut HeaderMap, sink: &'a mut dyn Sink) -> Self {
        Self { headers, sink }
    }
}

impl ResponseWriter for BorrowedWriter<'_> {
    #[inline]
    fn parts(&mut self) -> (&mut HeaderMap, &mut dyn Sink) {
        (&mut *self.headers, &mut *self.sink)
    }
}

/// A handler in the native `serve_http(writer, request)` convention.
///
/// Closures with the matching signature are handlers too.
///
/// # Examples
/// ```
/// use standard_engine::transport::{Handler, Request, ResponseWriter};
///
/// fn hello(w: &mut dyn ResponseWriter, _: &Request) {
///     let _ = w.write(b"hello");
/// }
///
/// let handler: &dyn Handler = &hello;
/// # drop(handler);
/// ```
pub trait Handler: Send + Sync {
    fn serve_http(&self, w: &mut dyn ResponseWriter, r: &Request);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseWriter, &Request) + Send + Sync,
{
    #[inline]
    fn serve_http(&self, w: &mut dyn ResponseWriter, r: &Request) {
        self(w, r)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sink and writer used by adapter tests.

    use super::*;

    /// Records the head and body instead of writing to a socket.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub(crate) status: Option<StatusCode>,
        pub(crate) head: Option<HeaderMap>,
        pub(crate) body: Vec<u8>,
        pub(crate) head_writes: usize,
    }

    impl Sink for RecordingSink {
        fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
            if self.status.is_some() {
                return Ok(());
            }
            self.status = Some(status);
            self.head = Some(headers.clone());
            self.head_writes += 1;
            Ok(())
        }

        fn write_body(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.body.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn committed(&self) -> bool {
            self.status.is_some()
        }
    }

    /// An owned writer, the in-memory counterpart of a connection writer.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub(crate) headers: HeaderMap,
        pub(crate) sink: RecordingSink,
    }

    impl ResponseWriter for Recorder {
        fn parts(&mut self) -> (&mut HeaderMap, &mut dyn Sink) {
            (&mut self.headers, &mut self.sink)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::Recorder, *};

    #[test]
    fn write_commits_implicit_ok() {
        let mut w = Recorder::default();
        w.header().insert("x-one", "1".parse().unwrap());

        assert!(!w.committed());
        assert_eq!(w.write(b"abc").unwrap(), 3);
        assert!(w.committed());

        assert_eq!(w.sink.status, Some(StatusCode::OK));
        assert_eq!(w.sink.head.as_ref().unwrap()["x-one"], "1");
        assert_eq!(w.sink.body, b"abc");
    }

    #[test]
    fn write_header_once() {
        let mut w = Recorder::default();
        w.write_header(StatusCode::CREATED).unwrap();
        w.write_header(StatusCode::NOT_FOUND).unwrap();
        w.write(b"x").unwrap();

        assert_eq!(w.sink.status, Some(StatusCode::CREATED));
        assert_eq!(w.sink.head_writes, 1);
    }

    #[test]
    fn borrowed_writer_shares_parts() {
        let mut headers = HeaderMap::new();
        let mut sink = testing::RecordingSink::default();

        {
            let mut w = BorrowedWriter::new(&mut headers, &mut sink);
            w.header().insert("x-borrowed", "yes".parse().unwrap());
            w.write(b"body").unwrap();
        }

        assert_eq!(headers["x-borrowed"], "yes");
        assert_eq!(sink.head.unwrap()["x-borrowed"], "yes");
        assert_eq!(sink.body, b"body");
    }

    #[test]
    fn closure_handler() {
        let handler = |w: &mut dyn ResponseWriter, r: &Request| {
            let _ = w.write(r.uri.path().as_bytes());
        };

        let mut w = Recorder::default();
        handler.serve_http(&mut w, &Request::new(Method::GET, Uri::from_static("/ping")));
        assert_eq!(w.sink.body, b"/ping");
    }

    #[test]
    fn host_fallback() {
        let mut request = Request::new(Method::GET, Uri::from_static("http://a.example/x"));
        assert_eq!(request.host(), Some("a.example"));

        request.headers.insert(http::header::HOST, "b.example".parse().unwrap());
        assert_eq!(request.host(), Some("b.example"));
    }
}
