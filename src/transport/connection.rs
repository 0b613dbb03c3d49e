use crate::{
    errors::ErrorKind,
    limits::{ConnLimits, ReqLimits, RespLimits},
    transport::{parser::Parser, Handler, Request, ResponseWriter, Sink},
};
use bytes::Bytes;
use http::{header, HeaderMap, Method, StatusCode, Version};
use std::{
    io::{self, Read, Write},
    net::SocketAddr,
    sync::Arc,
    time::Instant,
};

/// Buffered [`Sink`] for one connection.
///
/// The head is serialized when committed; framing headers
/// (`content-length`, `transfer-encoding`, `connection`) are owned by the
/// connection and dropped from user headers. The body is buffered so the
/// response always carries an exact `content-length`.
#[derive(Debug)]
pub(crate) struct ConnWriter {
    version: Version,
    head_only: bool,

    status: Option<StatusCode>,
    close: bool,
    head: Vec<u8>,
    body: Vec<u8>,
}

impl ConnWriter {
    #[inline]
    pub(crate) fn new(limits: &RespLimits) -> Self {
        Self {
            version: Version::HTTP_11,
            head_only: false,

            status: None,
            close: false,
            head: Vec::with_capacity(256),
            body: Vec::with_capacity(limits.default_capacity),
        }
    }

    /// Prepares the writer for the response to `request`.
    #[inline]
    pub(crate) fn reset(&mut self, request: &Request, limits: &RespLimits) {
        self.version = request.version;
        self.head_only = request.method == Method::HEAD;

        self.status = None;
        self.close = false;
        self.head.clear();

        if self.body.capacity() > limits.max_capacity {
            self.body = Vec::with_capacity(limits.default_capacity);
        } else {
            self.body.clear();
        }
    }

    /// Writes the whole response to `stream`.
    ///
    /// A handler that never wrote anything gets an empty `200 OK`. Returns
    /// whether the connection may serve another request.
    pub(crate) fn finish<W: Write>(&mut self, stream: &mut W, keep_alive: bool) -> io::Result<bool> {
        if self.status.is_none() {
            self.write_head(StatusCode::OK, &HeaderMap::new())?;
        }
        let keep_alive = keep_alive && !self.close;

        let mut num = itoa_buffer();
        self.head.extend_from_slice(b"content-length: ");
        self.head.extend_from_slice(format_usize(self.body.len(), &mut num));
        self.head.extend_from_slice(match keep_alive {
            true => &b"\r\nconnection: keep-alive\r\n\r\n"[..],
            false => &b"\r\nconnection: close\r\n\r\n"[..],
        });

        stream.write_all(&self.head)?;
        if !self.head_only {
            stream.write_all(&self.body)?;
        }
        stream.flush()?;

        Ok(keep_alive)
    }

    #[cfg(test)]
    pub(crate) fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Sink for ConnWriter {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        self.status = Some(status);

        self.head.extend_from_slice(match self.version == Version::HTTP_10 {
            true => b"HTTP/1.0 ",
            false => b"HTTP/1.1 ",
        });
        self.head.extend_from_slice(status.as_str().as_bytes());
        self.head.push(b' ');
        self.head
            .extend_from_slice(status.canonical_reason().unwrap_or("").as_bytes());
        self.head.extend_from_slice(b"\r\n");

        for (name, value) in headers {
            if *name == header::CONNECTION {
                self.close |= value.as_bytes().eq_ignore_ascii_case(b"close");
                continue;
            }
            if *name == header::CONTENT_LENGTH || *name == header::TRANSFER_ENCODING {
                continue;
            }

            self.head.extend_from_slice(name.as_str().as_bytes());
            self.head.extend_from_slice(b": ");
            self.head.extend_from_slice(value.as_bytes());
            self.head.extend_from_slice(b"\r\n");
        }

        Ok(())
    }

    #[inline]
    fn write_body(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            return Err(io::Error::other("body written before the response head"));
        }

        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    #[inline]
    fn committed(&self) -> bool {
        self.status.is_some()
    }
}

#[inline(always)]
fn itoa_buffer() -> [u8; 20] {
    [0; 20]
}

#[inline]
fn format_usize(mut n: usize, buf: &mut [u8; 20]) -> &[u8] {
    let mut pos = buf.len();
    loop {
        pos -= 1;
        buf[pos] = b'0' + (n % 10) as u8;
        n /= 10;

        if n == 0 {
            return &buf[pos..];
        }
    }
}

/// The native writer handed to transport handlers.
#[derive(Debug)]
pub(crate) struct ConnResponse {
    pub(crate) headers: HeaderMap,
    pub(crate) writer: ConnWriter,
}

impl ConnResponse {
    #[inline]
    pub(crate) fn new(limits: &RespLimits) -> Self {
        Self {
            headers: HeaderMap::new(),
            writer: ConnWriter::new(limits),
        }
    }

    #[inline]
    pub(crate) fn reset(&mut self, request: &Request, limits: &RespLimits) {
        self.headers.clear();
        self.writer.reset(request, limits);
    }
}

impl ResponseWriter for ConnResponse {
    #[inline]
    fn parts(&mut self) -> (&mut HeaderMap, &mut dyn Sink) {
        (&mut self.headers, &mut self.writer)
    }
}

/// Who is on the other end of a connection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Peer {
    pub(crate) addr: Option<SocketAddr>,
    pub(crate) tls: bool,
}

/// Serves requests from one stream until it closes or expires.
pub(crate) struct HttpConnection {
    handler: Arc<dyn Handler>,

    parser: Parser,
    response: ConnResponse,
    version: Version,
    keep_alive: bool,

    created: Instant,
    request_count: usize,

    conn_limits: ConnLimits,
    req_limits: ReqLimits,
    resp_limits: RespLimits,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(
        handler: Arc<dyn Handler>,
        conn_limits: ConnLimits,
        req_limits: ReqLimits,
        resp_limits: RespLimits,
    ) -> Self {
        Self {
            handler,

            parser: Parser::new(&req_limits),
            response: ConnResponse::new(&resp_limits),
            version: Version::HTTP_11,
            keep_alive: true,

            created: Instant::now(),
            request_count: 0,

            conn_limits,
            req_limits,
            resp_limits,
        }
    }

    #[inline]
    pub(crate) fn run<S: Read + Write>(&mut self, stream: &mut S, peer: Peer) -> io::Result<()> {
        match self.impl_run(stream, peer) {
            Ok(()) => Ok(()),
            Err(ErrorKind::Io(e)) => Err(e.0),
            Err(err) => {
                stream.write_all(err.as_http(self.version))?;
                stream.flush()
            }
        }
    }

    fn impl_run<S: Read + Write>(&mut self, stream: &mut S, peer: Peer) -> Result<(), ErrorKind> {
        while !self.is_expired() {
            let Some(end) = self.parser.read_head(stream)? else {
                break;
            };

            let head = self.parser.parse_head(end, &self.req_limits)?;
            self.version = head.version;

            let body = match head.content_length {
                0 => {
                    self.parser.consume(end);
                    Bytes::new()
                }
                len => Bytes::from(self.parser.read_body(stream, end, len)?),
            };

            let request = Request {
                method: head.method,
                uri: head.uri,
                version: head.version,
                headers: head.headers,
                body,
                remote_addr: peer.addr,
                tls: peer.tls,
            };

            self.response.reset(&request, &self.resp_limits);
            self.handler.serve_http(&mut self.response, &request);

            self.request_count += 1;
            let keep_alive = head.keep_alive && !self.is_expired();
            self.keep_alive = self.response.writer.finish(stream, keep_alive)?;
        }

        Ok(())
    }

    #[inline(always)]
    fn is_expired(&self) -> bool {
        !self.keep_alive
            || self.request_count >= self.conn_limits.max_requests_per_connection
            || self.created.elapsed() > self.conn_limits.connection_lifetime
    }
}
