//! Request head parser for the blocking transport.

use crate::{errors::ErrorKind, limits::ReqLimits};
use http::{header::HeaderName, HeaderMap, HeaderValue, Method, Uri, Version};
use memchr::{memchr, memmem};
use std::io::{self, Read};

/// Everything the request line and headers carry.
#[derive(Debug)]
pub(crate) struct Head {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) content_length: usize,
    pub(crate) keep_alive: bool,
}

/// Per-connection read buffer.
///
/// Holds at most one request head plus whatever bytes the client already
/// sent after it (the start of a body or a pipelined request).
#[derive(Debug)]
pub(crate) struct Parser {
    len: usize,
    buffer: Box<[u8]>,
}

impl Parser {
    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        let buffer = vec![0; limits.head_buffer_size()].into_boxed_slice();

        Parser { len: 0, buffer }
    }

    #[cfg(test)]
    pub(crate) fn from<V: AsRef<[u8]>>(limits: &ReqLimits, value: V) -> Self {
        let mut parser = Self::new(limits);

        let value = value.as_ref();
        parser.buffer[..value.len()].copy_from_slice(value);
        parser.len = value.len();

        parser
    }

    #[cfg(test)]
    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops the first `n` bytes, keeping whatever follows for the next request.
    #[inline]
    pub(crate) fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.buffer.copy_within(n..self.len, 0);
        self.len -= n;
    }
}

// Reading
impl Parser {
    /// Reads until a complete head is buffered.
    ///
    /// Returns `Ok(None)` when the peer closed (or went idle past the read
    /// timeout) before sending a single byte of a new request.
    pub(crate) fn read_head<R: Read>(&mut self, stream: &mut R) -> Result<Option<usize>, ErrorKind> {
        loop {
            if let Some(end) = self.head_end() {
                return Ok(Some(end));
            }

            if self.len == self.buffer.len() {
                return Err(ErrorKind::HeadTooLarge);
            }

            match stream.read(&mut self.buffer[self.len..]) {
                Ok(0) if self.len == 0 => return Ok(None),
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(n) => self.len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if self.len == 0 && is_timeout(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reads a `len`-byte body that starts at `start` in the buffer.
    ///
    /// Bytes already buffered are used first; the rest comes from `stream`.
    /// The head and body are consumed from the buffer afterwards.
    pub(crate) fn read_body<R: Read>(
        &mut self,
        stream: &mut R,
        start: usize,
        len: usize,
    ) -> Result<Vec<u8>, ErrorKind> {
        let buffered = (self.len - start).min(len);

        let mut body = Vec::with_capacity(len);
        body.extend_from_slice(&self.buffer[start..start + buffered]);
        self.consume(start + buffered);

        if buffered < len {
            body.resize(len, 0);
            stream.read_exact(&mut body[buffered..])?;
        }

        Ok(body)
    }

    #[inline]
    fn head_end(&self) -> Option<usize> {
        memmem::find(&self.buffer[..self.len], b"\r\n\r\n").map(|pos| pos + 4)
    }
}

#[inline(always)]
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

// Parsing
impl Parser {
    /// Parses the head occupying `..end` of the buffer.
    pub(crate) fn parse_head(&self, end: usize, limits: &ReqLimits) -> Result<Head, ErrorKind> {
        let head = &self.buffer[..end];
        simdutf8::basic::from_utf8(head).map_err(|_| ErrorKind::InvalidHeader)?;

        let line_end = find_crlf(head, 0).ok_or(ErrorKind::InvalidVersion)?;
        let (method, uri, version) = parse_first_line(&head[..line_end], limits)?;

        let mut result = Head {
            method,
            uri,
            version,
            headers: HeaderMap::with_capacity(limits.header_count),
            content_length: 0,
            keep_alive: version == Version::HTTP_11,
        };

        let mut content_length = None;
        let mut start = line_end + 2;
        loop {
            let crlf = find_crlf(head, start).ok_or(ErrorKind::InvalidHeader)?;
            if crlf == start {
                break;
            }

            if result.headers.len() >= limits.header_count {
                return Err(ErrorKind::TooManyHeaders);
            }

            let (name, value) = split_header(&head[start..crlf], limits)?;
            if name.eq_ignore_ascii_case(b"connection") {
                parse_connection(&mut result.keep_alive, value);
            } else if name.eq_ignore_ascii_case(b"content-length") {
                let len = slice_to_usize(value).ok_or(ErrorKind::InvalidContentLength)?;
                if content_length.is_some_and(|prev| prev != len) {
                    return Err(ErrorKind::InvalidContentLength);
                }
                if len > limits.body_size {
                    return Err(ErrorKind::BodyTooLarge);
                }
                content_length = Some(len);
            } else if name.eq_ignore_ascii_case(b"transfer-encoding") && !value.eq_ignore_ascii_case(b"identity") {
                return Err(ErrorKind::UnsupportedTransferEncoding);
            }

            let name = HeaderName::from_bytes(name).map_err(|_| ErrorKind::InvalidHeader)?;
            let value = HeaderValue::from_bytes(value).map_err(|_| ErrorKind::InvalidHeader)?;
            result.headers.append(name, value);

            start = crlf + 2;
        }

        result.content_length = content_length.unwrap_or(0);
        Ok(result)
    }
}

#[inline]
fn find_crlf(src: &[u8], from: usize) -> Option<usize> {
    let pos = from + memchr(b'\n', src.get(from..)?)?;
    (pos > from && src[pos - 1] == b'\r').then(|| pos - 1)
}

#[inline]
fn parse_first_line(line: &[u8], limits: &ReqLimits) -> Result<(Method, Uri, Version), ErrorKind> {
    let method_end = memchr(b' ', line).ok_or(ErrorKind::InvalidMethod)?;
    let method = Method::from_bytes(&line[..method_end]).map_err(|_| ErrorKind::InvalidMethod)?;

    let rest = &line[method_end + 1..];
    let target_end = memchr(b' ', rest).ok_or(ErrorKind::InvalidVersion)?;
    let target = &rest[..target_end];

    if target.len() > limits.url_size {
        return Err(ErrorKind::UrlTooLong);
    }
    if !matches!(target.first(), Some(b'/' | b'*')) && memmem::find(target, b"://").is_none() {
        return Err(ErrorKind::InvalidUrl);
    }
    let uri = Uri::try_from(target).map_err(|_| ErrorKind::InvalidUrl)?;

    let version = match &rest[target_end + 1..] {
        b"HTTP/1.1" => Version::HTTP_11,
        b"HTTP/1.0" => Version::HTTP_10,
        [b'H', b'T', b'T', b'P', b'/', ..] => return Err(ErrorKind::UnsupportedVersion),
        _ => return Err(ErrorKind::InvalidVersion),
    };

    Ok((method, uri, version))
}

#[inline]
fn split_header<'a>(line: &'a [u8], limits: &ReqLimits) -> Result<(&'a [u8], &'a [u8]), ErrorKind> {
    let colon = memchr(b':', line).ok_or(ErrorKind::InvalidHeader)?;

    let name = &line[..colon];
    if name.is_empty() || name.len() > limits.header_name_size {
        return Err(ErrorKind::InvalidHeader);
    }

    let value = line[colon + 1..].trim_ascii();
    if value.len() > limits.header_value_size {
        return Err(ErrorKind::InvalidHeader);
    }

    Ok((name, value))
}

#[inline]
fn parse_connection(keep_alive: &mut bool, value: &[u8]) {
    for token in value.split(|&b| b == b',') {
        match token.trim_ascii() {
            #[rustfmt::skip]
            [
                b'k' | b'K', b'e' | b'E', b'e' | b'E', b'p' | b'P', b'-',
                b'a' | b'A', b'l' | b'L', b'i' | b'I', b'v' | b'V', b'e' | b'E'
            ] => *keep_alive = true,
            #[rustfmt::skip]
            [
                b'c' | b'C', b'l' | b'L', b'o' | b'O', b's' | b'S', b'e' | b'E'
            ] => {
                *keep_alive = false;
                return;
            }
            _ => {}
        }
    }
}

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}


#[cfg(test)]
mod first_line_tests {
    use super::helpers::{parse, parse_with};
    use super::*;

    #[test]
    fn valid() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n\r\n",              Method::GET,     "/",          Version::HTTP_11),
            ("POST /api?x=1 HTTP/1.0\r\n\r\n",      Method::POST,    "/api?x=1",   Version::HTTP_10),
            ("OPTIONS * HTTP/1.1\r\n\r\n",          Method::OPTIONS, "*",          Version::HTTP_11),
            ("DELETE /a/b/c HTTP/1.1\r\n\r\n",      Method::DELETE,  "/a/b/c",     Version::HTTP_11),
            ("GET http://h/x HTTP/1.1\r\n\r\n",     Method::GET,     "http://h/x", Version::HTTP_11),
        ];

        for (raw, method, target, version) in cases {
            let head = parse(raw).unwrap();
            assert_eq!(head.method, method, "{raw:?}");
            assert_eq!(head.uri, target, "{raw:?}");
            assert_eq!(head.version, version, "{raw:?}");
        }
    }

    #[test]
    fn invalid() {
        #[rustfmt::skip]
        let cases = [
            ("GET/ HTTP/1.1\r\n\r\n",         ErrorKind::InvalidMethod),
            ("G(T / HTTP/1.1\r\n\r\n",        ErrorKind::InvalidMethod),
            ("GET /\r\n\r\n",                 ErrorKind::InvalidVersion),
            ("GET abc HTTP/1.1\r\n\r\n",      ErrorKind::InvalidUrl),
            ("GET / HTTP/2.0\r\n\r\n",        ErrorKind::UnsupportedVersion),
            ("GET / HTTX/1.1\r\n\r\n",        ErrorKind::InvalidVersion),
            ("GET / HTTP/1.1\n\r\n\r\n",      ErrorKind::InvalidVersion),
        ];

        for (raw, err) in cases {
            assert_eq!(parse(raw).unwrap_err(), err, "{raw:?}");
        }
    }

    #[test]
    fn url_limit() {
        let limits = ReqLimits {
            url_size: 4,
            ..ReqLimits::default()
        };

        assert!(parse_with("GET /abc HTTP/1.1\r\n\r\n", &limits).is_ok());
        assert_eq!(
            parse_with("GET /abcd HTTP/1.1\r\n\r\n", &limits).unwrap_err(),
            ErrorKind::UrlTooLong
        );
    }
}
