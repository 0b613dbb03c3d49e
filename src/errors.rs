use http::Version;
use std::{fmt, io, net::SocketAddr};
use thiserror::Error;

/// Errors returned while starting or running a server.
///
/// Only transport-level failures end up here. Errors raised by a handler for
/// one request never abort the accept loop.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The listen address could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The listen address could not be resolved to a socket address.
    #[error("invalid listen address {0:?}")]
    Address(String),

    /// The TLS certificate or private key could not be loaded.
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// The accept loop failed with a non-recoverable error.
    #[error("accept failed on {local_addr:?}: {source}")]
    Accept {
        local_addr: Option<SocketAddr>,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Rejected header mutation.
///
/// Header mutations never panic: a view that cannot be written reports why.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeaderError {
    /// The view is bound to request headers, which are read-only.
    #[error("request headers are read-only")]
    ReadOnly,

    /// The response head was already written to the wire.
    #[error("response already committed, headers can no longer change")]
    Committed,

    /// The view is not bound to any header set.
    #[error("header view is not bound")]
    Unbound,

    #[error("invalid header name {0:?}")]
    InvalidName(String),

    #[error("invalid value for header {0:?}")]
    InvalidValue(String),
}

/// Malformed-request conditions detected by the transport.
///
/// Each kind maps to a canned response written right before the connection
/// is closed.
#[derive(Debug, PartialEq)]
pub(crate) enum ErrorKind {
    InvalidMethod,
    InvalidUrl,
    UrlTooLong,

    InvalidVersion,
    UnsupportedVersion,

    InvalidHeader,
    TooManyHeaders,
    HeadTooLarge,
    InvalidContentLength,
    UnsupportedTransferEncoding,

    BodyTooLarge,

    Io(IoError),
}

macro_rules! http_errors {
    ($($name:ident: $status_code:expr, $len:literal => $json:literal; )*) => {
        pub(crate) fn as_http(&self, version: Version) -> &'static [u8] {
            match (self, version == Version::HTTP_10) { $(
                (Self::$name { .. }, true) => concat!(
                    "HTTP/1.0 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ),
                (Self::$name { .. }, false) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ),
            )* }.as_bytes()
        }
    };
}

impl ErrorKind {
    http_errors! {
        InvalidMethod: "400 Bad Request", "55"
            => r#"{"error":"Invalid HTTP method","code":"INVALID_METHOD"}"#;

        InvalidUrl: "400 Bad Request", "51"
            => r#"{"error":"Invalid URL format","code":"INVALID_URL"}"#;
        UrlTooLong: "414 URI Too Long", "46"
            => r#"{"error":"URL too long","code":"URL_TOO_LONG"}"#;

        InvalidVersion: "400 Bad Request", "57"
            => r#"{"error":"Invalid HTTP version","code":"INVALID_VERSION"}"#;
        UnsupportedVersion: "505 HTTP Version Not Supported", "67"
            => r#"{"error":"HTTP version not supported","code":"UNSUPPORTED_VERSION"}"#;

        InvalidHeader: "400 Bad Request", "57"
            => r#"{"error":"Invalid header format","code":"INVALID_HEADER"}"#;
        TooManyHeaders: "431 Request Header Fields Too Large", "54"
            => r#"{"error":"Too many headers","code":"TOO_MANY_HEADERS"}"#;
        HeadTooLarge: "431 Request Header Fields Too Large", "58"
            => r#"{"error":"Request head too large","code":"HEAD_TOO_LARGE"}"#;
        InvalidContentLength: "400 Bad Request", "66"
            => r#"{"error":"Invalid Content-Length","code":"INVALID_CONTENT_LENGTH"}"#;
        UnsupportedTransferEncoding: "501 Not Implemented", "82"
            => r#"{"error":"Transfer-Encoding not supported","code":"UNSUPPORTED_TRANSFER_ENCODING"}"#;

        BodyTooLarge: "413 Payload Too Large", "58"
            => r#"{"error":"Request body too large","code":"BODY_TOO_LARGE"}"#;

        Io: "503 Service Unavailable", "48"
            => r#"{"error":"I/O error occurred","code":"IO_ERROR"}"#;
    }
}

impl std::error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug)]
pub(crate) struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}
