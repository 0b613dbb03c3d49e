//! Transport and pool limits
//!
//! # Security-First Defaults
//!
//! Default limits are intentionally conservative to prevent:
//! - Resource exhaustion attacks
//! - Header flooding
//! - Slowloris attacks
//! - Unbounded growth of the adapter pools
//!
//! # Memory Consumption
//!
//! Each active connection holds one request head buffer
//! ([`ReqLimits::head_buffer_size`]), one response buffer
//! ([`RespLimits`]) and, while a request is in flight, one set of pooled
//! adapters (see [`PoolLimits`]).
//!
//! # Examples
//!
//! ```no_run
//! use standard_engine::{
//!     engine::Config,
//!     limits::{ConnLimits, PoolLimits, ReqLimits},
//!     standard::Server,
//! };
//! use std::time::Duration;
//!
//! let server = Server::from_config(Config {
//!     address: "127.0.0.1:8080".into(),
//!     connection_limits: ConnLimits {
//!         socket_read_timeout: Duration::from_secs(5),
//!         max_requests_per_connection: 10_000,
//!         ..ConnLimits::default()
//!     },
//!     request_limits: ReqLimits {
//!         header_count: 48,
//!         body_size: 64 * 1024,
//!         ..ReqLimits::default()
//!     },
//!     pool_limits: PoolLimits {
//!         prewarm: 64,
//!         ..PoolLimits::default()
//!     },
//!     ..Config::default()
//! });
//! # drop(server);
//! ```

use std::time::Duration;

/// Per-connection timeouts and keep-alive bounds.
///
/// Every accepted connection runs on its own thread; these limits decide how
/// long that thread may wait on the socket and how many requests it serves
/// before the connection is closed.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum time to wait for request bytes (default: `5s`).
    ///
    /// Applied to the socket with `set_read_timeout`. An idle keep-alive
    /// connection is closed when it expires.
    pub socket_read_timeout: Duration,

    /// Maximum time a single socket write may block (default: `5s`).
    pub socket_write_timeout: Duration,

    /// Maximum requests served over one keep-alive connection (default: `100`).
    pub max_requests_per_connection: usize,

    /// Maximum lifetime of a connection (default: `120s`).
    ///
    /// Checked between requests; a request in progress is never cut.
    pub connection_lifetime: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(5),
            socket_write_timeout: Duration::from_secs(5),
            max_requests_per_connection: 100,
            connection_lifetime: Duration::from_secs(120),

            _priv: (),
        }
    }
}

/// Request parsing limits.
///
/// The request head (request line and headers) is read into a fixed buffer
/// whose size is derived from these limits; the body is read separately and
/// never exceeds `body_size`.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum request-target length in bytes (default: `2048`).
    pub url_size: usize,

    /// Maximum number of header lines (default: `32`).
    pub header_count: usize,
    /// Maximum header name length (default: `64`).
    pub header_name_size: usize,
    /// Maximum header value length (default: `1024`).
    pub header_value_size: usize,

    /// Maximum body length accepted via `Content-Length` (default: `64 KiB`).
    pub body_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            url_size: 2048,

            header_count: 32,       // Typical: 10-12 browser headers + custom ones
            header_name_size: 64,   // Fits: x-custom-auth-token-header-name
            header_value_size: 1024, // Fits most JWT tokens and cookies

            body_size: 64 * 1024,

            _priv: (),
        }
    }
}

impl ReqLimits {
    /// Size of the buffer that must hold a complete request head.
    ///
    /// First line + Header * N + "\r\n"
    #[inline(always)]
    pub fn head_buffer_size(&self) -> usize {
        self.first_line() + self.header_count * self.header_line() + 2
    }

    #[inline(always)]
    // First line:
    // OPTIONS /url/test HTTP/1.1\r\n
    // |-----| |-------| |------|
    //  Method    URl    Version
    //
    // Formula: Method(7) + " " + URl + " " + Version(8) + "\r\n"
    pub(crate) fn first_line(&self) -> usize {
        19 + self.url_size
    }

    #[inline(always)]
    // Header:
    // Authorization: Sample%20Data\r\n
    // |-----------|  |-----------|
    //     Name           Value
    //
    // Formula: Name + ": " + Value + "\r\n"
    pub(crate) fn header_line(&self) -> usize {
        self.header_name_size + self.header_value_size + 4
    }
}

/// Response buffer sizing.
///
/// The transport buffers each response body so it can emit an exact
/// `Content-Length`. The buffer is kept between requests on the same
/// connection and shrunk back when a response grew it past `max_capacity`.
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial capacity of the response buffer (default: `1 KiB`).
    pub default_capacity: usize,
    /// Capacity above which the buffer is reallocated after use (default: `64 KiB`).
    pub max_capacity: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            max_capacity: 64 * 1024,

            _priv: (),
        }
    }
}

/// Bounds for the adapter reuse pools.
///
/// One pool exists per recyclable kind (request, response, response-writer
/// shim, header view, URL view). A pool never blocks: a miss manufactures a
/// new instance and a full pool drops the returned one.
#[derive(Debug, Clone)]
pub struct PoolLimits {
    /// Maximum idle instances retained per kind (default: `1024`, minimum `1`).
    pub capacity: usize,
    /// Instances manufactured per kind when the server is built (default: `0`).
    ///
    /// Header views are prewarmed twice, since every request borrows two.
    pub prewarm: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            capacity: 1024,
            prewarm: 0,

            _priv: (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_buffer_size() {
        let limits = ReqLimits {
            url_size: 100,
            header_count: 2,
            header_name_size: 10,
            header_value_size: 20,
            ..ReqLimits::default()
        };

        assert_eq!(limits.first_line(), 119);
        assert_eq!(limits.header_line(), 34);
        assert_eq!(limits.head_buffer_size(), 119 + 2 * 34 + 2);
    }

    #[test]
    fn defaults() {
        let pool = PoolLimits::default();
        assert_eq!(pool.capacity, 1024);
        assert_eq!(pool.prewarm, 0);

        let conn = ConnLimits::default();
        assert!(conn.max_requests_per_connection > 0);
        assert!(conn.socket_read_timeout > Duration::ZERO);
    }
}
