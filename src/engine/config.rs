use crate::limits::{ConnLimits, PoolLimits, ReqLimits, RespLimits};
use std::{net::TcpListener, path::PathBuf};

/// Server configuration.
///
/// # Examples
///
/// ```
/// use standard_engine::engine::Config;
///
/// let config = Config {
///     address: "127.0.0.1:8443".into(),
///     tls_cert_file: Some("cert.pem".into()),
///     tls_key_file: Some("key.pem".into()),
///     ..Config::default()
/// };
/// assert!(config.tls_enabled());
/// ```
#[derive(Debug)]
pub struct Config {
    /// Listen address, `host:port` or `:port` (default: `":8080"`).
    pub address: String,

    /// PEM certificate chain. TLS is used only when both files are set.
    pub tls_cert_file: Option<PathBuf>,
    /// PEM private key.
    pub tls_key_file: Option<PathBuf>,

    /// A pre-bound listener. When set, `address` and the TLS files are ignored.
    pub listener: Option<TcpListener>,

    pub request_limits: ReqLimits,
    pub connection_limits: ConnLimits,
    pub response_limits: RespLimits,
    pub pool_limits: PoolLimits,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: ":8080".into(),

            tls_cert_file: None,
            tls_key_file: None,

            listener: None,

            request_limits: ReqLimits::default(),
            connection_limits: ConnLimits::default(),
            response_limits: RespLimits::default(),
            pool_limits: PoolLimits::default(),

            _priv: (),
        }
    }
}

impl Config {
    /// Both TLS files are configured and non-empty.
    #[inline]
    pub fn tls_enabled(&self) -> bool {
        let set = |path: &Option<PathBuf>| path.as_ref().is_some_and(|p| !p.as_os_str().is_empty());
        set(&self.tls_cert_file) && set(&self.tls_key_file)
    }
}
