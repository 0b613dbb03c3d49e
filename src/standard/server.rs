use crate::{
    engine::{self, Config},
    errors::Error,
    log::{Logger, TracingLogger},
    standard::{
        pool::{PoolStats, Pools},
        Request, Response,
    },
    transport::{self, HttpServer, ResponseWriter, Shutdown},
};
use http::HeaderMap;
use std::{fmt, mem, net::TcpListener, path::PathBuf, sync::Arc};

/// The engine [`Server`](engine::Server) on the blocking transport.
///
/// # Examples
///
/// ```no_run
/// use standard_engine::{
///     engine::{Request, Response, Server as _},
///     standard::Server,
/// };
/// use std::sync::Arc;
///
/// let mut server = Server::new("127.0.0.1:8080");
/// server.set_handler(Arc::new(|_: &mut dyn Request, rs: &mut dyn Response| {
///     let _ = rs.write(b"Hello world!");
/// }));
/// server.start().unwrap();
/// ```
pub struct Server {
    config: Config,
    pools: Pools,
    handler: Option<Arc<dyn engine::Handler>>,
    logger: Arc<dyn Logger>,
    shutdown: Shutdown,
}

/// How [`engine::Server::start`] obtains its listener.
#[derive(Debug)]
pub(crate) enum ListenMode {
    Custom(TcpListener),
    Tls { cert: PathBuf, key: PathBuf },
    Plain,
}

impl fmt::Display for ListenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(_) => f.write_str("custom listener"),
            Self::Tls { .. } => f.write_str("tls"),
            Self::Plain => f.write_str("plain"),
        }
    }
}

impl Server {
    /// A plain HTTP server for `address`.
    #[inline]
    pub fn new(address: impl Into<String>) -> Self {
        Self::from_config(Config {
            address: address.into(),
            ..Config::default()
        })
    }

    /// An HTTPS server for `address` using the given PEM files.
    #[inline]
    pub fn from_tls(address: impl Into<String>, cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self::from_config(Config {
            address: address.into(),
            tls_cert_file: Some(cert_file.into()),
            tls_key_file: Some(key_file.into()),
            ..Config::default()
        })
    }

    /// A server for `config`. The pools are built (and prewarmed) here.
    pub fn from_config(config: Config) -> Self {
        Self {
            pools: Pools::new(&config.pool_limits),
            config,
            handler: None,
            logger: Arc::new(TracingLogger),
            shutdown: Shutdown::new(),
        }
    }

    /// A handle that stops [`start`](engine::Server::start) from another thread.
    #[inline]
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Created and idle counts of every adapter pool.
    #[inline]
    pub fn pool_stats(&self) -> PoolStats {
        self.pools.stats()
    }

    /// Decides, once, where the server listens. Takes the custom listener.
    pub(crate) fn listen_mode(&mut self) -> ListenMode {
        if let Some(listener) = self.config.listener.take() {
            return ListenMode::Custom(listener);
        }

        match (&self.config.tls_cert_file, &self.config.tls_key_file) {
            (Some(cert), Some(key)) if self.config.tls_enabled() => ListenMode::Tls {
                cert: cert.clone(),
                key: key.clone(),
            },
            _ => ListenMode::Plain,
        }
    }
}

impl engine::Server for Server {
    #[inline]
    fn set_handler(&mut self, handler: Arc<dyn engine::Handler>) {
        self.handler = Some(handler);
    }

    #[inline]
    fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = logger;
    }

    fn start(mut self) -> Result<(), Error> {
        let mode = self.listen_mode();
        let address = self.config.address.clone();
        self.logger
            .info(&format!("starting {mode} server on {address}"));

        let conn_limits = self.config.connection_limits.clone();
        let req_limits = self.config.request_limits.clone();
        let resp_limits = self.config.response_limits.clone();
        let shutdown = self.shutdown.clone();

        let transport = HttpServer::new(Arc::new(self))
            .connection_limits(conn_limits)
            .request_limits(req_limits)
            .response_limits(resp_limits)
            .shutdown(shutdown);

        match mode {
            ListenMode::Custom(listener) => transport.serve(listener),
            ListenMode::Tls { cert, key } => transport.listen_and_serve_tls(&address, cert, key),
            ListenMode::Plain => transport.listen_and_serve(&address),
        }
    }
}

impl transport::Handler for Server {
    fn serve_http(&self, w: &mut dyn ResponseWriter, r: &transport::Request) {
        let (headers, sink) = w.parts();
        let mut lease = Lease::checkout(&self.pools, r, headers, sink, self.logger.clone());

        match &self.handler {
            Some(handler) => handler.serve(&mut lease.request, &mut lease.response),
            None => self
                .logger
                .error("handler not set, use `set_handler()` to set it."),
        }
    }
}

/// The adapters borrowed for one request.
///
/// Dropping the lease releases and checks in every object, so a panicking
/// handler still returns them to the pools.
struct Lease<'a> {
    pools: &'a Pools,
    request: Request<'a>,
    response: Response<'a>,
}

impl<'a> Lease<'a> {
    fn checkout(
        pools: &'a Pools,
        r: &'a transport::Request,
        headers: &'a mut HeaderMap,
        sink: &'a mut dyn transport::Sink,
        logger: Arc<dyn Logger>,
    ) -> Self {
        // Views first, then the shim, then the adapters holding them.
        let rq_header = pools.header.checkout().bind(&r.headers);
        let rq_url = pools.url.checkout().bind(&r.uri);
        let rs_header = pools.header.checkout().bind_mut(headers);

        let shim = pools.response_adapter.checkout().bind(sink);

        let request = pools.request.checkout().bind(r, rq_header, rq_url);
        let response = pools.response.checkout().bind(shim, rs_header, logger);

        Self {
            pools,
            request,
            response,
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let (request, rq_header, rq_url) = mem::take(&mut self.request).release();
        let (response, shim, rs_header) = mem::take(&mut self.response).release();

        self.pools.request.checkin(request);
        self.pools.header.checkin(rq_header);
        self.pools.url.checkin(rq_url);

        self.pools.response.checkin(response);
        self.pools.response_adapter.checkin(shim);
        self.pools.header.checkin(rs_header);
    }
}

#[cfg(test)]
mod listen_mode_tests {
    use super::*;

    fn mode(config: Config) -> ListenMode {
        Server::from_config(config).listen_mode()
    }

    #[test]
    fn empty_tls_paths_are_plain() {
        let config = Config {
            address: "x".into(),
            tls_cert_file: Some("".into()),
            tls_key_file: Some("".into()),
            ..Config::default()
        };

        assert!(matches!(mode(config), ListenMode::Plain));
    }

    #[test]
    fn both_paths_select_tls() {
        let mode = mode(Config {
            tls_cert_file: Some("cert.pem".into()),
            tls_key_file: Some("key.pem".into()),
            ..Config::default()
        });

        assert!(
            matches!(mode, ListenMode::Tls { cert, key } if cert == PathBuf::from("cert.pem") && key == PathBuf::from("key.pem"))
        );
    }

    #[test]
    fn injected_listener_wins() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let expected = listener.local_addr().unwrap();

        let mut server = Server::from_config(Config {
            tls_cert_file: Some("cert.pem".into()),
            tls_key_file: Some("key.pem".into()),
            listener: Some(listener),
            ..Config::default()
        });

        match server.listen_mode() {
            ListenMode::Custom(listener) => assert_eq!(listener.local_addr().unwrap(), expected),
            other => panic!("unexpected mode {other}"),
        }
        assert!(matches!(server.listen_mode(), ListenMode::Tls { .. }));
    }

    #[test]
    fn constructors() {
        assert!(matches!(Server::new(":0").listen_mode(), ListenMode::Plain));
        assert!(matches!(
            Server::from_tls(":0", "c.pem", "k.pem").listen_mode(),
            ListenMode::Tls { .. }
        ));
    }
}
