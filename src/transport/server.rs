use crate::{
    errors::Error,
    limits::{ConnLimits, ReqLimits, RespLimits},
    transport::{
        connection::{HttpConnection, Peer},
        tls, Handler,
    },
};
use crossbeam::atomic::AtomicCell;
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    io::{self, Write},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

const LISTEN_BACKLOG: i32 = 1024;

/// Stops a running accept loop from another thread.
///
/// Connections already being served finish their current request; the
/// accept loop returns `Ok(())` as soon as it observes the signal.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownState>,
}

#[derive(Debug, Default)]
struct ShutdownState {
    stopped: AtomicBool,
    local_addr: AtomicCell<Option<SocketAddr>>,
}

impl Shutdown {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals shutdown and wakes the accept loop.
    pub fn shutdown(&self) {
        self.inner.stopped.store(true, Ordering::Release);

        if let Some(addr) = self.inner.local_addr.load() {
            // A throwaway connection unblocks `accept`.
            let _ = TcpStream::connect_timeout(&wake_addr(addr), Duration::from_secs(1));
        }
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Address of the listener currently served, once the loop has started.
    #[inline]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr.load()
    }

    #[inline]
    fn attach(&self, addr: Option<SocketAddr>) {
        self.inner.local_addr.store(addr);
    }
}

#[inline]
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => (Ipv4Addr::LOCALHOST, addr.port()).into(),
        IpAddr::V6(ip) if ip.is_unspecified() => (Ipv6Addr::LOCALHOST, addr.port()).into(),
        _ => addr,
    }
}

/// A blocking HTTP/1.x server with one thread per connection.
///
/// # Examples
///
/// ```no_run
/// use standard_engine::transport::{HttpServer, Request, ResponseWriter};
/// use std::sync::Arc;
///
/// let hello = |w: &mut dyn ResponseWriter, _: &Request| {
///     let _ = w.write(b"Hello world!");
/// };
///
/// HttpServer::new(Arc::new(hello))
///     .listen_and_serve("127.0.0.1:8080")
///     .unwrap();
/// ```
pub struct HttpServer {
    handler: Arc<dyn Handler>,
    shutdown: Shutdown,

    conn_limits: ConnLimits,
    req_limits: ReqLimits,
    resp_limits: RespLimits,
}

impl HttpServer {
    #[inline]
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            shutdown: Shutdown::new(),

            conn_limits: ConnLimits::default(),
            req_limits: ReqLimits::default(),
            resp_limits: RespLimits::default(),
        }
    }

    #[inline]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.conn_limits = limits;
        self
    }

    #[inline]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.req_limits = limits;
        self
    }

    #[inline]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.resp_limits = limits;
        self
    }

    /// Uses an existing shutdown handle instead of a fresh one.
    #[inline]
    pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[inline]
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Binds `address` and serves plain HTTP until shutdown or a fatal accept error.
    pub fn listen_and_serve(&self, address: &str) -> Result<(), Error> {
        self.accept_loop(bind(address)?, None)
    }

    /// Loads the certificate and key, binds `address` and serves HTTPS.
    ///
    /// The PEM files are read before the address is bound, so a bad
    /// certificate never leaves a listener behind.
    pub fn listen_and_serve_tls(
        &self,
        address: &str,
        cert_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> Result<(), Error> {
        let config = tls::server_config(cert_file.as_ref(), key_file.as_ref())?;
        self.accept_loop(bind(address)?, Some(config))
    }

    /// Serves plain HTTP on a listener the caller already bound.
    pub fn serve(&self, listener: TcpListener) -> Result<(), Error> {
        self.accept_loop(listener, None)
    }

    /// Serves HTTPS on a listener the caller already bound.
    pub fn serve_tls(
        &self,
        listener: TcpListener,
        cert_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> Result<(), Error> {
        let config = tls::server_config(cert_file.as_ref(), key_file.as_ref())?;
        self.accept_loop(listener, Some(config))
    }

    fn accept_loop(&self, listener: TcpListener, tls: Option<Arc<ServerConfig>>) -> Result<(), Error> {
        let local_addr = listener.local_addr().ok();
        self.shutdown.attach(local_addr);

        tracing::info!(
            target: "standard_engine",
            address = ?local_addr,
            tls = tls.is_some(),
            "accepting connections"
        );

        let result = loop {
            if self.shutdown.is_shutdown() {
                break Ok(());
            }

            match listener.accept() {
                Ok(_) if self.shutdown.is_shutdown() => break Ok(()),
                Ok((stream, peer)) => self.spawn_connection(stream, peer, tls.clone()),
                Err(e) if is_transient(&e) => {
                    tracing::debug!(target: "standard_engine", error = %e, "transient accept error");
                }
                Err(source) => break Err(Error::Accept { local_addr, source }),
            }
        };

        self.shutdown.attach(None);
        tracing::info!(target: "standard_engine", address = ?local_addr, "listener closed");

        result
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, tls: Option<Arc<ServerConfig>>) {
        if let Err(e) = configure(&stream, &self.conn_limits) {
            tracing::debug!(target: "standard_engine", %peer, error = %e, "failed to configure socket");
            return;
        }

        let mut conn = HttpConnection::new(
            self.handler.clone(),
            self.conn_limits.clone(),
            self.req_limits.clone(),
            self.resp_limits.clone(),
        );

        let spawned = thread::Builder::new()
            .name("http-conn".into())
            .spawn(move || {
                let peer_info = Peer {
                    addr: Some(peer),
                    tls: tls.is_some(),
                };

                let result = match tls {
                    None => {
                        let mut stream = stream;
                        conn.run(&mut stream, peer_info)
                    }
                    Some(config) => serve_tls_stream(&mut conn, config, stream, peer_info),
                };

                if let Err(e) = result {
                    tracing::debug!(target: "standard_engine", %peer, error = %e, "connection closed with error");
                }
            });

        if let Err(e) = spawned {
            tracing::warn!(target: "standard_engine", %peer, error = %e, "failed to spawn connection thread");
        }
    }
}

fn serve_tls_stream(
    conn: &mut HttpConnection,
    config: Arc<ServerConfig>,
    stream: TcpStream,
    peer: Peer,
) -> io::Result<()> {
    let session = ServerConnection::new(config).map_err(io::Error::other)?;
    let mut stream = StreamOwned::new(session, stream);

    conn.run(&mut stream, peer)?;

    stream.conn.send_close_notify();
    stream.flush()
}

#[inline]
fn configure(stream: &TcpStream, limits: &ConnLimits) -> io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(limits.socket_read_timeout))?;
    stream.set_write_timeout(Some(limits.socket_write_timeout))
}

/// Accept errors that concern a single connection, not the listener.
#[inline]
pub(crate) fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
    )
}

/// Resolves a listen address. A bare `:port` listens on all interfaces.
pub(crate) fn resolve(address: &str) -> Result<SocketAddr, Error> {
    let full;
    let address_ref = match address.starts_with(':') {
        true => {
            full = format!("0.0.0.0{address}");
            full.as_str()
        }
        false => address,
    };

    address_ref
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| Error::Address(address.to_owned()))
}

/// Binds a listener with address reuse enabled.
pub(crate) fn bind(address: &str) -> Result<TcpListener, Error> {
    let addr = resolve(address)?;
    let bind_err = |source| Error::Bind {
        address: address.to_owned(),
        source,
    };

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

    Ok(socket.into())
}
