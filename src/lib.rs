//! standard_engine - pooled engine adapters over a blocking HTTP/1.x server
//!
//! Handlers are written once against the transport-agnostic [`engine`]
//! traits. The [`standard`] implementation runs them on a blocking,
//! thread-per-connection [`transport`], recycling every per-request adapter
//! object through bounded pools so steady-state traffic does not allocate
//! adapters.
//!
//! # Request Lifecycle
//!
//! For every request the server checks out a request adapter, a response
//! adapter, a response-writer shim, two header views and a URL view. It
//! binds them to the live transport objects, calls the configured
//! [`engine::Handler`], then resets them and checks them back in. Check-in
//! also happens when the handler panics.
//!
//! # Start-up
//!
//! - **Injected listener** - a pre-bound [`std::net::TcpListener`] in
//!   [`engine::Config::listener`] is served as is
//! - **TLS** - used when both the certificate and key files are configured
//! - **Plain HTTP** - everything else, bound to [`engine::Config::address`]
//!
//! # Bridges
//!
//! Code written for the transport's own handler convention keeps working:
//! [`standard::wrap_handler`] turns a [`transport::Handler`] into an engine
//! [`engine::Handle`], and [`standard::wrap_middleware`] does the same for
//! transport middleware.
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use standard_engine::{
//!     engine::{Request, Response, Server as _},
//!     standard::Server,
//! };
//! use std::sync::Arc;
//!
//! let mut server = Server::new(":8080");
//! server.set_handler(Arc::new(|rq: &mut dyn Request, rs: &mut dyn Response| {
//!     let _ = rs.header().set("content-type", "text/plain");
//!     let _ = rs.write(rq.url().path().as_bytes());
//! }));
//! server.start().unwrap();
//! ```
//! A chain with middleware and a legacy handler:
//! ```no_run
//! use standard_engine::{
//!     engine::{Chain, Config, Server as _},
//!     limits::{ConnLimits, PoolLimits},
//!     standard::{wrap_handler, wrap_middleware, Server},
//!     transport::{Handler, Request, ResponseWriter},
//! };
//! use http::StatusCode;
//! use std::{sync::Arc, time::Duration};
//!
//! let legacy = |w: &mut dyn ResponseWriter, r: &Request| {
//!     let _ = w.write(r.uri.path().as_bytes());
//! };
//! let auth = |next: Arc<dyn Handler>| -> Arc<dyn Handler> {
//!     Arc::new(move |w: &mut dyn ResponseWriter, r: &Request| {
//!         match r.headers.contains_key("authorization") {
//!             true => next.serve_http(w, r),
//!             false => {
//!                 let _ = w.write_header(StatusCode::UNAUTHORIZED);
//!             }
//!         }
//!     })
//! };
//!
//! let mut server = Server::from_config(Config {
//!     address: "127.0.0.1:8080".into(),
//!     connection_limits: ConnLimits {
//!         socket_read_timeout: Duration::from_secs(5),
//!         ..ConnLimits::default()
//!     },
//!     pool_limits: PoolLimits {
//!         capacity: 512,
//!         ..PoolLimits::default()
//!     },
//!     ..Config::default()
//! });
//! server.set_handler(Arc::new(Chain::new(wrap_handler(legacy)).wrap(wrap_middleware(auth))));
//! server.start().unwrap();
//! ```

pub mod engine;
pub mod errors;
pub mod limits;
pub mod log;
pub mod standard;
pub mod transport;

pub use errors::{Error, HeaderError};
