//! The engine adapter over the blocking [`transport`](crate::transport).
//!
//! For every request the [`Server`] checks out six pooled objects (request,
//! response, response-writer shim, two header views, one URL view), binds
//! them to the live transport request and writer, calls the engine handler,
//! and checks every object back in, also when the handler panics.
//!
//! Binding is explicit: a pooled object is stored unbound with a `'static`
//! lifetime, and binding consumes it and returns a value borrowing the live
//! request. Releasing consumes it again, so a pooled object can never keep a
//! reference to a finished request.

mod bridge;
mod header;
mod pool;
mod request;
mod response;
mod server;
mod url;

pub use bridge::{wrap_handler, wrap_middleware};
pub use header::Header;
pub use pool::{KindStats, PoolStats};
pub use request::Request;
pub use response::{Response, ResponseAdapter};
pub use server::Server;
pub use self::url::Url;

use crate::{engine, log::Logger, transport};
use std::sync::Arc;

/// Runs `f` with fresh, unpooled adapters bound to `r` and `w`.
pub(crate) fn with_adapters<R>(
    r: &transport::Request,
    w: &mut dyn transport::ResponseWriter,
    logger: Arc<dyn Logger>,
    f: impl FnOnce(&mut dyn engine::Request, &mut dyn engine::Response) -> R,
) -> R {
    let (headers, sink) = w.parts();

    let mut rq = Request::default().bind(r, Header::default().bind(&r.headers), Url::default().bind(&r.uri));
    let mut rs = Response::default().bind(
        ResponseAdapter::default().bind(sink),
        Header::default().bind_mut(headers),
        logger,
    );

    f(&mut rq, &mut rs)
}
