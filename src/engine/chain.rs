use crate::{
    engine::{Handler, Request, Response},
    errors::HeaderError,
    log::{Logger, TracingLogger},
};
use http::StatusCode;
use std::{error::Error as StdError, io, sync::Arc};
use thiserror::Error;

/// Error returned by a [`Handle`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HandlerError {
    /// Answer with `status` and `message`.
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Header(#[from] HeaderError),

    /// A bridge needed the transport objects, but the request or response
    /// was not produced by the standard adapters.
    #[error("request or response is not backed by the standard transport")]
    UnsupportedAdapter,

    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync>),
}

impl HandlerError {
    #[inline]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Status used to answer a still-uncommitted response.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The error-returning handler convention used inside a [`Chain`].
pub trait Handle: Send + Sync {
    fn handle(&self, rq: &mut dyn Request, rs: &mut dyn Response) -> Result<(), HandlerError>;
}

impl<F> Handle for F
where
    F: Fn(&mut dyn Request, &mut dyn Response) -> Result<(), HandlerError> + Send + Sync,
{
    #[inline]
    fn handle(&self, rq: &mut dyn Request, rs: &mut dyn Response) -> Result<(), HandlerError> {
        self(rq, rs)
    }
}

/// Wraps one [`Handle`] into another.
pub trait Middleware: Fn(Arc<dyn Handle>) -> Arc<dyn Handle> + Send + Sync {}

impl<F> Middleware for F where F: Fn(Arc<dyn Handle>) -> Arc<dyn Handle> + Send + Sync {}

/// An endpoint plus its middleware, usable as a server [`Handler`].
///
/// Middleware added last runs first. An error escaping the chain is logged;
/// if nothing was written yet, the response gets the error's status and
/// message.
///
/// # Examples
///
/// ```
/// use standard_engine::engine::{Chain, Handle, HandlerError, Request, Response};
/// use std::sync::Arc;
///
/// fn hello(_: &mut dyn Request, rs: &mut dyn Response) -> Result<(), HandlerError> {
///     rs.write(b"hello")?;
///     Ok(())
/// }
///
/// let chain = Chain::new(hello).wrap(|next: Arc<dyn Handle>| -> Arc<dyn Handle> {
///     Arc::new(move |rq: &mut dyn Request, rs: &mut dyn Response| {
///         rs.header().set("x-powered-by", "chain")?;
///         next.handle(rq, rs)
///     })
/// });
/// # drop(chain);
/// ```
pub struct Chain {
    handler: Arc<dyn Handle>,
    logger: Arc<dyn Logger>,
}

impl Chain {
    pub fn new(endpoint: impl Handle + 'static) -> Self {
        Self {
            handler: Arc::new(endpoint),
            logger: Arc::new(TracingLogger),
        }
    }

    #[inline]
    pub fn wrap(mut self, middleware: impl Middleware) -> Self {
        self.handler = middleware(self.handler);
        self
    }

    #[inline]
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }
}

impl Handler for Chain {
    fn serve(&self, rq: &mut dyn Request, rs: &mut dyn Response) {
        let Err(err) = self.handler.handle(rq, rs) else {
            return;
        };

        self.logger
            .error(&format!("{} {}: {err}", rq.method(), rq.uri()));

        if !rs.committed() {
            let body = err.to_string();
            let _ = rs.header().set("content-type", "text/plain; charset=utf-8");
            let _ = rs.write_header(err.status());
            let _ = rs.write(body.as_bytes());
        }
    }
}
