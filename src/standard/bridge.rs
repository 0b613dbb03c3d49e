//! Bridges from the transport handler convention to the engine chain.

use crate::{
    engine::{Handle, HandlerError, Middleware, Request, Response},
    log::{Logger, TracingLogger},
    standard::with_adapters,
    transport::{self, ResponseWriter},
};
use crossbeam::atomic::AtomicCell;
use std::sync::Arc;

/// Runs a transport handler as an engine [`Handle`].
///
/// The handler receives the transport request and writer behind the
/// standard adapters and the result is always `Ok`. Adapters from another
/// engine implementation yield [`HandlerError::UnsupportedAdapter`].
///
/// # Examples
///
/// ```
/// use standard_engine::{
///     engine::Chain,
///     standard::wrap_handler,
///     transport::{Request, ResponseWriter},
/// };
///
/// let legacy = |w: &mut dyn ResponseWriter, r: &Request| {
///     let _ = w.write(r.uri.path().as_bytes());
/// };
/// let chain = Chain::new(wrap_handler(legacy));
/// # drop(chain);
/// ```
pub fn wrap_handler<H>(handler: H) -> impl Handle
where
    H: transport::Handler + 'static,
{
    move |rq: &mut dyn Request, rs: &mut dyn Response| -> Result<(), HandlerError> {
        let r = rq.native().ok_or(HandlerError::UnsupportedAdapter)?;
        let mut w = rs.native().ok_or(HandlerError::UnsupportedAdapter)?;

        handler.serve_http(&mut w, r);
        Ok(())
    }
}

/// Runs a transport middleware as an engine [`Middleware`].
///
/// For every request, the transport middleware wraps a throwaway handler
/// that calls the next engine handler and captures its error. The wrapped
/// handler then runs on the transport request and writer, and the captured
/// error (if any) is returned. A middleware that answers by itself and never
/// calls its inner handler yields `Ok(())` and the next handler never runs.
///
/// The next handler gets fresh adapters bound to whatever request and
/// writer the transport middleware passes down. They report to the logger of
/// the outer response.
pub fn wrap_middleware<M>(middleware: M) -> impl Middleware
where
    M: Fn(Arc<dyn transport::Handler>) -> Arc<dyn transport::Handler> + Send + Sync + 'static,
{
    let middleware = Arc::new(middleware);

    move |next: Arc<dyn Handle>| -> Arc<dyn Handle> {
        let middleware = middleware.clone();

        Arc::new(move |rq: &mut dyn Request, rs: &mut dyn Response| -> Result<(), HandlerError> {
            let logger = rs.logger().unwrap_or_else(|| Arc::new(TracingLogger));
            let r = rq.native().ok_or(HandlerError::UnsupportedAdapter)?;
            let mut w = rs.native().ok_or(HandlerError::UnsupportedAdapter)?;

            let captured = Arc::new(AtomicCell::new(None));
            let inner = Capture {
                next: next.clone(),
                captured: captured.clone(),
                logger,
            };

            middleware(Arc::new(inner)).serve_http(&mut w, r);

            match captured.take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }
}

/// The transport handler that forwards to the next engine handler.
struct Capture {
    next: Arc<dyn Handle>,
    captured: Arc<AtomicCell<Option<HandlerError>>>,
    logger: Arc<dyn Logger>,
}

impl transport::Handler for Capture {
    fn serve_http(&self, w: &mut dyn ResponseWriter, r: &transport::Request) {
        let result = with_adapters(r, w, self.logger.clone(), |rq, rs| self.next.handle(rq, rs));

        if let Err(err) = result {
            self.captured.store(Some(err));
        }
    }
}


#[cfg(test)]
mod middleware_tests {
    use super::*;
    use crate::{
        log::testing::RecordingLogger,
        standard::testing::{exchange, exchange_with},
    };
    use http::StatusCode;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn passthrough(next: Arc<dyn transport::Handler>) -> Arc<dyn transport::Handler> {
        Arc::new(move |w: &mut dyn ResponseWriter, r: &transport::Request| {
            w.header().insert("x-middleware", "seen".parse().unwrap());
            next.serve_http(w, r);
        })
    }

    fn deny(_: Arc<dyn transport::Handler>) -> Arc<dyn transport::Handler> {
        Arc::new(|w: &mut dyn ResponseWriter, _: &transport::Request| {
            let _ = w.write_header(StatusCode::UNAUTHORIZED);
        })
    }

    #[test]
    fn short_circuit_skips_next() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let next: Arc<dyn Handle> = Arc::new(move |_: &mut dyn Request, _: &mut dyn Response| -> Result<(), HandlerError> {
            flag.store(true, Ordering::SeqCst);
            Err(HandlerError::new(StatusCode::BAD_REQUEST, "should not surface"))
        });

        let handle = wrap_middleware(deny)(next);
        let w = exchange("/", |rq, rs| {
            assert!(handle.handle(rq, rs).is_ok());
        });

        assert!(!called.load(Ordering::SeqCst));
        assert_eq!(w.sink.status, Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn passes_through_and_propagates_error() {
        let next: Arc<dyn Handle> = Arc::new(|rq: &mut dyn Request, rs: &mut dyn Response| -> Result<(), HandlerError> {
            assert_eq!(rs.header().get("x-middleware"), Some("seen"));
            rs.write(rq.url().path().as_bytes())?;
            Err(HandlerError::new(StatusCode::CONFLICT, "after body"))
        });

        let handle = wrap_middleware(passthrough)(next);
        let w = exchange("/inner", |rq, rs| {
            let err = handle.handle(rq, rs).unwrap_err();
            assert_eq!(err.status(), StatusCode::CONFLICT);
            assert!(rs.committed());
        });

        assert_eq!(w.sink.head.unwrap()["x-middleware"], "seen");
        assert_eq!(w.sink.body, b"/inner");
    }

    #[test]
    fn ok_when_next_succeeds() {
        let next: Arc<dyn Handle> = Arc::new(|_: &mut dyn Request, rs: &mut dyn Response| -> Result<(), HandlerError> {
            rs.write(b"fine")?;
            Ok(())
        });

        let handle = wrap_middleware(passthrough)(next);
        let w = exchange("/", |rq, rs| assert!(handle.handle(rq, rs).is_ok()));

        assert_eq!(w.sink.body, b"fine");
    }

    #[test]
    fn inner_handler_reports_to_outer_logger() {
        let logger = Arc::new(RecordingLogger::default());
        let next: Arc<dyn Handle> = Arc::new(|_: &mut dyn Request, rs: &mut dyn Response| -> Result<(), HandlerError> {
            rs.write_header(StatusCode::CREATED)?;
            rs.write_header(StatusCode::OK)?;
            Ok(())
        });

        let handle = wrap_middleware(passthrough)(next);
        let w = exchange_with("/", logger.clone(), |rq, rs| {
            assert!(handle.handle(rq, rs).is_ok());
            assert_eq!(rs.status(), StatusCode::CREATED);
        });

        assert_eq!(w.sink.status, Some(StatusCode::CREATED));
        assert_eq!(logger.messages("warn"), ["response already committed"]);
    }

    #[test]
    fn outer_size_counts_inner_writes() {
        let next: Arc<dyn Handle> = Arc::new(|_: &mut dyn Request, rs: &mut dyn Response| -> Result<(), HandlerError> {
            rs.write(b"inner")?;
            Ok(())
        });

        let handle = wrap_middleware(passthrough)(next);
        exchange("/", |rq, rs| {
            assert!(handle.handle(rq, rs).is_ok());
            rs.write(b"+outer").unwrap();
            assert_eq!(rs.size(), 11);
        });
    }

    #[test]
    fn error_does_not_leak_between_requests() {
        let fail = Arc::new(AtomicBool::new(true));
        let toggle = fail.clone();
        let next: Arc<dyn Handle> = Arc::new(move |_: &mut dyn Request, _: &mut dyn Response| -> Result<(), HandlerError> {
            match toggle.swap(false, Ordering::SeqCst) {
                true => Err(HandlerError::new(StatusCode::GONE, "first only")),
                false => Ok(()),
            }
        });

        let handle = wrap_middleware(passthrough)(next);
        exchange("/", |rq, rs| assert!(handle.handle(rq, rs).is_err()));
        exchange("/", |rq, rs| assert!(handle.handle(rq, rs).is_ok()));
    }
}
