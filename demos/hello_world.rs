use standard_engine::{
    engine::{Chain, HandlerError, Request, Response, Server as _},
    standard::{wrap_middleware, Server},
    transport::{self, ResponseWriter},
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn hello(rq: &mut dyn Request, rs: &mut dyn Response) -> Result<(), HandlerError> {
    let name = rq.form_value("name").unwrap_or("world").to_owned();

    rs.header().set("content-type", "text/plain")?;
    rs.write(format!("Hello, {name}!").as_bytes())?;
    Ok(())
}

fn powered_by(next: Arc<dyn transport::Handler>) -> Arc<dyn transport::Handler> {
    Arc::new(move |w: &mut dyn ResponseWriter, r: &transport::Request| {
        w.header().insert("x-powered-by", "standard_engine".parse().unwrap());
        next.serve_http(w, r);
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut server = Server::new("127.0.0.1:8080");
    server.set_handler(Arc::new(Chain::new(hello).wrap(wrap_middleware(powered_by))));

    if let Err(err) = server.start() {
        tracing::error!("server stopped: {err}");
    }
}
