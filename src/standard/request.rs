use crate::{
    engine,
    standard::{Header, Url},
    transport,
};
use http::{header, Method, Uri, Version};
use std::{net::SocketAddr, sync::OnceLock};

/// The engine request adapter over a transport request.
///
/// Holds the request-side [`Header`] and [`Url`] views while bound. Every
/// accessor reads the currently bound transport request; the decoded form
/// is cached until the adapter is rebound.
#[derive(Debug, Default)]
pub struct Request<'a> {
    native: Option<&'a transport::Request>,
    header: Header<'a>,
    url: Url<'a>,

    form: Vec<(String, String)>,
    form_parsed: bool,
}

fn unbound() -> &'static transport::Request {
    static EMPTY: OnceLock<transport::Request> = OnceLock::new();
    EMPTY.get_or_init(|| transport::Request::new(Method::GET, Uri::from_static("/")))
}

impl Request<'_> {
    /// Binds the adapter to `native` and the views already bound to its parts.
    #[inline]
    pub(crate) fn bind<'b>(
        self,
        native: &'b transport::Request,
        header: Header<'b>,
        url: Url<'b>,
    ) -> Request<'b> {
        let mut form = self.form;
        form.clear();

        Request {
            native: Some(native),
            header,
            url,
            form,
            form_parsed: false,
        }
    }

    /// Unbinds the adapter and hands back the views it held.
    #[inline]
    pub(crate) fn release(self) -> (Request<'static>, Header<'static>, Url<'static>) {
        let mut form = self.form;
        form.clear();

        let request = Request {
            native: None,
            header: Header::default(),
            url: Url::default(),
            form,
            form_parsed: false,
        };

        (request, self.header.release(), self.url.release())
    }

    #[inline]
    fn inner(&self) -> &transport::Request {
        match self.native {
            Some(native) => native,
            None => unbound(),
        }
    }

    fn is_form(&self) -> bool {
        self.inner()
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| {
                v.split(';')
                    .next()
                    .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
            })
    }

    fn parse_form(&mut self) {
        if self.form_parsed {
            return;
        }

        let mut form = std::mem::take(&mut self.form);
        form.clear();

        // Body fields first, then the query string.
        if self.is_form() {
            form.extend(
                url::form_urlencoded::parse(&self.inner().body).map(|(k, v)| (k.into_owned(), v.into_owned())),
            );
        }
        if let Some(query) = self.inner().uri.query() {
            form.extend(
                url::form_urlencoded::parse(query.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned())),
            );
        }

        self.form = form;
        self.form_parsed = true;
    }
}

impl engine::Request for Request<'_> {
    #[inline]
    fn is_tls(&self) -> bool {
        self.inner().tls
    }

    #[inline]
    fn scheme(&self) -> &str {
        match self.is_tls() {
            true => "https",
            false => "http",
        }
    }

    #[inline]
    fn host(&self) -> &str {
        self.inner().host().unwrap_or("")
    }

    #[inline]
    fn uri(&self) -> &str {
        let uri = &self.inner().uri;
        uri.path_and_query().map_or(uri.path(), |p| p.as_str())
    }

    #[inline]
    fn url(&mut self) -> &mut dyn engine::Url {
        &mut self.url
    }

    #[inline]
    fn header(&mut self) -> &mut dyn engine::Header {
        &mut self.header
    }

    #[inline]
    fn version(&self) -> Version {
        self.inner().version
    }

    #[inline]
    fn content_length(&self) -> u64 {
        self.inner().body.len() as u64
    }

    #[inline]
    fn user_agent(&self) -> &str {
        self.inner()
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    #[inline]
    fn remote_address(&self) -> Option<SocketAddr> {
        self.inner().remote_addr
    }

    #[inline]
    fn method(&self) -> &Method {
        &self.inner().method
    }

    #[inline]
    fn body(&self) -> &[u8] {
        &self.inner().body
    }

    fn form_value(&mut self, name: &str) -> Option<&str> {
        self.parse_form();
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn form_params(&mut self) -> &[(String, String)] {
        self.parse_form();
        &self.form
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.inner()
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim_matches('"'))
    }

    #[inline]
    fn native(&self) -> Option<&transport::Request> {
        self.native
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Request as _;
    use bytes::Bytes;

    fn native(method: Method, uri: &str) -> transport::Request {
        transport::Request::new(method, uri.parse().unwrap())
    }

    fn bind(native: &transport::Request) -> Request<'_> {
        Request::default().bind(
            native,
            Header::default().bind(&native.headers),
            Url::default().bind(&native.uri),
        )
    }

    #[test]
    fn accessors() {
        let mut source = native(Method::PUT, "/items/7?verbose=1");
        source.headers.insert(header::HOST, "api.example".parse().unwrap());
        source.headers.insert(header::USER_AGENT, "curl/8".parse().unwrap());
        source.body = Bytes::from_static(b"{}");
        source.remote_addr = Some("10.0.0.9:5000".parse().unwrap());
        source.tls = true;

        let mut rq = bind(&source);

        assert!(rq.is_tls());
        assert_eq!(rq.scheme(), "https");
        assert_eq!(rq.host(), "api.example");
        assert_eq!(rq.uri(), "/items/7?verbose=1");
        assert_eq!(rq.method(), Method::PUT);
        assert_eq!(rq.version(), Version::HTTP_11);
        assert_eq!(rq.content_length(), 2);
        assert_eq!(rq.body(), b"{}");
        assert_eq!(rq.user_agent(), "curl/8");
        assert_eq!(rq.remote_address(), Some("10.0.0.9:5000".parse().unwrap()));
        assert_eq!(rq.url().path(), "/items/7");
        assert_eq!(rq.url().query_param("verbose"), Some("1"));
        assert_eq!(rq.header().get("user-agent"), Some("curl/8"));
        assert!(std::ptr::eq(rq.native().unwrap(), &source));
    }

    #[test]
    fn request_headers_are_read_only() {
        let source = native(Method::GET, "/");
        let mut rq = bind(&source);

        assert_eq!(
            rq.header().set("x", "1"),
            Err(crate::errors::HeaderError::ReadOnly)
        );
    }

    #[test]
    fn form_body_and_query() {
        let mut source = native(Method::POST, "/submit?source=query&name=from-query");
        source.headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=utf-8".parse().unwrap(),
        );
        source.body = Bytes::from_static(b"name=Ada+Lovelace&lang=en");

        let mut rq = bind(&source);

        assert_eq!(rq.form_value("name"), Some("Ada Lovelace"));
        assert_eq!(rq.form_value("source"), Some("query"));
        assert_eq!(rq.form_value("lang"), Some("en"));
        assert_eq!(rq.form_params().len(), 4);
    }

    #[test]
    fn non_form_body_is_ignored() {
        let mut source = native(Method::POST, "/submit");
        source.headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        source.body = Bytes::from_static(b"name=ignored");

        let mut rq = bind(&source);
        assert_eq!(rq.form_value("name"), None);
    }

    #[test]
    fn cookies() {
        let mut source = native(Method::GET, "/");
        source.headers.append(header::COOKIE, "session=abc; theme=\"dark\"".parse().unwrap());
        source.headers.append(header::COOKIE, "lang=en".parse().unwrap());

        let rq = bind(&source);

        assert_eq!(rq.cookie("session"), Some("abc"));
        assert_eq!(rq.cookie("theme"), Some("dark"));
        assert_eq!(rq.cookie("lang"), Some("en"));
        assert_eq!(rq.cookie("missing"), None);
    }

    #[test]
    fn release_returns_views_unbound() {
        let source = native(Method::GET, "/first?a=1");
        let mut rq = bind(&source);
        assert_eq!(rq.form_value("a"), Some("1"));

        let (mut rq, header, url) = rq.release();
        assert!(!header.is_bound());
        assert!(!url.is_bound());
        assert!(rq.native().is_none());
        assert_eq!(rq.form_value("a"), None);
        assert_eq!(rq.uri(), "/");
    }

    #[test]
    fn rebind_sees_only_current_request() {
        let first = native(Method::GET, "/first?only_first=1");
        let mut second = native(Method::DELETE, "/second");
        second.headers.insert("x-second", "2".parse().unwrap());

        let mut rq = bind(&first);
        assert_eq!(rq.form_value("only_first"), Some("1"));
        let (rq, header, url) = rq.release();

        let mut rq = rq.bind(
            &second,
            header.bind(&second.headers),
            url.bind(&second.uri),
        );
        assert_eq!(rq.method(), Method::DELETE);
        assert_eq!(rq.url().path(), "/second");
        assert_eq!(rq.form_value("only_first"), None);
        assert_eq!(rq.header().get("x-second"), Some("2"));
    }
}
