use crate::engine;
use http::Uri;

/// A view over the request URI owned by the transport.
///
/// Query parameters are decoded on first access and cached until the view is
/// rebound.
#[derive(Debug, Default)]
pub struct Url<'a> {
    uri: Option<&'a Uri>,

    query: Vec<(String, String)>,
    query_parsed: bool,
}

impl Url<'_> {
    /// Binds the view to `uri`, dropping any previous binding and cache.
    #[inline]
    pub(crate) fn bind<'b>(self, uri: &'b Uri) -> Url<'b> {
        self.rebind(Some(uri))
    }

    #[inline]
    pub(crate) fn release(self) -> Url<'static> {
        self.rebind(None)
    }

    #[inline]
    fn rebind<'b>(self, uri: Option<&'b Uri>) -> Url<'b> {
        let mut query = self.query;
        query.clear();

        Url {
            uri,
            query,
            query_parsed: false,
        }
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn is_bound(&self) -> bool {
        self.uri.is_some()
    }

    fn parse_query(&mut self) {
        if self.query_parsed {
            return;
        }

        self.query.clear();
        if let Some(query) = self.uri.and_then(Uri::query) {
            self.query.extend(
                url::form_urlencoded::parse(query.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned())),
            );
        }
        self.query_parsed = true;
    }
}

impl engine::Url for Url<'_> {
    #[inline]
    fn path(&self) -> &str {
        self.uri.map_or("", Uri::path)
    }

    #[inline]
    fn raw_query(&self) -> &str {
        self.uri.and_then(Uri::query).unwrap_or("")
    }

    fn query_param(&mut self, name: &str) -> Option<&str> {
        self.parse_query();
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn query_params(&mut self) -> &[(String, String)] {
        self.parse_query();
        &self.query
    }
}
