use crate::{
    engine,
    log::Logger,
    standard::Header,
    transport::{BorrowedWriter, Sink},
};
use http::{HeaderMap, StatusCode};
use std::{io, sync::Arc};

// SECTION: writer shim

/// Forwards writes to the transport sink and tracks the commit state.
///
/// Uncommitted until the head is sent, committed afterwards. The head is
/// sent at most once; body bytes flow straight to the sink.
pub struct ResponseAdapter<'a> {
    sink: Option<&'a mut dyn Sink>,
    status: StatusCode,
    size: u64,
    committed: bool,
}

impl Default for ResponseAdapter<'_> {
    #[inline]
    fn default() -> Self {
        Self {
            sink: None,
            status: StatusCode::OK,
            size: 0,
            committed: false,
        }
    }
}

impl std::fmt::Debug for ResponseAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseAdapter")
            .field("bound", &self.sink.is_some())
            .field("status", &self.status)
            .field("size", &self.size)
            .field("committed", &self.committed)
            .finish()
    }
}

impl ResponseAdapter<'_> {
    #[inline]
    pub(crate) fn bind<'b>(self, sink: &'b mut dyn Sink) -> ResponseAdapter<'b> {
        ResponseAdapter {
            sink: Some(sink),
            ..ResponseAdapter::default()
        }
    }

    #[inline]
    pub(crate) fn release(self) -> ResponseAdapter<'static> {
        ResponseAdapter::default()
    }

    #[inline]
    pub(crate) fn is_bound(&self) -> bool {
        self.sink.is_some()
    }

    /// Committed by this shim, or by anyone else writing to the same sink.
    #[inline]
    pub(crate) fn committed(&self) -> bool {
        self.committed || self.sink.as_ref().is_some_and(|sink| sink.committed())
    }

    /// Sends the head. Returns `false` if the response was already committed.
    pub(crate) fn commit(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<bool> {
        if self.committed() {
            self.committed = true;
            return Ok(false);
        }

        self.sink_mut()?.write_head(status, headers)?;
        self.status = status;
        self.committed = true;

        Ok(true)
    }

    #[inline]
    pub(crate) fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.sink_mut()?.write_body(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    #[inline]
    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.sink_mut()?.flush()
    }

    #[inline]
    fn sink_mut(&mut self) -> io::Result<&mut dyn Sink> {
        match self.sink {
            Some(ref mut sink) => Ok(&mut **sink),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "response is not bound")),
        }
    }
}

/// Native code writing through the shim keeps its status and size current.
impl Sink for ResponseAdapter<'_> {
    #[inline]
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        self.commit(status, headers).map(|_| ())
    }

    #[inline]
    fn write_body(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }

    #[inline]
    fn committed(&self) -> bool {
        ResponseAdapter::committed(self)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        ResponseAdapter::flush(self)
    }
}

// SECTION: response adapter

/// The engine response adapter.
///
/// Owns the writer shim and the response-side [`Header`] view while bound.
/// Once the response commits, the header view is locked and further
/// mutations fail with [`HeaderError::Committed`](crate::errors::HeaderError::Committed).
#[derive(Default)]
pub struct Response<'a> {
    adapter: ResponseAdapter<'a>,
    header: Header<'a>,
    logger: Option<Arc<dyn Logger>>,
}

impl std::fmt::Debug for Response<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("adapter", &self.adapter)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl Response<'_> {
    #[inline]
    pub(crate) fn bind<'b>(
        self,
        adapter: ResponseAdapter<'b>,
        header: Header<'b>,
        logger: Arc<dyn Logger>,
    ) -> Response<'b> {
        Response {
            adapter,
            header,
            logger: Some(logger),
        }
    }

    /// Unbinds the adapter and hands back the shim and header view it held.
    #[inline]
    pub(crate) fn release(self) -> (Response<'static>, ResponseAdapter<'static>, Header<'static>) {
        (
            Response::default(),
            self.adapter.release(),
            self.header.release(),
        )
    }

    #[inline]
    fn warn(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.warn(message);
        }
    }
}

impl engine::Response for Response<'_> {
    #[inline]
    fn header(&mut self) -> &mut dyn engine::Header {
        if self.adapter.committed() {
            self.header.lock();
        }
        &mut self.header
    }

    fn write_header(&mut self, status: StatusCode) -> io::Result<()> {
        let empty = HeaderMap::new();
        let headers = self.header.headers().unwrap_or(&empty);

        let sent = self.adapter.commit(status, headers)?;
        self.header.lock();

        if !sent {
            self.warn("response already committed");
        }
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.adapter.committed() {
            self.write_header(StatusCode::OK)?;
        }
        self.adapter.write(buf)
    }

    #[inline]
    fn status(&self) -> StatusCode {
        self.adapter.status
    }

    #[inline]
    fn size(&self) -> u64 {
        self.adapter.size
    }

    #[inline]
    fn committed(&self) -> bool {
        self.adapter.committed()
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        self.adapter.flush()
    }

    fn native(&mut self) -> Option<BorrowedWriter<'_>> {
        if !self.adapter.is_bound() {
            return None;
        }
        let headers = self.header.exclusive()?;

        Some(BorrowedWriter::new(headers, &mut self.adapter))
    }

    #[inline]
    fn logger(&self) -> Option<Arc<dyn Logger>> {
        self.logger.clone()
    }
}

#[cfg(test)]
mod shim_tests {
    use super::*;
    use crate::transport::testing::RecordingSink;

    #[test]
    fn commit_once() {
        let mut sink = RecordingSink::default();
        let mut shim = ResponseAdapter::default().bind(&mut sink);

        assert!(!shim.committed());
        assert!(shim.commit(StatusCode::ACCEPTED, &HeaderMap::new()).unwrap());
        assert!(shim.committed());
        assert!(!shim.commit(StatusCode::OK, &HeaderMap::new()).unwrap());
        assert_eq!(shim.status, StatusCode::ACCEPTED);

        shim.write(b"abc").unwrap();
        shim.write(b"de").unwrap();
        assert_eq!(shim.size, 5);

        drop(shim);
        assert_eq!(sink.head_writes, 1);
        assert_eq!(sink.body, b"abcde");
    }

    #[test]
    fn unbound_shim() {
        let mut shim = ResponseAdapter::default();

        assert!(!shim.is_bound());
        assert!(!shim.committed());
        assert_eq!(
            shim.write(b"x").unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
    }

    #[test]
    fn release_resets_state() {
        let mut sink = RecordingSink::default();
        let mut shim = ResponseAdapter::default().bind(&mut sink);
        shim.commit(StatusCode::NOT_FOUND, &HeaderMap::new()).unwrap();
        shim.write(b"gone").unwrap();

        let shim = shim.release();
        assert!(!shim.is_bound());
        assert!(!shim.committed());
        assert_eq!(shim.status, StatusCode::OK);
        assert_eq!(shim.size, 0);
    }

    #[test]
    fn sees_foreign_commit() {
        let mut sink = RecordingSink::default();
        sink.write_head(StatusCode::OK, &HeaderMap::new()).unwrap();

        let shim = ResponseAdapter::default().bind(&mut sink);
        assert!(shim.committed());
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use crate::{
        engine::Response as _, errors::HeaderError, log::testing::RecordingLogger,
        transport::{testing::RecordingSink, ResponseWriter},
    };

    struct Fixture {
        headers: HeaderMap,
        sink: RecordingSink,
        logger: Arc<RecordingLogger>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                headers: HeaderMap::new(),
                sink: RecordingSink::default(),
                logger: Arc::new(RecordingLogger::default()),
            }
        }

        fn response(&mut self) -> Response<'_> {
            Response::default().bind(
                ResponseAdapter::default().bind(&mut self.sink),
                Header::default().bind_mut(&mut self.headers),
                self.logger.clone(),
            )
        }
    }

    #[test]
    fn headers_then_body() {
        let mut fx = Fixture::new();
        let mut rs = fx.response();

        assert!(!rs.committed());
        rs.header().set("content-type", "text/plain").unwrap();
        assert_eq!(rs.write(b"hi").unwrap(), 2);

        assert!(rs.committed());
        assert_eq!(rs.status(), StatusCode::OK);
        assert_eq!(rs.size(), 2);
        drop(rs);

        assert_eq!(fx.sink.status, Some(StatusCode::OK));
        assert_eq!(fx.sink.head.unwrap()["content-type"], "text/plain");
        assert_eq!(fx.sink.body, b"hi");
    }

    #[test]
    fn header_rejected_after_commit() {
        let mut fx = Fixture::new();
        let mut rs = fx.response();

        rs.header().set("x-early", "1").unwrap();
        rs.write(b"body").unwrap();

        assert_eq!(rs.header().set("x-late", "1"), Err(HeaderError::Committed));
        assert_eq!(rs.header().get("x-early"), Some("1"));
        rs.write(b" more").unwrap();
        drop(rs);

        let head = fx.sink.head.unwrap();
        assert!(!head.contains_key("x-late"));
        assert_eq!(fx.sink.body, b"body more");
    }

    #[test]
    fn repeated_write_header_warns() {
        let mut fx = Fixture::new();
        let mut rs = fx.response();

        rs.write_header(StatusCode::CREATED).unwrap();
        rs.write_header(StatusCode::INTERNAL_SERVER_ERROR).unwrap();
        assert_eq!(rs.status(), StatusCode::CREATED);
        drop(rs);

        assert_eq!(fx.sink.head_writes, 1);
        assert_eq!(fx.logger.messages("warn"), ["response already committed"]);
    }

    #[test]
    fn native_writer_shares_state() {
        let mut fx = Fixture::new();
        let mut rs = fx.response();

        {
            let mut w = rs.native().unwrap();
            w.header().insert("x-native", "yes".parse().unwrap());
            w.write(b"from native").unwrap();
        }

        assert!(rs.committed());
        assert_eq!(rs.header().set("x-after", "1"), Err(HeaderError::Committed));
        drop(rs);

        assert_eq!(fx.sink.head.unwrap()["x-native"], "yes");
        assert_eq!(fx.sink.body, b"from native");
    }

    #[test]
    fn native_writes_update_status_and_size() {
        let mut fx = Fixture::new();
        let mut rs = fx.response();

        {
            let mut w = rs.native().unwrap();
            w.write_header(StatusCode::IM_A_TEAPOT).unwrap();
            w.write(b"short and stout").unwrap();
        }

        assert_eq!(rs.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(rs.size(), 15);
        rs.write(b"!").unwrap();
        assert_eq!(rs.size(), 16);
        drop(rs);

        assert_eq!(fx.sink.head_writes, 1);
        assert_eq!(fx.sink.body, b"short and stout!");
    }

    #[test]
    fn keys_follow_native_changes() {
        let mut fx = Fixture::new();
        let mut rs = fx.response();

        rs.header().set("x-a", "1").unwrap();
        assert_eq!(rs.header().keys(), ["x-a"]);

        rs.native()
            .unwrap()
            .header()
            .insert("x-native", "1".parse().unwrap());

        assert!(rs.header().contains("x-native"));
        assert_eq!(rs.header().keys().len(), 2);
    }

    #[test]
    fn exposes_its_logger() {
        let mut fx = Fixture::new();
        let rs = fx.response();

        rs.logger().unwrap().warn("through the adapter");
        drop(rs);

        assert_eq!(fx.logger.messages("warn"), ["through the adapter"]);
    }

    #[test]
    fn release_returns_parts_unbound() {
        let mut fx = Fixture::new();
        let mut rs = fx.response();
        rs.write(b"x").unwrap();

        let (mut rs, shim, header) = rs.release();
        assert!(!shim.is_bound());
        assert!(!header.is_bound());
        assert!(!rs.committed());
        assert_eq!(rs.size(), 0);
        assert!(rs.native().is_none());
    }
}
