use crate::{
    limits::PoolLimits,
    standard::{Header, Request, Response, ResponseAdapter, Url},
};
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A lock-free reuse pool for one kind of object.
///
/// `checkout` never blocks: an empty pool manufactures a fresh instance with
/// the factory. `checkin` never blocks either: a full pool drops the
/// returned instance. Pooled values must already be in their unbound state.
pub(crate) struct Pool<T> {
    store: ArrayQueue<T>,
    factory: fn() -> T,
    created: AtomicUsize,
}

impl<T> Pool<T> {
    #[inline]
    pub(crate) fn new(capacity: usize, factory: fn() -> T) -> Self {
        Self {
            store: ArrayQueue::new(capacity.max(1)),
            factory,
            created: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn checkout(&self) -> T {
        match self.store.pop() {
            Some(value) => value,
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                (self.factory)()
            }
        }
    }

    #[inline]
    pub(crate) fn checkin(&self, value: T) {
        // Full pool: let the instance go.
        let _ = self.store.push(value);
    }

    /// Manufactures up to `count` instances ahead of time.
    pub(crate) fn prewarm(&self, count: usize) {
        for _ in 0..count.min(self.store.capacity()) {
            self.created.fetch_add(1, Ordering::Relaxed);
            if self.store.push((self.factory)()).is_err() {
                break;
            }
        }
    }

    #[inline]
    pub(crate) fn idle(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    #[inline]
    fn stats(&self) -> KindStats {
        KindStats {
            created: self.created(),
            idle: self.idle(),
        }
    }
}

/// The five reuse pools of one server.
pub(crate) struct Pools {
    pub(crate) request: Pool<Request<'static>>,
    pub(crate) response: Pool<Response<'static>>,
    pub(crate) response_adapter: Pool<ResponseAdapter<'static>>,
    pub(crate) header: Pool<Header<'static>>,
    pub(crate) url: Pool<Url<'static>>,
}

impl Pools {
    pub(crate) fn new(limits: &PoolLimits) -> Self {
        let pools = Self {
            request: Pool::new(limits.capacity, Request::default),
            response: Pool::new(limits.capacity, Response::default),
            response_adapter: Pool::new(limits.capacity, ResponseAdapter::default),
            header: Pool::new(limits.capacity.saturating_mul(2), Header::default),
            url: Pool::new(limits.capacity, Url::default),
        };

        pools.request.prewarm(limits.prewarm);
        pools.response.prewarm(limits.prewarm);
        pools.response_adapter.prewarm(limits.prewarm);
        pools.header.prewarm(limits.prewarm.saturating_mul(2));
        pools.url.prewarm(limits.prewarm);

        pools
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            request: self.request.stats(),
            response: self.response.stats(),
            response_adapter: self.response_adapter.stats(),
            header: self.header.stats(),
            url: self.url.stats(),
        }
    }
}

/// Counters for one pool kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindStats {
    /// Instances manufactured since the server was built.
    pub created: usize,
    /// Instances currently waiting in the pool.
    pub idle: usize,
}

/// A snapshot of every reuse pool of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub request: KindStats,
    pub response: KindStats,
    pub response_adapter: KindStats,
    pub header: KindStats,
    pub url: KindStats,
}
