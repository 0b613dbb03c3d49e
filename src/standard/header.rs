use crate::{engine, errors::HeaderError};
use http::{
    header::{HeaderName, HeaderValue},
    HeaderMap,
};

#[derive(Debug, Default)]
enum Source<'a> {
    #[default]
    Unbound,
    Shared(&'a HeaderMap),
    Exclusive(&'a mut HeaderMap),
}

/// A view over a header map owned by the transport.
///
/// The view never copies header data. A request view is bound read-only;
/// a response view is bound mutably and locked once the response commits.
/// Rebinding with [`Header::bind`] or [`Header::bind_mut`] consumes the view,
/// so no reference to the previous map can survive a reset.
#[derive(Debug, Default)]
pub struct Header<'a> {
    source: Source<'a>,
    locked: bool,

    keys: Vec<String>,
    keys_valid: bool,
}

impl Header<'_> {
    /// Binds the view read-only to `map`, dropping any previous binding and cache.
    #[inline]
    pub(crate) fn bind<'b>(self, map: &'b HeaderMap) -> Header<'b> {
        self.rebind(Source::Shared(map))
    }

    /// Binds the view read-write to `map`, dropping any previous binding and cache.
    #[inline]
    pub(crate) fn bind_mut<'b>(self, map: &'b mut HeaderMap) -> Header<'b> {
        self.rebind(Source::Exclusive(map))
    }

    /// Returns the unbound view, ready for the pool.
    #[inline]
    pub(crate) fn release(self) -> Header<'static> {
        self.rebind(Source::Unbound)
    }

    #[inline]
    fn rebind<'b>(self, source: Source<'b>) -> Header<'b> {
        let mut keys = self.keys;
        keys.clear();

        Header {
            source,
            locked: false,
            keys,
            keys_valid: false,
        }
    }

    /// Freezes the view: every later mutation fails with [`HeaderError::Committed`].
    #[inline]
    pub(crate) fn lock(&mut self) {
        self.locked = true;
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn is_bound(&self) -> bool {
        !matches!(self.source, Source::Unbound)
    }

    /// The bound header map, if any.
    #[inline]
    pub(crate) fn headers(&self) -> Option<&HeaderMap> {
        self.map()
    }

    /// The bound map when bound read-write, regardless of the lock.
    ///
    /// The caller may change the map behind the view, so the key cache is dropped.
    #[inline]
    pub(crate) fn exclusive(&mut self) -> Option<&mut HeaderMap> {
        match &mut self.source {
            Source::Exclusive(map) => {
                self.keys_valid = false;
                Some(&mut **map)
            }
            _ => None,
        }
    }

    #[inline]
    fn map(&self) -> Option<&HeaderMap> {
        match &self.source {
            Source::Unbound => None,
            Source::Shared(map) => Some(*map),
            Source::Exclusive(map) => Some(&**map),
        }
    }

    #[inline]
    fn map_mut(&mut self) -> Result<&mut HeaderMap, HeaderError> {
        if self.locked {
            return Err(HeaderError::Committed);
        }

        match &mut self.source {
            Source::Unbound => Err(HeaderError::Unbound),
            Source::Shared(_) => Err(HeaderError::ReadOnly),
            Source::Exclusive(map) => {
                self.keys_valid = false;
                Ok(&mut **map)
            }
        }
    }
}

#[inline]
fn parse(key: &str, value: &str) -> Result<(HeaderName, HeaderValue), HeaderError> {
    let name = HeaderName::from_bytes(key.as_bytes())
        .map_err(|_| HeaderError::InvalidName(key.to_owned()))?;
    let value = HeaderValue::from_str(value).map_err(|_| HeaderError::InvalidValue(key.to_owned()))?;

    Ok((name, value))
}

impl engine::Header for Header<'_> {
    #[inline]
    fn get(&self, key: &str) -> Option<&str> {
        self.map()?.get(key)?.to_str().ok()
    }

    #[inline]
    fn contains(&self, key: &str) -> bool {
        self.map().is_some_and(|map| map.contains_key(key))
    }

    fn keys(&mut self) -> &[String] {
        if !self.keys_valid {
            let mut keys = std::mem::take(&mut self.keys);
            keys.clear();
            if let Some(map) = self.map() {
                keys.extend(map.keys().map(|k| k.as_str().to_owned()));
            }

            self.keys = keys;
            self.keys_valid = true;
        }

        &self.keys
    }

    #[inline]
    fn len(&self) -> usize {
        self.map().map_or(0, HeaderMap::len)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HeaderError> {
        let map = self.map_mut()?;
        let (name, value) = parse(key, value)?;
        map.insert(name, value);
        Ok(())
    }

    fn add(&mut self, key: &str, value: &str) -> Result<(), HeaderError> {
        let map = self.map_mut()?;
        let (name, value) = parse(key, value)?;
        map.append(name, value);
        Ok(())
    }

    fn del(&mut self, key: &str) -> Result<(), HeaderError> {
        let map = self.map_mut()?;
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| HeaderError::InvalidName(key.to_owned()))?;
        map.remove(name);
        Ok(())
    }
}
