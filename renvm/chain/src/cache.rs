use std::{
    collections::HashMap,
    future::Future,
    sync::{PoisonError, RwLock},
};

/// Per-asset lookups memoized by a chain integration (token addresses,
/// decimals, gateway contracts...).
///
/// Each integration instance owns its own cache. The lock is never held
/// across an `.await`: two concurrent misses may both run the lookup, and
/// the first result to be inserted wins.
#[derive(Debug)]
pub struct AssetCache<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> Default for AssetCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> AssetCache<V>
where
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, asset: &str) -> Option<V> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(asset)
            .cloned()
    }

    pub fn insert(&self, asset: &str, value: V) -> V {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(asset.to_string())
            .or_insert(value)
            .clone()
    }

    pub async fn get_or_try_insert_with<F, Fut, E>(&self, asset: &str, lookup: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(asset) {
            return Ok(value);
        }

        let value = lookup().await?;

        Ok(self.insert(asset, value))
    }

    pub fn invalidate(&self, asset: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(asset);
    }
}
