use {
    crate::Chain,
    std::{collections::BTreeMap, sync::Arc},
};

/// Chain integrations available to the engine, keyed by chain name.
#[derive(Default, Clone)]
pub struct ChainRegistry {
    chains: BTreeMap<String, Arc<dyn Chain>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chain under its own name, replacing any previous
    /// integration with that name.
    pub fn register<C>(&mut self, chain: C) -> &mut Self
    where
        C: Chain + 'static,
    {
        self.insert(Arc::new(chain))
    }

    pub fn insert(&mut self, chain: Arc<dyn Chain>) -> &mut Self {
        self.chains.insert(chain.name().to_string(), chain);
        self
    }

    pub fn with<C>(mut self, chain: C) -> Self
    where
        C: Chain + 'static,
    {
        self.register(chain);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Chain>> {
        self.chains.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
