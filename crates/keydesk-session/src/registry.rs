use keydesk::protocol::SignerSummary;
use keydesk_signer::SignerBackend;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Connected signing backends, keyed by backend id.
#[derive(Default)]
pub struct SignerRegistry {
    signers: HashMap<String, Arc<dyn SignerBackend>>,
}

impl SignerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a backend, replacing any previous backend with the same id.
    pub fn insert(&mut self, backend: Arc<dyn SignerBackend>) -> Option<Arc<dyn SignerBackend>> {
        self.signers.insert(backend.id(), backend)
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<dyn SignerBackend>> {
        self.signers.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn SignerBackend>> {
        self.signers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.signers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    /// Summaries of every backend that is ready to be offered to callers.
    pub fn summaries(&self) -> BTreeMap<String, SignerSummary> {
        self.signers
            .iter()
            .map(|(id, signer)| (id.clone(), signer.summary()))
            .filter(|(_, summary)| summary.is_ready())
            .collect()
    }
}
