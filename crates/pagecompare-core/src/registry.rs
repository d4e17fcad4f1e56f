//! Content-addressed registry of rendering variants.
//!
//! Maps each [`HashId`] to the [`VariantDescriptor`] it was derived
//! from. Workers register the variants they render; the compare step
//! walks every known identifier. The registry is append-only during a
//! run and persisted in full at the end.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::variant::{HashId, VariantDescriptor};

/// Thread-safe map from [`HashId`] to [`VariantDescriptor`].
#[derive(Debug, Default)]
pub struct VariantRegistry {
    entries: Mutex<BTreeMap<HashId, VariantDescriptor>>,
}

impl VariantRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor and return its identifier.
    ///
    /// The fingerprint is computed before the lock is taken; only the
    /// check-and-insert runs under it. Registering an equal descriptor
    /// again returns the same identifier and leaves the registry
    /// unchanged.
    pub fn register(&self, descriptor: &VariantDescriptor) -> HashId {
        let id = descriptor.hash_id();
        self.lock()
            .entry(id.clone())
            .or_insert_with(|| descriptor.clone());
        id
    }

    /// Number of registered variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// A point-in-time copy of every entry, sorted by identifier.
    ///
    /// Callers iterate the copy so no lock is held across file I/O.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<HashId, VariantDescriptor> {
        self.lock().clone()
    }

    /// Merge previously persisted entries into the registry.
    ///
    /// Returns the number of entries that were not already present.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] for malformed JSON and
    /// [`RegistryError::FingerprintMismatch`] if a key is not the
    /// fingerprint of its descriptor. Nothing is merged on error.
    pub fn merge_json(&self, json: &str) -> Result<usize, RegistryError> {
        let loaded: BTreeMap<HashId, VariantDescriptor> = serde_json::from_str(json)?;
        for (id, descriptor) in &loaded {
            if descriptor.hash_id() != *id {
                return Err(RegistryError::FingerprintMismatch {
                    id: id.clone(),
                    descriptor: descriptor.clone(),
                });
            }
        }

        let mut entries = self.lock();
        let before = entries.len();
        entries.extend(loaded);
        Ok(entries.len() - before)
    }

    /// Serialize the full map as a JSON object keyed by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] if serialization fails.
    pub fn to_json(&self) -> Result<String, RegistryError> {
        Ok(serde_json::to_string_pretty(&*self.lock())?)
    }

    /// Recovers the map from a poisoned lock; inserts are never partial.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<HashId, VariantDescriptor>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Errors from loading or saving a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry JSON could not be parsed or produced.
    #[error("malformed variant registry: {0}")]
    Parse(#[from] serde_json::Error),

    /// A persisted key does not match its descriptor's fingerprint.
    #[error("registry key {id} does not match the fingerprint of {descriptor}")]
    FingerprintMismatch {
        /// The persisted key.
        id: HashId,
        /// The descriptor stored under it.
        descriptor: VariantDescriptor,
    },
}
