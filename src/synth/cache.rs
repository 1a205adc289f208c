use super::synthesizer::{SynthesizedType, TypeSynthesizer};
use crate::catalog::{CatalogStore, EntityKey};
use crate::core::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entries: usize,
}

/// Memoized synthesized types keyed by `(namespace, name)`.
///
/// Entries live until invalidated; there is no expiry. Every instance owns
/// its own entries, so an edit applied through one instance is not seen by
/// another instance's cache until that one is invalidated too.
///
/// Every invalidation advances a generation counter. A miss only stores its
/// result if no invalidation happened while it was synthesizing, since the
/// catalog it read may have held rows that were later rolled back.
pub struct EntityTypeCache {
    catalog: CatalogStore,
    synthesizer: TypeSynthesizer,
    entries: RwLock<HashMap<EntityKey, Arc<SynthesizedType>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    generation: AtomicU64,
}

impl EntityTypeCache {
    pub fn new(catalog: CatalogStore, synthesizer: TypeSynthesizer) -> Self {
        Self {
            catalog,
            synthesizer,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn synthesizer(&self) -> &TypeSynthesizer {
        &self.synthesizer
    }

    /// Cached type, or a freshly synthesized one on a miss.
    pub async fn get(&self, namespace: &str, name: &str) -> Result<Arc<SynthesizedType>> {
        let key = EntityKey::new(namespace, name);
        if let Some(ty) = self.entries.read().await.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Type cache hit for {}", key);
            return Ok(Arc::clone(ty));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Type cache miss for {}, synthesizing", key);
        let generation = self.generation.load(Ordering::Acquire);
        self.fill(key, generation).await
    }

    async fn fill(&self, key: EntityKey, generation: u64) -> Result<Arc<SynthesizedType>> {
        let snapshot = self.catalog.snapshot(&key).await?;
        let ty = Arc::new(self.synthesizer.synthesize(&snapshot)?);

        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("Catalog changed while synthesizing {}, not caching", key);
            return Ok(ty);
        }
        Ok(Arc::clone(entries.entry(key).or_insert(ty)))
    }

    /// Drop the entry for `(namespace, name)`; returns whether one was present.
    pub async fn invalidate(&self, namespace: &str, name: &str) -> bool {
        let key = EntityKey::new(namespace, name);
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        let removed = entries.remove(&key).is_some();
        if removed {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!("Invalidated cached type {}", key);
        }
        removed
    }

    /// Drop every entry of a namespace; returns how many were removed.
    pub async fn invalidate_namespace(&self, namespace: &str) -> usize {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        let before = entries.len();
        entries.retain(|key, _| key.namespace != namespace);
        let removed = before - entries.len();
        self.invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.invalidations
            .fetch_add(entries.len() as u64, Ordering::Relaxed);
        entries.clear();
    }

    pub async fn contains(&self, namespace: &str, name: &str) -> bool {
        self.entries
            .read()
            .await
            .contains_key(&EntityKey::new(namespace, name))
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries: self.entries.read().await.len(),
        }
    }
}
