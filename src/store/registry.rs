//! Hot cache of persisted canvases
//!
//! Reads are lock-free: every update builds a new map and swaps the pointer,
//! so readers serving `GET /canvas` never wait on a save.

use crate::graph::CanvasSnapshot;
use crate::store::storage::CanvasStorage;
use anyhow::Result;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

/// Lock-free canvas cache backed by `CanvasStorage`
#[derive(Debug)]
pub struct CanvasRegistry {
    /// Key: process_id, Value: last persisted snapshot
    canvases: ArcSwap<HashMap<String, Arc<CanvasSnapshot>>>,
    /// Source for startup population
    storage: CanvasStorage,
}

impl CanvasRegistry {
    pub fn new(storage: CanvasStorage) -> Self {
        Self {
            canvases: ArcSwap::new(Arc::new(HashMap::new())),
            storage,
        }
    }

    /// Populate from storage at startup
    pub async fn init_from_storage(&self) -> Result<()> {
        let stored = self.storage.load_all_canvases().await?;
        let canvases = stored
            .into_iter()
            .map(|(id, snapshot)| (id, Arc::new(snapshot)))
            .collect::<HashMap<_, _>>();

        self.canvases.store(Arc::new(canvases));

        tracing::info!(
            "Initialized canvas registry with {} canvases",
            self.canvases.load().len()
        );

        Ok(())
    }

    /// Lock-free read
    pub fn get_canvas(&self, process_id: &str) -> Option<Arc<CanvasSnapshot>> {
        self.canvases.load().get(process_id).cloned()
    }

    /// Cache a persisted snapshot unless a newer revision is already cached
    ///
    /// Returns whether the snapshot was published.
    pub fn publish(&self, snapshot: CanvasSnapshot) -> bool {
        let process_id = snapshot.process_id().to_string();
        let snapshot = Arc::new(snapshot);
        let mut published = false;
        self.canvases.rcu(|current| {
            let mut next = (**current).clone();
            published = match next.get(&process_id) {
                Some(cached) if cached.revision > snapshot.revision => false,
                _ => {
                    next.insert(process_id.clone(), Arc::clone(&snapshot));
                    true
                }
            };
            next
        });

        if published {
            tracing::debug!("🔁 Published canvas '{}' to registry", process_id);
        } else {
            tracing::debug!(
                "⏭️ Kept newer cached revision of '{}' over {:?}",
                process_id,
                snapshot.revision
            );
        }
        published
    }

    pub fn len(&self) -> usize {
        self.canvases.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures;
    use crate::store::PersistOutcome;

    #[tokio::test]
    async fn registry_loads_and_publishes() {
        let storage = CanvasStorage::in_memory().await.unwrap();
        storage.save_canvas(&fixtures::chain(), false).await.unwrap();

        let registry = CanvasRegistry::new(storage.clone());
        assert!(registry.is_empty());
        registry.init_from_storage().await.unwrap();
        assert!(registry.get_canvas("p-chain").is_some());

        let PersistOutcome::Saved(saved) =
            storage.save_canvas(&fixtures::full_process(), false).await.unwrap()
        else {
            panic!("expected a saved canvas");
        };
        assert!(registry.get_canvas("p-orders").is_none());
        assert!(registry.publish(saved.clone()));
        assert_eq!(registry.get_canvas("p-orders").as_deref(), Some(&saved));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn an_older_revision_never_replaces_a_newer_one() {
        let storage = CanvasStorage::in_memory().await.unwrap();
        let registry = CanvasRegistry::new(storage);

        let mut older = fixtures::chain();
        older.revision = Some(1);
        let mut newer = fixtures::chain();
        newer.revision = Some(2);
        newer.steps[0].name = "Triage".to_string();

        assert!(registry.publish(newer.clone()));
        assert!(!registry.publish(older));
        assert_eq!(registry.get_canvas("p-chain").as_deref(), Some(&newer));
    }
}
