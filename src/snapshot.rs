//! Owner of the current knowledge base snapshot.
//!
//! Readers take an `Arc` to the snapshot and query it without holding any
//! lock. A rebuild constructs the replacement completely before swapping
//! the reference, so readers see either the old or the new knowledge base,
//! never a mixture. A rebuild that fails leaves the old snapshot in place.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use serde::Serialize;
use texkb_core::knowledge::KnowledgeBase;
use texkb_core::query::QueryEngine;

/// Liveness report.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub loaded: bool,
    pub total_items: usize,
}

#[derive(Debug, Default)]
pub struct KnowledgeHandle {
    current: RwLock<Option<Arc<KnowledgeBase>>>,
}

impl KnowledgeHandle {
    /// A handle with nothing loaded yet.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(knowledge: KnowledgeBase) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(knowledge))),
        }
    }

    /// The current snapshot, if one is loaded.
    pub fn snapshot(&self) -> Option<Arc<KnowledgeBase>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// A query engine over the current snapshot.
    pub fn engine(&self) -> Option<QueryEngine> {
        self.snapshot().map(QueryEngine::new)
    }

    /// Publish a new snapshot, returning the one it replaced.
    pub fn replace(&self, knowledge: KnowledgeBase) -> Option<Arc<KnowledgeBase>> {
        let next = Arc::new(knowledge);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.replace(next)
    }

    /// Run `build` and publish its result. On error the current snapshot
    /// stays authoritative and the error is returned.
    pub fn rebuild<F>(&self, build: F) -> Result<Arc<KnowledgeBase>>
    where
        F: FnOnce() -> Result<KnowledgeBase>,
    {
        let knowledge = build()?;
        let next = Arc::new(knowledge);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(Arc::clone(&next));
        Ok(next)
    }

    pub fn health(&self) -> Health {
        match self.snapshot() {
            Some(kb) => Health {
                loaded: true,
                total_items: kb.len(),
            },
            None => Health {
                loaded: false,
                total_items: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use texkb_core::knowledge::CollectionBatch;
    use texkb_core::models::{raw_type, RawRecord};

    fn kb(names: &[&str]) -> KnowledgeBase {
        let records = names
            .iter()
            .map(|n| {
                RawRecord::new(raw_type::COMMAND, "x", "x.tex")
                    .with("command_name", *n)
                    .with("description", "d")
                    .with_seed(&format!("cmd_{}", n))
            })
            .collect();
        KnowledgeBase::build(&[CollectionBatch {
            collection: "x".to_string(),
            records,
        }])
        .0
    }

    #[test]
    fn empty_handle_reports_unloaded() {
        let handle = KnowledgeHandle::empty();
        let health = handle.health();
        assert!(!health.loaded);
        assert_eq!(health.total_items, 0);
        assert!(handle.engine().is_none());
    }

    #[test]
    fn readers_keep_their_snapshot_across_a_swap() {
        let handle = KnowledgeHandle::new(kb(&["\\a"]));
        let before = handle.snapshot().unwrap();
        handle.replace(kb(&["\\a", "\\b"]));
        assert_eq!(before.len(), 1);
        assert_eq!(handle.health().total_items, 2);
    }

    #[test]
    fn failed_rebuild_keeps_prior_snapshot() {
        let handle = KnowledgeHandle::new(kb(&["\\a", "\\b"]));
        let result = handle.rebuild(|| anyhow::bail!("sources.root does not exist"));
        assert!(result.is_err());
        assert_eq!(handle.health().total_items, 2);

        let rebuilt = handle.rebuild(|| Ok(kb(&["\\c"]))).unwrap();
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(handle.health().total_items, 1);
    }
}
