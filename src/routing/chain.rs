//! Fallback chain over logical model names

use std::collections::HashMap;

/// Immutable successor mapping built from an ordered model list
///
/// Built from a preference-ordered list, so the graph is acyclic by
/// construction; the last entry is terminal. The mapping is fixed at startup,
/// only the per-model limit flags in the tracker change at runtime.
pub struct FallbackChain {
    next: HashMap<String, Option<String>>,
    order: Vec<String>,
}

impl FallbackChain {
    /// Build from a preference-ordered, duplicate-free list of model ids
    pub fn from_ordered(ids: &[String]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if ids.is_empty() {
            return Err("fallback chain requires at least one model".into());
        }

        let mut next = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            let successor = ids.get(i + 1).cloned();
            if next.insert(id.clone(), successor).is_some() {
                return Err(format!("fallback chain lists '{}' more than once", id).into());
            }
        }

        Ok(Self {
            next,
            order: ids.to_vec(),
        })
    }

    /// Successor of `id`; `None` for the terminal model or unknown ids
    pub fn next(&self, id: &str) -> Option<&str> {
        self.next.get(id).and_then(|n| n.as_deref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.next.contains_key(id)
    }

    /// The last-resort model at the end of the chain
    pub fn terminal(&self) -> &str {
        // order is non-empty by construction
        &self.order[self.order.len() - 1]
    }

    /// All models in preference order
    pub fn models(&self) -> &[String] {
        &self.order
    }
}
