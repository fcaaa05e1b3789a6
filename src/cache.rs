use log::{debug, warn};
use std::collections::{HashMap, VecDeque};

use crate::data::ResumeData;

/// Identifies one rendering: a template and the exact data snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    template_id: String,
    data: String,
}

impl CacheKey {
    pub fn new(template_id: &str, data: Option<&ResumeData>) -> Self {
        let data = match data {
            Some(data) => serde_json::to_string(data).unwrap_or_else(|e| {
                warn!("Failed to serialize resume data for the cache key: {}", e);
                String::new()
            }),
            None => "null".to_string(),
        };
        Self {
            template_id: template_id.to_string(),
            data,
        }
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Rendered documents, bounded to `capacity` entries.
///
/// When full, the entry that was inserted first is evicted. A capacity of
/// zero disables caching.
#[derive(Debug)]
pub struct RenderCache {
    capacity: usize,
    entries: HashMap<CacheKey, String>,
    order: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
}

impl RenderCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<&str> {
        match self.entries.get(key) {
            Some(rendered) => {
                self.hits += 1;
                Some(rendered.as_str())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Stores `rendered`. Replacing an existing entry keeps its original
    /// insertion slot.
    pub fn insert(&mut self, key: CacheKey, rendered: String) {
        if self.capacity == 0 {
            return;
        }
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = rendered;
            return;
        }
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                debug!(
                    "Evicted cached render of '{}' ({} entries)",
                    oldest.template_id,
                    self.order.len()
                );
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, rendered);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            len: self.entries.len(),
            capacity: self.capacity,
        }
    }
}
