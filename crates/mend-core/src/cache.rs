//! Healing cache and flakiness tracking.
//!
//! Both live for the lifetime of one `Healer` instance. The cache maps
//! broken selectors to the selector that healed them; entries are evicted
//! eagerly the first time a revalidation probe fails, since the DOM can
//! drift between calls. The flakiness tracker counts per-selector outcomes
//! across invocations.

use mend_common::StrategyKind;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub healed_selector: String,
    pub confidence: f64,
    pub strategy: StrategyKind,
    pub created_at: Instant,
    pub use_count: u64,
}

/// Process-local map from broken selector to its healed replacement.
#[derive(Debug, Default)]
pub struct HealingCache {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
}

impl HealingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, broken: &str) -> Option<&CacheEntry> {
        self.entries.get(broken)
    }

    /// Record a validated healing. Only call after the healed selector has
    /// been probed on the live page.
    pub fn insert(&mut self, broken: &str, healed: &str, confidence: f64, strategy: StrategyKind) {
        self.entries.insert(
            broken.to_string(),
            CacheEntry {
                healed_selector: healed.to_string(),
                confidence,
                strategy,
                created_at: Instant::now(),
                use_count: 0,
            },
        );
    }

    /// Count a revalidated hit and bump the entry's use count.
    pub fn record_hit(&mut self, broken: &str) {
        if let Some(entry) = self.entries.get_mut(broken) {
            entry.use_count += 1;
            self.hits += 1;
        }
    }

    pub fn evict(&mut self, broken: &str) {
        self.entries.remove(broken);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlakinessEntry {
    pub successes: u64,
    pub failures: u64,
}

impl FlakinessEntry {
    /// failures / (successes + failures); zero when unobserved.
    pub fn score(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            return 0.0;
        }
        self.failures as f64 / total as f64
    }
}

/// Per-selector outcome counters.
#[derive(Debug, Default)]
pub struct FlakinessTracker {
    entries: HashMap<String, FlakinessEntry>,
}

impl FlakinessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, selector: &str) {
        self.entries.entry(selector.to_string()).or_default().successes += 1;
    }

    pub fn record_failure(&mut self, selector: &str) {
        self.entries.entry(selector.to_string()).or_default().failures += 1;
    }

    pub fn get(&self, selector: &str) -> Option<FlakinessEntry> {
        self.entries.get(selector).copied()
    }

    /// Selectors with a nonzero flakiness score, most flaky first.
    pub fn ranked(&self) -> Vec<(String, FlakinessEntry)> {
        let mut out: Vec<(String, FlakinessEntry)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.score() > 0.0)
            .map(|(selector, entry)| (selector.clone(), *entry))
            .collect();
        out.sort_by(|a, b| {
            b.1.score()
                .partial_cmp(&a.1.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
