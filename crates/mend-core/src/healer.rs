//! The healing dispatcher.
//!
//! One `Healer` owns the configured strategies, the healing cache, and the
//! flakiness tracker. Healing calls are serialized through `&mut self`; an
//! instance must not be shared across parallel test workers.

use crate::cache::{FlakinessTracker, HealingCache};
use crate::config::{ConfigPatch, MendConfig};
use crate::llm::client::LlmError;
use crate::strategy::{
    CssHierarchyStrategy, HealOptions, HealingStrategy, LlmAnalysisStrategy, TestIdStrategy,
    TextMatchStrategy,
};
use mend_common::{Driver, HealingResult, StrategyKind};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Aggregate engine health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All strategies report available.
    Healthy,
    /// Some strategies report available.
    Degraded,
    /// No strategy reports available.
    Offline,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyHealth {
    pub strategy: StrategyKind,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub strategies: Vec<StrategyHealth>,
    pub cache_size: usize,
    pub cache_hits: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlakinessStat {
    pub selector: String,
    pub successes: u64,
    pub failures: u64,
    pub score: f64,
}

pub struct Healer {
    config: MendConfig,
    strategies: Vec<Box<dyn HealingStrategy>>,
    cache: HealingCache,
    flakiness: FlakinessTracker,
}

impl Healer {
    /// Build a healer from configuration. Fails when the LLM strategy is
    /// configured and its endpoint does not pass allow-listing.
    pub fn new(mut config: MendConfig) -> Result<Self, LlmError> {
        config.normalize();
        let strategies = Self::build_strategies(&config)?;
        Ok(Self {
            config,
            strategies,
            cache: HealingCache::new(),
            flakiness: FlakinessTracker::new(),
        })
    }

    fn build_strategies(
        config: &MendConfig,
    ) -> Result<Vec<Box<dyn HealingStrategy>>, LlmError> {
        let mut strategies: Vec<Box<dyn HealingStrategy>> = Vec::new();
        let mut seen = Vec::new();
        for kind in &config.strategies {
            if seen.contains(kind) {
                continue;
            }
            seen.push(*kind);
            strategies.push(match kind {
                StrategyKind::TestIdRecovery => Box::new(TestIdStrategy::new()),
                StrategyKind::TextMatching => Box::new(TextMatchStrategy::new()),
                StrategyKind::CssHierarchy => Box::new(CssHierarchyStrategy::new()),
                StrategyKind::LlmAnalysis => {
                    Box::new(LlmAnalysisStrategy::new(&config.ollama)?)
                }
            });
        }
        Ok(strategies)
    }

    pub fn config(&self) -> &MendConfig {
        &self.config
    }

    /// Strategy kinds in effective dispatch order.
    pub fn strategy_order(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Attempt to recover a selector against the live page.
    ///
    /// Always returns a structured result; strategy errors are absorbed.
    /// Note that a selector which still resolves reports success with
    /// `no_healing_needed` metadata even when the caller expected it to be
    /// gone; presence on the page is the only signal consulted.
    pub async fn heal(
        &mut self,
        driver: &mut dyn Driver,
        selector: &str,
        options: &HealOptions,
    ) -> HealingResult {
        if !self.config.enabled {
            return HealingResult::disabled(selector);
        }

        // Cached healings are revalidated; the DOM may have drifted since
        // the entry was written.
        if self.config.cache_healing
            && let Some(entry) = self.cache.get(selector)
        {
            let healed = entry.healed_selector.clone();
            let confidence = entry.confidence;
            let strategy = entry.strategy;
            if probe_present(driver, &healed).await {
                self.cache.record_hit(selector);
                self.flakiness.record_success(&healed);
                debug!(%selector, %healed, "cache hit");
                return HealingResult::healed(healed, confidence, strategy)
                    .with_metadata("cached", Value::Bool(true));
            }
            info!(%selector, %healed, "cached healing no longer resolves, evicting");
            self.cache.evict(selector);
        }

        if probe_present(driver, selector).await {
            self.flakiness.record_success(selector);
            return HealingResult::no_healing_needed(selector);
        }

        if self.strategies.is_empty() {
            warn!(%selector, "no healing strategies configured");
            self.flakiness.record_failure(selector);
            return HealingResult::failure(selector, None, "no healing strategies configured");
        }

        let mut last: Option<HealingResult> = None;
        let max_attempts = self.config.max_attempts;
        for attempt in 0..max_attempts {
            for strategy in &self.strategies {
                if !strategy.can_handle(selector) {
                    debug!(strategy = %strategy.kind(), %selector, "selector shape not claimed");
                    continue;
                }
                debug!(strategy = %strategy.kind(), attempt, %selector, "dispatching strategy");
                match strategy.heal(driver, selector, options).await {
                    Ok(result) if result.success => {
                        if self.config.cache_healing {
                            self.cache.insert(
                                selector,
                                &result.selector,
                                result.confidence,
                                strategy.kind(),
                            );
                        }
                        self.flakiness.record_success(&result.selector);
                        info!(
                            %selector,
                            healed = %result.selector,
                            strategy = %strategy.kind(),
                            confidence = result.confidence,
                            "selector healed"
                        );
                        return result;
                    }
                    Ok(result) => {
                        last = Some(result);
                    }
                    Err(e) => {
                        error!(strategy = %strategy.kind(), %selector, "strategy raised: {}", e);
                    }
                }
            }
            if attempt + 1 < max_attempts {
                let backoff = Duration::from_millis(1000 * (attempt as u64 + 1));
                debug!(%selector, ?backoff, "healing attempt failed, backing off");
                tokio::time::sleep(backoff).await;
            }
        }

        self.flakiness.record_failure(selector);
        last.unwrap_or_else(|| {
            HealingResult::failure(selector, None, "all healing strategies exhausted")
        })
    }

    /// Probe each strategy's availability and summarize.
    pub async fn health_check(&self) -> HealthReport {
        let mut strategies = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            strategies.push(StrategyHealth {
                strategy: strategy.kind(),
                available: strategy.is_available().await,
            });
        }
        let available = strategies.iter().filter(|s| s.available).count();
        let status = if available == strategies.len() && !strategies.is_empty() {
            HealthStatus::Healthy
        } else if available > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Offline
        };
        HealthReport {
            status,
            strategies,
            cache_size: self.cache.len(),
            cache_hits: self.cache.hits(),
        }
    }

    /// Selectors with a nonzero flakiness score, most flaky first.
    pub fn flakiness_stats(&self) -> Vec<FlakinessStat> {
        self.flakiness
            .ranked()
            .into_iter()
            .map(|(selector, entry)| FlakinessStat {
                selector,
                successes: entry.successes,
                failures: entry.failures,
                score: entry.score(),
            })
            .collect()
    }

    /// Drop all cached healings and flakiness counters.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.flakiness.clear();
    }

    /// Apply a partial configuration over the captured one and re-instantiate
    /// all strategies. A patch that fails strategy construction (e.g. an LLM
    /// endpoint outside the allow-list) is rejected without touching the
    /// current configuration.
    pub fn update_config(&mut self, patch: &ConfigPatch) -> Result<(), LlmError> {
        let mut updated = self.config.clone();
        patch.apply(&mut updated);
        updated.normalize();
        let strategies = Self::build_strategies(&updated)?;
        self.config = updated;
        self.strategies = strategies;
        Ok(())
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

/// Presence probe with the edge policy of the heal algorithm: an empty
/// selector or a probe error counts as absent.
async fn probe_present(driver: &mut dyn Driver, selector: &str) -> bool {
    if selector.trim().is_empty() {
        return false;
    }
    match driver.probe(selector).await {
        Ok(count) => count >= 1,
        Err(e) => {
            debug!(%selector, "probe failed, treating selector as absent: {}", e);
            false
        }
    }
}
