//! Selector healing for browser end-to-end tests.
//!
//! When a selector stops resolving, the `Healer` inspects the live page
//! through a `Driver`, generates replacement candidates with a configurable
//! set of strategies, validates them against the DOM, and caches what
//! worked. The `RetryHandler` classifies interaction errors, retries
//! transient classes with exponential backoff, and escalates locator
//! failures into healing. `Actions` wraps both behind plain
//! click/fill/goto calls.

pub mod actions;
pub mod cache;
pub mod config;
pub mod healer;
pub mod introspect;
pub mod llm;
pub mod retry;
pub mod similarity;
pub mod strategy;
pub mod telemetry;

pub use actions::Actions;
pub use config::{ConfigLoader, ConfigPatch, MendConfig};
pub use healer::{Healer, HealthReport, HealthStatus};
pub use mend_common::{
    Candidate, Driver, DriverError, ElementDescriptor, HealingResult, Interaction, StrategyKind,
};
pub use retry::{ErrorClass, RetryHandler, classify};
pub use strategy::{HealOptions, HealingStrategy};
