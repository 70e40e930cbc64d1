pub mod driver;
pub mod protocol;

pub use driver::{Driver, DriverError, WaitState};
pub use protocol::{
    Candidate, ElementDescriptor, HealingResult, Interaction, InteractionOutcome, ParentInfo,
    StrategyKind, sort_candidates,
};
