#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod aggregator;
pub mod context;
pub mod coordinator;
pub(crate) mod executor;
pub(crate) mod scheduler;
pub mod scenario;

pub use bomber_core as core;
pub use bomber_core::{
    AggregateStats, ConfigError, FailKind, LatencyStats, LiveCounters, LoadProfile, Outcome,
    Phase, ProfileError, Response, RunOptions, RunStatus, Status,
};
pub use bomber_macros::scenario;
pub use context::{CancelHandle, StepContext};
pub use coordinator::{Coordinator, RunState};
pub use scenario::{RunSpec, Scenario};

pub mod prelude {
    pub use crate::context::{CancelHandle, StepContext};
    pub use crate::coordinator::{Coordinator, RunState};
    pub use crate::scenario::{RunSpec, Scenario};
    pub use bomber_core::{AggregateStats, LoadProfile, Phase, Response, RunOptions, RunStatus};
    pub use bomber_macros::scenario;
}
