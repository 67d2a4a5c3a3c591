//! Lead shuffle and distribution.
//!
//! A request picks candidate leads by creation window and status
//! ([`window`]), puts them in a uniformly random order ([`permute`]) and hands
//! them out round-robin over an ordered employee list ([`distribute`]).
//! [`ShuffleService`] runs the preview and commit variants against the
//! repositories.

pub mod distribute;
pub mod permute;
pub mod service;
pub mod window;

pub use distribute::{DistributionPlan, EmployeeCount};
pub use permute::{fisher_yates, shuffled};
pub use service::{
    AssignRequest, BulkShuffleRequest, EmployeeTarget, Preview, Selection, ShuffleError,
    ShuffleFilter, ShuffleOutcome, ShuffleResult, ShuffleService,
};
pub use window::{Clock, FixedClock, Period, PeriodKind, SelectionWindow, SystemClock};
