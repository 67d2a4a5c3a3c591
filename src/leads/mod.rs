//! Read-side helpers shared by the lead endpoints: relation population and
//! per-tag statistics.

pub mod populate;
pub mod stats;

pub use populate::{PopulatedLead, UserSummary, populate, populate_one};
pub use stats::{StatRow, StatsKind, tally};
