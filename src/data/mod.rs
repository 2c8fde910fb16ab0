pub mod collector;
pub mod snapshot;

pub use collector::{ProbeHealth, RegistrationError, SampleAggregator};
pub use snapshot::{ProbeResult, Reading, Snapshot, Unit, UnavailableReason};
