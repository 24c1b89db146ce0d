//! Run pipeline: the orchestrator and the phase scheduler it drives

pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{terminal_status, Orchestrator};
pub use scheduler::{DiscoveryVerdict, PhaseScheduler};
