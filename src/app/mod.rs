mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::DoorsnapOrchestrator;
pub use types::{ComponentState, ShutdownReason};
