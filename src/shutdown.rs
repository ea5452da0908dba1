//! Cooperative shutdown: the stopping flag and the coordinator that drains
//! the kernel session when a termination signal arrives.

pub mod coordinator;
pub mod flag;

#[cfg(unix)]
pub use coordinator::termination_signal;
pub use coordinator::{DrainHandoff, DrainOutcome, ShutdownCoordinator};
pub use flag::ShutdownFlag;
