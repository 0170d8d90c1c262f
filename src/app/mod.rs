//! Application wiring: the Supervisor that owns process-level concerns
//! (signals, task spawning, shutdown) on top of the `core` library.

pub mod supervisor;

pub use supervisor::Supervisor;
