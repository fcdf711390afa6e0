//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Open database → Start listener
//!
//! Shutdown (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → ShutdownSignal resolves
//!     → Stop accepting → Drain in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The database opens before the listener binds (traffic only when ready)

pub mod signals;

pub use signals::{Shutdown, ShutdownSignal};
