//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Process clock (uptime.rs):
//!     Start instant pinned once in main → read by /health
//!
//! Startup (startup.rs):
//!     Validated config → Initialize metrics → Bind listener → Serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown.rs broadcast
//!
//! Shutdown (shutdown.rs):
//!     Broadcast received → Stop accepting → Drain connections → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only once subsystems are ready)

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod uptime;

pub use shutdown::Shutdown;
pub use startup::{start, StartupError};
pub use uptime::{mark_process_start, uptime};
