//! # Keeper Process
//!
//! Low-level process operations used by the supervisor:
//! - Liveness checks ([`LivenessChecker`], [`OsLiveness`])
//! - Graceful and forced termination
//! - Spawning the service with redirected output
//! - Memory/uptime sampling

pub mod check;
pub mod execute;
pub mod output;
pub mod terminate;
pub mod usage;

// Re-export main types
pub use check::*;
pub use execute::*;
pub use output::*;
pub use terminate::*;
pub use usage::*;
