//! # Keeper Process File
//!
//! Process state persistence for the supervisor:
//! - [`ProcessHandle`], the in-memory view of the running service
//! - [`HandleStore`] with the on-disk [`PidFileStore`] and [`MemoryHandleStore`]
//! - [`SupervisorLock`], the advisory lock around supervisor commands

pub mod handle;
pub mod lock;
pub mod store;

pub use handle::{HandleTemplate, ProcessHandle};
pub use lock::SupervisorLock;
pub use store::{HandleStore, MemoryHandleStore, PidFileStore, PidRecord};
