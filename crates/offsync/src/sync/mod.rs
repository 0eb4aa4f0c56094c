//! Synchronization infrastructure
//!
//! - `remote_store`: the narrow interface to the remote table
//! - `memory_remote`: in-process remote table
//! - `coordinator`: single-flight, coalescing drain of the pending queue

pub mod coordinator;
pub mod memory_remote;
pub mod remote_store;

pub use coordinator::*;
pub use memory_remote::*;
pub use remote_store::*;
