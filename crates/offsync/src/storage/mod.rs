pub mod file_store;
pub mod kv;
pub mod memory_store;
pub mod types;

pub use file_store::*;
pub use kv::*;
pub use memory_store::*;
pub use types::*;
