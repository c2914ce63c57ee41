//! Persisted credential and watermark state

pub mod json_file;
pub mod memory;
pub mod traits;

pub use json_file::JsonFileStateStore;
pub use memory::InMemoryStateStore;
pub use traits::{StateStorage, TokenStore, WatermarkStore};
