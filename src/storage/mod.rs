pub mod collection;
pub mod engine;
pub mod error;
pub mod persistence;

pub use collection::{Collection, Document};
pub use engine::DocumentStore;
pub use error::{Result, StoreError};
pub use persistence::DurabilityMode;
