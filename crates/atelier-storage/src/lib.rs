//! Storage abstraction for the Atelier back office.
//!
//! Backend crates (e.g., atelier-store-redis, atelier-store-memory) implement
//! the [`Store`] trait so the service layer doesn't depend on any specific
//! key-value engine or key-layout details.

mod store;
pub mod types;

pub use store::Store;
pub use types::*;

use thiserror::Error;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("backend error: {0}")]
    Backend(String),
}
