//! Type definitions for Atelier storage.

mod invitations;
mod ratelimit;
mod users;

// Re-export all types from submodules
pub use invitations::*;
pub use ratelimit::*;
pub use users::*;
