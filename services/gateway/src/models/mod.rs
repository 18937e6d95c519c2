//! Gateway models

pub mod session;
pub mod user;

// Re-export for convenience
pub use session::{NewSession, Session, UpdateSession};
pub use user::{Credentials, PublicUser, User};
