//! Storage interfaces and their in-memory backings
//!
//! State lives only for the lifetime of the process. Handlers depend on the
//! traits so a durable backing can replace the in-memory one.

pub mod session;
pub mod user;

pub use session::{InMemorySessionRepository, SessionRepository};
pub use user::{InMemoryUserRepository, UserRepository};
