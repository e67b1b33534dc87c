pub mod memory;
pub mod store;
pub mod token;
pub mod valkey;

pub use memory::InMemorySessionStore;
pub use store::{SessionError, SessionRecord, SessionStore};
pub use valkey::ValkeySessionStore;
