pub mod memory;
pub mod store;

pub use memory::InMemoryIdentityStore;
pub use store::{
    IdentityError, IdentityStore, Principal, Subject, SubjectRef, looks_like_email,
    resolve_subject,
};
