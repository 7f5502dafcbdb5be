//! Chapter list reconciliation for one work.
//!
//! A sync takes the freshly fetched chapter list for one source and the
//! persisted list for the owning work, and computes what is new, what
//! changed, and what disappeared, without ever touching user state. The
//! computation is pure; applying the outcome is the caller's job and happens
//! in a single transaction ([`crate::library::LibraryStore::apply_sync`]).

mod engine;
mod error;
mod policy;

pub use engine::{SyncOutcome, reconcile};
pub use error::SyncError;
pub use policy::RemovalPolicy;
