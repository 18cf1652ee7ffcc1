//! Attach DB Library
//!
//! Persistence seam for file metadata. The service talks to the
//! [`FileInfoStore`] trait only; the backing database is an external
//! collaborator. The in-memory implementation backs tests and the dev server.

pub mod memory;
pub mod store;

pub use memory::MemoryFileInfoStore;
pub use store::{FileInfoStore, StoreError, StoreResult};
