//! Functional core of the tablecache project.
//!
//! Everything in this crate is pure: key schemas and item types, cache-key
//! derivation, cache value serialization, the collaborator traits implemented
//! by the storage and cache backends, and the error taxonomy shared by all of
//! them. The imperative shell lives in the `tablecache` crate.

pub mod cache;
pub mod storage;
