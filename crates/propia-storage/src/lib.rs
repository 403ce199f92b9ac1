//! Propia Storage Library
//!
//! This crate provides the storage abstraction used by the image pipeline,
//! with S3, local filesystem, and in-memory implementations.
//!
//! # Storage key format
//!
//! Keys are content-addressed and namespaced by the caller, e.g.
//! `properties/{digest}.{ext}`. Keys must not contain `..` or a leading `/`.
//!
//! # Write semantics
//!
//! All backends implement `put_if_absent`: an object is written at most once
//! per key. A concurrent identical write may lose the race; since keys are
//! content-addressed the stored bytes are the same either way, so a lost
//! race is reported as success.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::InMemoryStorage;
pub use propia_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
