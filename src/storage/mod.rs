//! Storage module for image objects
//!
//! Provides an S3 object-store client for uploading, deleting and
//! presigning image objects. Works against AWS S3 or any S3-compatible
//! endpoint via the AWS SDK.

mod s3;

pub use s3::{ObjectStore, S3Store, StorageError};
