//! Asset module
//!
//! Coordinates each mutating operation across the object store and the
//! metadata repository, compensating when the second step fails after the
//! first succeeded.

mod key;
mod coordinator;

pub use key::{sanitize_filename, object_key};
pub use coordinator::{
    AssetCoordinator, AssetError, CoordinatorOptions,
    DirectUpload, PresignRequest, PresignedUpload, ListPage,
};
