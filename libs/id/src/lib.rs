//! # stackops-id
//!
//! Typed identifiers for resources owned by the cloud control plane.
//!
//! ## Design Principles
//!
//! - IDs are issued by the control plane; this crate never interprets them
//! - IDs are typed so a port id cannot be passed where a network id is expected
//! - Empty or whitespace-bearing ids are rejected at parse and deserialize time
//! - IDs order lexicographically, which is what first-match selection sorts by
//!
//! ## ID Format
//!
//! The control plane hands out opaque strings (UUIDs in practice):
//!
//! - `3f1c9a52-8a0e-4a7e-9f55-2b1d5c1e7f10`
//!
//! Locally generated ids (used by the in-memory cloud) are UUID v4 strings.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

#[doc(hidden)]
pub mod __private {
    pub use uuid::Uuid;
}
