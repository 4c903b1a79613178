//! # stackops-cloud
//!
//! The cloud control plane as seen by the orchestration core:
//!
//! - [`model`]: networks, subnets, routers, ports, floating IPs, instances
//! - [`CloudApi`]: the operations the core depends on
//! - [`RestCloudClient`]: OpenStack-style REST implementation
//! - [`MockCloud`]: in-memory implementation for tests and dry runs

pub mod api;
pub mod config;
pub mod error;
pub mod mock;
pub mod model;
pub mod rest;

pub use api::CloudApi;
pub use config::CloudConfig;
pub use error::{CloudError, CloudResult};
pub use mock::MockCloud;
pub use rest::RestCloudClient;
