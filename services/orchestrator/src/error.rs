//! Errors surfaced by the orchestration core.

use std::time::Duration;

use stackops_cloud::model::InstanceStatus;
use stackops_cloud::CloudError;
use stackops_id::{FloatingIpId, InstanceId, NetworkId, PortId};
use thiserror::Error;

/// Result type for orchestration operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Errors that abort a topology, floating-IP or pool operation.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no external network is available")]
    NoExternalNetwork,

    #[error("instance {instance_id} has no ports")]
    NoInstancePorts { instance_id: InstanceId },

    #[error("no port of instance {instance_id} sits on a network routed to an external gateway")]
    NoReachablePort { instance_id: InstanceId },

    #[error("failed to allocate a floating IP on network {network_id}: {source}")]
    AllocationFailed {
        network_id: NetworkId,
        #[source]
        source: CloudError,
    },

    #[error("failed to bind floating IP {floating_ip_id} to port {port_id}: {reason}")]
    BindFailed {
        floating_ip_id: FloatingIpId,
        port_id: PortId,
        reason: String,
    },

    #[error("instance {name} ({instance_id}) entered status {status}")]
    InstanceFailed {
        instance_id: InstanceId,
        name: String,
        status: InstanceStatus,
    },

    #[error("instance {name} ({instance_id}) not active after {elapsed:?}")]
    WaitTimeout {
        instance_id: InstanceId,
        name: String,
        elapsed: Duration,
    },

    #[error("pool '{base_name}' has no members")]
    EmptyPool { base_name: String },

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl OrchestratorError {
    /// True for failures caused by the current topology rather than by a call.
    /// Retrying without changing the cloud gives the same answer.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NoExternalNetwork
                | Self::NoInstancePorts { .. }
                | Self::NoReachablePort { .. }
                | Self::EmptyPool { .. }
        )
    }
}
