//! Typed ID definitions for all control-plane resources.

use crate::define_id;

// =============================================================================
// Identity
// =============================================================================

define_id!(ProjectId, "project");

// =============================================================================
// Networking
// =============================================================================

define_id!(NetworkId, "network");
define_id!(SubnetId, "subnet");
define_id!(RouterId, "router");
define_id!(PortId, "port");
define_id!(FloatingIpId, "floating IP");
define_id!(SecurityGroupId, "security group");

// =============================================================================
// Compute
// =============================================================================

define_id!(InstanceId, "instance");
define_id!(ImageId, "image");
define_id!(FlavorId, "flavor");
