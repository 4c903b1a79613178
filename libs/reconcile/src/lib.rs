//! Pool reconciliation primitives.
//!
//! This library holds the pure decision logic behind "scale pool to N":
//!
//! - **Membership**: one predicate decides which instances belong to a pool.
//!   Scale-up, scale-down and bulk delete all use the same predicate.
//! - **Decision**: compare the current member count with the target and
//!   produce either nothing, the names to create, or how many to remove.
//! - **Ordering**: members are removed newest-first so the longest-running
//!   members survive.
//!
//! # Invariants
//!
//! - Decisions are deterministic given the same snapshot
//! - New member names are contiguous: `{base}_{current+1}` .. `{base}_{target}`
//! - Removal order is total (created-at, then name, then id)

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod backoff;
pub mod locks;

pub use backoff::{BackoffPolicy, WaitPolicy};
pub use locks::{PoolGuard, PoolLocks};

/// Lock key shared by every pool in [`PoolMembership::Fleet`] mode.
pub const FLEET_LOCK_KEY: &str = "*fleet";

/// Error returned when parsing a [`PoolMembership`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown pool membership '{0}' (expected 'prefix' or 'fleet')")]
pub struct ParseMembershipError(String);

/// Which instances count as members of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolMembership {
    /// Instances whose name starts with the pool's base name.
    #[default]
    Prefix,

    /// Every instance in the fleet, regardless of name.
    Fleet,
}

impl PoolMembership {
    /// Returns true if an instance named `instance_name` belongs to the pool.
    pub fn is_member(&self, base_name: &str, instance_name: &str) -> bool {
        match self {
            Self::Prefix => instance_name.starts_with(base_name),
            Self::Fleet => true,
        }
    }

    /// Key under which calls for `base_name` are serialized.
    ///
    /// Every fleet-mode pool counts the same instances, so they share one key.
    pub fn lock_key<'a>(&self, base_name: &'a str) -> &'a str {
        match self {
            Self::Prefix => base_name,
            Self::Fleet => FLEET_LOCK_KEY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Fleet => "fleet",
        }
    }
}

impl fmt::Display for PoolMembership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolMembership {
    type Err = ParseMembershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prefix" => Ok(Self::Prefix),
            "fleet" => Ok(Self::Fleet),
            _ => Err(ParseMembershipError(s.to_string())),
        }
    }
}

/// Name of the `ordinal`-th member of a pool (1-based).
pub fn member_name(base_name: &str, ordinal: usize) -> String {
    format!("{base_name}_{ordinal}")
}

/// Outcome of comparing current and desired pool size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Pool already has the desired size.
    Noop,

    /// Create these members, in order.
    Up { names: Vec<String> },

    /// Remove this many members.
    Down { count: usize },
}

impl ScaleDecision {
    /// Decide how to move a pool from `current` to `target` members.
    pub fn compute(base_name: &str, current: usize, target: usize) -> Self {
        if current < target {
            let names = (current + 1..=target)
                .map(|ordinal| member_name(base_name, ordinal))
                .collect();
            Self::Up { names }
        } else if current > target {
            Self::Down {
                count: current - target,
            }
        } else {
            Self::Noop
        }
    }

    /// Returns true if nothing needs to change.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Up { .. } => "up",
            Self::Down { .. } => "down",
        }
    }
}

/// The fields removal order is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalKey<'a> {
    pub created_at: DateTime<Utc>,
    pub name: &'a str,
    pub id: &'a str,
}

/// Sort members so the first one is removed first.
///
/// Newest first by creation time; ties are broken by name, then id, both
/// descending, so the order is total for any snapshot.
pub fn removal_order<T, F>(mut members: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> RemovalKey<'_>,
{
    members.sort_by(|a, b| {
        let (a, b) = (key(a), key(b));
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.name.cmp(a.name))
            .then_with(|| b.id.cmp(a.id))
    });
    members
}

/// Pick the `count` members to remove, in removal order.
pub fn select_for_removal<T, F>(members: Vec<T>, count: usize, key: F) -> Vec<T>
where
    F: Fn(&T) -> RemovalKey<'_>,
{
    let mut ordered = removal_order(members, key);
    ordered.truncate(count);
    ordered
}
