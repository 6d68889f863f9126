//! Per-record enrichment from secondary upstream sources
//!
//! Both caches are owned by the orchestrator and live for exactly one run.

mod capacity;
mod service;

pub use capacity::{
    AutoScalingGroupDetails, CapacityProviderCache, CapacityProviderDetails, ScalingPolicySummary,
};
pub use service::{
    ServiceCache, ServiceDetails, UtilizationWindow, CPU_UTILIZATION, DEFAULT_METRIC_NAMESPACE,
    MEMORY_UTILIZATION,
};
