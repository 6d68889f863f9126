//! Inventory library for container fleets
//!
//! This crate provides the core functionality for:
//! - Paginated listing and batched describing of clusters, hosts and tasks
//! - Normalization of upstream quantities and task allocation resolution
//! - Memoized service and capacity provider enrichment
//! - Per-cluster CSV report assembly
//! - Metrics and structured logging of a run

pub mod allocation;
pub mod collector;
pub mod enrichment;
pub mod error;
pub mod identity;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod upstream;

pub use allocation::{resolve_allocation, Allocation, AllocationSource, ResolvedAllocation};
pub use error::{InventoryError, Result};
pub use models::*;
pub use observability::{InventoryMetrics, StructuredLogger};
pub use pipeline::{
    ClusterOrchestrator, ClusterOutcome, ClusterSummary, OrchestratorBuilder, PipelineConfig,
    RunSummary,
};
pub use report::{FieldValue, ReportAssembler, ReportKind, ReportRecord};
