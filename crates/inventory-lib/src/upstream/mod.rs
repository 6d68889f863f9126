//! Upstream collaborators consumed by the pipeline
//!
//! Every upstream API sits behind a trait so the orchestrator can be handed
//! real clients or the in-memory [`SnapshotUpstream`]. Calls are assumed to be
//! pre-authorized; no retry happens at this layer.

mod snapshot;
mod types;

pub use snapshot::{FleetSnapshot, SnapshotCluster, SnapshotService, SnapshotUpstream, DEFAULT_PAGE_SIZE};
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation names used for logging, metrics and call accounting
pub mod operations {
    pub const LIST_CLUSTERS: &str = "ListClusters";
    pub const LIST_CONTAINER_INSTANCES: &str = "ListContainerInstances";
    pub const DESCRIBE_CONTAINER_INSTANCES: &str = "DescribeContainerInstances";
    pub const LIST_TASKS: &str = "ListTasks";
    pub const DESCRIBE_TASKS: &str = "DescribeTasks";
    pub const DESCRIBE_SERVICES: &str = "DescribeServices";
    pub const DESCRIBE_CAPACITY_PROVIDERS: &str = "DescribeCapacityProviders";
    pub const GET_METRIC_STATISTICS: &str = "GetMetricStatistics";
    pub const DESCRIBE_AUTO_SCALING_GROUPS: &str = "DescribeAutoScalingGroups";
    pub const DESCRIBE_POLICIES: &str = "DescribePolicies";
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A page with no continuation
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Statistic requested from the metrics API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Maximum,
}

/// A metric dimension name/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parameters of a metric-statistics request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Aggregation bucket length in seconds
    pub period_secs: i64,
    pub statistics: Vec<Statistic>,
    pub unit: String,
}

impl MetricQuery {
    /// Value of a dimension by name
    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }
}

/// Container platform API: clusters, instances, tasks, services and
/// capacity providers
#[async_trait]
pub trait ContainerPlatform: Send + Sync {
    async fn list_clusters(&self, next_token: Option<String>) -> Result<Page<String>>;

    async fn list_container_instances(
        &self,
        cluster: &str,
        status: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>>;

    /// Describe up to 100 container instances
    async fn describe_container_instances(
        &self,
        cluster: &str,
        instance_arns: &[String],
    ) -> Result<Vec<ContainerInstanceDescription>>;

    async fn list_tasks(
        &self,
        cluster: &str,
        desired_status: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>>;

    /// Describe up to 100 tasks
    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
    ) -> Result<Vec<TaskDescription>>;

    /// Returns `None` when the service does not exist in the cluster
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Option<ServiceDescription>>;

    async fn describe_capacity_provider(
        &self,
        name: &str,
    ) -> Result<Option<CapacityProviderDescription>>;
}

/// Metric statistics API
#[async_trait]
pub trait MetricStatistics: Send + Sync {
    /// Datapoints for the query window; may be empty
    async fn get_metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>>;
}

/// Auto scaling API
#[async_trait]
pub trait AutoScaling: Send + Sync {
    async fn describe_auto_scaling_group(
        &self,
        name: &str,
    ) -> Result<Option<AutoScalingGroupDescription>>;

    async fn describe_policies(
        &self,
        group_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<ScalingPolicyDescription>>;
}
