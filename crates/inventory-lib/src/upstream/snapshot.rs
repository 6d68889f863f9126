//! In-memory upstream backed by a captured fleet snapshot
//!
//! A snapshot is a JSON document holding the describe-level view of every
//! cluster plus the capacity providers, auto scaling groups, scaling policies
//! and metric datapoints the pipeline asks for. Listings are served in pages
//! of a configurable size so pagination is exercised the same way a live API
//! would exercise it. Every call is recorded for accounting.

use super::operations::*;
use super::{
    AutoScaling, AutoScalingGroupDescription, CapacityProviderDescription,
    ContainerInstanceDescription, ContainerPlatform, Datapoint, MetricQuery, MetricStatistics,
    Page, ScalingPolicyDescription, ServiceDescription, TaskDescription,
};
use crate::error::{InventoryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Default number of items served per listing page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Captured state of one cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCluster {
    pub cluster_arn: String,
    #[serde(default)]
    pub container_instances: Vec<ContainerInstanceDescription>,
    #[serde(default)]
    pub tasks: Vec<TaskDescription>,
    #[serde(default)]
    pub services: Vec<ServiceDescription>,
}

/// Datapoints of one utilization metric for one service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotService {
    pub cluster_name: String,
    pub service_name: String,
    pub metric_name: String,
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
}

/// Complete fleet snapshot document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSnapshot {
    #[serde(default)]
    pub clusters: Vec<SnapshotCluster>,
    #[serde(default)]
    pub capacity_providers: Vec<CapacityProviderDescription>,
    #[serde(default)]
    pub auto_scaling_groups: Vec<AutoScalingGroupDescription>,
    /// Scaling policies keyed by auto scaling group name
    #[serde(default)]
    pub scaling_policies: BTreeMap<String, Vec<ScalingPolicyDescription>>,
    #[serde(default)]
    pub service_metrics: Vec<SnapshotService>,
}

impl FleetSnapshot {
    fn cluster(&self, operation: &str, cluster_arn: &str) -> Result<&SnapshotCluster> {
        self.clusters
            .iter()
            .find(|c| c.cluster_arn == cluster_arn)
            .ok_or_else(|| {
                InventoryError::upstream(operation, format!("cluster not found: {}", cluster_arn))
            })
    }
}

/// Upstream implementation serving a [`FleetSnapshot`]
pub struct SnapshotUpstream {
    snapshot: FleetSnapshot,
    page_size: usize,
    /// (operation, item count) per call, in call order
    calls: Mutex<Vec<(&'static str, usize)>>,
    /// (operation, cluster arn) pairs that fail on purpose
    failures: HashSet<(&'static str, String)>,
}

impl SnapshotUpstream {
    pub fn new(snapshot: FleetSnapshot) -> Self {
        Self {
            snapshot,
            page_size: DEFAULT_PAGE_SIZE,
            calls: Mutex::new(Vec::new()),
            failures: HashSet::new(),
        }
    }

    /// Load a snapshot document from disk
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| InventoryError::io(path, e))?;
        let snapshot: FleetSnapshot = serde_json::from_str(&content)?;
        debug!(
            path = %path.display(),
            clusters = snapshot.clusters.len(),
            "Loaded fleet snapshot"
        );
        Ok(Self::new(snapshot))
    }

    /// Serve listings in pages of `page_size` items (minimum 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make `operation` fail whenever it is called for `cluster_arn`
    pub fn fail_on(mut self, operation: &'static str, cluster_arn: impl Into<String>) -> Self {
        self.failures.insert((operation, cluster_arn.into()));
        self
    }

    pub fn snapshot(&self) -> &FleetSnapshot {
        &self.snapshot
    }

    /// Number of calls made to `operation`
    pub fn call_count(&self, operation: &str) -> usize {
        self.lock_calls()
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }

    /// Item counts of each call made to `operation`, in call order
    pub fn call_sizes(&self, operation: &str) -> Vec<usize> {
        self.lock_calls()
            .iter()
            .filter(|(op, _)| *op == operation)
            .map(|(_, size)| *size)
            .collect()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<(&'static str, usize)>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, operation: &'static str, size: usize, cluster_arn: &str) -> Result<()> {
        self.lock_calls().push((operation, size));
        if self.failures.contains(&(operation, cluster_arn.to_string())) {
            return Err(InventoryError::upstream(
                operation,
                format!("injected failure for {}", cluster_arn),
            ));
        }
        Ok(())
    }

    fn paginate<T: Clone>(
        &self,
        operation: &str,
        items: Vec<T>,
        next_token: Option<String>,
    ) -> Result<Page<T>> {
        let start = match next_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                InventoryError::upstream(operation, format!("invalid next token {:?}", token))
            })?,
            None => 0,
        };
        let end = (start + self.page_size).min(items.len());
        let page_items = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
        let next_token = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: page_items,
            next_token,
        })
    }
}

#[async_trait]
impl ContainerPlatform for SnapshotUpstream {
    async fn list_clusters(&self, next_token: Option<String>) -> Result<Page<String>> {
        self.record(LIST_CLUSTERS, 0, "*")?;
        let arns = self
            .snapshot
            .clusters
            .iter()
            .map(|c| c.cluster_arn.clone())
            .collect();
        self.paginate(LIST_CLUSTERS, arns, next_token)
    }

    async fn list_container_instances(
        &self,
        cluster: &str,
        status: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        self.record(LIST_CONTAINER_INSTANCES, 0, cluster)?;
        let arns = self
            .snapshot
            .cluster(LIST_CONTAINER_INSTANCES, cluster)?
            .container_instances
            .iter()
            .filter(|i| i.status == status)
            .map(|i| i.container_instance_arn.clone())
            .collect();
        self.paginate(LIST_CONTAINER_INSTANCES, arns, next_token)
    }

    async fn describe_container_instances(
        &self,
        cluster: &str,
        instance_arns: &[String],
    ) -> Result<Vec<ContainerInstanceDescription>> {
        self.record(DESCRIBE_CONTAINER_INSTANCES, instance_arns.len(), cluster)?;
        let instances = &self
            .snapshot
            .cluster(DESCRIBE_CONTAINER_INSTANCES, cluster)?
            .container_instances;
        Ok(instance_arns
            .iter()
            .filter_map(|arn| instances.iter().find(|i| &i.container_instance_arn == arn))
            .cloned()
            .collect())
    }

    async fn list_tasks(
        &self,
        cluster: &str,
        desired_status: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        self.record(LIST_TASKS, 0, cluster)?;
        let arns = self
            .snapshot
            .cluster(LIST_TASKS, cluster)?
            .tasks
            .iter()
            .filter(|t| t.desired_status == desired_status)
            .map(|t| t.task_arn.clone())
            .collect();
        self.paginate(LIST_TASKS, arns, next_token)
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
    ) -> Result<Vec<TaskDescription>> {
        self.record(DESCRIBE_TASKS, task_arns.len(), cluster)?;
        let tasks = &self.snapshot.cluster(DESCRIBE_TASKS, cluster)?.tasks;
        Ok(task_arns
            .iter()
            .filter_map(|arn| tasks.iter().find(|t| &t.task_arn == arn))
            .cloned()
            .collect())
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Option<ServiceDescription>> {
        self.record(DESCRIBE_SERVICES, 1, cluster)?;
        Ok(self
            .snapshot
            .cluster(DESCRIBE_SERVICES, cluster)?
            .services
            .iter()
            .find(|s| s.service_name == service)
            .cloned())
    }

    async fn describe_capacity_provider(
        &self,
        name: &str,
    ) -> Result<Option<CapacityProviderDescription>> {
        self.record(DESCRIBE_CAPACITY_PROVIDERS, 1, name)?;
        Ok(self
            .snapshot
            .capacity_providers
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }
}

#[async_trait]
impl MetricStatistics for SnapshotUpstream {
    async fn get_metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
        let cluster_name = query.dimension("ClusterName").unwrap_or_default();
        let service_name = query.dimension("ServiceName").unwrap_or_default();
        self.record(GET_METRIC_STATISTICS, 1, cluster_name)?;
        Ok(self
            .snapshot
            .service_metrics
            .iter()
            .find(|m| {
                m.cluster_name == cluster_name
                    && m.service_name == service_name
                    && m.metric_name == query.metric_name
            })
            .map(|m| m.datapoints.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AutoScaling for SnapshotUpstream {
    async fn describe_auto_scaling_group(
        &self,
        name: &str,
    ) -> Result<Option<AutoScalingGroupDescription>> {
        self.record(DESCRIBE_AUTO_SCALING_GROUPS, 1, name)?;
        Ok(self
            .snapshot
            .auto_scaling_groups
            .iter()
            .find(|g| g.auto_scaling_group_name == name)
            .cloned())
    }

    async fn describe_policies(
        &self,
        group_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<ScalingPolicyDescription>> {
        self.record(DESCRIBE_POLICIES, 0, group_name)?;
        let policies = self
            .snapshot
            .scaling_policies
            .get(group_name)
            .cloned()
            .unwrap_or_default();
        self.paginate(DESCRIBE_POLICIES, policies, next_token)
    }
}
