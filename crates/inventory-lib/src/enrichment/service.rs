//! Service placement and utilization lookups, memoized per run
//!
//! Many tasks of a cluster belong to the same service, so each
//! (cluster, service) pair is described and measured once. Entries live as
//! long as the cache, which the orchestrator drops at the end of the run.

use crate::error::Result;
use crate::identity::last_segment;
use crate::models::UtilizationStats;
use crate::observability::InventoryMetrics;
use crate::report::{FieldValue, ReportRecord};
use crate::upstream::operations::{DESCRIBE_SERVICES, GET_METRIC_STATISTICS};
use crate::upstream::{
    ContainerPlatform, Dimension, MetricQuery, MetricStatistics, PlacementConstraint,
    PlacementStrategy, Statistic,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MEMORY_UTILIZATION: &str = "MemoryUtilization";
pub const CPU_UTILIZATION: &str = "CPUUtilization";

/// Default namespace of the container platform's service metrics
pub const DEFAULT_METRIC_NAMESPACE: &str = "AWS/ECS";

/// Time window the utilization statistics cover, as one aggregation bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilizationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UtilizationWindow {
    /// The `days` leading up to `end`
    pub fn trailing(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    /// Bucket length covering the whole window
    pub fn period_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Placement policy and utilization of one service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDetails {
    pub placement_strategy: Vec<PlacementStrategy>,
    pub placement_constraints: Vec<PlacementConstraint>,
    pub scheduling_strategy: Option<String>,
    /// `None` when the window holds no datapoints
    pub memory: Option<UtilizationStats>,
    pub cpu: Option<UtilizationStats>,
}

impl ServiceDetails {
    /// Service columns of a task record
    pub fn to_record(&self) -> Result<ReportRecord> {
        let mut record = ReportRecord::new();
        record
            .set("placementStrategy", FieldValue::json(&self.placement_strategy)?)
            .set(
                "placementConstraints",
                FieldValue::json(&self.placement_constraints)?,
            )
            .set_opt("schedulingStrategy", self.scheduling_strategy.clone());

        if let Some(memory) = &self.memory {
            record
                .set_opt("memoryAverage", memory.average)
                .set_opt("memoryMaximum", memory.maximum);
        }
        if let Some(cpu) = &self.cpu {
            record
                .set_opt("cpuAverage", cpu.average)
                .set_opt("cpuMaximum", cpu.maximum);
        }
        Ok(record)
    }
}

/// Memoizing (cluster, service) → [`ServiceDetails`] lookup
pub struct ServiceCache {
    platform: Arc<dyn ContainerPlatform>,
    metrics_api: Arc<dyn MetricStatistics>,
    window: UtilizationWindow,
    namespace: String,
    metrics: InventoryMetrics,
    /// `None` values remember services the platform did not return
    entries: HashMap<(String, String), Option<ServiceDetails>>,
}

impl ServiceCache {
    pub fn new(
        platform: Arc<dyn ContainerPlatform>,
        metrics_api: Arc<dyn MetricStatistics>,
        window: UtilizationWindow,
        namespace: impl Into<String>,
        metrics: InventoryMetrics,
    ) -> Self {
        Self {
            platform,
            metrics_api,
            window,
            namespace: namespace.into(),
            metrics,
            entries: HashMap::new(),
        }
    }

    pub fn window(&self) -> UtilizationWindow {
        self.window
    }

    /// Number of distinct (cluster, service) pairs looked up so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Details for `service` in `cluster_arn`, fetching them on first use
    ///
    /// Upstream errors propagate and are not cached.
    pub async fn lookup(&mut self, cluster_arn: &str, service: &str) -> Result<Option<&ServiceDetails>> {
        let key = (cluster_arn.to_string(), service.to_string());
        let hit = self.entries.contains_key(&key);
        self.metrics.inc_service_cache(hit);

        if !hit {
            let details = self.fetch(cluster_arn, service).await?;
            self.entries.insert(key.clone(), details);
        }

        Ok(self.entries.get(&key).and_then(Option::as_ref))
    }

    async fn fetch(&self, cluster_arn: &str, service: &str) -> Result<Option<ServiceDetails>> {
        debug!(cluster = %cluster_arn, service = %service, "Gathering details for service");

        self.metrics.inc_upstream_call(DESCRIBE_SERVICES);
        let Some(description) = self.platform.describe_service(cluster_arn, service).await? else {
            warn!(
                cluster = %cluster_arn,
                service = %service,
                "Service not returned by the platform, omitting service columns"
            );
            return Ok(None);
        };

        let memory = self
            .fetch_utilization(cluster_arn, service, MEMORY_UTILIZATION)
            .await?;
        let cpu = self
            .fetch_utilization(cluster_arn, service, CPU_UTILIZATION)
            .await?;

        Ok(Some(ServiceDetails {
            placement_strategy: description.placement_strategy,
            placement_constraints: description.placement_constraints,
            scheduling_strategy: description.scheduling_strategy,
            memory,
            cpu,
        }))
    }

    /// First datapoint's average and maximum, or `None` for an empty window
    async fn fetch_utilization(
        &self,
        cluster_arn: &str,
        service: &str,
        metric_name: &str,
    ) -> Result<Option<UtilizationStats>> {
        let query = MetricQuery {
            namespace: self.namespace.clone(),
            metric_name: metric_name.to_string(),
            dimensions: vec![
                Dimension::new("ClusterName", last_segment(cluster_arn)),
                Dimension::new("ServiceName", service),
            ],
            start_time: self.window.start,
            end_time: self.window.end,
            period_secs: self.window.period_secs(),
            statistics: vec![Statistic::Average, Statistic::Maximum],
            unit: "Percent".to_string(),
        };

        self.metrics.inc_upstream_call(GET_METRIC_STATISTICS);
        let datapoints = self.metrics_api.get_metric_statistics(&query).await?;

        match datapoints.first() {
            Some(point) => Ok(Some(UtilizationStats {
                average: point.average,
                maximum: point.maximum,
            })),
            None => {
                warn!(
                    cluster = %cluster_arn,
                    service = %service,
                    metric = %metric_name,
                    "No datapoints in utilization window, omitting metric columns"
                );
                self.metrics.inc_metric_gap(metric_name);
                Ok(None)
            }
        }
    }
}
