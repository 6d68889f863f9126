//! Cluster orchestration
//!
//! Drives the whole inventory once per cluster: instances first, then tasks,
//! then both report files, which land together or not at all. Everything runs
//! sequentially; a failure inside one cluster is logged and counted and the
//! next cluster proceeds.

mod instances;
mod tasks;

#[cfg(test)]
mod tests;

use crate::collector::{collect_pages, MAX_DESCRIBE_BATCH};
use crate::enrichment::{
    CapacityProviderCache, ServiceCache, UtilizationWindow, DEFAULT_METRIC_NAMESPACE,
};
use crate::error::{InventoryError, Result};
use crate::identity::{cluster_short_name, SERVICE_GROUP_PREFIX};
use crate::observability::{InventoryMetrics, StructuredLogger};
use crate::report::{ReportAssembler, ReportKind};
use crate::upstream::operations::LIST_CLUSTERS;
use crate::upstream::{AutoScaling, ContainerPlatform, MetricStatistics};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for one inventory run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory the report files are written to (must exist)
    pub output_dir: PathBuf,
    /// Identifiers per describe call, clamped to `1..=100`
    pub batch_size: usize,
    /// Length of the utilization window in days
    pub metric_window_days: i64,
    /// Namespace of service utilization metrics
    pub metric_namespace: String,
    /// Task group prefix marking service-owned tasks
    pub service_group_prefix: String,
    /// Instance status listed
    pub instance_status: String,
    /// Task desired status listed
    pub task_desired_status: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            batch_size: MAX_DESCRIBE_BATCH,
            metric_window_days: 7,
            metric_namespace: DEFAULT_METRIC_NAMESPACE.to_string(),
            service_group_prefix: SERVICE_GROUP_PREFIX.to_string(),
            instance_status: "ACTIVE".to_string(),
            task_desired_status: "RUNNING".to_string(),
        }
    }
}

/// How one cluster ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ClusterOutcome {
    Written {
        instances_path: PathBuf,
        tasks_path: PathBuf,
    },
    Failed {
        error: String,
    },
}

/// Per-cluster result of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster_arn: String,
    pub short_name: String,
    pub instances: usize,
    pub tasks: usize,
    pub skipped: usize,
    pub outcome: ClusterOutcome,
}

impl ClusterSummary {
    pub fn is_written(&self) -> bool {
        matches!(self.outcome, ClusterOutcome::Written { .. })
    }
}

/// Result of a full run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub clusters: Vec<ClusterSummary>,
}

impl RunSummary {
    pub fn written(&self) -> usize {
        self.clusters.iter().filter(|c| c.is_written()).count()
    }

    pub fn failed(&self) -> usize {
        self.clusters.len() - self.written()
    }
}

/// Records gathered by one stage of a cluster
pub(crate) struct StageOutput {
    pub report: ReportAssembler,
    pub skipped: usize,
}

/// A report written under a staging name, waiting to be moved into place
struct StagedReport {
    staging: PathBuf,
    path: PathBuf,
}

impl StagedReport {
    fn commit(&self) -> Result<()> {
        std::fs::rename(&self.staging, &self.path).map_err(|e| InventoryError::io(&self.path, e))
    }

    fn discard(&self) {
        remove_quietly(&self.staging);
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove report file");
        }
    }
}

/// Runs the inventory pipeline over every cluster
pub struct ClusterOrchestrator {
    platform: Arc<dyn ContainerPlatform>,
    config: PipelineConfig,
    services: ServiceCache,
    capacity_providers: CapacityProviderCache,
    metrics: InventoryMetrics,
    logger: StructuredLogger,
}

impl ClusterOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Inventory every cluster
    ///
    /// Consumes the orchestrator so the lookup caches end with the run. Only a
    /// failure to list clusters aborts the run; per-cluster failures are
    /// reported in the summary.
    pub async fn run(mut self) -> Result<RunSummary> {
        let started = Instant::now();

        let platform = &self.platform;
        let metrics = &self.metrics;
        let clusters = collect_pages(LIST_CLUSTERS, |token| {
            metrics.inc_upstream_call(LIST_CLUSTERS);
            platform.list_clusters(token)
        })
        .await?;

        self.logger.log_run_start(clusters.len());

        let mut summaries = Vec::with_capacity(clusters.len());
        for cluster_arn in &clusters {
            summaries.push(self.run_cluster(cluster_arn).await);
        }

        let summary = RunSummary {
            run_id: self.logger.run_id().to_string(),
            clusters: summaries,
        };
        self.logger.log_run_complete(
            summary.written(),
            summary.failed(),
            started.elapsed().as_secs_f64(),
        );
        debug!(
            services = self.services.len(),
            capacity_providers = self.capacity_providers.len(),
            "Lookup caches released"
        );
        Ok(summary)
    }

    /// Inventory one cluster, isolating its failure from the rest of the run
    async fn run_cluster(&mut self, cluster_arn: &str) -> ClusterSummary {
        let started = Instant::now();
        let short_name = cluster_short_name(cluster_arn).to_string();
        self.logger.log_cluster_start(cluster_arn, &short_name);

        let result = self.process_cluster(cluster_arn, &short_name).await;
        self.metrics
            .observe_cluster_duration(started.elapsed().as_secs_f64());

        match result {
            Ok(summary) => {
                self.metrics.inc_cluster_outcome("written");
                summary
            }
            Err(e) => {
                self.logger.log_cluster_failed(cluster_arn, &e.to_string());
                self.metrics.inc_cluster_outcome("failed");
                ClusterSummary {
                    cluster_arn: cluster_arn.to_string(),
                    short_name,
                    instances: 0,
                    tasks: 0,
                    skipped: 0,
                    outcome: ClusterOutcome::Failed {
                        error: e.to_string(),
                    },
                }
            }
        }
    }

    /// Gather both reports, then write both or neither
    async fn process_cluster(&mut self, cluster_arn: &str, short_name: &str) -> Result<ClusterSummary> {
        let instances = self.instance_report(cluster_arn).await?;
        let tasks = self.task_report(cluster_arn).await?;

        let (instances_path, tasks_path) =
            self.write_reports(cluster_arn, short_name, &instances.report, &tasks.report)?;

        Ok(ClusterSummary {
            cluster_arn: cluster_arn.to_string(),
            short_name: short_name.to_string(),
            instances: instances.report.len(),
            tasks: tasks.report.len(),
            skipped: instances.skipped + tasks.skipped,
            outcome: ClusterOutcome::Written {
                instances_path,
                tasks_path,
            },
        })
    }

    /// Write the report pair of a cluster
    ///
    /// Both files are written under staging names in the output directory and
    /// moved into place only once both exist. The tasks file moves first, so
    /// a failed move never leaves an instance report behind.
    fn write_reports(
        &self,
        cluster_arn: &str,
        short_name: &str,
        instances: &ReportAssembler,
        tasks: &ReportAssembler,
    ) -> Result<(PathBuf, PathBuf)> {
        let staged_instances = self.stage_report(short_name, instances)?;
        let staged_tasks = match self.stage_report(short_name, tasks) {
            Ok(staged) => staged,
            Err(e) => {
                staged_instances.discard();
                return Err(e);
            }
        };

        if let Err(e) = staged_tasks.commit() {
            staged_instances.discard();
            staged_tasks.discard();
            return Err(e);
        }
        if let Err(e) = staged_instances.commit() {
            staged_instances.discard();
            remove_quietly(&staged_tasks.path);
            return Err(e);
        }

        self.record_written(cluster_arn, instances, &staged_instances.path);
        self.record_written(cluster_arn, tasks, &staged_tasks.path);
        Ok((staged_instances.path, staged_tasks.path))
    }

    fn stage_report(&self, short_name: &str, report: &ReportAssembler) -> Result<StagedReport> {
        let file_name = report.kind().file_name(short_name);
        let staged = StagedReport {
            staging: self.config.output_dir.join(format!(".{}.partial", file_name)),
            path: self.config.output_dir.join(file_name),
        };

        if let Err(e) = report.write_file(&staged.staging) {
            staged.discard();
            return Err(e);
        }
        Ok(staged)
    }

    fn record_written(&self, cluster_arn: &str, report: &ReportAssembler, path: &Path) {
        self.metrics
            .add_records_written(report.kind().as_str(), report.len());
        self.logger.log_report_written(
            cluster_arn,
            report.kind().as_str(),
            &path.display().to_string(),
            report.len(),
            report.columns().len(),
        );
    }

    /// Count and log a record dropped as incomplete
    pub(crate) fn skip_record(&self, cluster_arn: &str, kind: ReportKind, error: &InventoryError) {
        self.metrics.inc_records_skipped(kind.as_str());
        self.logger
            .log_record_skipped(cluster_arn, kind.as_str(), &error.to_string());
    }
}

/// Builder for [`ClusterOrchestrator`]
pub struct OrchestratorBuilder {
    platform: Option<Arc<dyn ContainerPlatform>>,
    metrics_api: Option<Arc<dyn MetricStatistics>>,
    autoscaling: Option<Arc<dyn AutoScaling>>,
    config: PipelineConfig,
    window_end: Option<DateTime<Utc>>,
    metrics: Option<InventoryMetrics>,
    run_id: Option<String>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            platform: None,
            metrics_api: None,
            autoscaling: None,
            config: PipelineConfig::default(),
            window_end: None,
            metrics: None,
            run_id: None,
        }
    }

    /// Set the container platform client
    pub fn platform(mut self, platform: Arc<dyn ContainerPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set the metric statistics client
    pub fn metrics_api(mut self, metrics_api: Arc<dyn MetricStatistics>) -> Self {
        self.metrics_api = Some(metrics_api);
        self
    }

    /// Set the auto scaling client
    pub fn autoscaling(mut self, autoscaling: Arc<dyn AutoScaling>) -> Self {
        self.autoscaling = Some(autoscaling);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = output_dir.into();
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// End of the utilization window (defaults to now)
    pub fn window_end(mut self, end: DateTime<Utc>) -> Self {
        self.window_end = Some(end);
        self
    }

    pub fn metrics(mut self, metrics: InventoryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn build(self) -> Result<ClusterOrchestrator> {
        let platform = self
            .platform
            .ok_or_else(|| InventoryError::Config("platform client is required".into()))?;
        let metrics_api = self
            .metrics_api
            .ok_or_else(|| InventoryError::Config("metrics client is required".into()))?;
        let autoscaling = self
            .autoscaling
            .ok_or_else(|| InventoryError::Config("auto scaling client is required".into()))?;
        if self.config.metric_window_days <= 0 {
            return Err(InventoryError::Config(format!(
                "metric window must be at least one day, got {}",
                self.config.metric_window_days
            )));
        }

        let window_end = self.window_end.unwrap_or_else(Utc::now);
        let metrics = self.metrics.unwrap_or_default();
        let run_id = self
            .run_id
            .unwrap_or_else(|| window_end.format("%Y%m%dT%H%M%SZ").to_string());
        let window = UtilizationWindow::trailing(window_end, self.config.metric_window_days);

        info!(
            output_dir = %self.config.output_dir.display(),
            batch_size = self.config.batch_size,
            window_start = %window.start,
            window_end = %window.end,
            "Inventory pipeline configured"
        );

        Ok(ClusterOrchestrator {
            services: ServiceCache::new(
                platform.clone(),
                metrics_api,
                window,
                self.config.metric_namespace.clone(),
                metrics.clone(),
            ),
            capacity_providers: CapacityProviderCache::new(
                platform.clone(),
                autoscaling,
                metrics.clone(),
            ),
            platform,
            config: self.config,
            metrics,
            logger: StructuredLogger::new(run_id),
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
