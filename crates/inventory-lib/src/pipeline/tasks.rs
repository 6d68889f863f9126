//! Running task report

use super::{ClusterOrchestrator, StageOutput};
use crate::allocation::resolve_allocation;
use crate::collector::{collect_pages, describe_in_batches};
use crate::error::Result;
use crate::identity::service_from_group;
use crate::models::{DeclaredContainer, Workload};
use crate::report::{FieldValue, ReportAssembler, ReportKind, ReportRecord};
use crate::upstream::operations::{DESCRIBE_TASKS, LIST_TASKS};
use tracing::debug;

impl ClusterOrchestrator {
    /// One row per running task with its resolved allocation and, for tasks
    /// owned by a service, the service's placement and utilization
    pub(crate) async fn task_report(&mut self, cluster_arn: &str) -> Result<StageOutput> {
        let platform = &self.platform;
        let metrics = &self.metrics;
        let desired_status = self.config.task_desired_status.as_str();

        let arns = collect_pages(LIST_TASKS, |token| {
            metrics.inc_upstream_call(LIST_TASKS);
            platform.list_tasks(cluster_arn, desired_status, token)
        })
        .await?;

        let descriptions = describe_in_batches(DESCRIBE_TASKS, &arns, self.config.batch_size, |group| {
            metrics.inc_upstream_call(DESCRIBE_TASKS);
            platform.describe_tasks(cluster_arn, group)
        })
        .await?;

        let mut report = ReportAssembler::new(ReportKind::Tasks);
        let mut skipped = 0;

        for description in &descriptions {
            debug!(task = %description.task_arn, "Gathering details for task");

            let resolved = Workload::from_description(description).and_then(|workload| {
                let allocation = resolve_allocation(&workload)?;
                Ok((workload, allocation))
            });
            let (workload, allocation) = match resolved {
                Ok(resolved) => resolved,
                Err(e) if e.is_record_level() => {
                    self.skip_record(cluster_arn, ReportKind::Tasks, &e);
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let declared: Vec<DeclaredContainer> =
                description.containers.iter().map(DeclaredContainer::from).collect();

            let mut record = ReportRecord::new();
            record
                .set("cluster", cluster_arn)
                .set("taskArn", workload.arn.as_str())
                .set("taskDefinitionArn", workload.task_definition_arn.as_str())
                .set("launchType", workload.launch_type.as_str())
                .set("desiredStatus", workload.desired_status.as_str())
                .set("lastStatus", workload.last_status.as_str())
                .set("cpuAllocation", allocation.cpu.amount)
                .set("cpuType", allocation.cpu.source.as_str())
                .set("memoryAllocation", allocation.memory.amount)
                .set("memoryType", allocation.memory.source.as_str())
                .set("containers", FieldValue::json(&declared)?)
                .set("group", workload.group.as_str());

            if let Some(service) = service_from_group(&workload.group, &self.config.service_group_prefix) {
                if let Some(details) = self.services.lookup(cluster_arn, service).await? {
                    record.extend(details.to_record()?);
                }
            }

            report.push(record);
        }

        Ok(StageOutput { report, skipped })
    }
}
