//! Container instance report

use super::{ClusterOrchestrator, StageOutput};
use crate::collector::{collect_pages, describe_in_batches};
use crate::error::Result;
use crate::models::Instance;
use crate::report::{ReportAssembler, ReportKind, ReportRecord};
use crate::upstream::operations::{DESCRIBE_CONTAINER_INSTANCES, LIST_CONTAINER_INSTANCES};
use tracing::debug;

impl ClusterOrchestrator {
    /// One row per active container instance, with capacity provider scaling
    /// details when the instance was launched through a provider
    pub(crate) async fn instance_report(&mut self, cluster_arn: &str) -> Result<StageOutput> {
        let platform = &self.platform;
        let metrics = &self.metrics;
        let status = self.config.instance_status.as_str();

        let arns = collect_pages(LIST_CONTAINER_INSTANCES, |token| {
            metrics.inc_upstream_call(LIST_CONTAINER_INSTANCES);
            platform.list_container_instances(cluster_arn, status, token)
        })
        .await?;

        let descriptions =
            describe_in_batches(DESCRIBE_CONTAINER_INSTANCES, &arns, self.config.batch_size, |group| {
                metrics.inc_upstream_call(DESCRIBE_CONTAINER_INSTANCES);
                platform.describe_container_instances(cluster_arn, group)
            })
            .await?;

        let mut report = ReportAssembler::new(ReportKind::Instances);
        let mut skipped = 0;

        for description in &descriptions {
            debug!(
                instance = %description.container_instance_arn,
                "Gathering details for container instance"
            );

            let instance = match Instance::from_description(description) {
                Ok(instance) => instance,
                Err(e) if e.is_record_level() => {
                    self.skip_record(cluster_arn, ReportKind::Instances, &e);
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut record = ReportRecord::new();
            record
                .set("cluster", cluster_arn)
                .set("instanceId", instance.ec2_instance_id.as_str())
                .set("status", instance.status.as_str())
                .set("cpu", instance.cpu)
                .set("memory", instance.memory);

            if let Some(provider_name) = &instance.capacity_provider_name {
                match self.capacity_providers.lookup(provider_name).await? {
                    Some(details) => {
                        record.extend(details.to_record()?);
                    }
                    None => {
                        record.set("capacityProviderName", provider_name.as_str());
                    }
                }
            }

            report.push(record);
        }

        Ok(StageOutput { report, skipped })
    }
}
