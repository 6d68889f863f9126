//! Capacity provider scaling details, memoized per run
//!
//! An instance launched through a capacity provider is reported together with
//! the provider's managed scaling policy, its auto scaling group, the metrics
//! that group publishes and the group's scaling policies. Instances of one
//! cluster usually share a provider, so each provider is resolved once.

use crate::collector::collect_pages;
use crate::error::Result;
use crate::identity::last_segment;
use crate::observability::InventoryMetrics;
use crate::report::{FieldValue, ReportRecord};
use crate::upstream::operations::{
    DESCRIBE_AUTO_SCALING_GROUPS, DESCRIBE_CAPACITY_PROVIDERS, DESCRIBE_POLICIES,
};
use crate::upstream::{AutoScaling, ContainerPlatform, EnabledMetric};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name and target tracking configuration of one scaling policy
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingPolicySummary {
    pub policy_name: String,
    pub target_tracking_configuration: Option<serde_json::Value>,
}

/// Auto scaling group behind a capacity provider
#[derive(Debug, Clone, PartialEq)]
pub struct AutoScalingGroupDetails {
    pub arn: String,
    /// `None` when the group itself could not be described
    pub enabled_metrics: Option<Vec<EnabledMetric>>,
    pub scaling_policies: Vec<ScalingPolicySummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapacityProviderDetails {
    pub name: String,
    pub managed_scaling: Option<serde_json::Value>,
    pub auto_scaling_group: Option<AutoScalingGroupDetails>,
}

impl CapacityProviderDetails {
    /// Capacity columns of an instance record
    pub fn to_record(&self) -> Result<ReportRecord> {
        let mut record = ReportRecord::new();
        record.set("capacityProviderName", self.name.as_str());

        if let Some(managed_scaling) = &self.managed_scaling {
            record.set("managedScaling", FieldValue::pretty_json(managed_scaling)?);
        }
        if let Some(group) = &self.auto_scaling_group {
            record
                .set("asgArn", group.arn.as_str())
                .set("scalingPolicies", FieldValue::pretty_json(&group.scaling_policies)?);
            if let Some(enabled_metrics) = &group.enabled_metrics {
                record.set("asgMetrics", FieldValue::json(enabled_metrics)?);
            }
        }
        Ok(record)
    }
}

/// Memoizing provider name → [`CapacityProviderDetails`] lookup
pub struct CapacityProviderCache {
    platform: Arc<dyn ContainerPlatform>,
    autoscaling: Arc<dyn AutoScaling>,
    metrics: InventoryMetrics,
    entries: HashMap<String, Option<CapacityProviderDetails>>,
}

impl CapacityProviderCache {
    pub fn new(
        platform: Arc<dyn ContainerPlatform>,
        autoscaling: Arc<dyn AutoScaling>,
        metrics: InventoryMetrics,
    ) -> Self {
        Self {
            platform,
            autoscaling,
            metrics,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Details of provider `name`, fetching them on first use
    pub async fn lookup(&mut self, name: &str) -> Result<Option<&CapacityProviderDetails>> {
        let hit = self.entries.contains_key(name);
        self.metrics.inc_capacity_provider_cache(hit);

        if !hit {
            let details = self.fetch(name).await?;
            self.entries.insert(name.to_string(), details);
        }

        Ok(self.entries.get(name).and_then(Option::as_ref))
    }

    async fn fetch(&self, name: &str) -> Result<Option<CapacityProviderDetails>> {
        debug!(capacity_provider = %name, "Gathering capacity provider details");

        self.metrics.inc_upstream_call(DESCRIBE_CAPACITY_PROVIDERS);
        let Some(provider) = self.platform.describe_capacity_provider(name).await? else {
            warn!(capacity_provider = %name, "Capacity provider not found, omitting scaling columns");
            return Ok(None);
        };

        let (managed_scaling, auto_scaling_group) = match provider.auto_scaling_group_provider {
            Some(asg_provider) => (
                asg_provider.managed_scaling,
                Some(self.fetch_group(&asg_provider.auto_scaling_group_arn).await?),
            ),
            None => {
                debug!(capacity_provider = %name, "Capacity provider has no auto scaling group");
                (None, None)
            }
        };

        Ok(Some(CapacityProviderDetails {
            name: provider.name,
            managed_scaling,
            auto_scaling_group,
        }))
    }

    async fn fetch_group(&self, asg_arn: &str) -> Result<AutoScalingGroupDetails> {
        let group_name = last_segment(asg_arn);

        self.metrics.inc_upstream_call(DESCRIBE_AUTO_SCALING_GROUPS);
        let enabled_metrics = match self.autoscaling.describe_auto_scaling_group(group_name).await? {
            Some(group) => Some(group.enabled_metrics),
            None => {
                warn!(asg = %group_name, "Auto scaling group not found, omitting its metrics");
                None
            }
        };

        let autoscaling = &self.autoscaling;
        let metrics = &self.metrics;
        let policies = collect_pages(DESCRIBE_POLICIES, |token| {
            metrics.inc_upstream_call(DESCRIBE_POLICIES);
            autoscaling.describe_policies(group_name, token)
        })
        .await?;

        Ok(AutoScalingGroupDetails {
            arn: asg_arn.to_string(),
            enabled_metrics,
            scaling_policies: policies
                .into_iter()
                .map(|p| ScalingPolicySummary {
                    policy_name: p.policy_name,
                    target_tracking_configuration: p.target_tracking_configuration,
                })
                .collect(),
        })
    }
}
