//! Response shapes returned by the upstream APIs
//!
//! Field names follow the upstream services: the container platform speaks
//! camelCase, auto scaling and metric statistics speak PascalCase. Quantities
//! stay raw here and are normalized in [`crate::models`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A quantity as the upstream returns it: a JSON number or a numeric string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawQuantity {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for RawQuantity {
    fn from(value: i64) -> Self {
        RawQuantity::Integer(value)
    }
}

impl From<&str> for RawQuantity {
    fn from(value: &str) -> Self {
        RawQuantity::Text(value.to_string())
    }
}

/// One registered resource of a container instance (CPU, MEMORY, PORTS, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredResource {
    pub name: String,
    #[serde(default)]
    pub integer_value: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInstanceDescription {
    pub container_instance_arn: String,
    #[serde(default)]
    pub ec2_instance_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub registered_resources: Vec<RegisteredResource>,
    #[serde(default)]
    pub capacity_provider_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDescription {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cpu: Option<RawQuantity>,
    #[serde(default)]
    pub memory: Option<RawQuantity>,
    #[serde(default)]
    pub memory_reservation: Option<RawQuantity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescription {
    pub task_arn: String,
    #[serde(default)]
    pub task_definition_arn: String,
    #[serde(default)]
    pub launch_type: String,
    #[serde(default)]
    pub desired_status: String,
    #[serde(default)]
    pub last_status: String,
    #[serde(default)]
    pub cpu: Option<RawQuantity>,
    #[serde(default)]
    pub memory: Option<RawQuantity>,
    #[serde(default)]
    pub containers: Vec<ContainerDescription>,
    #[serde(default)]
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementStrategy {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementConstraint {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescription {
    pub service_name: String,
    #[serde(default)]
    pub placement_strategy: Vec<PlacementStrategy>,
    #[serde(default)]
    pub placement_constraints: Vec<PlacementConstraint>,
    #[serde(default)]
    pub scheduling_strategy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoScalingGroupProvider {
    pub auto_scaling_group_arn: String,
    #[serde(default)]
    pub managed_scaling: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityProviderDescription {
    pub name: String,
    #[serde(default)]
    pub auto_scaling_group_provider: Option<AutoScalingGroupProvider>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnabledMetric {
    pub metric: String,
    #[serde(default)]
    pub granularity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoScalingGroupDescription {
    pub auto_scaling_group_name: String,
    #[serde(default, rename = "AutoScalingGroupARN")]
    pub auto_scaling_group_arn: Option<String>,
    #[serde(default)]
    pub enabled_metrics: Vec<EnabledMetric>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScalingPolicyDescription {
    pub policy_name: String,
    #[serde(default)]
    pub policy_type: Option<String>,
    #[serde(default)]
    pub target_tracking_configuration: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Datapoint {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}
