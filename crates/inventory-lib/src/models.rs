//! Core data models for the inventory pipeline
//!
//! Upstream descriptions are converted into these types right after each
//! detail fetch. Quantities become `Option<u64>` where `None` covers absent,
//! empty, `0` and `"0"` alike, so nothing downstream re-checks sentinels.

use crate::error::{InventoryError, Result};
use crate::upstream::{ContainerDescription, ContainerInstanceDescription, RawQuantity, TaskDescription};
use serde::{Deserialize, Serialize};

/// Registered resource names carrying host capacity
pub const CPU_RESOURCE: &str = "CPU";
pub const MEMORY_RESOURCE: &str = "MEMORY";

/// Normalize a raw upstream quantity
///
/// Returns `Ok(None)` for absent, empty and zero values.
pub fn normalize_quantity(
    raw: Option<&RawQuantity>,
    entity: &str,
    field: &str,
) -> Result<Option<u64>> {
    let invalid = |value: String| InventoryError::InvalidQuantity {
        entity: entity.to_string(),
        field: field.to_string(),
        value,
    };

    let value = match raw {
        None => return Ok(None),
        Some(RawQuantity::Integer(n)) => u64::try_from(*n).map_err(|_| invalid(n.to_string()))?,
        Some(RawQuantity::Float(f)) => {
            if !f.is_finite() || f.fract() != 0.0 || *f < 0.0 || *f >= u64::MAX as f64 {
                return Err(invalid(f.to_string()));
            }
            *f as u64
        }
        Some(RawQuantity::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<u64>().map_err(|_| invalid(s.clone()))?
        }
    };

    Ok((value != 0).then_some(value))
}

/// A container host registered to a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub arn: String,
    pub ec2_instance_id: String,
    pub status: String,
    pub cpu: i64,
    pub memory: i64,
    pub capacity_provider_name: Option<String>,
}

impl Instance {
    /// Build from a describe response
    ///
    /// CPU and MEMORY must both be registered; a host without them cannot be
    /// reported without inventing a capacity.
    pub fn from_description(desc: &ContainerInstanceDescription) -> Result<Self> {
        let entity = format!("container instance {}", desc.container_instance_arn);
        let resource = |name: &str| {
            desc.registered_resources
                .iter()
                .find(|r| r.name == name)
                .and_then(|r| r.integer_value)
                .ok_or_else(|| InventoryError::incomplete(&entity, name))
        };

        Ok(Self {
            arn: desc.container_instance_arn.clone(),
            ec2_instance_id: desc
                .ec2_instance_id
                .clone()
                .ok_or_else(|| InventoryError::incomplete(&entity, "ec2InstanceId"))?,
            status: desc.status.clone(),
            cpu: resource(CPU_RESOURCE)?,
            memory: resource(MEMORY_RESOURCE)?,
            capacity_provider_name: desc
                .capacity_provider_name
                .clone()
                .filter(|name| !name.is_empty()),
        })
    }
}

/// A resource-declaring unit inside a task (one container)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubUnit {
    #[serde(skip)]
    pub name: Option<String>,
    pub cpu: Option<u64>,
    /// Hard limit
    pub memory: Option<u64>,
    /// Soft limit
    pub memory_reservation: Option<u64>,
}

impl SubUnit {
    pub fn from_description(desc: &ContainerDescription, entity: &str) -> Result<Self> {
        Ok(Self {
            name: desc.name.clone(),
            cpu: normalize_quantity(desc.cpu.as_ref(), entity, "containers.cpu")?,
            memory: normalize_quantity(desc.memory.as_ref(), entity, "containers.memory")?,
            memory_reservation: normalize_quantity(
                desc.memory_reservation.as_ref(),
                entity,
                "containers.memoryReservation",
            )?,
        })
    }
}

/// Container quantities exactly as declared upstream, `null` when absent
///
/// Feeds the `containers` column, where a declared `"0"` stays visible.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredContainer<'a> {
    pub cpu: Option<&'a RawQuantity>,
    pub memory: Option<&'a RawQuantity>,
    pub memory_reservation: Option<&'a RawQuantity>,
}

impl<'a> From<&'a ContainerDescription> for DeclaredContainer<'a> {
    fn from(desc: &'a ContainerDescription) -> Self {
        Self {
            cpu: desc.cpu.as_ref(),
            memory: desc.memory.as_ref(),
            memory_reservation: desc.memory_reservation.as_ref(),
        }
    }
}

/// A running task and its declared resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub arn: String,
    pub task_definition_arn: String,
    pub launch_type: String,
    pub desired_status: String,
    pub last_status: String,
    pub cpu: Option<u64>,
    pub memory: Option<u64>,
    pub sub_units: Vec<SubUnit>,
    pub group: String,
}

impl Workload {
    pub fn from_description(desc: &TaskDescription) -> Result<Self> {
        let entity = format!("task {}", desc.task_arn);
        let sub_units = desc
            .containers
            .iter()
            .map(|c| SubUnit::from_description(c, &entity))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            arn: desc.task_arn.clone(),
            task_definition_arn: desc.task_definition_arn.clone(),
            launch_type: desc.launch_type.clone(),
            desired_status: desc.desired_status.clone(),
            last_status: desc.last_status.clone(),
            cpu: normalize_quantity(desc.cpu.as_ref(), &entity, "cpu")?,
            memory: normalize_quantity(desc.memory.as_ref(), &entity, "memory")?,
            sub_units,
            group: desc.group.clone(),
        })
    }
}

/// Average and maximum of one utilization metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationStats {
    pub average: Option<f64>,
    pub maximum: Option<f64>,
}
