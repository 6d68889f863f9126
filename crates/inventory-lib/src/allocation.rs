//! Effective CPU and memory allocation of a task
//!
//! A value declared on the task wins. Otherwise the containers' declarations
//! are summed; for memory each container offers its soft limit first and its
//! hard limit second.

use crate::error::{InventoryError, Result};
use crate::models::{SubUnit, Workload};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which level supplied an effective allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationSource {
    #[serde(rename = "WORKLOAD")]
    Workload,
    #[serde(rename = "SUB-UNITS")]
    SubUnits,
}

impl AllocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationSource::Workload => "WORKLOAD",
            AllocationSource::SubUnits => "SUB-UNITS",
        }
    }
}

impl fmt::Display for AllocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved amount and the level it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub amount: u64,
    pub source: AllocationSource,
}

/// Resolved CPU and memory of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAllocation {
    pub cpu: Allocation,
    pub memory: Allocation,
}

impl SubUnit {
    /// Memory this container reserves: soft limit, else hard limit, else 0
    pub fn memory_contribution(&self) -> u64 {
        self.memory_reservation.or(self.memory).unwrap_or(0)
    }

    pub fn cpu_contribution(&self) -> u64 {
        self.cpu.unwrap_or(0)
    }
}

fn resolve_one(
    workload: &Workload,
    field: &str,
    declared: Option<u64>,
    contribution: impl Fn(&SubUnit) -> u64,
) -> Result<Allocation> {
    if let Some(amount) = declared {
        return Ok(Allocation {
            amount,
            source: AllocationSource::Workload,
        });
    }

    let amount = workload
        .sub_units
        .iter()
        .try_fold(0u64, |total, unit| total.checked_add(contribution(unit)))
        .ok_or_else(|| InventoryError::InvalidQuantity {
            entity: format!("task {}", workload.arn),
            field: format!("containers.{}", field),
            value: "sum exceeds the representable range".to_string(),
        })?;

    Ok(Allocation {
        amount,
        source: AllocationSource::SubUnits,
    })
}

/// Resolve CPU and memory independently
///
/// A container sum too large to represent is an invalid quantity, which
/// skips the task.
pub fn resolve_allocation(workload: &Workload) -> Result<ResolvedAllocation> {
    Ok(ResolvedAllocation {
        cpu: resolve_one(workload, "cpu", workload.cpu, SubUnit::cpu_contribution)?,
        memory: resolve_one(
            workload,
            "memory",
            workload.memory,
            SubUnit::memory_contribution,
        )?,
    })
}
