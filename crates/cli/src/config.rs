//! Configuration management for the CLI
//!
//! Sources, lowest precedence first: the config file, `INVENTORY_*`
//! environment variables, command line flags.

use anyhow::{Context, Result};
use inventory_lib::collector::MAX_DESCRIBE_BATCH;
use inventory_lib::enrichment::DEFAULT_METRIC_NAMESPACE;
use inventory_lib::identity::SERVICE_GROUP_PREFIX;
use inventory_lib::upstream::DEFAULT_PAGE_SIZE;
use inventory_lib::PipelineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    /// Directory the reports are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Identifiers per describe call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Days of utilization history per service
    #[serde(default = "default_metric_window_days")]
    pub metric_window_days: i64,

    #[serde(default = "default_metric_namespace")]
    pub metric_namespace: String,

    /// Task group prefix marking service-owned tasks
    #[serde(default = "default_service_group_prefix")]
    pub service_group_prefix: String,

    #[serde(default = "default_instance_status")]
    pub instance_status: String,

    #[serde(default = "default_task_desired_status")]
    pub task_desired_status: String,

    /// Items per snapshot listing page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_batch_size() -> usize {
    MAX_DESCRIBE_BATCH
}

fn default_metric_window_days() -> i64 {
    7
}

fn default_metric_namespace() -> String {
    DEFAULT_METRIC_NAMESPACE.to_string()
}

fn default_service_group_prefix() -> String {
    SERVICE_GROUP_PREFIX.to_string()
}

fn default_instance_status() -> String {
    "ACTIVE".to_string()
}

fn default_task_desired_status() -> String {
    "RUNNING".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl InventoryConfig {
    /// Load configuration from the config file and environment
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => match Self::default_path() {
                Some(default) => builder.add_source(config::File::from(default).required(false)),
                None => builder,
            },
        };

        let config = builder
            .add_source(config::Environment::with_prefix("INVENTORY").try_parsing(true))
            .build()
            .context("Failed to load configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Apply command line flags on top of the loaded configuration
    pub fn with_overrides(
        mut self,
        output_dir: Option<PathBuf>,
        batch_size: Option<usize>,
        page_size: Option<usize>,
    ) -> Self {
        if let Some(output_dir) = output_dir {
            self.output_dir = output_dir;
        }
        if let Some(batch_size) = batch_size {
            self.batch_size = batch_size;
        }
        if let Some(page_size) = page_size {
            self.page_size = page_size;
        }
        self
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            output_dir: self.output_dir.clone(),
            batch_size: self.batch_size,
            metric_window_days: self.metric_window_days,
            metric_namespace: self.metric_namespace.clone(),
            service_group_prefix: self.service_group_prefix.clone(),
            instance_status: self.instance_status.clone(),
            task_desired_status: self.task_desired_status.clone(),
        }
    }

    /// Get the default configuration file path
    fn default_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(
            home.join(".config")
                .join("fleet-inventory")
                .join("config.toml"),
        )
    }
}
