//! Inventory run command

use anyhow::{bail, Context, Result};
use inventory_lib::upstream::SnapshotUpstream;
use inventory_lib::{ClusterOrchestrator, InventoryMetrics};
use std::sync::Arc;
use tracing::info;

use crate::config::InventoryConfig;
use crate::output::{print_info, print_summary, print_warning, OutputFormat};
use crate::Cli;

/// Inventory every cluster of the snapshot and report the outcome
///
/// Fails after printing the summary when any cluster could not be written.
pub async fn run(cli: &Cli) -> Result<()> {
    let config = InventoryConfig::load(cli.config.as_deref())?.with_overrides(
        cli.output_dir.clone(),
        cli.batch_size,
        cli.page_size,
    );
    info!(
        output_dir = %config.output_dir.display(),
        batch_size = config.batch_size,
        page_size = config.page_size,
        "Configuration loaded"
    );

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory {}",
                config.output_dir.display()
            )
        })?;

    let upstream = SnapshotUpstream::load(&cli.snapshot)
        .await
        .with_context(|| format!("Failed to load snapshot {}", cli.snapshot.display()))?
        .with_page_size(config.page_size);
    let upstream = Arc::new(upstream);

    let metrics = InventoryMetrics::new();
    let summary = ClusterOrchestrator::builder()
        .platform(upstream.clone())
        .metrics_api(upstream.clone())
        .autoscaling(upstream)
        .config(config.pipeline())
        .metrics(metrics.clone())
        .build()
        .context("Invalid pipeline configuration")?
        .run()
        .await
        .context("Inventory run failed")?;

    print_summary(&summary, cli.format)?;

    if let Some(path) = &cli.metrics_out {
        tokio::fs::write(path, metrics.render())
            .await
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        if let OutputFormat::Table = cli.format {
            print_info(&format!("Metrics written to {}", path.display()));
        }
    }

    if summary.failed() > 0 {
        if let OutputFormat::Table = cli.format {
            print_warning(&format!(
                "{} of {} clusters failed",
                summary.failed(),
                summary.clusters.len()
            ));
        }
        bail!("{} cluster(s) could not be inventoried", summary.failed());
    }

    Ok(())
}
