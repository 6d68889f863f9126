//! Pipeline tests against an in-memory fleet
//!
//! These tests verify:
//! - Service and capacity provider lookups are memoized per run
//! - Describe calls are batched
//! - Incomplete records are skipped and counted
//! - A failing cluster writes nothing and the run continues
//! - Re-running over the same fleet reproduces the files exactly

use super::*;
use crate::upstream::operations::*;
use crate::upstream::{
    CapacityProviderDescription, ContainerDescription, ContainerInstanceDescription, Datapoint,
    FleetSnapshot, RawQuantity, RegisteredResource, ServiceDescription, SnapshotCluster,
    SnapshotService, SnapshotUpstream, TaskDescription, PlacementStrategy,
};
use chrono::TimeZone;
use std::path::Path;
use tempfile::TempDir;

const PROD: &str = "arn:aws:ecs:us-east-1:123456789012:cluster/prod";
const STAGING: &str = "arn:aws:ecs:us-east-1:123456789012:cluster/staging";

fn window_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap()
}

fn instance(cluster: &str, id: &str, memory: Option<i64>, provider: Option<&str>) -> ContainerInstanceDescription {
    let mut registered_resources = vec![RegisteredResource {
        name: "CPU".into(),
        integer_value: Some(2048),
    }];
    if let Some(memory) = memory {
        registered_resources.push(RegisteredResource {
            name: "MEMORY".into(),
            integer_value: Some(memory),
        });
    }

    ContainerInstanceDescription {
        container_instance_arn: format!(
            "arn:aws:ecs:us-east-1:123456789012:container-instance/{}/{}",
            cluster, id
        ),
        ec2_instance_id: Some(format!("i-{}", id)),
        status: "ACTIVE".into(),
        registered_resources,
        capacity_provider_name: provider.map(String::from),
    }
}

fn task(cluster: &str, id: usize, group: &str) -> TaskDescription {
    TaskDescription {
        task_arn: format!("arn:aws:ecs:us-east-1:123456789012:task/{}/t{:03}", cluster, id),
        task_definition_arn: "arn:aws:ecs:us-east-1:123456789012:task-definition/web:3".into(),
        launch_type: "EC2".into(),
        desired_status: "RUNNING".into(),
        last_status: "RUNNING".into(),
        cpu: Some(RawQuantity::from("256")),
        memory: None,
        containers: vec![ContainerDescription {
            name: Some("app".into()),
            cpu: Some(RawQuantity::Integer(100)),
            memory: Some(RawQuantity::Integer(256)),
            memory_reservation: Some(RawQuantity::Integer(128)),
        }],
        group: group.into(),
    }
}

fn web_service() -> ServiceDescription {
    ServiceDescription {
        service_name: "web".into(),
        placement_strategy: vec![PlacementStrategy {
            kind: "spread".into(),
            field: Some("attribute:ecs.availability-zone".into()),
        }],
        placement_constraints: vec![],
        scheduling_strategy: Some("REPLICA".into()),
    }
}

fn utilization(cluster_name: &str, metric_name: &str, average: f64, maximum: f64) -> SnapshotService {
    SnapshotService {
        cluster_name: cluster_name.into(),
        service_name: "web".into(),
        metric_name: metric_name.into(),
        datapoints: vec![Datapoint {
            timestamp: None,
            average: Some(average),
            maximum: Some(maximum),
            unit: Some("Percent".into()),
        }],
    }
}

/// prod: two instances (one without MEMORY), two web tasks and one batch task
/// staging: one instance and one web task
fn fleet() -> FleetSnapshot {
    FleetSnapshot {
        clusters: vec![
            SnapshotCluster {
                cluster_arn: PROD.into(),
                container_instances: vec![
                    instance("prod", "0a1", Some(3928), Some("cp-prod")),
                    instance("prod", "0a2", None, None),
                ],
                tasks: vec![
                    task("prod", 1, "service:web"),
                    task("prod", 2, "service:web"),
                    task("prod", 3, "family:batch"),
                ],
                services: vec![web_service()],
            },
            SnapshotCluster {
                cluster_arn: STAGING.into(),
                container_instances: vec![instance("staging", "0b1", Some(3928), Some("cp-prod"))],
                tasks: vec![task("staging", 1, "service:web")],
                services: vec![web_service()],
            },
        ],
        capacity_providers: vec![CapacityProviderDescription {
            name: "cp-prod".into(),
            auto_scaling_group_provider: None,
        }],
        service_metrics: vec![
            utilization("prod", "MemoryUtilization", 41.5, 77.0),
            utilization("prod", "CPUUtilization", 12.5, 80.0),
        ],
        ..Default::default()
    }
}

fn orchestrator(upstream: &Arc<SnapshotUpstream>, output_dir: &Path) -> ClusterOrchestrator {
    ClusterOrchestrator::builder()
        .platform(upstream.clone())
        .metrics_api(upstream.clone())
        .autoscaling(upstream.clone())
        .output_dir(output_dir)
        .window_end(window_end())
        .run_id("test-run")
        .build()
        .unwrap()
}

fn read(dir: &TempDir, name: &str) -> String {
    std::fs::read_to_string(dir.path().join(name)).unwrap()
}

mod orchestration_tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_written_per_cluster() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()));

        let summary = orchestrator(&upstream, dir.path()).run().await.unwrap();

        assert_eq!(summary.run_id, "test-run");
        assert_eq!(summary.written(), 2);
        assert_eq!(summary.failed(), 0);
        for name in ["prod.csv", "prod--tasks.csv", "staging.csv", "staging--tasks.csv"] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }

        let prod = &summary.clusters[0];
        assert_eq!(prod.short_name, "prod");
        assert_eq!(prod.instances, 1);
        assert_eq!(prod.tasks, 3);
        assert_eq!(prod.skipped, 1);
    }

    #[tokio::test]
    async fn test_instance_report_contents() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()));
        orchestrator(&upstream, dir.path()).run().await.unwrap();

        let report = read(&dir, "prod.csv");
        let mut lines = report.lines();
        assert_eq!(
            lines.next(),
            Some("capacityProviderName,cluster,cpu,instanceId,memory,status")
        );
        assert_eq!(
            lines.next(),
            Some("cp-prod,arn:aws:ecs:us-east-1:123456789012:cluster/prod,2048,i-0a1,3928,ACTIVE")
        );
        // The instance without MEMORY is not reported
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn test_task_report_contents() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()));
        orchestrator(&upstream, dir.path()).run().await.unwrap();

        let report = read(&dir, "prod--tasks.csv");
        let mut lines = report.lines();
        let header: Vec<&str> = lines.next().unwrap().split(',').collect();
        let mut sorted = header.clone();
        sorted.sort();
        assert_eq!(header, sorted);
        for column in ["cpuAverage", "memoryMaximum", "placementStrategy", "schedulingStrategy"] {
            assert!(header.contains(&column), "{} missing from header", column);
        }

        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 3);
        // Declared task CPU wins, memory falls back to the soft limits
        assert!(rows[0].contains(",256,12.5,80.0,WORKLOAD,"));
        assert!(rows[0].contains(",128,41.5,77.0,SUB-UNITS,"));
        // The batch task carries no service columns
        assert!(rows[2].contains("family:batch"));
        assert!(!rows[2].contains("REPLICA"));
    }

    #[tokio::test]
    async fn test_empty_fleet_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(FleetSnapshot::default()));

        let summary = orchestrator(&upstream, dir.path()).run().await.unwrap();
        assert!(summary.clusters.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()));

        orchestrator(&upstream, first.path()).run().await.unwrap();
        orchestrator(&upstream, second.path()).run().await.unwrap();

        for name in ["prod.csv", "prod--tasks.csv", "staging.csv", "staging--tasks.csv"] {
            assert_eq!(read(&first, name), read(&second, name), "{} differs", name);
        }
    }
}

mod failure_isolation_tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_cluster_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()).fail_on(LIST_TASKS, PROD));

        let summary = orchestrator(&upstream, dir.path()).run().await.unwrap();

        assert_eq!(summary.written(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(matches!(
            &summary.clusters[0].outcome,
            ClusterOutcome::Failed { error } if error.contains(LIST_TASKS)
        ));
        // Instances were gathered but the cluster's files are all or nothing
        assert!(!dir.path().join("prod.csv").exists());
        assert!(!dir.path().join("prod--tasks.csv").exists());
        assert!(dir.path().join("staging.csv").exists());
        assert!(dir.path().join("staging--tasks.csv").exists());
    }

    fn leftovers(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_unwritable_tasks_file_leaves_no_instance_file() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("prod--tasks.csv")).unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()));

        let summary = orchestrator(&upstream, dir.path()).run().await.unwrap();

        assert!(matches!(
            &summary.clusters[0].outcome,
            ClusterOutcome::Failed { error } if error.contains("prod--tasks.csv")
        ));
        assert!(!dir.path().join("prod.csv").exists());
        assert!(dir.path().join("prod--tasks.csv").is_dir());
        assert!(leftovers(&dir).is_empty(), "staged files left: {:?}", leftovers(&dir));
        assert!(summary.clusters[1].is_written());
        assert!(dir.path().join("staging.csv").exists());
    }

    #[tokio::test]
    async fn test_unwritable_instance_file_leaves_no_tasks_file() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("prod.csv")).unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()));

        let summary = orchestrator(&upstream, dir.path()).run().await.unwrap();

        assert!(!summary.clusters[0].is_written());
        assert!(!dir.path().join("prod--tasks.csv").exists());
        assert!(leftovers(&dir).is_empty(), "staged files left: {:?}", leftovers(&dir));
        assert!(summary.clusters[1].is_written());
    }

    #[tokio::test]
    async fn test_overflowing_container_sum_skips_task() {
        let dir = TempDir::new().unwrap();
        let mut snapshot = fleet();
        let mut oversized = task("prod", 4, "family:batch");
        oversized.cpu = None;
        oversized.containers = vec![
            ContainerDescription {
                cpu: Some(RawQuantity::Float(1e19)),
                ..Default::default()
            };
            2
        ];
        snapshot.clusters[0].tasks.push(oversized);
        let upstream = Arc::new(SnapshotUpstream::new(snapshot));

        let summary = orchestrator(&upstream, dir.path()).run().await.unwrap();

        let prod = &summary.clusters[0];
        assert!(prod.is_written());
        assert_eq!(prod.tasks, 3);
        assert_eq!(prod.skipped, 2);
        assert!(!read(&dir, "prod--tasks.csv").contains("t004"));
    }

    #[tokio::test]
    async fn test_metric_failure_fails_cluster() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()).fail_on(GET_METRIC_STATISTICS, "prod"));

        let summary = orchestrator(&upstream, dir.path()).run().await.unwrap();
        assert!(!summary.clusters[0].is_written());
        assert!(summary.clusters[1].is_written());
    }

    #[tokio::test]
    async fn test_cluster_listing_failure_aborts() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()).fail_on(LIST_CLUSTERS, "*"));

        let err = orchestrator(&upstream, dir.path()).run().await.unwrap_err();
        assert!(matches!(err, InventoryError::Upstream { .. }));
    }

    #[test]
    fn test_builder_requires_clients() {
        let err = ClusterOrchestrator::builder().build().err().unwrap();
        assert!(matches!(err, InventoryError::Config(_)));
    }

    #[test]
    fn test_builder_rejects_empty_window() {
        let upstream = Arc::new(SnapshotUpstream::new(FleetSnapshot::default()));
        let config = PipelineConfig {
            metric_window_days: 0,
            ..Default::default()
        };
        let result = ClusterOrchestrator::builder()
            .platform(upstream.clone())
            .metrics_api(upstream.clone())
            .autoscaling(upstream)
            .config(config)
            .build();
        assert!(matches!(result, Err(InventoryError::Config(_))));
    }
}

mod lookup_tests {
    use super::*;

    #[tokio::test]
    async fn test_service_fetched_once_per_cluster() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()));
        orchestrator(&upstream, dir.path()).run().await.unwrap();

        // prod has two web tasks, staging one: one description per (cluster, service)
        assert_eq!(upstream.call_count(DESCRIBE_SERVICES), 2);
        // Memory and CPU for each description
        assert_eq!(upstream.call_count(GET_METRIC_STATISTICS), 4);
    }

    #[tokio::test]
    async fn test_non_service_group_skips_lookup() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(FleetSnapshot {
            clusters: vec![SnapshotCluster {
                cluster_arn: PROD.into(),
                tasks: vec![task("prod", 1, "family:my-fam")],
                ..Default::default()
            }],
            ..Default::default()
        }));
        orchestrator(&upstream, dir.path()).run().await.unwrap();

        assert_eq!(upstream.call_count(DESCRIBE_SERVICES), 0);
        assert_eq!(upstream.call_count(GET_METRIC_STATISTICS), 0);
    }

    #[tokio::test]
    async fn test_missing_datapoints_omit_metric_columns() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()));
        orchestrator(&upstream, dir.path()).run().await.unwrap();

        // staging has no datapoints for web
        let report = read(&dir, "staging--tasks.csv");
        let header = report.lines().next().unwrap();
        assert!(header.contains("placementStrategy"));
        assert!(!header.contains("cpuAverage"));
        assert!(!header.contains("memoryMaximum"));
    }

    #[tokio::test]
    async fn test_capacity_provider_resolved_once_per_run() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()));
        orchestrator(&upstream, dir.path()).run().await.unwrap();

        // prod and staging instances share cp-prod
        assert_eq!(upstream.call_count(DESCRIBE_CAPACITY_PROVIDERS), 1);
    }
}

mod batching_tests {
    use super::*;

    #[tokio::test]
    async fn test_tasks_described_in_batches() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(FleetSnapshot {
            clusters: vec![SnapshotCluster {
                cluster_arn: PROD.into(),
                tasks: (0..250).map(|i| task("prod", i, "family:batch")).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }));

        let summary = orchestrator(&upstream, dir.path()).run().await.unwrap();

        assert_eq!(summary.clusters[0].tasks, 250);
        assert_eq!(upstream.call_count(LIST_TASKS), 3);
        assert_eq!(upstream.call_sizes(DESCRIBE_TASKS), vec![100, 100, 50]);

        let report = read(&dir, "prod--tasks.csv");
        let rows: Vec<&str> = report.lines().skip(1).collect();
        assert_eq!(rows.len(), 250);
        assert!(rows[0].contains("/t000,"));
        assert!(rows[249].contains("/t249,"));
    }

    #[tokio::test]
    async fn test_configured_batch_size() {
        let dir = TempDir::new().unwrap();
        let upstream = Arc::new(SnapshotUpstream::new(fleet()));

        ClusterOrchestrator::builder()
            .platform(upstream.clone())
            .metrics_api(upstream.clone())
            .autoscaling(upstream.clone())
            .output_dir(dir.path())
            .batch_size(2)
            .window_end(window_end())
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();

        // prod: 3 tasks, staging: 1 task
        assert_eq!(upstream.call_sizes(DESCRIBE_TASKS), vec![2, 1, 1]);
    }
}
