//! Integration tests for a full inventory run over a snapshot file

use inventory_lib::observability::InventoryMetrics;
use inventory_lib::upstream::operations::{DESCRIBE_SERVICES, LIST_CLUSTERS};
use inventory_lib::upstream::SnapshotUpstream;
use inventory_lib::{ClusterOrchestrator, ClusterOutcome, PipelineConfig};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
    "clusters": [
        {
            "clusterArn": "arn:aws:ecs:eu-west-1:210987654321:cluster/payments",
            "containerInstances": [
                {
                    "containerInstanceArn": "arn:aws:ecs:eu-west-1:210987654321:container-instance/payments/c1",
                    "ec2InstanceId": "i-0c1",
                    "status": "ACTIVE",
                    "capacityProviderName": "payments-cp",
                    "registeredResources": [
                        {"name": "CPU", "integerValue": 4096},
                        {"name": "MEMORY", "integerValue": 7855},
                        {"name": "PORTS"}
                    ]
                },
                {
                    "containerInstanceArn": "arn:aws:ecs:eu-west-1:210987654321:container-instance/payments/c2",
                    "ec2InstanceId": "i-0c2",
                    "status": "DRAINING",
                    "registeredResources": [
                        {"name": "CPU", "integerValue": 4096},
                        {"name": "MEMORY", "integerValue": 7855}
                    ]
                }
            ],
            "tasks": [
                {
                    "taskArn": "arn:aws:ecs:eu-west-1:210987654321:task/payments/a1",
                    "taskDefinitionArn": "arn:aws:ecs:eu-west-1:210987654321:task-definition/api:12",
                    "launchType": "EC2",
                    "desiredStatus": "RUNNING",
                    "lastStatus": "RUNNING",
                    "cpu": "0",
                    "memory": "",
                    "containers": [
                        {"name": "api", "cpu": 256, "memory": 1024, "memoryReservation": 512},
                        {"name": "sidecar", "cpu": "128", "memory": 256}
                    ],
                    "group": "service:api"
                },
                {
                    "taskArn": "arn:aws:ecs:eu-west-1:210987654321:task/payments/a2",
                    "taskDefinitionArn": "arn:aws:ecs:eu-west-1:210987654321:task-definition/api:12",
                    "launchType": "EC2",
                    "desiredStatus": "RUNNING",
                    "lastStatus": "PENDING",
                    "cpu": "512",
                    "memory": "2048",
                    "containers": [{"name": "api"}],
                    "group": "service:api"
                },
                {
                    "taskArn": "arn:aws:ecs:eu-west-1:210987654321:task/payments/bad",
                    "taskDefinitionArn": "arn:aws:ecs:eu-west-1:210987654321:task-definition/api:12",
                    "launchType": "EC2",
                    "desiredStatus": "RUNNING",
                    "lastStatus": "RUNNING",
                    "cpu": "lots",
                    "containers": [],
                    "group": "service:api"
                }
            ],
            "services": [
                {
                    "serviceName": "api",
                    "placementStrategy": [{"type": "binpack", "field": "memory"}],
                    "placementConstraints": [{"type": "distinctInstance"}],
                    "schedulingStrategy": "REPLICA"
                }
            ]
        },
        {
            "clusterArn": "arn:aws:ecs:eu-west-1:210987654321:cluster/empty"
        }
    ],
    "capacityProviders": [
        {
            "name": "payments-cp",
            "autoScalingGroupProvider": {
                "autoScalingGroupArn": "arn:aws:autoscaling:eu-west-1:210987654321:autoScalingGroup:9a8b:autoScalingGroupName/payments-asg",
                "managedScaling": {"status": "ENABLED", "targetCapacity": 90}
            }
        }
    ],
    "autoScalingGroups": [
        {
            "AutoScalingGroupName": "payments-asg",
            "EnabledMetrics": [{"Metric": "GroupDesiredCapacity", "Granularity": "1Minute"}]
        }
    ],
    "scalingPolicies": {
        "payments-asg": [
            {
                "PolicyName": "ECSManagedAutoScalingPolicy",
                "PolicyType": "TargetTrackingScaling",
                "TargetTrackingConfiguration": {"TargetValue": 90.0}
            }
        ]
    },
    "serviceMetrics": [
        {
            "clusterName": "payments",
            "serviceName": "api",
            "metricName": "MemoryUtilization",
            "datapoints": [{"Average": 55.25, "Maximum": 91.0, "Unit": "Percent"}]
        },
        {
            "clusterName": "payments",
            "serviceName": "api",
            "metricName": "CPUUtilization",
            "datapoints": [{"Average": 20.0, "Maximum": 64.5, "Unit": "Percent"}]
        }
    ]
}"#;

async fn load_snapshot(dir: &TempDir) -> Arc<SnapshotUpstream> {
    let path = dir.path().join("fleet.json");
    tokio::fs::write(&path, SNAPSHOT).await.unwrap();
    Arc::new(SnapshotUpstream::load(&path).await.unwrap().with_page_size(1))
}

fn orchestrator(upstream: &Arc<SnapshotUpstream>, output_dir: &Path) -> ClusterOrchestrator {
    ClusterOrchestrator::builder()
        .platform(upstream.clone())
        .metrics_api(upstream.clone())
        .autoscaling(upstream.clone())
        .config(PipelineConfig {
            output_dir: output_dir.to_path_buf(),
            ..Default::default()
        })
        .metrics(InventoryMetrics::new())
        .build()
        .unwrap()
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap()
}

/// Parse a report into (header, rows) so cells can be checked by column
fn parse(report: &str) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_reader(report.as_bytes());
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(String::from)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (header, rows)
}

fn cell<'a>(header: &[String], row: &'a [String], column: &str) -> &'a str {
    let index = header
        .iter()
        .position(|h| h == column)
        .unwrap_or_else(|| panic!("no column {}", column));
    &row[index]
}

#[tokio::test]
async fn test_full_run_from_snapshot_file() {
    let work = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let upstream = load_snapshot(&work).await;

    let summary = orchestrator(&upstream, output.path()).run().await.unwrap();

    assert_eq!(summary.clusters.len(), 2);
    assert_eq!(summary.written(), 2);
    // One cluster per page
    assert_eq!(upstream.call_count(LIST_CLUSTERS), 2);

    let payments = &summary.clusters[0];
    assert_eq!(payments.short_name, "payments");
    assert_eq!(payments.instances, 1);
    assert_eq!(payments.tasks, 2);
    assert_eq!(payments.skipped, 1);
    match &payments.outcome {
        ClusterOutcome::Written {
            instances_path,
            tasks_path,
        } => {
            assert_eq!(instances_path, &output.path().join("payments.csv"));
            assert_eq!(tasks_path, &output.path().join("payments--tasks.csv"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_instance_capacity_columns() {
    let work = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let upstream = load_snapshot(&work).await;
    orchestrator(&upstream, output.path()).run().await.unwrap();

    let (header, rows) = parse(&read(output.path(), "payments.csv"));
    assert_eq!(
        header,
        vec![
            "asgArn",
            "asgMetrics",
            "capacityProviderName",
            "cluster",
            "cpu",
            "instanceId",
            "managedScaling",
            "memory",
            "scalingPolicies",
            "status",
        ]
    );
    // Only the ACTIVE instance is listed
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(cell(&header, row, "instanceId"), "i-0c1");
    assert_eq!(cell(&header, row, "capacityProviderName"), "payments-cp");
    assert_eq!(
        cell(&header, row, "asgMetrics"),
        r#"[{"Metric":"GroupDesiredCapacity","Granularity":"1Minute"}]"#
    );
    assert_eq!(
        cell(&header, row, "managedScaling"),
        "{\n    \"status\": \"ENABLED\",\n    \"targetCapacity\": 90\n}"
    );
    assert!(cell(&header, row, "scalingPolicies").contains("\"policyName\": \"ECSManagedAutoScalingPolicy\""));
}

#[tokio::test]
async fn test_task_allocation_and_service_columns() {
    let work = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let upstream = load_snapshot(&work).await;
    orchestrator(&upstream, output.path()).run().await.unwrap();

    let (header, rows) = parse(&read(output.path(), "payments--tasks.csv"));
    assert_eq!(rows.len(), 2);

    let summed = &rows[0];
    assert_eq!(cell(&header, summed, "cpuAllocation"), "384");
    assert_eq!(cell(&header, summed, "cpuType"), "SUB-UNITS");
    // Soft limit of api plus hard limit of sidecar
    assert_eq!(cell(&header, summed, "memoryAllocation"), "768");
    assert_eq!(cell(&header, summed, "memoryType"), "SUB-UNITS");
    assert_eq!(
        cell(&header, summed, "containers"),
        r#"[{"cpu":256,"memory":1024,"memoryReservation":512},{"cpu":"128","memory":256,"memoryReservation":null}]"#
    );
    assert_eq!(
        cell(&header, summed, "placementStrategy"),
        r#"[{"type":"binpack","field":"memory"}]"#
    );
    assert_eq!(cell(&header, summed, "memoryAverage"), "55.25");
    assert_eq!(cell(&header, summed, "cpuMaximum"), "64.5");

    let declared = &rows[1];
    assert_eq!(cell(&header, declared, "cpuAllocation"), "512");
    assert_eq!(cell(&header, declared, "cpuType"), "WORKLOAD");
    assert_eq!(cell(&header, declared, "memoryAllocation"), "2048");
    assert_eq!(cell(&header, declared, "memoryType"), "WORKLOAD");
    assert_eq!(cell(&header, declared, "lastStatus"), "PENDING");

    // Both tasks share one service description
    assert_eq!(upstream.call_count(DESCRIBE_SERVICES), 1);
}

#[tokio::test]
async fn test_empty_cluster_writes_empty_reports() {
    let work = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let upstream = load_snapshot(&work).await;
    orchestrator(&upstream, output.path()).run().await.unwrap();

    assert_eq!(read(output.path(), "empty.csv"), "");
    assert_eq!(read(output.path(), "empty--tasks.csv"), "");
}

#[tokio::test]
async fn test_missing_snapshot_file() {
    let work = TempDir::new().unwrap();
    let result = SnapshotUpstream::load(&work.path().join("missing.json")).await;
    assert!(matches!(
        result,
        Err(inventory_lib::InventoryError::Io { .. })
    ));
}
