//! Splitting resource identities into their descriptive segments
//!
//! Identities look like `arn:aws:ecs:us-east-1:123456789012:cluster/prod` or
//! `arn:aws:ecs:us-east-1:123456789012:container-instance/prod/0a1b`. The part
//! after the last `:` of the prefix is a `/`-delimited resource path.

/// Prefix marking a task group owned by a service
pub const SERVICE_GROUP_PREFIX: &str = "service:";

/// Display name of a cluster: the second `/` segment of its identity
///
/// An identity without `/`, or with nothing after it, is returned unchanged.
pub fn cluster_short_name(cluster_arn: &str) -> &str {
    cluster_arn
        .split('/')
        .nth(1)
        .filter(|name| !name.is_empty())
        .unwrap_or(cluster_arn)
}

/// Last `/` segment of an identity
///
/// Used for the cluster name passed as a metric dimension and for the group
/// name inside an auto scaling group identity.
pub fn last_segment(identity: &str) -> &str {
    identity.rsplit('/').next().unwrap_or(identity)
}

/// Service name of a task group, if the group is owned by a service
pub fn service_from_group<'a>(group: &'a str, prefix: &str) -> Option<&'a str> {
    group
        .strip_prefix(prefix)
        .filter(|service| !service.is_empty())
}
