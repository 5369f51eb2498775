//! Pure aggregation over parsed records.
//!
//! Every function here is a fold over a record slice plus, for wait times,
//! the snapshot time. Nothing here performs I/O or can fail.

use std::collections::{BTreeMap, HashMap};

use slurmwatch_adapters::Parsed;
use slurmwatch_types::{
    JobFacet, JobGroupSummary, JobGrouping, JobRecord, NodeFacet, NodeRecord, NodeSummary,
    PartitionSummary, PendingWaitStats, Seconds, StateCounts,
};

/// Per-partition totals, largest partitions first.
///
/// A node counts once towards every distinct partition it lists.
pub fn partition_summaries(nodes: &[NodeRecord]) -> Vec<PartitionSummary> {
    let mut by_name: BTreeMap<&str, PartitionSummary> = BTreeMap::new();

    for node in nodes {
        for (i, partition) in node.partitions.iter().enumerate() {
            if node.partitions[..i].contains(partition) {
                continue;
            }
            by_name
                .entry(partition.as_str())
                .or_insert_with(|| PartitionSummary::new(partition.as_str()))
                .add_node(node);
        }
    }

    let mut summaries: Vec<PartitionSummary> = by_name.into_values().collect();
    summaries.sort_by(|a, b| {
        b.nodes_total
            .cmp(&a.nodes_total)
            .then_with(|| a.name.cmp(&b.name))
    });
    summaries
}

/// Cluster-wide node totals.
pub fn node_summary(nodes: &[NodeRecord]) -> NodeSummary {
    nodes.iter().fold(NodeSummary::default(), |mut summary, node| {
        summary.add_node(node);
        summary
    })
}

/// Job counts per state across all jobs.
pub fn state_counts(jobs: &[JobRecord]) -> StateCounts {
    jobs.iter().fold(StateCounts::default(), |mut counts, job| {
        counts.record(&job.state);
        counts
    })
}

/// Job counts per account or per user, busiest first.
pub fn job_groups(jobs: &[JobRecord], grouping: JobGrouping) -> Vec<JobGroupSummary> {
    let mut groups: HashMap<&str, StateCounts> = HashMap::new();
    for job in jobs {
        let key = match grouping {
            JobGrouping::Account => job.account.as_str(),
            JobGrouping::User => job.user.as_str(),
        };
        groups.entry(key).or_default().record(&job.state);
    }

    let mut summaries: Vec<JobGroupSummary> = groups
        .into_iter()
        .map(|(key, counts)| JobGroupSummary {
            key: key.to_string(),
            counts,
        })
        .collect();
    summaries.sort_by(|a, b| b.total().cmp(&a.total()).then_with(|| a.key.cmp(&b.key)));
    summaries
}

/// Wait statistics over pending jobs, measured at `now` (Unix seconds).
///
/// The median of an even number of waits is the mean of the two middle
/// values. Returns [`PendingWaitStats::NoPendingJobs`] when no pending job
/// has a queue time.
pub fn pending_wait_stats(jobs: &[JobRecord], now: i64) -> PendingWaitStats {
    let mut waits: Vec<f64> = jobs
        .iter()
        .filter_map(|job| job.pending_wait(now))
        .map(|wait| wait.as_secs_f64())
        .collect();

    if waits.is_empty() {
        return PendingWaitStats::NoPendingJobs;
    }

    waits.sort_by(f64::total_cmp);
    let n = waits.len();
    let mid = n / 2;
    let median = if n % 2 == 1 {
        waits[mid]
    } else {
        (waits[mid - 1] + waits[mid]) / 2.0
    };
    let mean = waits.iter().sum::<f64>() / n as f64;

    PendingWaitStats::Observed {
        jobs: n,
        max: Seconds(waits[n - 1]),
        median: Seconds(median),
        mean: Seconds(mean),
    }
}

/// Build the node facet from parsed node records.
pub fn aggregate_nodes(parsed: Parsed<NodeRecord>) -> NodeFacet {
    let mut nodes = parsed.records;
    nodes.sort_by(|a, b| a.name.cmp(&b.name));

    NodeFacet {
        partitions: partition_summaries(&nodes),
        summary: node_summary(&nodes),
        nodes,
        skipped_lines: parsed.skipped,
    }
}

/// Build the job facet from parsed job records, measuring waits at `now`.
pub fn aggregate_jobs(parsed: Parsed<JobRecord>, now: i64) -> JobFacet {
    let jobs = parsed.records;

    JobFacet {
        total_jobs: jobs.len(),
        states: state_counts(&jobs),
        by_account: job_groups(&jobs, JobGrouping::Account),
        by_user: job_groups(&jobs, JobGrouping::User),
        pending_wait: pending_wait_stats(&jobs, now),
        computed_at: now,
        skipped_lines: parsed.skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slurmwatch_types::{JobState, NodeState};

    fn node(name: &str, partitions: &[&str], total: u32, allocated: u32) -> NodeRecord {
        NodeRecord::new(name)
            .with_partitions(partitions.iter().copied())
            .with_state(if allocated == 0 {
                NodeState::Idle
            } else if allocated < total {
                NodeState::Mixed
            } else {
                NodeState::Allocated
            })
            .with_cpus(total, allocated)
    }

    fn pending(id: &str, account: &str, user: &str, queued_at: i64) -> JobRecord {
        JobRecord::new(id, account, user, JobState::Pending, queued_at).with_queued_at(queued_at)
    }

    fn running(id: &str, account: &str, user: &str) -> JobRecord {
        JobRecord::new(id, account, user, JobState::Running, 0)
    }

    #[test]
    fn test_partition_scenario() {
        let nodes = vec![node("n1", &["p1"], 4, 2), node("n2", &["p1", "p2"], 8, 8)];
        let summaries = partition_summaries(&nodes);

        assert_eq!(summaries.len(), 2);
        let p1 = &summaries[0];
        assert_eq!(p1.name, "p1");
        assert_eq!(p1.nodes_total, 2);
        assert_eq!(p1.cpus_total, 12);
        assert_eq!(p1.cpus_allocated, 10);
        assert_eq!(p1.cpus_idle, 2);

        let p2 = &summaries[1];
        assert_eq!(p2.name, "p2");
        assert_eq!(p2.nodes_total, 1);
        assert_eq!(p2.cpus_total, 8);
        assert_eq!(p2.cpus_allocated, 8);
        assert_eq!(p2.utilization(), 1.0);
    }

    #[test]
    fn test_partition_cpus_counted_once_per_membership() {
        let mut dup = node("n1", &["p1"], 16, 4);
        dup.partitions = vec!["p1".into(), "p2".into(), "p1".into()];
        let nodes = vec![dup, node("n2", &["p2"], 4, 0)];

        let summaries = partition_summaries(&nodes);
        let total: u64 = summaries.iter().map(|p| p.cpus_total).sum();
        assert_eq!(total, 16 * 2 + 4);

        let p1 = summaries.iter().find(|p| p.name == "p1").unwrap();
        assert_eq!(p1.cpus_total, 16);
        assert_eq!(p1.nodes_total, 1);
    }

    #[test]
    fn test_partition_sort_order() {
        let nodes = vec![
            node("a", &["small"], 4, 0),
            node("b", &["big", "alpha"], 4, 0),
            node("c", &["big", "alpha"], 4, 0),
        ];
        let names: Vec<_> = partition_summaries(&nodes)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["alpha", "big", "small"]);
    }

    #[test]
    fn test_empty_nodes() {
        assert!(partition_summaries(&[]).is_empty());
        assert_eq!(node_summary(&[]), NodeSummary::default());
    }

    #[test]
    fn test_group_counts_sum_to_job_count() {
        let jobs = vec![
            pending("1", "physics", "alice", 0),
            running("2", "physics", "bob"),
            running("3", "chem", "alice"),
            JobRecord::new("4", "chem", "carol", JobState::Completed, 0),
            JobRecord::new("5", "bio", "carol", JobState::Other("FAILED".into()), 0),
        ];

        let by_account = job_groups(&jobs, JobGrouping::Account);
        let by_user = job_groups(&jobs, JobGrouping::User);
        let account_sum: u64 = by_account.iter().map(|g| g.total()).sum();
        let user_sum: u64 = by_user.iter().map(|g| g.total()).sum();

        assert_eq!(account_sum, jobs.len() as u64);
        assert_eq!(user_sum, jobs.len() as u64);
        assert_eq!(state_counts(&jobs).total(), jobs.len() as u64);
    }

    #[test]
    fn test_group_breakdown_and_order() {
        let jobs = vec![
            pending("1", "physics", "alice", 0),
            running("2", "physics", "bob"),
            running("3", "chem", "alice"),
            running("4", "bio", "dave"),
        ];
        let by_account = job_groups(&jobs, JobGrouping::Account);
        let keys: Vec<_> = by_account.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["physics", "bio", "chem"]);

        let physics = &by_account[0];
        assert_eq!(physics.counts.pending, 1);
        assert_eq!(physics.counts.running, 1);

        let by_user = job_groups(&jobs, JobGrouping::User);
        assert_eq!(by_user[0].key, "alice");
        assert_eq!(by_user[0].total(), 2);
    }

    #[test]
    fn test_wait_stats_scenario() {
        let now = 1_000;
        let jobs = vec![
            pending("1", "a", "u", now - 10),
            pending("2", "a", "u", now - 90),
            pending("3", "a", "u", now - 20),
            running("4", "a", "u"),
        ];

        let stats = pending_wait_stats(&jobs, now);
        assert_eq!(stats.jobs(), 3);
        assert_eq!(stats.max(), Some(Seconds::from_secs(90)));
        assert_eq!(stats.median(), Some(Seconds::from_secs(20)));
        assert_eq!(stats.mean(), Some(Seconds::from_secs(40)));
    }

    #[test]
    fn test_wait_stats_even_median() {
        let now = 100;
        let jobs = vec![
            pending("1", "a", "u", now - 10),
            pending("2", "a", "u", now - 20),
            pending("3", "a", "u", now - 30),
            pending("4", "a", "u", now - 41),
        ];
        let stats = pending_wait_stats(&jobs, now);
        assert_eq!(stats.median(), Some(Seconds(25.0)));
        assert_eq!(stats.max(), Some(Seconds::from_secs(41)));
    }

    #[test]
    fn test_wait_stats_no_pending_jobs() {
        assert_eq!(pending_wait_stats(&[], 100), PendingWaitStats::NoPendingJobs);

        let jobs = vec![running("1", "a", "u")];
        assert_eq!(pending_wait_stats(&jobs, 100), PendingWaitStats::NoPendingJobs);
    }

    #[test]
    fn test_wait_stats_clamps_future_queue_time() {
        let jobs = vec![pending("1", "a", "u", 500), pending("2", "a", "u", 40)];
        let stats = pending_wait_stats(&jobs, 100);
        assert_eq!(stats.max(), Some(Seconds::from_secs(60)));
        assert_eq!(stats.median(), Some(Seconds(30.0)));
    }

    #[test]
    fn test_aggregate_nodes_sorts_by_name() {
        let parsed = Parsed {
            records: vec![node("n2", &["p1"], 4, 4), node("n1", &["p1"], 4, 0)],
            skipped: 2,
        };
        let facet = aggregate_nodes(parsed);
        assert_eq!(facet.nodes[0].name, "n1");
        assert_eq!(facet.skipped_lines, 2);
        assert_eq!(facet.summary.nodes_total, 2);
        assert_eq!(facet.partition("p1").unwrap().nodes_allocated, 1);
    }

    #[test]
    fn test_aggregate_jobs() {
        let parsed = Parsed {
            records: vec![pending("1", "a", "u", 90), running("2", "b", "v")],
            skipped: 1,
        };
        let facet = aggregate_jobs(parsed, 100);
        assert_eq!(facet.total_jobs, 2);
        assert_eq!(facet.states.pending, 1);
        assert_eq!(facet.computed_at, 100);
        assert_eq!(facet.skipped_lines, 1);
        assert_eq!(facet.pending_wait.max(), Some(Seconds::from_secs(10)));
        assert!(facet.account("a").is_some());
        assert!(facet.user("v").is_some());
    }

    #[test]
    fn test_aggregate_empty_jobs() {
        let facet = aggregate_jobs(
            Parsed {
                records: vec![],
                skipped: 0,
            },
            100,
        );
        assert_eq!(facet.total_jobs, 0);
        assert!(facet.pending_wait.is_empty());
        assert!(facet.by_account.is_empty());
    }
}
