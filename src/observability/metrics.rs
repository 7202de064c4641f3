//! Metrics facade setup. The crate emits counters/gauges through the
//! `metrics` facade throughout (git subprocess timeouts, index mutex
//! poison recovery, lifecycle sweep counts); wiring an exporter (e.g.
//! Prometheus) is left to the embedding application, matching the
//! teacher's facade-only approach for library code.

/// Registers metric descriptions so exporters that expose help text have
/// something to show. A no-op if no recorder has been installed by the
/// embedding application.
pub fn init_metrics() {
    metrics::describe_counter!(
        "git_subprocess_timeout_total",
        "Number of git subprocess invocations killed for exceeding their wall-clock timeout"
    );
    metrics::describe_counter!(
        "index_mutex_poison_recovery_total",
        "Number of times the index connection mutex was recovered after a panic while held"
    );
    metrics::describe_counter!(
        "lifecycle_sweep_aged_total",
        "Memories transitioned from active to aging by a lifecycle sweep"
    );
    metrics::describe_counter!(
        "lifecycle_sweep_archived_total",
        "Memories transitioned from aging to archived by a lifecycle sweep"
    );
    metrics::describe_counter!(
        "lifecycle_sweep_tombstoned_total",
        "Memories transitioned to tombstone by a lifecycle sweep"
    );
    metrics::describe_counter!(
        "lifecycle_gc_removed_total",
        "Tombstoned memories physically removed by garbage collection"
    );
}
