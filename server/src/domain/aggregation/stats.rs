//! Rollup statistics over one hour of events

use std::collections::BTreeMap;

use crate::core::constants::ERROR_STATUS_THRESHOLD;
use crate::data::{EventSample, MetricBucket};

/// Nearest-rank percentile of an ascending slice: index `floor(n * p / 100)`
///
/// Returns 0 for an empty slice.
pub fn percentile(sorted: &[i64], p: u32) -> i64 {
    if sorted.is_empty() {
        return 0;
    }
    let n = sorted.len();
    let idx = (n * p as usize / 100).min(n - 1);
    sorted[idx]
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    error_count: i64,
    durations: Vec<i64>,
}

/// Group samples by (tenant, project) and compute one bucket per group
///
/// Groups are returned in (tenant, project) order; empty input yields none.
pub fn group_window(bucket_start: i64, samples: Vec<EventSample>) -> Vec<MetricBucket> {
    let mut groups: BTreeMap<(String, String), GroupAccumulator> = BTreeMap::new();

    for sample in samples {
        let acc = groups.entry((sample.tenant, sample.project)).or_default();
        if sample.status >= ERROR_STATUS_THRESHOLD {
            acc.error_count += 1;
        }
        acc.durations.push(sample.duration_ms);
    }

    groups
        .into_iter()
        .map(|((tenant, project), mut acc)| {
            acc.durations.sort_unstable();
            MetricBucket {
                tenant,
                project,
                bucket_start,
                total_count: acc.durations.len() as i64,
                error_count: acc.error_count,
                p50_ms: percentile(&acc.durations, 50),
                p95_ms: percentile(&acc.durations, 95),
                p99_ms: percentile(&acc.durations, 99),
            }
        })
        .collect()
}
