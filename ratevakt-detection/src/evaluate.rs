//! Threshold evaluation of a closed window.

use ratevakt_core::{BlockDecision, ThresholdPolicy};

use crate::aggregator::WindowSnapshot;
use crate::exemption::ExemptionFilter;

/// Block decisions for every source strictly over the threshold that is still
/// eligible (a source may have been whitelisted or blocked since it was
/// counted).
///
/// Heaviest sources come first; ties are ordered by identifier.
pub fn evaluate(
    snapshot: &WindowSnapshot,
    policy: &ThresholdPolicy,
    filter: &ExemptionFilter,
) -> Vec<BlockDecision> {
    let mut decisions: Vec<BlockDecision> = snapshot
        .iter()
        .filter(|(id, count)| policy.exceeds(*count) && filter.should_count(id))
        .map(|(id, count)| BlockDecision {
            source: id.clone(),
            count,
            window_end_ns: snapshot.ended_ns,
        })
        .collect();

    decisions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));
    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::RateAggregator;
    use crate::exemption::MemoryRegistry;
    use ratevakt_core::{SourceId, VirtualClock};
    use std::sync::Arc;
    use std::time::Duration;

    fn policy(threshold: u64) -> ThresholdPolicy {
        ThresholdPolicy::new(threshold, Duration::from_secs(1)).unwrap()
    }

    fn window(counts: &[(&str, u64)]) -> WindowSnapshot {
        let agg = RateAggregator::new(Arc::new(VirtualClock::new(7)));
        for (id, n) in counts {
            let id = SourceId::from(*id);
            for _ in 0..*n {
                agg.increment(&id);
            }
        }
        agg.snapshot_and_reset()
    }

    fn open_filter() -> ExemptionFilter {
        ExemptionFilter::new(Arc::new(MemoryRegistry::default()))
    }

    #[test]
    fn exact_threshold_is_allowed() {
        let decisions = evaluate(&window(&[("10.0.0.2", 100)]), &policy(100), &open_filter());
        assert!(decisions.is_empty());
    }

    #[test]
    fn one_over_threshold_blocks() {
        let decisions = evaluate(&window(&[("10.0.0.1", 101)]), &policy(100), &open_filter());
        assert_eq!(
            decisions,
            vec![BlockDecision {
                source: SourceId::from("10.0.0.1"),
                count: 101,
                window_end_ns: 7,
            }]
        );
    }

    #[test]
    fn orders_by_count_then_id() {
        let decisions = evaluate(
            &window(&[("10.0.0.9", 5), ("10.0.0.1", 9), ("10.0.0.5", 5), ("10.0.0.7", 1)]),
            &policy(2),
            &open_filter(),
        );
        let order: Vec<_> = decisions.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(order, vec!["10.0.0.1", "10.0.0.5", "10.0.0.9"]);
    }

    #[test]
    fn rechecks_exemption_at_evaluation() {
        let registry = Arc::new(MemoryRegistry::default());
        let filter = ExemptionFilter::new(registry.clone());
        let snapshot = window(&[("10.0.0.1", 50), ("10.0.0.2", 50)]);

        registry.mark_blocked(SourceId::from("10.0.0.1"));
        let decisions = evaluate(&snapshot, &policy(10), &filter);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].source.as_str(), "10.0.0.2");
    }
}
