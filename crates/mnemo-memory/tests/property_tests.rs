//! Property-based tests for mnemo-memory
//!
//! Invariants that must hold for all inputs:
//! - Nothing below the thresholds is ever offered for core promotion
//! - A never-matching oracle yields one record per submission
//! - Duplicates always land on the single matching record
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;

use chrono::{Duration, Utc};
use mnemo_core::{MemoryStatus, PromotionThresholds, Result, SourceRef};
use mnemo_memory::{DataFiles, LongTermMemory, RecordStore, SimilarityOracle};
use std::sync::Arc;

fn src(i: usize) -> SourceRef {
    SourceRef::new(format!("session-{i}"), "claude-code", Utc::now())
}

// ============================================================================
// PROMOTION ELIGIBILITY
// ============================================================================

mod promotable {
    use super::*;

    fn status_from(n: u8) -> MemoryStatus {
        match n % 3 {
            0 => MemoryStatus::Active,
            1 => MemoryStatus::PromotedToCore,
            _ => MemoryStatus::Rejected,
        }
    }

    proptest! {
        /// Invariant: every listed record is active and meets both thresholds,
        /// and every such record is listed.
        #[test]
        fn never_below_thresholds(
            records in prop::collection::vec((1u32..20, 0i64..30, 0u8..3), 0..12),
            min_count in 1u32..20,
            min_days in 0u32..30,
        ) {
            let dir = tempfile::tempdir().unwrap();
            let files = DataFiles::in_dir(dir.path());
            let now = Utc::now();

            let memories: Vec<LongTermMemory> = records
                .iter()
                .enumerate()
                .map(|(i, &(count, age_days, status))| LongTermMemory {
                    id: uuid::Uuid::new_v4(),
                    observation_id: uuid::Uuid::new_v4(),
                    text: format!("habit {i}"),
                    count,
                    source_refs: vec![src(i)],
                    first_seen_at: now - Duration::days(age_days + 1),
                    last_seen_at: now,
                    promoted_to_long_term_at: now - Duration::days(age_days),
                    status: status_from(status),
                    core_targets: vec![],
                    delivered_targets: vec![],
                    promoted_to_core_at: None,
                })
                .collect();
            RecordStore::new(&files.long_term).save(&memories).unwrap();

            let never: Arc<dyn SimilarityOracle> =
                Arc::new(|_: &str, _: &str| -> Result<bool> { Ok(false) });
            let thresholds = PromotionThresholds::new(1, min_count, min_days);
            let h = files.open_hierarchy(never, thresholds).unwrap();
            let listed = h.list_promotable_at(&thresholds, now);

            for m in &listed {
                prop_assert_eq!(m.status, MemoryStatus::Active);
                prop_assert!(m.count >= min_count);
                prop_assert!(m.days_in_long_term(now) >= i64::from(min_days));
            }

            let expected = records
                .iter()
                .filter(|&&(count, age, status)| {
                    status_from(status) == MemoryStatus::Active
                        && count >= min_count
                        && age >= i64::from(min_days)
                })
                .count();
            prop_assert_eq!(listed.len(), expected);

            for pair in listed.windows(2) {
                prop_assert!(pair[0].count >= pair[1].count);
            }
        }
    }
}

// ============================================================================
// DEDUPLICATION
// ============================================================================

mod dedup {
    use super::*;

    proptest! {
        /// Invariant: an oracle that never matches creates one record per submit
        #[test]
        fn never_matching_oracle_keeps_all(texts in prop::collection::vec("[a-z]{1,12}( [a-z]{1,12}){0,3}", 1..20)) {
            let dir = tempfile::tempdir().unwrap();
            let never: Arc<dyn SimilarityOracle> =
                Arc::new(|_: &str, _: &str| -> Result<bool> { Ok(false) });
            let files = DataFiles::in_dir(dir.path());
            let mut h = files.open_hierarchy(never, PromotionThresholds::default()).unwrap();

            for (i, text) in texts.iter().enumerate() {
                h.observations_mut().submit(text, src(i)).unwrap();
            }
            prop_assert_eq!(h.observations().len(), texts.len());
            prop_assert!(h.observations().all().iter().all(|o| o.count == 1));
        }

        /// Invariant: duplicates matching exactly one record raise only its count
        #[test]
        fn duplicates_accumulate_on_one_record(others in 0usize..8, dups in 1usize..10) {
            let dir = tempfile::tempdir().unwrap();
            let oracle: Arc<dyn SimilarityOracle> =
                Arc::new(|candidate: &str, existing: &str| -> Result<bool> {
                    Ok(candidate.starts_with("dup") && existing == "target")
                });
            let files = DataFiles::in_dir(dir.path());
            let mut h = files.open_hierarchy(oracle, PromotionThresholds::default()).unwrap();

            for i in 0..others {
                h.observations_mut().submit(&format!("other {i}"), src(i)).unwrap();
            }
            let target = h.observations_mut().submit("target", src(100)).unwrap();
            for i in 0..dups {
                let merged = h.observations_mut().submit(&format!("dup {i}"), src(200 + i)).unwrap();
                prop_assert_eq!(merged.id, target.id);
            }

            let target = h.observations().get(target.id).unwrap();
            prop_assert_eq!(target.count as usize, 1 + dups);
            prop_assert_eq!(target.source_refs.len(), 1 + dups);
            prop_assert_eq!(h.observations().len(), others + 1);
        }
    }
}
