#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use mnemo_core::*;
    use std::path::PathBuf;

    // ── Status tests ───────────────────────────────────────────

    #[test]
    fn test_observation_status_serde() {
        let json = serde_json::to_string(&ObservationStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let restored: ObservationStatus = serde_json::from_str("\"denied\"").unwrap();
        assert_eq!(restored, ObservationStatus::Denied);
    }

    #[test]
    fn test_observation_status_from_str() {
        assert_eq!("Approved".parse::<ObservationStatus>().unwrap(), ObservationStatus::Approved);
        assert!("archived".parse::<ObservationStatus>().is_err());
    }

    #[test]
    fn test_memory_status_serde_snake_case() {
        let json = serde_json::to_string(&MemoryStatus::PromotedToCore).unwrap();
        assert_eq!(json, "\"promoted_to_core\"");
    }

    #[test]
    fn test_memory_status_terminal() {
        assert!(!MemoryStatus::Active.is_terminal());
        assert!(MemoryStatus::PromotedToCore.is_terminal());
        assert!(MemoryStatus::Rejected.is_terminal());
    }

    // ── SourceRef tests ────────────────────────────────────────

    #[test]
    fn test_union_source_ignores_duplicates() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut refs = vec![SourceRef::new("session-1", "claude-code", ts)];
        assert!(!union_source(&mut refs, SourceRef::new("session-1", "claude-code", ts)));
        assert_eq!(refs.len(), 1);
        assert!(union_source(&mut refs, SourceRef::new("session-2", "claude-code", ts)));
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_union_source_distinguishes_tool() {
        let ts = Utc::now();
        let mut refs = vec![SourceRef::new("s", "claude-code", ts)];
        assert!(union_source(&mut refs, SourceRef::new("s", "cursor", ts)));
    }

    // ── Threshold tests ────────────────────────────────────────

    #[test]
    fn test_threshold_defaults() {
        let t = PromotionThresholds::default();
        assert_eq!(t.min_count_to_long_term, 3);
        assert_eq!(t.min_count_for_core, 5);
        assert_eq!(t.min_days_in_long_term, 7);
    }

    #[test]
    fn test_allows_core_requires_both_count_and_age() {
        let t = PromotionThresholds::new(1, 3, 2);
        let now = Utc::now();
        let old = now - Duration::days(3);
        let fresh = now - Duration::hours(1);
        assert!(t.allows_core(3, old, now));
        assert!(!t.allows_core(2, old, now));
        assert!(!t.allows_core(5, fresh, now));
    }

    #[test]
    fn test_allows_core_age_boundary_is_inclusive() {
        let t = PromotionThresholds::new(1, 1, 1);
        let now = Utc::now();
        assert!(t.allows_core(1, now - Duration::days(1), now));
        assert!(!t.allows_core(1, now - Duration::days(1) + Duration::seconds(1), now));
    }

    #[test]
    fn test_thresholds_partial_json_applies_defaults() {
        let t: PromotionThresholds = serde_json::from_str(r#"{"min_count_for_core": 9}"#).unwrap();
        assert_eq!(t.min_count_for_core, 9);
        assert_eq!(t.min_days_in_long_term, 7);
    }

    // ── Error tests ────────────────────────────────────────────

    #[test]
    fn test_error_not_found_display() {
        let err = MnemoError::NotFound { kind: "observation", id: "abc".into() };
        assert_eq!(err.to_string(), "observation not found: abc");
    }

    #[test]
    fn test_error_invalid_transition_display() {
        let err = MnemoError::InvalidTransition {
            kind: "observation",
            id: "abc".into(),
            from: "approved".into(),
            action: "deny",
        };
        let s = err.to_string();
        assert!(s.contains("deny"));
        assert!(s.contains("approved"));
    }

    #[test]
    fn test_error_partial_promotion_lists_targets() {
        let err = MnemoError::PartialPromotion {
            id: "m1".into(),
            succeeded: vec!["A".into()],
            failed: vec![("B".into(), "disk full".into())],
            persist_error: None,
        };
        let s = err.to_string();
        assert!(s.contains("succeeded [A]"));
        assert!(s.contains("B: disk full"));
        assert!(!s.contains("not saved"));
        assert_eq!(err.failed_targets(), vec!["B".to_string()]);
    }

    #[test]
    fn test_error_partial_promotion_reports_unsaved_progress() {
        let err = MnemoError::PartialPromotion {
            id: "m1".into(),
            succeeded: vec!["A".into(), "B".into()],
            failed: vec![],
            persist_error: Some("read-only file system".into()),
        };
        let s = err.to_string();
        assert!(s.contains("succeeded [A, B]"));
        assert!(s.contains("progress not saved: read-only file system"));
        assert!(err.failed_targets().is_empty());
        assert!(!err.is_storage_error());
    }

    #[test]
    fn test_error_corrupt_store_carries_path() {
        let err = MnemoError::CorruptStore {
            path: PathBuf::from("/tmp/observations.json"),
            reason: "expected value".into(),
        };
        assert!(err.to_string().contains("/tmp/observations.json"));
        assert!(err.is_storage_error());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MnemoError = io_err.into();
        assert!(err.to_string().contains("file not found"));
        assert!(err.failed_targets().is_empty());
    }
}
