use chrono::{DateTime, Utc};
use console::style;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use mnemo_core::{MnemoError, ObservationStatus, Result, SourceRef};
use mnemo_memory::{MemoryHierarchy, Observation, RunStateStore};

use super::{App, resolve_id, short_id, truncate_output};

/// One line of an import file, as produced by a session extractor.
#[derive(Debug, Deserialize)]
struct ImportRecord {
    text: String,
    source_id: String,
    #[serde(default = "default_tool")]
    tool_name: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

fn default_tool() -> String {
    "unknown".into()
}

pub(super) fn cmd_observe(app: &App, text: &str, source: &str, tool: &str) -> Result<()> {
    let mut hierarchy = app.hierarchy()?;
    let observation = hierarchy.observe(text, SourceRef::new(source, tool, Utc::now()))?;

    if observation.count == 1 {
        println!("📝 New observation {}", style(short_id(&observation.id)).cyan());
    } else {
        println!(
            "🔁 Merged into {} (seen {}x): {}",
            style(short_id(&observation.id)).cyan(),
            observation.count,
            truncate_output(&observation.text, 80)
        );
    }
    Ok(())
}

pub(super) fn cmd_import(app: &App, file: &Path, all: bool) -> Result<()> {
    let mut hierarchy = app.hierarchy()?;
    let started = Utc::now();
    let summary = tracked_run(app, started, |run_state| {
        import_file(&mut hierarchy, run_state, file, all, started)
    })?;

    println!(
        "📥 Imported {} line(s): {} new, {} merged, {} skipped by cursor",
        summary.imported, summary.created, summary.merged, summary.skipped
    );
    Ok(())
}

#[derive(Debug, Default)]
struct ImportSummary {
    imported: usize,
    created: usize,
    merged: usize,
    skipped: usize,
}

fn import_file(
    hierarchy: &mut MemoryHierarchy,
    run_state: &mut RunStateStore,
    file: &Path,
    all: bool,
    now: DateTime<Utc>,
) -> Result<ImportSummary> {
    let raw = std::fs::read_to_string(file)?;
    let mut summary = ImportSummary::default();
    let mut candidates = Vec::new();
    let mut newest: BTreeMap<String, DateTime<Utc>> = BTreeMap::new();

    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: ImportRecord = serde_json::from_str(line).map_err(|e| {
            MnemoError::InvalidInput(format!("{}:{}: {}", file.display(), lineno + 1, e))
        })?;
        let at = record.timestamp.unwrap_or(now);

        if !all {
            if let Some(cursor) = run_state.get_cursor(&record.source_id) {
                if at <= cursor {
                    summary.skipped += 1;
                    continue;
                }
            }
        }

        let entry = newest.entry(record.source_id.clone()).or_insert(at);
        if at > *entry {
            *entry = at;
        }
        candidates.push((
            record.text,
            SourceRef::new(record.source_id, record.tool_name, at),
        ));
    }

    let before = hierarchy.observations().len();
    let observations = hierarchy.observe_batch(candidates)?;
    summary.imported = observations.len();
    summary.created = hierarchy.observations().len() - before;
    summary.merged = summary.imported - summary.created;

    for (source, at) in newest {
        run_state.set_cursor(&source, at)?;
    }
    info!(
        imported = summary.imported,
        created = summary.created,
        skipped = summary.skipped,
        "import finished"
    );
    Ok(summary)
}

/// Run `work` between run-start and run-success bookkeeping. A failure is
/// recorded in the run state before it is returned.
fn tracked_run<T>(
    app: &App,
    started: DateTime<Utc>,
    work: impl FnOnce(&mut RunStateStore) -> Result<T>,
) -> Result<T> {
    let mut run_state = app.run_state()?;
    run_state.record_run_start(started)?;
    match work(&mut run_state) {
        Ok(value) => {
            run_state.record_run_success(started)?;
            Ok(value)
        }
        Err(e) => {
            run_state.record_error(&e.to_string());
            Err(e)
        }
    }
}

pub(super) fn cmd_pending(app: &App, ready: bool, json: bool) -> Result<()> {
    let hierarchy = app.hierarchy()?;
    let store = hierarchy.observations();
    let min_count = app.config.thresholds.min_count_to_long_term;
    let pending = if ready {
        store.list_ready_for_review(min_count)
    } else {
        store.list_pending()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    if pending.is_empty() {
        println!("No observations awaiting review.");
        return Ok(());
    }

    println!(
        "{} ({} observations)",
        style("Pending review").bold(),
        pending.len()
    );
    println!("{}", "-".repeat(80));
    for o in &pending {
        print_observation(o, min_count);
    }
    println!();
    println!("   Approve with: mnemo approve <id>...   Deny with: mnemo deny <id>...");
    Ok(())
}

fn print_observation(o: &Observation, min_count: u32) {
    let marker = if o.count >= min_count { "★" } else { " " };
    println!(
        "{} {}  {:>3}x  {}  {}",
        marker,
        style(short_id(&o.id)).cyan(),
        o.count,
        style(o.last_seen_at.format("%Y-%m-%d")).dim(),
        truncate_output(&o.text, 80)
    );
}

/// Approve observations (all or none) and hand them to long-term memory.
/// An approved observation whose hand-off never completed is promoted
/// without being approved again.
pub(super) fn cmd_approve(app: &App, ids: &[String]) -> Result<()> {
    let mut hierarchy = app.hierarchy()?;
    let ids = resolve_observation_ids(&hierarchy, ids)?;
    let to_approve: Vec<Uuid> = ids
        .iter()
        .copied()
        .filter(|id| !awaiting_hand_off(&hierarchy, *id))
        .collect();
    if !to_approve.is_empty() {
        hierarchy.observations_mut().approve_many(&to_approve)?;
    }
    for id in ids {
        let memory = hierarchy.approve_and_promote(id)?;
        println!(
            "✅ {} → long-term {}: {}",
            short_id(&id),
            style(short_id(&memory.id)).cyan(),
            truncate_output(&memory.text, 60)
        );
    }
    Ok(())
}

/// Approved, but not yet in long-term memory.
fn awaiting_hand_off(hierarchy: &MemoryHierarchy, id: Uuid) -> bool {
    hierarchy
        .observations()
        .get(id)
        .is_ok_and(|o| o.status == ObservationStatus::Approved)
        && !hierarchy.all().iter().any(|m| m.observation_id == id)
}

pub(super) fn cmd_deny(app: &App, ids: &[String]) -> Result<()> {
    let mut hierarchy = app.hierarchy()?;
    let ids = resolve_observation_ids(&hierarchy, ids)?;
    let denied = hierarchy.observations_mut().deny_many(&ids)?;
    for observation in &denied {
        println!(
            "🚫 {} denied: {}",
            short_id(&observation.id),
            truncate_output(&observation.text, 60)
        );
    }
    Ok(())
}

/// Leave an observation for later. Only checks that it is still pending.
pub(super) fn cmd_skip(app: &App, id: &str) -> Result<()> {
    let hierarchy = app.hierarchy()?;
    let store = hierarchy.observations();
    let id = resolve_id("observation", id, store.all().iter().map(|o| o.id))?;
    let observation = store.get(id)?;
    if observation.status != ObservationStatus::Pending {
        return Err(MnemoError::InvalidTransition {
            kind: "observation",
            id: id.to_string(),
            from: observation.status.to_string(),
            action: "skip",
        });
    }
    println!("⏭️  {} stays pending", short_id(&id));
    Ok(())
}

fn resolve_observation_ids(hierarchy: &MemoryHierarchy, inputs: &[String]) -> Result<Vec<Uuid>> {
    let all = hierarchy.observations().all();
    inputs
        .iter()
        .map(|input| resolve_id("observation", input, all.iter().map(|o| o.id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_config::MnemoConfig;
    use mnemo_core::PromotionThresholds;

    fn app_in(dir: &Path) -> App {
        let mut config = MnemoConfig::default();
        config.storage.data_dir = dir.to_path_buf();
        config.thresholds = PromotionThresholds::new(2, 2, 0);
        App::new(config)
    }

    fn write_lines(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.join("import.jsonl");
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    #[test]
    fn test_import_merges_and_advances_cursors() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        let file = write_lines(
            dir.path(),
            &[
                r#"{"text": "prefers tabs", "source_id": "s1", "tool_name": "claude-code", "timestamp": "2026-01-01T10:00:00Z"}"#,
                "",
                r#"{"text": "Prefers tabs.", "source_id": "s1", "timestamp": "2026-01-02T10:00:00Z"}"#,
                r#"{"text": "runs clippy", "source_id": "s2", "timestamp": "2026-01-03T10:00:00Z"}"#,
            ],
        );

        cmd_import(&app, &file, false).unwrap();

        let hierarchy = app.hierarchy().unwrap();
        assert_eq!(hierarchy.observations().len(), 2);
        let ready = hierarchy.observations().list_ready_for_review(2);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].text, "prefers tabs");

        let run_state = app.run_state().unwrap();
        assert_eq!(
            run_state.get_cursor("s1").unwrap().to_rfc3339(),
            "2026-01-02T10:00:00+00:00"
        );
        assert!(run_state.get().last_run_at.is_some());
        assert!(run_state.get().last_error.is_none());
    }

    #[test]
    fn test_import_skips_lines_behind_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        let file = write_lines(
            dir.path(),
            &[r#"{"text": "uses rg", "source_id": "s1", "timestamp": "2026-01-01T10:00:00Z"}"#],
        );
        cmd_import(&app, &file, false).unwrap();
        cmd_import(&app, &file, false).unwrap();
        let hierarchy = app.hierarchy().unwrap();
        assert_eq!(hierarchy.observations().all()[0].count, 1);

        cmd_import(&app, &file, true).unwrap();
        let hierarchy = app.hierarchy().unwrap();
        assert_eq!(hierarchy.observations().all()[0].count, 2);
    }

    #[test]
    fn test_import_bad_line_records_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        let file = write_lines(
            dir.path(),
            &[
                r#"{"text": "ok", "source_id": "s1"}"#,
                r#"{"text": "missing source"}"#,
            ],
        );
        let err = cmd_import(&app, &file, false).unwrap_err();
        assert!(err.to_string().contains(":2:"));
        assert!(app.hierarchy().unwrap().observations().is_empty());
        assert!(app.run_state().unwrap().get().last_error.is_some());
    }

    #[test]
    fn test_approve_moves_to_long_term() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        cmd_observe(&app, "prefers tabs", "s1", "cli").unwrap();
        let id = app.hierarchy().unwrap().observations().all()[0].id;

        cmd_approve(&app, &[short_id(&id)]).unwrap();
        let hierarchy = app.hierarchy().unwrap();
        assert_eq!(hierarchy.all().len(), 1);
        assert_eq!(hierarchy.all()[0].observation_id, id);
        assert!(cmd_deny(&app, &[id.to_string()]).is_err());
        assert!(cmd_skip(&app, &id.to_string()).is_err());
    }

    #[test]
    fn test_approve_resumes_stalled_hand_off() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        cmd_observe(&app, "prefers tabs", "s1", "cli").unwrap();
        cmd_observe(&app, "runs clippy", "s1", "cli").unwrap();
        let ids: Vec<Uuid> = app
            .hierarchy()
            .unwrap()
            .observations()
            .all()
            .iter()
            .map(|o| o.id)
            .collect();

        // Approved earlier, but the long-term record was never written.
        app.hierarchy()
            .unwrap()
            .observations_mut()
            .approve(ids[0])
            .unwrap();
        assert!(app.hierarchy().unwrap().all().is_empty());

        cmd_approve(&app, &[short_id(&ids[0]), ids[1].to_string()]).unwrap();
        let hierarchy = app.hierarchy().unwrap();
        assert_eq!(hierarchy.all().len(), 2);
        assert!(hierarchy.all().iter().any(|m| m.observation_id == ids[0]));
        assert!(hierarchy.all().iter().any(|m| m.observation_id == ids[1]));

        assert!(matches!(
            cmd_approve(&app, &[ids[0].to_string()]),
            Err(MnemoError::InvalidTransition { .. })
        ));
        assert_eq!(app.hierarchy().unwrap().all().len(), 2);
    }

    #[test]
    fn test_observe_is_not_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        cmd_observe(&app, "prefers tabs", "s1", "cli").unwrap();
        cmd_observe(&app, "Prefers tabs!", "s2", "cli").unwrap();

        assert_eq!(app.hierarchy().unwrap().observations().all()[0].count, 2);
        let state = app.run_state().unwrap();
        assert!(state.get().last_run_at.is_none());
        assert!(state.get().last_started_at.is_none());
    }

    #[test]
    fn test_deny_and_skip() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        cmd_observe(&app, "a", "s1", "cli").unwrap();
        cmd_observe(&app, "b", "s1", "cli").unwrap();
        let ids: Vec<String> = app
            .hierarchy()
            .unwrap()
            .observations()
            .all()
            .iter()
            .map(|o| o.id.to_string())
            .collect();

        cmd_skip(&app, &ids[1]).unwrap();
        cmd_deny(&app, &ids[..1]).unwrap();
        let counts = app.hierarchy().unwrap().counts();
        assert_eq!(counts.pending_observations, 1);
    }
}
