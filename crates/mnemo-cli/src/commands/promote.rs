use chrono::Utc;
use console::style;

use mnemo_core::{MnemoError, Result};
use mnemo_memory::MemoryHierarchy;

use super::{App, resolve_id, short_id, truncate_output};

pub(super) fn cmd_promotable(app: &App, json: bool) -> Result<()> {
    let hierarchy = app.hierarchy()?;
    let thresholds = app.config.thresholds;
    let promotable = hierarchy.list_promotable(&thresholds);

    if json {
        println!("{}", serde_json::to_string_pretty(&promotable)?);
        return Ok(());
    }

    if promotable.is_empty() {
        println!(
            "Nothing is ready for core memory (needs ≥ {} detections and {} days in long-term).",
            thresholds.min_count_for_core, thresholds.min_days_in_long_term
        );
        return Ok(());
    }

    let now = Utc::now();
    println!(
        "{} ({} memories)",
        style("Ready for core memory").bold(),
        promotable.len()
    );
    println!("{}", "-".repeat(80));
    for m in &promotable {
        println!(
            "  {}  {:>3}x  {:>3}d  {}",
            style(short_id(&m.id)).cyan(),
            m.count,
            m.days_in_long_term(now),
            truncate_output(&m.text, 80)
        );
    }
    println!();
    println!("   Promote with: mnemo promote <id> [--target <target>...]");
    Ok(())
}

/// Promote to the requested targets, or every configured target when none
/// are given. A partial failure prints what landed and what to retry.
pub(super) fn cmd_promote(app: &App, id: &str, targets: Vec<String>) -> Result<()> {
    let mut hierarchy = app.hierarchy()?;
    let id = resolve_memory_id(&hierarchy, id)?;
    let targets = if targets.is_empty() {
        app.config.targets.keys().cloned().collect::<Vec<_>>()
    } else {
        targets
    };
    if targets.is_empty() {
        return Err(MnemoError::InvalidInput(
            "no targets given and none configured; add a [targets.<id>] section".into(),
        ));
    }

    match hierarchy.promote_to_core(id, &targets) {
        Ok(memory) => {
            println!(
                "🎉 {} promoted to core memory: {}",
                style(short_id(&memory.id)).cyan(),
                memory.core_targets.join(", ")
            );
            Ok(())
        }
        Err(err) => {
            if let MnemoError::PartialPromotion {
                succeeded,
                failed,
                persist_error,
                ..
            } = &err
            {
                for target in succeeded {
                    println!("  ✅ {target}");
                }
                for (target, reason) in failed {
                    println!("  ❌ {target}: {reason}");
                }
                if let Some(reason) = persist_error {
                    println!("  ⚠️  Delivery progress not saved: {reason}");
                }
                let retry: Vec<String> = if failed.is_empty() {
                    targets.iter().map(|t| format!("-t {t}")).collect()
                } else {
                    failed.iter().map(|(t, _)| format!("-t {t}")).collect()
                };
                println!(
                    "   ↳ Retry with: mnemo promote {} {}",
                    short_id(&id),
                    retry.join(" ")
                );
            }
            Err(err)
        }
    }
}

pub(super) fn cmd_reject(app: &App, id: &str) -> Result<()> {
    let mut hierarchy = app.hierarchy()?;
    let id = resolve_memory_id(&hierarchy, id)?;
    let memory = hierarchy.reject(id)?;
    println!(
        "🗑️  {} rejected: {}",
        short_id(&memory.id),
        truncate_output(&memory.text, 60)
    );
    Ok(())
}

fn resolve_memory_id(hierarchy: &MemoryHierarchy, input: &str) -> Result<uuid::Uuid> {
    resolve_id(
        "long-term memory",
        input,
        hierarchy.all().iter().map(|m| m.id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_config::{MnemoConfig, TargetConfig};
    use mnemo_core::{MemoryStatus, PromotionThresholds, SourceRef};

    fn app_with_targets(dir: &std::path::Path, targets: &[(&str, std::path::PathBuf)]) -> App {
        let mut config = MnemoConfig::default();
        config.storage.data_dir = dir.join("data");
        config.thresholds = PromotionThresholds::new(1, 1, 0);
        for (id, path) in targets {
            config.targets.insert(
                id.to_string(),
                TargetConfig {
                    path: path.clone(),
                    heading: Some("## Learned patterns".into()),
                },
            );
        }
        App::new(config)
    }

    fn seed(app: &App, text: &str) -> uuid::Uuid {
        let mut h = app.hierarchy().unwrap();
        let obs = h
            .observe(text, SourceRef::new("s1", "cli", Utc::now()))
            .unwrap();
        h.approve_and_promote(obs.id).unwrap().id
    }

    #[test]
    fn test_promote_writes_every_configured_target() {
        let dir = tempfile::tempdir().unwrap();
        let claude = dir.path().join("CLAUDE.md");
        let agents = dir.path().join("AGENTS.md");
        let app = app_with_targets(
            dir.path(),
            &[("agents_md", agents.clone()), ("claude_md", claude.clone())],
        );
        let id = seed(&app, "prefers tabs over spaces");

        cmd_promote(&app, &short_id(&id), vec![]).unwrap();

        for path in [&claude, &agents] {
            let content = std::fs::read_to_string(path).unwrap();
            assert!(content.starts_with("## Learned patterns\n\n- prefers tabs over spaces\n"));
        }
        let h = app.hierarchy().unwrap();
        let memory = h.get(id).unwrap();
        assert_eq!(memory.status, MemoryStatus::PromotedToCore);
        assert_eq!(memory.core_targets, vec!["agents_md", "claude_md"]);
    }

    #[test]
    fn test_promote_partial_failure_then_retry() {
        let dir = tempfile::tempdir().unwrap();
        let claude = dir.path().join("CLAUDE.md");
        let blocked = dir.path().join("AGENTS.md");
        std::fs::create_dir_all(&blocked).unwrap();
        let app = app_with_targets(
            dir.path(),
            &[("agents_md", blocked.clone()), ("claude_md", claude.clone())],
        );
        let id = seed(&app, "uses pnpm");

        let err = cmd_promote(&app, &id.to_string(), vec![]).unwrap_err();
        assert_eq!(err.failed_targets(), vec!["agents_md"]);
        assert_eq!(
            app.hierarchy().unwrap().get(id).unwrap().status,
            MemoryStatus::Active
        );

        std::fs::remove_dir(&blocked).unwrap();
        cmd_promote(&app, &id.to_string(), vec!["agents_md".into(), "claude_md".into()]).unwrap();
        let content = std::fs::read_to_string(&claude).unwrap();
        assert_eq!(content.matches("- uses pnpm").count(), 1);
        assert!(std::fs::read_to_string(&blocked).unwrap().contains("- uses pnpm"));
    }

    #[test]
    fn test_promote_without_targets_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_targets(dir.path(), &[]);
        let id = seed(&app, "x");
        assert!(matches!(
            cmd_promote(&app, &id.to_string(), vec![]),
            Err(MnemoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reject() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_targets(dir.path(), &[]);
        let id = seed(&app, "x");
        cmd_reject(&app, &short_id(&id)).unwrap();
        assert!(cmd_reject(&app, &id.to_string()).is_err());
        assert!(app.hierarchy().unwrap().list_promotable(&app.config.thresholds).is_empty());
    }
}
