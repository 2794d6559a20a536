use std::path::{Path, PathBuf};

use mnemo_core::Result;

const MINIMAL_CONFIG: &str = r###"# 🧠 Mnemo Configuration

[storage]
data_dir = "~/.mnemo"

[thresholds]
min_count_to_long_term = 3   # detections before an observation is flagged ready for review
min_count_for_core = 5       # detections before a long-term memory may enter core memory
min_days_in_long_term = 7    # days a memory must spend in long-term first

[targets.claude_md]
path = "~/.claude/CLAUDE.md"
heading = "## Learned patterns"

# [targets.agents_md]
# path = "AGENTS.md"

[logging]
level = "info"
# format = "pretty"   # pretty | json | compact
"###;

pub(super) fn cmd_init(local: bool) -> Result<()> {
    let dir = if local {
        std::env::current_dir()?
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mnemo")
    };

    match write_minimal_config(&dir)? {
        Some(config_path) => {
            println!("✅ Created {}", config_path.display());
            println!("   Edit the targets, then run: mnemo status");
        }
        None => {
            println!("⚠️  {} already exists", dir.join("mnemo.toml").display());
            println!("   Run 'mnemo config' to see the effective configuration.");
        }
    }
    Ok(())
}

/// Write `mnemo.toml` into `dir` unless one is already there.
fn write_minimal_config(dir: &Path) -> Result<Option<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let config_path = dir.join("mnemo.toml");
    if config_path.exists() {
        return Ok(None);
    }
    std::fs::write(&config_path, MINIMAL_CONFIG)?;
    Ok(Some(config_path))
}
