use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use mnemo_config::{ConfigLoader, MnemoConfig, WarningSeverity, expand_tilde};
use mnemo_core::{MnemoError, Result};
use mnemo_memory::{DataFiles, MemoryHierarchy, NormalizedTextOracle, RunStateStore};

use crate::writer::FileWriter;

mod promote;
mod review;
mod setup;

/// 🧠 Mnemo: learns your coding habits and promotes them into core memory
#[derive(Parser)]
#[command(name = "mnemo", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to mnemo.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show counts, thresholds, targets and the last run
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record an observed pattern by hand
    Observe {
        /// Pattern description, e.g. "prefers tabs over spaces"
        text: String,
        /// Session or source identifier
        #[arg(short, long, default_value = "manual")]
        source: String,
        /// Assistant the pattern was seen in
        #[arg(short, long, default_value = "cli")]
        tool: String,
    },
    /// Import extracted observations from a JSON Lines file
    Import {
        /// File with one {"text", "source_id", "tool_name", "timestamp"} object per line
        file: PathBuf,
        /// Ignore source cursors and import every line
        #[arg(long)]
        all: bool,
    },
    /// List observations awaiting review
    Pending {
        /// Only those seen at least min_count_to_long_term times
        #[arg(long)]
        ready: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Approve observations and move them into long-term memory
    Approve {
        /// Observation ids (full or unique prefix)
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Deny observations so they are never matched again
    Deny {
        /// Observation ids (full or unique prefix)
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Leave an observation pending for a later review
    Skip {
        /// Observation id (full or unique prefix)
        id: String,
    },
    /// List long-term memories eligible for core promotion
    Promotable {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a long-term memory into core memory targets
    Promote {
        /// Long-term memory id (full or unique prefix)
        id: String,
        /// Target ids; defaults to every configured target
        #[arg(short, long = "target")]
        targets: Vec<String>,
    },
    /// Reject a long-term memory permanently
    Reject {
        /// Long-term memory id (full or unique prefix)
        id: String,
    },
    /// Inspect or move per-source read cursors
    Cursor {
        #[command(subcommand)]
        action: CursorAction,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Initialize a new mnemo.toml in the current or home directory
    Init {
        /// Create in current directory instead of ~/.mnemo/
        #[arg(long)]
        local: bool,
    },
    /// Audit configuration and stored data
    Doctor,
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Show version and build info
    Version,
}

#[derive(Subcommand)]
enum CursorAction {
    /// Show the cursor for a source
    Get { source: String },
    /// Set the cursor for a source (RFC 3339 timestamp)
    Set { source: String, at: String },
    /// Reset a source so it is read from the beginning
    Clear { source: String },
}

/// Resolved configuration plus the data files it points at.
struct App {
    config: MnemoConfig,
    files: DataFiles,
}

impl App {
    fn new(config: MnemoConfig) -> Self {
        let files = DataFiles::in_dir(&config.data_dir());
        Self { config, files }
    }

    /// Open the hierarchy with the lexical oracle and one file writer per target.
    fn hierarchy(&self) -> Result<MemoryHierarchy> {
        let mut hierarchy = self
            .files
            .open_hierarchy(Arc::new(NormalizedTextOracle), self.config.thresholds)?;
        for (id, target) in &self.config.targets {
            let writer = FileWriter::new(expand_tilde(&target.path), target.heading.clone());
            hierarchy.register_writer(id.clone(), Arc::new(writer));
        }
        Ok(hierarchy)
    }

    fn run_state(&self) -> Result<RunStateStore> {
        self.files.open_run_state()
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        self.init_tracing(config_loader.get());

        let config_path = config_loader.path().to_path_buf();
        let app = App::new(config_loader.into_config());

        match self.command {
            Commands::Status { json } => Self::cmd_status(&app, json),
            Commands::Observe { text, source, tool } => {
                review::cmd_observe(&app, &text, &source, &tool)
            }
            Commands::Import { file, all } => review::cmd_import(&app, &file, all),
            Commands::Pending { ready, json } => review::cmd_pending(&app, ready, json),
            Commands::Approve { ids } => review::cmd_approve(&app, &ids),
            Commands::Deny { ids } => review::cmd_deny(&app, &ids),
            Commands::Skip { id } => review::cmd_skip(&app, &id),
            Commands::Promotable { json } => promote::cmd_promotable(&app, json),
            Commands::Promote { id, targets } => promote::cmd_promote(&app, &id, targets),
            Commands::Reject { id } => promote::cmd_reject(&app, &id),
            Commands::Cursor { action } => Self::cmd_cursor(&app, action),
            Commands::Config { json } => Self::cmd_config(&app.config, json),
            Commands::Init { local } => setup::cmd_init(local),
            Commands::Doctor => Self::cmd_doctor(&app, &config_path),
            Commands::Completions { shell } => Self::cmd_completions(shell),
            Commands::Version => Self::cmd_version(),
        }
    }

    /// Resolve log level: --verbose > --quiet > --log-level > config. RUST_LOG wins over all.
    fn init_tracing(&self, config: &MnemoConfig) {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        // Logs go to stderr so --json output stays parseable.
        let _ = match config.logging.format.as_str() {
            "json" => builder.json().with_target(true).try_init(),
            "compact" => builder.compact().with_target(false).try_init(),
            _ => builder.with_target(false).try_init(),
        };
    }

    fn cmd_status(app: &App, json: bool) -> Result<()> {
        let hierarchy = app.hierarchy()?;
        let run_state = app.run_state()?;
        let counts = hierarchy.counts();
        let thresholds = app.config.thresholds;
        let ready = hierarchy
            .observations()
            .list_ready_for_review(thresholds.min_count_to_long_term)
            .len();
        let promotable = hierarchy.list_promotable(&thresholds).len();
        let state = run_state.get();

        if json {
            let value = serde_json::json!({
                "data_dir": app.config.data_dir(),
                "counts": counts,
                "ready_for_review": ready,
                "promotable": promotable,
                "thresholds": thresholds,
                "targets": hierarchy.targets(),
                "run_state": state,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        println!("🧠 {}", style("Mnemo status").bold());
        println!("   Data dir:              {}", app.config.data_dir().display());
        println!(
            "   Pending observations:  {} ({} ready for review)",
            counts.pending_observations, ready
        );
        println!("   Long-term (active):    {}", counts.active_long_term);
        println!("   Promoted to core:      {}", counts.promoted_to_core);
        println!("   Promotable now:        {promotable}");
        println!(
            "   Thresholds:            review ≥ {}, core ≥ {} after {} days",
            thresholds.min_count_to_long_term,
            thresholds.min_count_for_core,
            thresholds.min_days_in_long_term
        );

        if app.config.targets.is_empty() {
            println!("   Targets:               {}", style("none configured").dim());
        } else {
            println!("   Targets:");
            for (id, target) in &app.config.targets {
                println!("     {} → {}", style(id).cyan(), expand_tilde(&target.path).display());
            }
        }

        match state.last_run_at {
            Some(at) => println!("   Last run:              {}", at.to_rfc3339()),
            None => println!("   Last run:              {}", style("never").dim()),
        }
        if let Some(ref err) = state.last_error {
            let when = state
                .last_error_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            println!("   Last error:            ❌ {err} {}", style(when).dim());
        }
        if !state.cursors.is_empty() {
            println!("   Cursors:");
            for (source, cursor) in &state.cursors {
                let shown = cursor
                    .map(|c| c.to_rfc3339())
                    .unwrap_or_else(|| "(from start)".into());
                println!("     {source} → {shown}");
            }
        }
        Ok(())
    }

    fn cmd_cursor(app: &App, action: CursorAction) -> Result<()> {
        let mut run_state = app.run_state()?;
        match action {
            CursorAction::Get { source } => match run_state.get_cursor(&source) {
                Some(at) => println!("{source}: {}", at.to_rfc3339()),
                None => println!("{source}: {}", style("(from start)").dim()),
            },
            CursorAction::Set { source, at } => {
                let at = chrono::DateTime::parse_from_rfc3339(&at)
                    .map_err(|e| MnemoError::InvalidInput(format!("invalid timestamp '{at}': {e}")))?
                    .with_timezone(&chrono::Utc);
                run_state.set_cursor(&source, at)?;
                println!("✅ {source} cursor set to {}", at.to_rfc3339());
            }
            CursorAction::Clear { source } => {
                run_state.clear_cursor(&source)?;
                println!("✅ {source} will be read from the beginning");
            }
        }
        Ok(())
    }

    fn cmd_config(config: &MnemoConfig, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| MnemoError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_doctor(app: &App, config_path: &std::path::Path) -> Result<()> {
        println!("🩺 Mnemo Doctor — Configuration Audit");
        println!();

        if config_path.exists() {
            println!("  ✅ config: {}", config_path.display());
        } else {
            println!(
                "  💡 config: {} not found, using defaults",
                config_path.display()
            );
            println!("   ↳ Run 'mnemo init' to create one");
        }

        let warnings = match app.config.validate() {
            Ok(w) => w,
            Err(e) => {
                println!("{e}");
                return Ok(());
            }
        };

        let mut warn_count = 0;
        let mut info_count = 0;
        for w in &warnings {
            println!("  {w}");
            match w.severity {
                WarningSeverity::Warning => warn_count += 1,
                WarningSeverity::Info => info_count += 1,
                WarningSeverity::Error => {}
            }
        }

        // Stored data must parse; a corrupt file is reported, not repaired.
        let mut ok_count = 0;
        let mut error_count = 0;
        match app.hierarchy() {
            Ok(h) => {
                ok_count += 1;
                println!(
                    "  ✅ data: {} observations, {} long-term memories",
                    h.observations().len(),
                    h.all().len()
                );
            }
            Err(e) => {
                error_count += 1;
                println!("  ❌ data: {e}");
            }
        }
        match app.run_state() {
            Ok(_) => ok_count += 1,
            Err(e) => {
                error_count += 1;
                println!("  ❌ run state: {e}");
            }
        }

        for (id, target) in &app.config.targets {
            let path = expand_tilde(&target.path);
            let parent_ok = path
                .parent()
                .map(|p| p.as_os_str().is_empty() || p.exists())
                .unwrap_or(true);
            if path.exists() || parent_ok {
                ok_count += 1;
            } else {
                println!(
                    "  💡 targets.{id}: {} does not exist yet, it will be created",
                    path.display()
                );
                info_count += 1;
            }
        }

        println!();
        println!(
            "  ✅ {ok_count} checks passed, ❌ {error_count} errors, ⚠️  {warn_count} warnings, 💡 {info_count} suggestions"
        );
        Ok(())
    }

    fn cmd_version() -> Result<()> {
        println!("🧠 Mnemo v{}", env!("CARGO_PKG_VERSION"));
        println!("   Schema version: {}", mnemo_memory::SCHEMA_VERSION);
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "mnemo", &mut std::io::stdout());
        Ok(())
    }
}

/// Resolve a full id or a unique prefix of one among `candidates`.
fn resolve_id(
    kind: &'static str,
    input: &str,
    candidates: impl IntoIterator<Item = Uuid>,
) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return Err(MnemoError::InvalidInput(format!("empty {kind} id")));
    }
    let matches: Vec<Uuid> = candidates
        .into_iter()
        .filter(|id| id.to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [one] => Ok(*one),
        [] => Err(MnemoError::NotFound {
            kind,
            id: input.to_string(),
        }),
        _ => Err(MnemoError::InvalidInput(format!(
            "{kind} id prefix '{input}' is ambiguous ({} matches)",
            matches.len()
        ))),
    }
}

/// First eight characters of an id, enough to type back as a prefix.
fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Truncate to `max` characters on a single line.
fn truncate_output(s: &str, max: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    }
}
