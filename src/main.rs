//! # Quire - A Plugin-Driven Rich-Text Editor Core
//!
//! This binary drives the editor headlessly: it loads a document, mounts
//! it on an in-memory surface with a plugin preset, and reports the
//! normalized markup.
//!
//! ## Quick Start
//!
//! ```bash
//! # Normalize a document with the full preset
//! cargo run -- --preset full page.html
//!
//! # Keep a draft next to it, and restore it when no file is given
//! cargo run -- --draft page.draft.json page.html
//! cargo run -- --draft page.draft.json
//! ```

mod draft;

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quire_core::{Editor, EditorConfig, HeadlessSurface};
use quire_plugin::builtin::autosave;
use quire_plugin::{AutoSave, Preset, TextStats};

use draft::FileDraftStore;

/// Quire - a plugin-driven rich-text editor core
#[derive(Parser, Debug)]
#[command(name = "quire")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Markup file to open
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Plugin preset: basic, standard or full
    #[arg(short, long)]
    preset: Option<String>,

    /// Sanitize the loaded markup
    #[arg(long)]
    sanitize: bool,

    /// Mount without editing
    #[arg(short, long)]
    read_only: bool,

    /// Draft file for auto-save
    #[arg(short, long, value_name = "PATH")]
    draft: Option<PathBuf>,

    /// Keep a draft in the user data directory
    #[arg(long, conflicts_with = "draft")]
    autosave: bool,

    /// Print a JSON report instead of plain markup
    #[arg(long)]
    json: bool,

    /// Print the effective config as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Loads the config file and layers the flags on top.
    fn config(&self) -> anyhow::Result<EditorConfig> {
        let mut config = match &self.config {
            Some(path) => EditorConfig::load_from(path)?,
            None => EditorConfig::load(),
        };
        if let Some(preset) = &self.preset {
            config.preset = Some(preset.clone());
        }
        config.sanitize |= self.sanitize;
        config.read_only |= self.read_only;
        Ok(config)
    }

    /// Where drafts go. `--autosave` names the draft after the configured
    /// editor id, or a fixed name so the next run finds it again.
    fn draft_path(&self, editor_id: Option<&str>) -> anyhow::Result<Option<PathBuf>> {
        match (&self.draft, self.autosave) {
            (Some(path), _) => Ok(Some(path.clone())),
            (None, true) => {
                let name = editor_id.unwrap_or(FileDraftStore::DEFAULT_NAME);
                Ok(Some(FileDraftStore::default_path(name)?))
            }
            (None, false) => Ok(None),
        }
    }
}

/// What the driver prints with `--json`.
#[derive(Debug, Serialize)]
struct Report {
    id: String,
    plugins: Vec<String>,
    #[serde(flatten)]
    stats: TextStats,
    markup: String,
}

impl Report {
    fn of(editor: &Editor) -> Self {
        Self {
            id: editor.id().to_string(),
            plugins: editor.plugins().names(),
            stats: TextStats::of(&editor.text()),
            markup: editor.get_data(),
        }
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // Logs go to stderr so the markup on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    tracing::info!("Starting Quire v{}", env!("CARGO_PKG_VERSION"));

    let mut config = args.config()?;
    if args.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Some(path) = &args.file {
        config.content = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read {}: {}", path.display(), e)
        })?;
    }

    // Only a configured id names the draft; generated ones change per run
    let draft_path = args.draft_path(config.id.as_deref())?;

    let sources = Preset::sources_for(&config);
    let mut builder = Editor::builder()
        .config(config)
        .mount(HeadlessSurface::new())
        .plugins(sources);
    if let Some(path) = &draft_path {
        tracing::info!(path = %path.display(), "Auto-saving drafts");
        builder = builder.plugin(AutoSave::source(Arc::new(FileDraftStore::new(path))));
    }
    let editor = builder.build()?;

    let autosave: Option<Rc<AutoSave>> = editor.plugins().get_as::<AutoSave>(autosave::NAME);
    if let Some(plugin) = &autosave {
        if args.file.is_none() && plugin.restore_draft().await {
            tracing::info!("Restored the previous draft");
        }
    }

    let report = Report::of(&editor);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.markup);
        eprintln!("{}", report.stats.summary());
    }

    if let Some(plugin) = &autosave {
        if !plugin.save_now().await {
            tracing::warn!("Draft was not saved");
        }
    }

    editor.destroy();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["quire"]);
        assert!(args.file.is_none());
        assert!(!args.read_only);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_args_with_file() {
        let args = Args::parse_from(["quire", "-vv", "--preset", "full", "page.html"]);
        assert_eq!(args.file, Some(PathBuf::from("page.html")));
        assert_eq!(args.preset.as_deref(), Some("full"));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_draft_and_autosave_conflict() {
        let result = Args::try_parse_from(["quire", "--autosave", "--draft", "d.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "preset = \"basic\"\nundo_limit = 10\n").unwrap();

        let args = Args::parse_from([
            "quire",
            "--config",
            path.to_str().unwrap(),
            "--preset",
            "standard",
            "--read-only",
        ]);
        let config = args.config().unwrap();
        assert_eq!(config.preset.as_deref(), Some("standard"));
        assert_eq!(config.undo_limit, 10);
        assert!(config.read_only);
        assert!(!config.sanitize);
    }

    #[test]
    fn test_draft_path_choice() {
        let args = Args::parse_from(["quire", "--draft", "d.json"]);
        assert_eq!(
            args.draft_path(Some("quire-x")).unwrap(),
            Some(PathBuf::from("d.json"))
        );

        let args = Args::parse_from(["quire"]);
        assert_eq!(args.draft_path(Some("quire-x")).unwrap(), None);
    }

    #[test]
    fn test_autosave_path_is_stable_across_runs() {
        let first = Args::parse_from(["quire", "--autosave"]).draft_path(None);
        let second = Args::parse_from(["quire", "--autosave"]).draft_path(None);
        // No data directory on this machine
        let (Ok(first), Ok(second)) = (first, second) else {
            return;
        };
        assert_eq!(first, second);
        let first = first.unwrap();
        assert!(first.ends_with("quire/drafts/default.json"));

        let named = Args::parse_from(["quire", "--autosave"])
            .draft_path(Some("notes"))
            .unwrap()
            .unwrap();
        assert!(named.ends_with("quire/drafts/notes.json"));
    }

    #[test]
    fn test_report_counts_text() {
        let editor = Editor::builder()
            .config(EditorConfig {
                preset: Some("basic".into()),
                content: "<p>Three short words</p>".into(),
                ..EditorConfig::default()
            })
            .mount(HeadlessSurface::new())
            .plugins(Preset::Basic.sources())
            .build()
            .unwrap();

        let report = Report::of(&editor);
        assert_eq!(report.stats.words, 3);
        assert_eq!(report.plugins, vec!["history", "word-count"]);
        assert_eq!(report.markup, "<p>Three short words</p>");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["words"], 3);
    }
}
