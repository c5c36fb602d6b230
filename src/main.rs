use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use review_portal::cli::{self, Commands};
use review_portal::config::PortalConfig;
use review_portal::document::{DocumentLoader, FileDocumentLoader};
use review_portal::gate::{AccessGate, resolve_document_id};
use review_portal::portal::Portal;
use review_portal::progress::ProgressIndicator;
use review_portal::source::{CommentSource, configured_source};
use review_portal::submission::{HttpSubmissionSink, SubmissionSink};
use review_portal::tui::{App, run_tui};
use review_portal::worker::{spawn_document_load, start_comment_fetch};

fn main() -> Result<()> {
    let args = cli::parse_args();

    let mut config = PortalConfig::load(args.target.config.as_deref())?;
    config.apply_env_overrides(|key| std::env::var(key).ok());

    let document_id = resolve_document_id(
        args.target.document_id.as_deref(),
        args.target.url.as_deref(),
    )?;
    let reviewer_name = args
        .target
        .name
        .clone()
        .unwrap_or_else(|| config.reviewer_name.clone());

    match args.command.unwrap_or(Commands::Review) {
        Commands::Review => {
            init_logging(Some(config.log_file.as_path()), "info")?;
            handle_review(&config, document_id, reviewer_name)?;
        }
        Commands::Status => {
            init_logging(None, "warn")?;
            handle_status(&config, &document_id)?;
        }
        Commands::Anchors => {
            init_logging(None, "warn")?;
            handle_anchors(&config, &document_id)?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// The TUI owns the terminal, so the interactive portal logs to a file.
fn init_logging(log_file: Option<&Path>, default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
                .init();
        }
    }

    Ok(())
}

/// Handle the review command - launch the interactive portal.
fn handle_review(config: &PortalConfig, document_id: String, reviewer_name: String) -> Result<()> {
    info!(document_id = %document_id, "starting review portal");

    // A missing comment source leaves the panel empty; the portal still opens
    let source: Result<Arc<dyn CommentSource>, _> =
        configured_source(config.comments_url.as_deref(), config.request_timeout())
            .map(Arc::from);
    let loader: Arc<dyn DocumentLoader> =
        Arc::new(FileDocumentLoader::new(config.agreements_dir.clone()));
    let sink: Arc<dyn SubmissionSink> = Arc::new(
        HttpSubmissionSink::new(config.submit_url.clone(), config.request_timeout())
            .context("Failed to create submission client")?,
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    spawn_document_load(loader, document_id.clone(), tx.clone());
    start_comment_fetch(source, document_id.clone(), tx.clone());

    let portal = Portal::new(document_id, reviewer_name, config.coalesce_window());
    let gate = AccessGate::new(config.access_phrase.clone());
    let app = App::new(portal, gate, sink, tx, rx);

    run_tui(app)
}

/// Handle the status command - print each comment and whether its passage resolves.
fn handle_status(config: &PortalConfig, document_id: &str) -> Result<()> {
    let source = configured_source(config.comments_url.as_deref(), config.request_timeout())
        .context("Failed to create comment source")?;
    let comments = source
        .fetch(document_id)
        .with_context(|| format!("Failed to fetch comments for {document_id}"))?;

    let loader = FileDocumentLoader::new(config.agreements_dir.clone());
    let document = match loader.load(document_id) {
        Ok(document) => Some(document),
        Err(e) => {
            eprintln!("⚠ {e}");
            None
        }
    };

    println!("Review Status for {document_id}");
    println!("─────────────────────────────────────");

    if comments.is_empty() {
        println!("No comments for this document");
        return Ok(());
    }

    let mut resolved = 0;
    for (idx, comment) in comments.iter().enumerate() {
        let passage = match (&comment.reference_key, &document) {
            (Some(key), Some(doc)) if doc.anchor(key).is_some() => {
                resolved += 1;
                format!("✓ {key}")
            }
            (Some(key), _) => format!("✗ {key}"),
            (None, _) => "-".to_string(),
        };
        println!(
            "  {:>3}  {:12} {:16} {:20} {}",
            ProgressIndicator::label(idx),
            comment.id,
            comment.author,
            comment.created_at,
            passage
        );
    }

    let referenced = comments
        .iter()
        .filter(|c| c.reference_key.is_some())
        .count();
    println!();
    println!("  Comments:   {}", comments.len());
    println!("  Passages:   {resolved}/{referenced} found in document");

    Ok(())
}

/// Handle the anchors command - list the reference keys in the document.
fn handle_anchors(config: &PortalConfig, document_id: &str) -> Result<()> {
    let loader = FileDocumentLoader::new(config.agreements_dir.clone());
    let document = loader.load(document_id)?;

    let keys = document.anchor_keys();
    if keys.is_empty() {
        println!("No anchors found in {document_id}");
        return Ok(());
    }
    for key in keys {
        println!("{key}");
    }

    Ok(())
}
