//! Conceptmap CLI - personal knowledge graph with mastery tracking

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use conceptmap_core::config::Config;
use conceptmap_core::controller::Controller;
use conceptmap_core::domain::tree::classify;
use conceptmap_core::domain::{CandidateConcept, DedupPolicy, MasteryStatus, PersistenceStore};
use conceptmap_core::infrastructure::SqlitePersistenceStore;
use conceptmap_core::services::LlmTutor;
use conceptmap_core::storage::{Database, DatabaseConfig};
use render::{RenderOptions, TreeRenderer, TreeStyle};
use serde_json::json;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "conceptmap")]
#[command(author, version, about = "Personal knowledge graph with mastery tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Database file (defaults to the configured path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Owner whose graph to use (defaults to storage.owner)
    #[arg(long, global = true)]
    owner: Option<String>,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the starter graph
    Init {
        /// Replace an existing graph
        #[arg(long)]
        force: bool,
    },

    /// Show the folder tree
    Tree {
        /// ASCII characters only
        #[arg(long)]
        ascii: bool,
        /// Show closed folders expanded
        #[arg(long)]
        expand_all: bool,
        /// Hide a category (repeatable)
        #[arg(long = "hide", value_name = "CATEGORY")]
        hide: Vec<String>,
    },

    /// List concepts
    Nodes {
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
    },

    /// List categories with their bucket
    Categories,

    /// Show links of a concept
    Links { id: String },

    /// Merge concepts under a category
    Merge {
        #[arg(short, long)]
        category: String,
        /// "label|status|description", status and description optional
        #[arg(long = "concept", value_name = "SPEC", required = true)]
        concepts: Vec<String>,
        /// Duplicate handling (allow, skip_existing, reject_existing)
        #[arg(long)]
        dedup: Option<String>,
    },

    /// Set a concept's mastery status
    Status { id: String, status: String },

    /// Analyze text into candidate concepts
    Analyze {
        text: String,
        /// Merge the candidates under this category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Generate a quiz for a concept
    Quiz {
        id: String,
        #[arg(long)]
        show_answers: bool,
    },

    /// Assess an explanation of a concept
    Assess {
        id: String,
        #[arg(short, long)]
        explanation: String,
    },

    /// Per-concept notes
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },

    /// Past analyses and assessments
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum NotesAction {
    /// Print the notes of a concept
    Get { id: String },
    /// Replace the notes of a concept
    Set { id: String, content: String },
    /// Delete the notes of a concept
    Delete { id: String },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Chat messages, oldest first
    Chat {
        #[arg(short, long)]
        limit: Option<i64>,
    },
    /// Assessment results, newest first
    Assessments {
        #[arg(short, long)]
        node: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

/// Global options shared by every command
struct Session {
    format: OutputFormat,
    quiet: bool,
    db: Option<PathBuf>,
    owner: Option<String>,
}

impl Session {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn owner(&self, config: &Config) -> String {
        self.owner
            .clone()
            .unwrap_or_else(|| config.storage.owner.clone())
    }

    fn database_path(&self, config: &Config) -> anyhow::Result<PathBuf> {
        match &self.db {
            Some(path) => Ok(path.clone()),
            None => config.database_path(),
        }
    }

    async fn persistence(&self, config: &Config) -> anyhow::Result<Arc<dyn PersistenceStore>> {
        let path = self.database_path(config)?;
        debug!(path = %path.display(), "Opening database");
        let db = Database::new(DatabaseConfig::with_path(path)).await?;
        Ok(Arc::new(SqlitePersistenceStore::new(db)))
    }

    /// Load the owner's graph; an empty graph means `init` never ran
    async fn controller(&self, config: Config) -> anyhow::Result<Controller> {
        let persistence = self.persistence(&config).await?;
        let owner = self.owner(&config);
        let controller = Controller::load(config, persistence, owner.as_str()).await?;
        if controller.store().is_empty() {
            bail!(
                "No concept graph for '{}'. Run `conceptmap init` first.",
                owner
            );
        }
        Ok(controller)
    }

    async fn tutor_controller(&self, config: Config) -> anyhow::Result<Controller> {
        let tutor = LlmTutor::from_config(&config.llm)?.ok_or_else(|| {
            anyhow!("No API key configured. Set CONCEPTMAP_API_KEY or OPENROUTER_API_KEY.")
        })?;
        Ok(self.controller(config).await?.with_tutor(Arc::new(tutor)))
    }

    fn print_json(&self, value: &serde_json::Value) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays parseable
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("conceptmap=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        if let Some(hint) = e
            .downcast_ref::<conceptmap_core::Error>()
            .and_then(|core| core.suggestion())
        {
            eprintln!("  Hint: {}", hint);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let session = Session {
        format: cli.format,
        quiet: cli.quiet,
        db: cli.db,
        owner: cli.owner,
    };

    match cli.command {
        Commands::Config { action } => cmd_config(&session, action),
        Commands::Doctor => cmd_doctor(&session).await,
        command => {
            let config = Config::load()?;
            match command {
                Commands::Init { force } => cmd_init(&session, config, force).await,
                Commands::Tree {
                    ascii,
                    expand_all,
                    hide,
                } => cmd_tree(&session, config, ascii, expand_all, &hide).await,
                Commands::Nodes { category, status } => {
                    cmd_nodes(&session, config, category.as_deref(), status.as_deref()).await
                }
                Commands::Categories => cmd_categories(&session, config).await,
                Commands::Links { id } => cmd_links(&session, config, &id).await,
                Commands::Merge {
                    category,
                    concepts,
                    dedup,
                } => cmd_merge(&session, config, &category, &concepts, dedup.as_deref()).await,
                Commands::Status { id, status } => {
                    cmd_status(&session, config, &id, &status).await
                }
                Commands::Analyze { text, category } => {
                    cmd_analyze(&session, config, &text, category.as_deref()).await
                }
                Commands::Quiz { id, show_answers } => {
                    cmd_quiz(&session, config, &id, show_answers).await
                }
                Commands::Assess { id, explanation } => {
                    cmd_assess(&session, config, &id, &explanation).await
                }
                Commands::Notes { action } => cmd_notes(&session, config, action).await,
                Commands::History { action } => cmd_history(&session, config, action).await,
                // handled above
                Commands::Config { .. } | Commands::Doctor => Ok(()),
            }
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_init(session: &Session, config: Config, force: bool) -> anyhow::Result<()> {
    let path = session.database_path(&config)?;
    let persistence = session.persistence(&config).await?;
    let owner = session.owner(&config);
    let controller = Controller::init(config, persistence, owner.as_str(), force).await?;

    if session.json() {
        return session.print_json(&json!({
            "owner": owner,
            "database": path.display().to_string(),
            "nodes": controller.store().len(),
            "links": controller.store().link_count(),
        }));
    }
    if !session.quiet {
        println!(
            "Initialized concept graph for '{}' with {} concepts.",
            owner,
            controller.store().len()
        );
        println!("  Database: {}", path.display());
        println!("\nNext steps:");
        println!("  1. Run `conceptmap tree --expand-all` to browse concepts");
        println!("  2. Run `conceptmap assess <id> --explanation <text>` to test yourself");
    }
    Ok(())
}

async fn cmd_tree(
    session: &Session,
    config: Config,
    ascii: bool,
    expand_all: bool,
    hide: &[String],
) -> anyhow::Result<()> {
    let mut controller = session.controller(config).await?;
    for category in hide {
        if !controller.is_category_hidden(category) {
            controller.toggle_category_visibility(category);
        }
    }

    if session.json() {
        return session.print_json(&json!({
            "hierarchy": controller.hierarchy(),
            "hidden": controller.hidden_categories().iter().collect::<Vec<_>>(),
        }));
    }

    let options = RenderOptions {
        style: if ascii { TreeStyle::Ascii } else { TreeStyle::Unicode },
        expand_all,
        show_ids: !session.quiet,
    };
    let text = TreeRenderer::new(controller.store(), controller.hidden_categories())
        .options(options)
        .render(controller.hierarchy());
    print!("{}", text);
    Ok(())
}

async fn cmd_nodes(
    session: &Session,
    config: Config,
    category: Option<&str>,
    status: Option<&str>,
) -> anyhow::Result<()> {
    let status = status.map(parse_status).transpose()?;
    let controller = session.controller(config).await?;
    let nodes: Vec<_> = controller
        .store()
        .nodes()
        .iter()
        .filter(|n| category.is_none_or(|c| n.category == c))
        .filter(|n| status.is_none_or(|s| n.status == s))
        .collect();

    if session.json() {
        return session.print_json(&json!(nodes));
    }
    if nodes.is_empty() {
        if !session.quiet {
            println!("No concepts found.");
        }
        return Ok(());
    }
    for node in nodes {
        println!(
            "  {:<12} {:<8} {} ({})",
            node.id,
            node.status.as_str(),
            node.label,
            node.category
        );
    }
    Ok(())
}

async fn cmd_categories(session: &Session, config: Config) -> anyhow::Result<()> {
    let controller = session.controller(config).await?;
    let store = controller.store();
    let rows: Vec<_> = store
        .categories()
        .into_iter()
        .map(|category| {
            let count = store.nodes().iter().filter(|n| n.category == category).count();
            let bucket = classify(&category);
            (category, bucket, count)
        })
        .collect();

    if session.json() {
        let items: Vec<_> = rows
            .iter()
            .map(|(category, bucket, count)| {
                json!({ "category": category, "bucket": bucket, "concepts": count })
            })
            .collect();
        return session.print_json(&json!(items));
    }
    for (category, bucket, count) in rows {
        println!("  {:<20} {:<18} {}", category, bucket.to_string(), count);
    }
    Ok(())
}

async fn cmd_links(session: &Session, config: Config, id: &str) -> anyhow::Result<()> {
    let controller = session.controller(config).await?;
    let store = controller.store();
    if !store.contains(id) {
        return Err(conceptmap_core::Error::NodeNotFound(id.to_string()).into());
    }
    let links = store.links_touching(id);

    if session.json() {
        return session.print_json(&json!(links));
    }
    if links.is_empty() {
        if !session.quiet {
            println!("'{}' has no links.", id);
        }
        return Ok(());
    }
    for link in links {
        let (arrow, other) = if link.source == id {
            ("->", link.target.as_str())
        } else {
            ("<-", link.source.as_str())
        };
        let label = store.node(other).map(|n| n.label.as_str()).unwrap_or("?");
        println!("  {} {} {} ({})", id, arrow, other, label);
    }
    Ok(())
}

async fn cmd_merge(
    session: &Session,
    mut config: Config,
    category: &str,
    specs: &[String],
    dedup: Option<&str>,
) -> anyhow::Result<()> {
    if let Some(policy) = dedup {
        config.merge.dedup = DedupPolicy::parse(policy).ok_or_else(|| {
            anyhow!(
                "Unknown dedup policy '{}'. Use allow, skip_existing or reject_existing.",
                policy
            )
        })?;
    }
    let candidates = specs
        .iter()
        .map(|spec| parse_candidate(spec))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut controller = session.controller(config).await?;
    let report = controller.merge(&candidates, category).await?;

    if session.json() {
        return session.print_json(&json!(report));
    }
    if !session.quiet {
        println!(
            "Merged {} concept(s) into '{}'.",
            report.created.len(),
            report.category
        );
        if let Some(anchor) = &report.anchor_id {
            println!("  Anchor: {}", anchor);
        }
        if report.sentinel_created {
            println!("  Created root concept '{}'", anchor_label(&controller, &report.anchor_id));
        }
        for id in &report.created {
            let label = controller.store().node(id).map(|n| n.label.as_str()).unwrap_or("?");
            println!("  + {} ({})", label, id);
        }
        for label in &report.skipped {
            println!("  = {} (already exists, skipped)", label);
        }
    }
    Ok(())
}

fn anchor_label<'a>(controller: &'a Controller, anchor: &Option<String>) -> &'a str {
    anchor
        .as_deref()
        .and_then(|id| controller.store().node(id))
        .map(|n| n.label.as_str())
        .unwrap_or("?")
}

async fn cmd_status(session: &Session, config: Config, id: &str, status: &str) -> anyhow::Result<()> {
    let status = parse_status(status)?;
    let mut controller = session.controller(config).await?;
    let previous = controller.set_status(id, status).await?;

    if session.json() {
        return session.print_json(&json!({ "id": id, "previous": previous, "status": status }));
    }
    if !session.quiet {
        println!("{}: {} -> {}", id, previous, status);
    }
    Ok(())
}

async fn cmd_analyze(
    session: &Session,
    config: Config,
    text: &str,
    category: Option<&str>,
) -> anyhow::Result<()> {
    let mut controller = session.tutor_controller(config).await?;
    let analysis = controller.analyze(text).await?;
    let report = match category {
        Some(category) => Some(controller.merge_pending(category).await?),
        None => None,
    };

    if session.json() {
        return session.print_json(&json!({ "analysis": analysis, "merge": report }));
    }
    if !analysis.explanation.is_empty() {
        println!("{}\n", analysis.explanation);
    }
    println!("Concepts:");
    for concept in &analysis.concepts {
        println!("  - {} [{}]", concept.label, concept.status);
    }
    match report {
        Some(report) if !session.quiet => {
            println!(
                "\nMerged {} concept(s) into '{}'.",
                report.created.len(),
                report.category
            );
        }
        None if !session.quiet => {
            println!("\nRe-run with --category <name> to add them to your graph.");
        }
        _ => {}
    }
    Ok(())
}

async fn cmd_quiz(
    session: &Session,
    config: Config,
    id: &str,
    show_answers: bool,
) -> anyhow::Result<()> {
    let mut controller = session.tutor_controller(config).await?;
    controller.select_node(id)?;
    let quiz = controller.generate_quiz().await?;

    if session.json() {
        return session.print_json(&json!(quiz));
    }
    for (i, question) in quiz.questions.iter().enumerate() {
        println!("{}. {}", i + 1, question.question);
        for (j, option) in question.options.iter().enumerate() {
            println!("   {}) {}", option_letter(j), option);
        }
        if show_answers {
            println!(
                "   Answer: {}. {}",
                option_letter(question.correct_index),
                question.explanation
            );
        }
        println!();
    }
    Ok(())
}

fn option_letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map(|i| char::from(b'A' + i))
        .unwrap_or('?')
}

async fn cmd_assess(
    session: &Session,
    config: Config,
    id: &str,
    explanation: &str,
) -> anyhow::Result<()> {
    let mut controller = session.tutor_controller(config).await?;
    controller.select_node(id)?;
    let previous = controller
        .selected_node()
        .map(|n| n.status)
        .unwrap_or_default();
    let outcome = controller.assess(explanation).await?;

    if session.json() {
        return session.print_json(&json!({ "id": id, "previous": previous, "outcome": outcome }));
    }
    println!("Score: {}/100", outcome.score);
    println!("Status: {} -> {}", previous, outcome.status);
    if !outcome.feedback.is_empty() {
        println!("Feedback: {}", outcome.feedback);
    }
    if !outcome.next_step.is_empty() {
        println!("Next step: {}", outcome.next_step);
    }
    Ok(())
}

async fn cmd_notes(session: &Session, config: Config, action: NotesAction) -> anyhow::Result<()> {
    let controller = session.controller(config).await?;
    match action {
        NotesAction::Get { id } => {
            let notes = controller.node_notes(&id).await?;
            if session.json() {
                return session.print_json(&json!(notes));
            }
            match notes {
                Some(notes) => println!("{}", notes.content),
                None if !session.quiet => println!("No notes for '{}'.", id),
                None => {}
            }
        }
        NotesAction::Set { id, content } => {
            controller.save_node_notes(&id, &content).await?;
            if !session.quiet {
                println!("Notes saved for '{}'.", id);
            }
        }
        NotesAction::Delete { id } => {
            let deleted = controller.delete_node_notes(&id).await?;
            if !session.quiet {
                if deleted {
                    println!("Notes deleted for '{}'.", id);
                } else {
                    println!("No notes for '{}'.", id);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_history(
    session: &Session,
    config: Config,
    action: HistoryAction,
) -> anyhow::Result<()> {
    let controller = session.controller(config).await?;
    match action {
        HistoryAction::Chat { limit } => {
            let messages = controller.chat_history(limit).await?;
            if session.json() {
                return session.print_json(&json!(messages));
            }
            for message in messages {
                println!(
                    "[{}] {}: {}",
                    message.created_at.format("%Y-%m-%d %H:%M"),
                    message.sender.as_str(),
                    message.content
                );
            }
        }
        HistoryAction::Assessments { node } => {
            let records = controller.assessment_history(node.as_deref()).await?;
            if session.json() {
                return session.print_json(&json!(records));
            }
            for record in records {
                println!(
                    "[{}] {} {:>3}/100 {}",
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.node_id,
                    record.score,
                    record.status
                );
            }
        }
    }
    Ok(())
}

fn cmd_config(session: &Session, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !session.quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            if session.json() {
                let map: serde_json::Map<_, _> = items
                    .into_iter()
                    .map(|(key, value)| (key, serde_json::Value::String(value)))
                    .collect();
                return session.print_json(&serde_json::Value::Object(map));
            }
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !session.quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(session: &Session) -> anyhow::Result<()> {
    let quiet = session.quiet;
    if !quiet {
        println!("Conceptmap Health Check");
        println!("=======================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }
            match config.llm.redacted_api_key() {
                Ok(Some(redacted)) => {
                    if !quiet {
                        println!("[OK] API Key: Configured ({})", redacted);
                    }
                }
                Ok(None) => {
                    // analysis, quiz and assess need it; everything else works
                    if !quiet {
                        println!("[--] API Key: Not configured");
                        println!(
                            "     Set CONCEPTMAP_API_KEY or OPENROUTER_API_KEY to enable analyze, quiz and assess"
                        );
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] API Key: Error - {}", e);
                    }
                }
            }
            Some(config)
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Configuration: Error - {}", e);
            }
            None
        }
    };

    if !quiet {
        match Config::config_path() {
            Ok(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
            Ok(path) => println!("[--] Config file: {} (using defaults)", path.display()),
            Err(e) => println!("[!!] Config file: Error - {}", e),
        }
    }

    if let Some(config) = config {
        match check_database(session, &config).await {
            Ok(lines) => {
                if !quiet {
                    for line in lines {
                        println!("{}", line);
                    }
                }
            }
            Err(e) => {
                all_ok = false;
                warn!(error = %e, "Database check failed");
                if !quiet {
                    println!("[!!] Database: Error - {:#}", e);
                }
            }
        }
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    if all_ok {
        Ok(())
    } else {
        bail!("health check failed")
    }
}

async fn check_database(session: &Session, config: &Config) -> anyhow::Result<Vec<String>> {
    let path = session.database_path(config)?;
    let db = Database::new(DatabaseConfig::with_path(&path))
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    db.health_check().await?;

    let mut lines = vec![
        "[OK] Database: Connected".to_string(),
        format!("     Path: {}", db.path().display()),
    ];
    let status = db.migration_status().await?;
    if status.needs_migration {
        lines.push(format!(
            "[!!] Database: Migrations pending (v{} -> v{})",
            status.current_version, status.target_version
        ));
    } else {
        lines.push(format!("[OK] Database: Schema v{}", status.current_version));
    }

    let owner = session.owner(config);
    let (nodes, links) = SqlitePersistenceStore::new(db).load_graph(&owner).await?;
    lines.push(format!(
        "[OK] Graph '{}': {} concepts, {} links",
        owner,
        nodes.len(),
        links.len()
    ));
    Ok(lines)
}

// ============================================================================
// Argument parsing
// ============================================================================

fn parse_status(value: &str) -> anyhow::Result<MasteryStatus> {
    MasteryStatus::parse(value).ok_or_else(|| {
        anyhow!(
            "Unknown status '{}'. Use one of: known, fuzzy, unknown, new.",
            value
        )
    })
}

/// Parse "label|status|description"; status and description may be omitted
fn parse_candidate(spec: &str) -> anyhow::Result<CandidateConcept> {
    let mut parts = spec.splitn(3, '|').map(str::trim);
    let label = parts.next().unwrap_or_default();
    if label.is_empty() {
        bail!("Concept '{}' has no label", spec);
    }

    let mut candidate = CandidateConcept::new(label);
    if let Some(status) = parts.next().filter(|s| !s.is_empty()) {
        candidate = candidate.with_status(parse_status(status)?);
    }
    if let Some(description) = parts.next().filter(|s| !s.is_empty()) {
        candidate = candidate.with_description(description);
    }
    Ok(candidate)
}

#[cfg(test)]
mod main_tests;
