//! deckscope: command-line front end for reviewing and editing a deck.
//!
//! Output is JSON on stdout. The viewer identity comes from
//! `DECKSCOPE_USER_ID`; without it the CLI runs anonymously and grades go to
//! the local cache in `DECKSCOPE_CACHE_DIR`.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use deckscope_core::{
    CardStatus, CardVisibility, ChapterScope, Grade, GradeBucket, IdentityBus, NewCard,
    ScopePatch, TaxonomyKind, TopicScope,
};
use deckscope_db::Database;
use deckscope_study::{FileStore, StudyConfig, StudyController};

#[derive(Parser)]
#[command(name = "deckscope")]
#[command(author, version, about = "Scoped flashcard review")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List chapters, topics and tags with usage counts
    Taxonomy,

    /// Show the review pool for a scope
    Review {
        /// Chapter id, or "__uncategorised__"
        #[arg(long)]
        chapter: Option<ChapterScope>,

        /// Topic id, or "__none__"
        #[arg(long)]
        topic: Option<TopicScope>,

        /// again, hard, good, easy or ungraded
        #[arg(long)]
        diff: Option<GradeBucket>,

        /// Maximum cards to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show difficulty and picker counts for a scope
    Counts {
        #[arg(long)]
        chapter: Option<ChapterScope>,

        #[arg(long)]
        topic: Option<TopicScope>,
    },

    /// Search cards ("#name" searches tags)
    Search {
        query: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Grade a card
    Grade { card: Uuid, grade: Grade },

    /// Replace a card's tags by name
    Tag { card: Uuid, names: Vec<String> },

    /// Replace a card's topics by name
    Topics { card: Uuid, names: Vec<String> },

    /// Add a card
    Add {
        #[arg(long)]
        front: String,

        #[arg(long)]
        back: String,

        /// Chapter title (created if missing)
        #[arg(long)]
        chapter: Option<String>,

        /// Topic title, repeatable
        #[arg(long = "topic")]
        topics: Vec<String>,

        /// Tag name, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Publish as a public card
        #[arg(long)]
        publish: bool,
    },

    /// Toggle a card's author-suspended flag (requires login)
    Suspend { card: Uuid },

    /// Delete a card with its links and grades
    DeleteCard { card: Uuid },

    /// Rename a chapter, topic or tag (by id or current name)
    Rename {
        kind: TaxonomyKind,
        target: String,
        name: String,
    },

    /// Delete a chapter, topic or tag by id or name (cards are kept)
    Delete { kind: TaxonomyKind, target: String },

    /// Run database migrations
    Migrate,
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // LOG_FORMAT - "json" or "text" (default: "text")
    // LOG_FILE   - path to log file (optional, enables file logging)
    // RUST_LOG   - standard env filter (default: "deckscope=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "deckscope=info,deckscope_study=info,deckscope_db=info,deckscope_core=info".into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("deckscope.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
        }
        Some(guard)
    } else {
        // Console logs go to stderr so stdout stays machine-readable.
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        None
    }
}

fn print(value: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Accept either a UUID or an exact name of an existing entry.
fn resolve_target(
    controller: &StudyController,
    kind: TaxonomyKind,
    target: &str,
) -> anyhow::Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(target) {
        return Ok(id);
    }
    controller
        .taxonomy()
        .id_by_name(kind, target.trim())
        .ok_or_else(|| anyhow::anyhow!("no {} named '{}'", kind, target.trim()))
}

fn scope_patch(
    chapter: Option<ChapterScope>,
    topic: Option<TopicScope>,
    diff: Option<GradeBucket>,
) -> ScopePatch {
    ScopePatch {
        chapter,
        topic,
        diff: diff.map(Some),
        starred: None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();
    let cli = Cli::parse();

    let config = StudyConfig::from_env()?;
    let db = Database::connect_with_config(&config.database_url, config.pool_config())
        .await
        .context("connecting to database")?;

    if let Commands::Migrate = cli.command {
        db.migrate().await?;
        info!(subsystem = "cli", op = "migrate", "Migrations applied");
        return print(json!({ "migrated": true }));
    }

    let identity = Arc::new(IdentityBus::with_identity(
        deckscope_core::defaults::IDENTITY_BUS_CAPACITY,
        config.identity.clone(),
    ));
    let store = Arc::new(FileStore::new(config.cache_dir.clone()));
    let mut controller = StudyController::new(db.repositories(), identity, store);
    if let Some(report) = controller.start().await? {
        info!(
            subsystem = "cli",
            op = "start",
            written = report.written,
            failed = report.failed.len(),
            "Uploaded grades cached while signed out"
        );
    }

    match cli.command {
        Commands::Taxonomy => {
            let usage = controller.usage_counts();
            let tax = controller.taxonomy();
            let chapters: Vec<_> = tax
                .chapters
                .iter()
                .map(|c| json!({ "id": c.id, "title": c.title, "cards": usage.get(TaxonomyKind::Chapter, c.id) }))
                .collect();
            let topics: Vec<_> = tax
                .topics
                .iter()
                .map(|t| json!({ "id": t.id, "title": t.title, "cards": usage.get(TaxonomyKind::Topic, t.id) }))
                .collect();
            let tags: Vec<_> = tax
                .tags
                .iter()
                .map(|t| json!({ "id": t.id, "name": t.name, "cards": usage.get(TaxonomyKind::Tag, t.id) }))
                .collect();
            print(json!({
                "chapters": chapters,
                "topics": topics,
                "tags": tags,
                "uncategorised": usage.uncategorised,
            }))?;
        }
        Commands::Review {
            chapter,
            topic,
            diff,
            limit,
        } => {
            controller.set_scope(scope_patch(chapter, topic, diff));
            let pool: Vec<_> = controller
                .session()
                .pool()
                .iter()
                .take(limit)
                .filter_map(|id| controller.catalog().get(*id))
                .map(|card| {
                    json!({
                        "id": card.id,
                        "front": card.front,
                        "chapter": controller.taxonomy().chapter_label(card),
                        "topics": card.topic_labels(),
                        "grade": card.grade_bucket().as_str(),
                        "notes": card.meta.notes_preview(),
                        "attachments": card.meta.attachment_count(),
                    })
                })
                .collect();
            print(json!({
                "pool_size": controller.session().len(),
                "cards": pool,
                "counts": controller.counts(),
            }))?;
        }
        Commands::Counts { chapter, topic } => {
            controller.set_scope(scope_patch(chapter, topic, None));
            let picker = controller.picker_counts();
            let topic_options: Vec<_> = picker
                .topic_options
                .iter()
                .map(|id| {
                    json!({
                        "id": id,
                        "title": controller.taxonomy().topic_title(*id),
                        "cards": picker.topic(*id),
                    })
                })
                .collect();
            print(json!({
                "difficulty": controller.counts(),
                "total": picker.total,
                "uncategorised": picker.uncategorised,
                "no_topics": picker.no_topics,
                "by_chapter": picker.by_chapter,
                "topic_options": topic_options,
            }))?;
        }
        Commands::Search { query, limit } => {
            let found = controller.review_search(&query);
            let hits: Vec<_> = controller
                .session()
                .pool()
                .iter()
                .take(limit)
                .filter_map(|id| controller.catalog().get(*id))
                .map(|card| json!({ "id": card.id, "front": card.front, "tags": card.tag_names() }))
                .collect();
            print(json!({ "found": found, "cards": hits }))?;
        }
        Commands::Grade { card, grade } => {
            let outcome = controller.grade(card, grade).await?;
            print(json!({ "card": card, "grade": grade, "result": outcome }))?;
        }
        Commands::Tag { card, names } => {
            let report = controller.replace_tags_by_name(card, &names).await?;
            print(serde_json::to_value(report)?)?;
        }
        Commands::Topics { card, names } => {
            let report = controller.replace_topics_by_name(card, &names).await?;
            print(serde_json::to_value(report)?)?;
        }
        Commands::Add {
            front,
            back,
            chapter,
            topics,
            tags,
            publish,
        } => {
            let (status, visibility) = if publish {
                (CardStatus::Published, CardVisibility::Public)
            } else {
                (CardStatus::Draft, CardVisibility::Private)
            };
            let id = controller
                .create_card(NewCard {
                    front,
                    back,
                    chapter,
                    topics,
                    tags,
                    status,
                    visibility,
                    ..Default::default()
                })
                .await?;
            print(json!({ "id": id }))?;
        }
        Commands::Suspend { card } => {
            let suspended = controller.toggle_suspended(card).await?;
            print(json!({ "card": card, "author_suspended": suspended }))?;
        }
        Commands::DeleteCard { card } => {
            let report = controller.delete_card(card).await?;
            print(serde_json::to_value(report)?)?;
        }
        Commands::Rename { kind, target, name } => {
            let id = resolve_target(&controller, kind, &target)?;
            controller.rename(kind, id, &name).await?;
            print(json!({ "kind": kind, "id": id, "name": name }))?;
        }
        Commands::Delete { kind, target } => {
            let id = resolve_target(&controller, kind, &target)?;
            let detached = controller.delete(kind, id).await?;
            print(json!({ "kind": kind, "id": id, "detached": detached }))?;
        }
        Commands::Migrate => unreachable!("handled before the controller is built"),
    }

    Ok(())
}
