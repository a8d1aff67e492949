use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use scriptorium::comments::{add_comment, apply_comment, suggest_rewrite};
use scriptorium::config::{load_config, Config};
use scriptorium::db;
use scriptorium::migrate;
use scriptorium::model_client::OpenAiModel;
use scriptorium::proposals::{
    append_patch, apply_proposal, generate_toc, place_concept, propose_book, propose_chapter,
    reject_proposal, DEFAULT_TOC_COUNT,
};
use scriptorium::save::{restore_version, save_chapter, SaveOutcome};
use scriptorium::server::{serve, AppState};
use scriptorium::sqlite_store::SqliteStore;

use scriptorium_core::chunk::chunk_markdown;
use scriptorium_core::diff::{diff_lines, DiffTag};
use scriptorium_core::models::{Book, Chapter, ChapterDraft, EditIntent};
use scriptorium_core::store::Store;

#[derive(Parser)]
#[command(name = "scrib", about = "Local-first book chapter pipeline", version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "./config/scriptorium.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema
    Init,
    /// Manage books
    Book {
        #[command(subcommand)]
        command: BookCommands,
    },
    /// Manage chapters
    Chapter {
        #[command(subcommand)]
        command: ChapterCommands,
    },
    /// Save a chapter draft (from a file or stdin)
    Save {
        chapter_id: String,
        /// Markdown file to read; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        title: Option<String>,
        /// outline, draft, review, or final
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        summary: Option<String>,
    },
    /// Restore a chapter to a historical version
    Restore {
        chapter_id: String,
        version_id: String,
    },
    /// List a chapter's version history
    Versions { chapter_id: String },
    /// Chunk a local markdown file and print the result
    Chunk {
        file: PathBuf,
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Line diff between two local files
    Diff { old: PathBuf, new: PathBuf },
    /// Stage an AI rewrite proposal for a chapter
    Propose {
        chapter_id: String,
        /// outline, tighten, expand, continuity, or free text
        #[arg(long)]
        intent: Option<String>,
        #[arg(long)]
        instruction: String,
    },
    /// Stage one proposal per chapter across a whole book
    ProposeBook {
        book_id: String,
        #[arg(long)]
        intent: Option<String>,
        #[arg(long)]
        instruction: String,
    },
    /// List proposals for a chapter
    Proposals { chapter_id: String },
    /// Apply a pending proposal
    Apply { proposal_id: String },
    /// Reject a pending proposal
    Reject { proposal_id: String },
    /// Append text to the end of a chapter
    Patch {
        chapter_id: String,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        text: Option<String>,
    },
    /// Generate a table of contents for a book concept
    Toc {
        book_id: String,
        #[arg(long)]
        concept: String,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Route a concept to the best fitting chapter
    Place {
        book_id: String,
        #[arg(long)]
        concept: String,
    },
    /// Manage editorial comments
    Comment {
        #[command(subcommand)]
        command: CommentCommands,
    },
    /// Run the HTTP API server
    Serve,
}

#[derive(Subcommand)]
enum BookCommands {
    /// Create a book
    Add { title: String },
}

#[derive(Subcommand)]
enum ChapterCommands {
    /// Create a chapter at the end of a book
    Add { book_id: String, title: String },
    /// List a book's chapters in order
    List { book_id: String },
}

#[derive(Subcommand)]
enum CommentCommands {
    /// Attach a comment to a chapter
    Add {
        chapter_id: String,
        text: String,
        #[arg(long)]
        anchor: Option<String>,
    },
    /// Ask the model for a suggested patch addressing a comment
    Suggest { comment_id: String },
    /// Append a comment's suggested patch to its chapter
    Apply { comment_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let config = load_config(&cli.config)?;
            migrate::run_migrations(&config).await?;
            println!("Database initialized successfully.");
        }
        Commands::Book { command } => {
            let (_config, store) = open_store(&cli.config).await?;
            match command {
                BookCommands::Add { title } => {
                    let book = Book::new(title);
                    store.insert_book(&book).await?;
                    println!("created book {}", book.id);
                }
            }
        }
        Commands::Chapter { command } => {
            let (_config, store) = open_store(&cli.config).await?;
            match command {
                ChapterCommands::Add { book_id, title } => {
                    if store.get_book(&book_id).await?.is_none() {
                        bail!("book not found: {}", book_id);
                    }
                    let position = store.max_position(&book_id).await? + 1;
                    let chapter = Chapter::new(&book_id, title, position);
                    store.insert_chapter(&chapter).await?;
                    println!("created chapter {}", chapter.id);
                }
                ChapterCommands::List { book_id } => {
                    for chapter in store.list_chapters(&book_id).await? {
                        println!(
                            "{}. {} [{}] {}",
                            chapter.position,
                            chapter.title,
                            chapter.status.as_str(),
                            chapter.id
                        );
                    }
                }
            }
        }
        Commands::Save {
            chapter_id,
            file,
            title,
            status,
            summary,
        } => {
            let (config, store) = open_store(&cli.config).await?;
            let chapter = match store.get_chapter(&chapter_id).await? {
                Some(chapter) => chapter,
                None => bail!("chapter not found: {}", chapter_id),
            };

            let markdown = read_markdown(file.as_deref())?;
            let draft = ChapterDraft {
                title: title.unwrap_or(chapter.title),
                status: match status {
                    Some(s) => s.parse()?,
                    None => chapter.status,
                },
                summary: summary.or(chapter.summary),
                markdown,
            };

            match save_chapter(&store, &chapter_id, &draft, config.chunking.max_chars, "cli")
                .await?
            {
                SaveOutcome::Unchanged => {
                    println!("chapter {} unchanged, no version appended", chapter_id)
                }
                SaveOutcome::Saved { version } => {
                    println!("saved chapter {} as version {}", chapter_id, version)
                }
            }
        }
        Commands::Restore {
            chapter_id,
            version_id,
        } => {
            let (config, store) = open_store(&cli.config).await?;
            let version =
                restore_version(&store, &chapter_id, &version_id, config.chunking.max_chars)
                    .await?;
            println!("restored chapter {} to version {}", chapter_id, version);
        }
        Commands::Versions { chapter_id } => {
            let (_config, store) = open_store(&cli.config).await?;
            for v in store.list_versions(&chapter_id).await? {
                println!("v{}  {}  {}", v.version_number, v.id, v.created_at);
            }
        }
        Commands::Chunk { file, max_chars } => {
            let config = Config::minimal();
            let markdown = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let max_chars = max_chars.unwrap_or(config.chunking.max_chars);
            let chunks = chunk_markdown(&markdown, max_chars);
            println!("{} chunks", chunks.len());
            for chunk in &chunks {
                println!(
                    "[{}] heading={:?} tokens={} chars={}",
                    chunk.chunk_index,
                    chunk.heading_path,
                    chunk.token_count,
                    chunk.metadata.length
                );
            }
        }
        Commands::Diff { old, new } => {
            let old_text = std::fs::read_to_string(&old)
                .with_context(|| format!("Failed to read {}", old.display()))?;
            let new_text = std::fs::read_to_string(&new)
                .with_context(|| format!("Failed to read {}", new.display()))?;
            for run in diff_lines(&old_text, &new_text) {
                let marker = match run.tag {
                    DiffTag::Unchanged => ' ',
                    DiffTag::Removed => '-',
                    DiffTag::Added => '+',
                };
                for line in run.text.lines() {
                    println!("{} {}", marker, line);
                }
            }
        }
        Commands::Propose {
            chapter_id,
            intent,
            instruction,
        } => {
            let (config, store) = open_store(&cli.config).await?;
            let model = OpenAiModel::from_config(&config.model)?;
            let intent = parse_intent(intent.as_deref(), &instruction);
            let proposal =
                propose_chapter(&store, &model, &chapter_id, &intent, &instruction).await?;
            println!("created proposal {}", proposal.id);
        }
        Commands::ProposeBook {
            book_id,
            intent,
            instruction,
        } => {
            let (config, store) = open_store(&cli.config).await?;
            let model = OpenAiModel::from_config(&config.model)?;
            let intent = parse_intent(intent.as_deref(), &instruction);
            let proposals = propose_book(&store, &model, &book_id, &intent, &instruction).await?;
            println!("created {} proposals", proposals.len());
            for proposal in &proposals {
                println!("  {} -> chapter {}", proposal.id, proposal.chapter_id);
            }
        }
        Commands::Proposals { chapter_id } => {
            let (_config, store) = open_store(&cli.config).await?;
            for p in store.list_proposals(&chapter_id, None).await? {
                println!("{}  [{}]  {}", p.id, p.status.as_str(), p.instruction);
            }
        }
        Commands::Apply { proposal_id } => {
            let (config, store) = open_store(&cli.config).await?;
            let version =
                apply_proposal(&store, &proposal_id, config.chunking.max_chars, "cli").await?;
            println!("applied proposal {} as version {}", proposal_id, version);
        }
        Commands::Reject { proposal_id } => {
            let (_config, store) = open_store(&cli.config).await?;
            reject_proposal(&store, &proposal_id).await?;
            println!("rejected proposal {}", proposal_id);
        }
        Commands::Patch {
            chapter_id,
            file,
            text,
        } => {
            let (config, store) = open_store(&cli.config).await?;
            let patch = match (text, file) {
                (Some(text), _) => text,
                (None, file) => read_markdown(file.as_deref())?,
            };
            let version = append_patch(
                &store,
                &chapter_id,
                &patch,
                config.chunking.max_chars,
                "cli",
            )
            .await?;
            println!("patched chapter {} as version {}", chapter_id, version);
        }
        Commands::Toc {
            book_id,
            concept,
            count,
        } => {
            let (config, store) = open_store(&cli.config).await?;
            let model = OpenAiModel::from_config(&config.model)?;
            let chapters = generate_toc(
                &store,
                &model,
                &book_id,
                &concept,
                count.unwrap_or(DEFAULT_TOC_COUNT),
            )
            .await?;
            println!("created {} chapters", chapters.len());
            for chapter in &chapters {
                println!("  {}. {} ({})", chapter.position, chapter.title, chapter.id);
            }
        }
        Commands::Place { book_id, concept } => {
            let (config, store) = open_store(&cli.config).await?;
            let model = OpenAiModel::from_config(&config.model)?;
            let chapter = place_concept(&store, &model, &book_id, &concept).await?;
            println!("place in chapter {} ({})", chapter.title, chapter.id);
        }
        Commands::Comment { command } => {
            let (config, store) = open_store(&cli.config).await?;
            match command {
                CommentCommands::Add {
                    chapter_id,
                    text,
                    anchor,
                } => {
                    let comment = add_comment(&store, &chapter_id, &text, anchor, None, None).await?;
                    println!("created comment {}", comment.id);
                }
                CommentCommands::Suggest { comment_id } => {
                    let model = OpenAiModel::from_config(&config.model)?;
                    let suggestion = suggest_rewrite(&store, &model, &comment_id).await?;
                    println!("suggested patch:\n{}", suggestion);
                }
                CommentCommands::Apply { comment_id } => {
                    let version =
                        apply_comment(&store, &comment_id, config.chunking.max_chars, "cli")
                            .await?;
                    println!("applied comment {} as version {}", comment_id, version);
                }
            }
        }
        Commands::Serve => {
            let config = load_config(&cli.config)?;
            let pool = db::connect(&config.db).await?;
            migrate::apply_schema(&pool).await?;
            let store = SqliteStore::new(pool);
            let model = OpenAiModel::from_config(&config.model)?;
            let state = AppState {
                store: Arc::new(store),
                model: Arc::new(model),
                config: Arc::new(config),
            };
            serve(state).await?;
        }
    }

    Ok(())
}

async fn open_store(config_path: &std::path::Path) -> Result<(Config, SqliteStore)> {
    let config = load_config(config_path)?;
    let pool = db::connect(&config.db).await?;
    migrate::apply_schema(&pool).await?;
    Ok((config, SqliteStore::new(pool)))
}

fn read_markdown(file: Option<&std::path::Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

fn parse_intent(intent: Option<&str>, instruction: &str) -> EditIntent {
    match intent {
        Some(intent) => EditIntent::parse(intent),
        None => EditIntent::Custom(instruction.to_string()),
    }
}
