//! CLI interface for the note service

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use semantic_notes::{Config, Note, NoteInput, NoteService, SearchMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "notes")]
#[command(about = "Personal notes with keyword and semantic search", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct NoteArgs {
    /// Note title
    #[arg(short, long)]
    title: String,
    /// Note body
    #[arg(short, long, default_value = "")]
    content: String,
    /// Comma-separated tags
    #[arg(long, default_value = "")]
    tags: String,
    /// Category
    #[arg(long, default_value = "")]
    category: String,
}

impl From<NoteArgs> for NoteInput {
    fn from(args: NoteArgs) -> Self {
        NoteInput::new(args.title, args.content)
            .with_tags(args.tags)
            .with_category(args.category)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, env = "NOTES_ADDR", default_value = "0.0.0.0:8000")]
        addr: String,
    },
    #[command(flatten)]
    Note(NoteCommand),
}

#[derive(Subcommand)]
enum NoteCommand {
    /// Create a note
    Add(NoteArgs),
    /// List all notes, newest first
    List,
    /// Show a single note
    Show {
        /// Note ID
        id: i64,
    },
    /// Replace a note's fields
    Update {
        /// Note ID
        id: i64,
        #[command(flatten)]
        note: NoteArgs,
    },
    /// Delete a note
    Delete {
        /// Note ID
        id: i64,
    },
    /// Search notes
    Search {
        /// Query text
        query: String,
        /// Matching strategy
        #[arg(short, long, value_enum, default_value = "semantic")]
        mode: SearchMode,
        /// Number of results to return
        #[arg(short, long, default_value = "5")]
        k: usize,
    },
    /// List all tags
    Tags,
    /// List all categories
    Categories,
    /// Show note and index statistics
    Stats,
}

fn print_note(note: &Note) {
    println!("#{} {}", note.id, note.title);
    if !note.category.is_empty() {
        println!("  category: {}", note.category);
    }
    let tags = note.tag_list();
    if !tags.is_empty() {
        println!("  tags: {}", tags.join(", "));
    }
    if !note.content.is_empty() {
        println!("  {}", note.content);
    }
}

fn run(service: &NoteService, command: NoteCommand) -> Result<()> {
    match command {
        NoteCommand::Add(args) => {
            let id = service.create(&args.into())?;
            println!("Created note with ID: {}", id);
        }
        NoteCommand::List => {
            let notes = service.list()?;
            if notes.is_empty() {
                println!("No notes yet");
            }
            for note in &notes {
                print_note(note);
            }
        }
        NoteCommand::Show { id } => {
            let note = service
                .get(id)?
                .with_context(|| format!("Note not found: {}", id))?;
            print_note(&note);
        }
        NoteCommand::Update { id, note } => {
            let note = service
                .update(id, &note.into())?
                .with_context(|| format!("Note not found: {}", id))?;
            println!("Updated note {}", note.id);
        }
        NoteCommand::Delete { id } => {
            if !service.delete(id)? {
                anyhow::bail!("Note not found: {}", id);
            }
            println!("Deleted note {}", id);
        }
        NoteCommand::Search { query, mode, k } => {
            let results = service.search(&query, mode, k)?;
            if results.is_empty() {
                println!("No matching notes");
            } else {
                println!("Top {} results:", results.len());
                for (i, result) in results.iter().enumerate() {
                    match result.score {
                        Some(score) => println!(
                            "{}. #{} {} (score: {:.4})",
                            i + 1,
                            result.note.id,
                            result.note.title,
                            score
                        ),
                        None => println!("{}. #{} {}", i + 1, result.note.id, result.note.title),
                    }
                }
            }
        }
        NoteCommand::Tags => {
            for tag in service.tags()? {
                println!("{}", tag);
            }
        }
        NoteCommand::Categories => {
            for category in service.categories()? {
                println!("{}", category);
            }
        }
        NoteCommand::Stats => {
            println!("Notes:    {}", service.note_count()?);
            println!("Vectors:  {}", service.index_len()?);
            println!("Embedder: {} ({} dims)", service.embedder_name(), service.dim());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let service = cli
        .config
        .open_service()
        .context("failed to open note service")?;

    match cli.command {
        Commands::Serve { addr } => semantic_notes::server::start(&addr, service).await,
        Commands::Note(command) => run(&service, command),
    }
}
