use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notebox::config::{ClientConfig, ServerConfig};
use notebox::models::{Note, OwnerId};
use notebox::sync::NoteSync;
use notebox::{api, db};

#[derive(Parser)]
#[command(name = "notebox")]
#[command(about = "Personal notes with optimistic client-side sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the note service
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Work with notes on a running service
    Notes {
        #[command(flatten)]
        remote: RemoteArgs,

        #[command(subcommand)]
        command: NoteCommands,
    },
}

#[derive(Args)]
struct RemoteArgs {
    /// Service base URL (overrides NOTEBOX_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Bearer session token (overrides NOTEBOX_SESSION)
    #[arg(long, global = true)]
    session: Option<String>,

    /// Owner to act as (overrides NOTEBOX_OWNER)
    #[arg(long, global = true)]
    owner: Option<String>,
}

#[derive(Subcommand)]
enum NoteCommands {
    /// List notes, newest first
    List {
        /// Show the trash instead
        #[arg(long)]
        trash: bool,
    },
    /// Create a note
    New {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change a note's title or description
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change a note's color (#RGB or #RRGGBB)
    Color { id: String, color: String },
    /// Move a note to the trash
    Trash { id: String },
    /// Permanently delete a trashed note
    Delete { id: String },
    /// Permanently delete everything in the trash
    EmptyTrash,
}

/// Initialize tracing with output to stderr (for client commands) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "notebox=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // Client mode: stdout is reserved for command output
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = matches!(cli.command, Some(Commands::Notes { .. }));
    init_tracing(use_stderr);

    match cli.command {
        Some(Commands::Serve { port }) => serve(port).await,
        Some(Commands::Notes { remote, command }) => run_notes(remote, command).await,
        None => serve(3000).await,
    }
}

async fn serve(port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting notebox server on port {}", port);

    let config = ServerConfig::from_env();
    let db = match &config.db_path {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;

    let app = api::create_router_with_cors(db, config.cors_origins.as_deref());

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("notebox server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_notes(remote: RemoteArgs, command: NoteCommands) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = remote.url {
        config.base_url = url;
    }
    if let Some(session) = remote.session {
        config.session = Some(session);
    }
    if let Some(owner) = remote.owner {
        config.owner = Some(OwnerId::from(owner));
    }

    let sync = NoteSync::from_config(&config);
    if let Err(e) = sync.refresh().await {
        anyhow::bail!("failed to load notes: {}", e);
    }

    match command {
        NoteCommands::List { trash } => {
            let notes = if trash {
                sync.cache().trashed()
            } else {
                sync.cache().active()
            };
            if notes.is_empty() {
                println!("No notes.");
            }
            for note in &notes {
                print_note(note);
            }
        }
        NoteCommands::New { title, description } => {
            let note = sync.create()?;
            apply_text(&sync, &note.id, title, description)?;
            println!("{}", note.id);
        }
        NoteCommands::Edit {
            id,
            title,
            description,
        } => {
            apply_text(&sync, &id, title, description)?;
        }
        NoteCommands::Color { id, color } => sync.recolor(&id, color)?,
        NoteCommands::Trash { id } => sync.trash(&id)?,
        NoteCommands::Delete { id } => sync.delete_trashed(&id)?,
        NoteCommands::EmptyTrash => {
            let count = sync.cache().trashed().len();
            sync.empty_trash()?;
            println!("Deleted {} trashed note(s).", count);
        }
    }

    sync.flush().await;
    Ok(())
}

fn apply_text(
    sync: &NoteSync,
    id: &str,
    title: Option<String>,
    description: Option<String>,
) -> anyhow::Result<()> {
    if let Some(title) = title {
        sync.edit_title(id, title)?;
    }
    if let Some(description) = description {
        sync.edit_description(id, description)?;
    }
    Ok(())
}

fn print_note(note: &Note) {
    println!(
        "{}  {}  {}",
        note.id,
        note.color,
        note.title.as_deref().unwrap_or("(untitled)")
    );
}
