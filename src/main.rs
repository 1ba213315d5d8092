//! # ragdepot CLI
//!
//! The `ragdepot` binary drives the ingestion backend: database setup, file
//! uploads, chunk processing, and the HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! ragdepot --config ./config/ragdepot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragdepot init` | Create the SQLite database and run schema migrations |
//! | `ragdepot upload <project> <path>` | Validate and store a file in a project |
//! | `ragdepot process <project> <file_id>` | Split a stored file into persisted chunks |
//! | `ragdepot projects` | List known projects |
//! | `ragdepot chunks <project>` | Show a project's stored chunks |
//! | `ragdepot serve` | Start the HTTP API server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ragdepot::signal::Signal;
use ragdepot::{config, db, extract, migrate, pipeline, server, store};

/// ragdepot — a minimal RAG ingestion backend.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragdepot.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragdepot",
    about = "ragdepot — a minimal RAG ingestion backend",
    version,
    long_about = "ragdepot accepts file uploads scoped to a project, splits their text \
    content into overlapping chunks, and persists the chunks in SQLite for a downstream \
    embedding stage to consume."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragdepot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (projects,
    /// assets, chunks). Idempotent; running it repeatedly is safe.
    Init,

    /// Upload a file into a project.
    ///
    /// Validates the file's content type and size, stores it in the
    /// project's directory under a collision-free name, and prints the
    /// file_id to use with `process`.
    Upload {
        /// Project identifier (non-empty, alphanumeric).
        project_id: String,

        /// Path to the file to upload.
        path: PathBuf,

        /// Override the declared content type (inferred from the file
        /// extension by default).
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Split a stored file into persisted chunks.
    ///
    /// Extracts the file's text, splits it into overlapping windows, and
    /// bulk-inserts the chunks for the project.
    Process {
        /// Project identifier.
        project_id: String,

        /// Stored file name returned by `upload`.
        file_id: String,

        /// Window size in characters (config default: 1000).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Trailing-context overlap in characters (config default: 200).
        #[arg(long)]
        overlap_size: Option<usize>,

        /// Delete the project's existing chunks before inserting the new ones.
        #[arg(long)]
        reset: bool,
    },

    /// List known projects.
    Projects {
        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },

    /// Show a project's stored chunks.
    Chunks {
        /// Project identifier.
        project_id: String,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// upload and process endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Upload {
            project_id,
            path,
            content_type,
        } => {
            let pool = db::connect(&cfg).await?;

            let original_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| anyhow::anyhow!("not a file path: {}", path.display()))?;
            let declared_size = std::fs::metadata(&path)?.len();
            let content_type = content_type.unwrap_or_else(|| {
                extract::content_type_for(&extract::extension_of(&original_name)).to_string()
            });

            let file = tokio::fs::File::open(&path).await?;
            match pipeline::run_upload(
                &cfg,
                &pool,
                &project_id,
                &original_name,
                &content_type,
                Some(declared_size),
                file,
            )
            .await
            {
                Ok(outcome) => {
                    println!("upload {}", project_id);
                    println!("  signal: {}", Signal::UploadSuccess);
                    println!("  file_id: {}", outcome.file_id);
                    println!("  bytes: {}", outcome.size_bytes);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    println!("  signal: {}", e.signal());
                    std::process::exit(1);
                }
            }
            pool.close().await;
        }
        Commands::Process {
            project_id,
            file_id,
            chunk_size,
            overlap_size,
            reset,
        } => {
            let pool = db::connect(&cfg).await?;
            match pipeline::run_process(
                &cfg,
                &pool,
                &project_id,
                &file_id,
                chunk_size,
                overlap_size,
                reset,
            )
            .await
            {
                Ok(outcome) => {
                    println!("process {}", project_id);
                    println!("  signal: {}", Signal::ProcessingSuccess);
                    println!("  inserted_chunks: {}", outcome.inserted_chunks);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    println!("  signal: {}", e.signal());
                    std::process::exit(1);
                }
            }
            pool.close().await;
        }
        Commands::Projects { page, page_size } => {
            let pool = db::connect(&cfg).await?;
            let (projects, total_pages) = store::list_projects(&pool, page, page_size).await?;

            println!("{:<24} CREATED_AT", "PROJECT");
            for project in &projects {
                println!("{:<24} {}", project.project_id, project.created_at);
            }
            println!("total pages: {}", total_pages);
            pool.close().await;
        }
        Commands::Chunks { project_id } => {
            let pool = db::connect(&cfg).await?;
            match store::find_project(&pool, &project_id).await? {
                Some(project) => {
                    let chunks = store::list_chunks_by_project(&pool, &project.id).await?;
                    println!("chunks {}", project_id);
                    println!("  total: {}", chunks.len());
                    for chunk in &chunks {
                        println!("  [{}] {} chars", chunk.chunk_order, chunk.text.chars().count());
                    }
                }
                None => {
                    println!("chunks {}", project_id);
                    println!("  total: 0");
                }
            }
            pool.close().await;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
