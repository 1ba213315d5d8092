//! Ingestion pipeline orchestration.
//!
//! Two flows, each an independent unit of work:
//!
//! - **Upload**: validate the incoming file, then stream its bytes into the
//!   project's directory under a collision-free name and record the asset.
//! - **Process**: extract a previously stored file, split it into
//!   overlapping chunks, and persist them (optionally resetting the
//!   project's existing chunks first).
//!
//! Every failure maps onto one wire [`Signal`]; the boundary layer (HTTP
//! handlers, CLI) only translates, never decides.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::info;
use uuid::Uuid;

use crate::chunk::{self, ChunkError, ChunkParams};
use crate::config::Config;
use crate::extract::{self, ExtractError};
use crate::models::{Asset, Chunk, ChunkPiece};
use crate::naming;
use crate::paths::PathResolver;
use crate::signal::Signal;
use crate::store::{self, StoreError, DEFAULT_INSERT_BATCH};
use crate::validate::{self, ValidationError};

/// Why an upload request failed.
#[derive(Debug)]
pub enum UploadError {
    Validation(ValidationError),
    Storage(std::io::Error),
    Store(StoreError),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::Validation(e) => write!(f, "{}", e),
            UploadError::Storage(e) => write!(f, "storage error: {}", e),
            UploadError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UploadError::Validation(e) => Some(e),
            UploadError::Storage(e) => Some(e),
            UploadError::Store(e) => Some(e),
        }
    }
}

impl UploadError {
    pub fn signal(&self) -> Signal {
        match self {
            UploadError::Validation(e) => e.signal(),
            UploadError::Storage(_) | UploadError::Store(_) => Signal::UploadFailed,
        }
    }
}

/// Why a processing request failed.
#[derive(Debug)]
pub enum ProcessError {
    Extract(ExtractError),
    Chunk(ChunkError),
    /// The file held no extractable content (empty or whitespace only).
    NoChunksProduced,
    Store(StoreError),
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::Extract(e) => write!(f, "{}", e),
            ProcessError::Chunk(e) => write!(f, "{}", e),
            ProcessError::NoChunksProduced => write!(f, "no chunks produced from file content"),
            ProcessError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessError::Extract(e) => Some(e),
            ProcessError::Chunk(e) => Some(e),
            ProcessError::Store(e) => Some(e),
            ProcessError::NoChunksProduced => None,
        }
    }
}

impl ProcessError {
    pub fn signal(&self) -> Signal {
        match self {
            ProcessError::Extract(ExtractError::FileNotFound(_)) => Signal::FileNotFound,
            _ => Signal::ProcessingFail,
        }
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The stored file's unique name; the handle later processing refers to.
    pub file_id: String,
    pub size_bytes: u64,
}

/// Result of a completed processing request.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub inserted_chunks: u64,
}

/// An upload in flight: validation has passed and the destination file is
/// open; bytes are pushed in as they arrive and flushed to disk in
/// `block_size` blocks.
///
/// The configured size ceiling is enforced both upfront (when the caller
/// declares a size) and as bytes arrive (when it cannot, e.g. multipart
/// fields). On any failure the partially written file stays on disk; no
/// cleanup is attempted here.
pub struct Upload {
    file: tokio::fs::File,
    buf: Vec<u8>,
    block_size: usize,
    max_bytes: u64,
    written: u64,
    dest_path: PathBuf,
    stored_name: String,
    content_type: String,
    project_uuid: String,
    project_id: String,
}

impl Upload {
    /// Runs the validating and storing setup: get-or-create the project,
    /// check the declared content type (and size, when known), resolve the
    /// project directory, pick a collision-free name, and open the
    /// destination file.
    pub async fn start(
        config: &Config,
        pool: &SqlitePool,
        project_id: &str,
        original_name: &str,
        content_type: &str,
        declared_size: Option<u64>,
    ) -> Result<Upload, UploadError> {
        let project = store::get_or_create_project(pool, project_id)
            .await
            .map_err(UploadError::Store)?;

        validate::validate(content_type, declared_size.unwrap_or(0), &config.upload)
            .map_err(UploadError::Validation)?;

        if naming::sanitize(original_name).is_empty() {
            return Err(UploadError::Storage(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("file name {:?} sanitizes to nothing", original_name),
            )));
        }

        let project_dir = PathResolver::new(&config.storage.root)
            .resolve(project_id)
            .map_err(UploadError::Storage)?;
        let (dest_path, stored_name) = naming::generate_unique_name(original_name, &project_dir);

        let file = tokio::fs::File::create(&dest_path)
            .await
            .map_err(UploadError::Storage)?;

        Ok(Upload {
            file,
            buf: Vec::new(),
            block_size: config.upload.block_size.max(1),
            max_bytes: validate::max_bytes(&config.upload),
            written: 0,
            dest_path,
            stored_name,
            content_type: content_type.to_string(),
            project_uuid: project.id,
            project_id: project.project_id,
        })
    }

    /// Accepts the next slice of upload bytes, flushing full blocks to disk
    /// and enforcing the size ceiling as data arrives.
    pub async fn push(&mut self, data: &[u8]) -> Result<(), UploadError> {
        self.written += data.len() as u64;
        if self.written > self.max_bytes {
            return Err(UploadError::Validation(ValidationError::SizeExceeded {
                size_bytes: self.written,
                max_bytes: self.max_bytes,
            }));
        }

        self.buf.extend_from_slice(data);
        while self.buf.len() >= self.block_size {
            let rest = self.buf.split_off(self.block_size);
            let block = std::mem::replace(&mut self.buf, rest);
            self.file
                .write_all(&block)
                .await
                .map_err(UploadError::Storage)?;
        }
        Ok(())
    }

    /// Flushes the final partial block and records the asset.
    pub async fn finish(mut self, pool: &SqlitePool) -> Result<UploadOutcome, UploadError> {
        if !self.buf.is_empty() {
            self.file
                .write_all(&self.buf)
                .await
                .map_err(UploadError::Storage)?;
        }
        self.file.flush().await.map_err(UploadError::Storage)?;

        let asset = Asset {
            id: Uuid::new_v4().to_string(),
            project_id: self.project_uuid,
            file_name: self.stored_name.clone(),
            size_bytes: self.written as i64,
            content_type: self.content_type,
            created_at: chrono::Utc::now().timestamp(),
        };
        store::insert_asset(pool, &asset)
            .await
            .map_err(UploadError::Store)?;

        info!(
            project = %self.project_id,
            file = %self.stored_name,
            bytes = self.written,
            path = %self.dest_path.display(),
            "stored upload"
        );
        Ok(UploadOutcome {
            file_id: self.stored_name,
            size_bytes: self.written,
        })
    }
}

/// Convenience upload driver for callers holding an async byte source:
/// reads in block-size steps and feeds an [`Upload`].
pub async fn run_upload<R>(
    config: &Config,
    pool: &SqlitePool,
    project_id: &str,
    original_name: &str,
    content_type: &str,
    declared_size: Option<u64>,
    mut reader: R,
) -> Result<UploadOutcome, UploadError>
where
    R: AsyncRead + Unpin,
{
    let mut upload = Upload::start(
        config,
        pool,
        project_id,
        original_name,
        content_type,
        declared_size,
    )
    .await?;

    let mut buf = vec![0u8; config.upload.block_size.max(1)];
    loop {
        let n = reader.read(&mut buf).await.map_err(UploadError::Storage)?;
        if n == 0 {
            break;
        }
        upload.push(&buf[..n]).await?;
    }
    upload.finish(pool).await
}

/// Processing flow: extract the stored file, split it, persist the chunks.
///
/// Chunk parameters are validated before anything touches the file. When
/// `do_reset` is set, the project's existing chunks are deleted before the
/// insert (delete-then-insert, no cross-statement transaction). Inserts run
/// in fixed-size batches with slice order preserved, keeping the 1-based
/// `chunk_order` monotonic in storage.
pub async fn run_process(
    config: &Config,
    pool: &SqlitePool,
    project_id: &str,
    file_id: &str,
    chunk_size: Option<usize>,
    overlap_size: Option<usize>,
    do_reset: bool,
) -> Result<ProcessOutcome, ProcessError> {
    let project = store::get_or_create_project(pool, project_id)
        .await
        .map_err(ProcessError::Store)?;

    let params = ChunkParams::new(
        chunk_size.unwrap_or(config.chunking.default_chunk_size),
        overlap_size.unwrap_or(config.chunking.default_overlap),
    )
    .map_err(ProcessError::Chunk)?;

    let project_dir = PathResolver::new(&config.storage.root)
        .resolve(project_id)
        .map_err(|e| ProcessError::Extract(ExtractError::Io(e)))?;
    let file_path = project_dir.join(file_id);

    let records = extract::extract(&file_path).map_err(ProcessError::Extract)?;
    let pieces = chunk::split(&records, params);
    if pieces.is_empty() {
        return Err(ProcessError::NoChunksProduced);
    }

    let size_bytes = std::fs::metadata(&file_path)
        .map(|m| m.len() as i64)
        .map_err(|e| ProcessError::Extract(ExtractError::Io(e)))?;
    let content_type = extract::content_type_for(&extract::extension_of(file_id));
    let asset = store::get_or_create_asset(pool, &project.id, file_id, size_bytes, content_type)
        .await
        .map_err(ProcessError::Store)?;

    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| make_chunk(&project.id, &asset.id, (i + 1) as i64, piece))
        .collect();

    if do_reset {
        let deleted = store::delete_chunks_by_project(pool, &project.id)
            .await
            .map_err(ProcessError::Store)?;
        info!(project = %project_id, deleted, "reset existing chunks");
    }

    let inserted = store::insert_chunks(pool, &chunks, DEFAULT_INSERT_BATCH)
        .await
        .map_err(ProcessError::Store)?;

    info!(
        project = %project_id,
        file = %file_id,
        inserted,
        "processed file into chunks"
    );
    Ok(ProcessOutcome {
        inserted_chunks: inserted,
    })
}

fn make_chunk(project_uuid: &str, asset_uuid: &str, order: i64, piece: ChunkPiece) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(piece.text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        project_id: project_uuid.to_string(),
        asset_id: asset_uuid.to_string(),
        chunk_order: order,
        text: piece.text,
        metadata: piece.metadata,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, Config, DbConfig, ServerConfig, StorageConfig, UploadConfig};
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    fn test_config(root: &std::path::Path) -> Config {
        Config {
            db: DbConfig {
                path: root.join("ragdepot.sqlite"),
            },
            storage: StorageConfig {
                root: root.join("files"),
            },
            upload: UploadConfig::default(),
            chunking: ChunkingConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        }
    }

    async fn upload_text(
        config: &Config,
        pool: &SqlitePool,
        project_id: &str,
        name: &str,
        body: &str,
    ) -> UploadOutcome {
        run_upload(
            config,
            pool,
            project_id,
            name,
            "text/plain",
            Some(body.len() as u64),
            body.as_bytes(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn upload_then_process_round_trips() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let pool = test_pool().await;

        let body = "First paragraph with several words.\n\nSecond paragraph with more words.";
        let outcome = upload_text(&config, &pool, "proj1", "notes.txt", body).await;
        assert!(outcome.file_id.ends_with("_notes.txt"));
        assert_eq!(outcome.size_bytes, body.len() as u64);

        let processed = run_process(
            &config,
            &pool,
            "proj1",
            &outcome.file_id,
            Some(40),
            Some(10),
            false,
        )
        .await
        .unwrap();
        assert!(processed.inserted_chunks >= 2);

        let project = store::find_project(&pool, "proj1").await.unwrap().unwrap();
        let stored = store::list_chunks_by_project(&pool, &project.id).await.unwrap();
        assert_eq!(stored.len() as u64, processed.inserted_chunks);
        for (i, chunk) in stored.iter().enumerate() {
            assert_eq!(chunk.chunk_order, (i + 1) as i64);
            assert_eq!(chunk.project_id, project.id);
            assert!(!chunk.text.is_empty());
            assert!(chunk.metadata.contains_key("source"));
        }
    }

    #[tokio::test]
    async fn declared_oversize_fails_before_writing() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let pool = test_pool().await;

        let err = run_upload(
            &config,
            &pool,
            "proj1",
            "big.txt",
            "text/plain",
            Some(crate::validate::max_bytes(&config.upload) + 1),
            "tiny".as_bytes(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.signal(), Signal::SizeExceeded);
    }

    #[tokio::test]
    async fn streamed_oversize_is_caught_at_the_ceiling() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(tmp.path());
        config.upload.max_file_size_mb = 1;
        config.upload.block_size = 4096;
        let pool = test_pool().await;

        let body = vec![b'x'; 1_048_576 + 1];
        let err = run_upload(
            &config,
            &pool,
            "proj1",
            "big.txt",
            "text/plain",
            None,
            body.as_slice(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            UploadError::Validation(ValidationError::SizeExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn disallowed_content_type_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let pool = test_pool().await;

        let err = run_upload(
            &config,
            &pool,
            "proj1",
            "img.png",
            "image/png",
            Some(4),
            "data".as_bytes(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.signal(), Signal::UnsupportedType);
    }

    #[tokio::test]
    async fn whitespace_only_file_produces_no_chunks() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let pool = test_pool().await;

        let outcome = upload_text(&config, &pool, "proj1", "blank.txt", "   \n\n \t ").await;
        let err = run_process(&config, &pool, "proj1", &outcome.file_id, None, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NoChunksProduced));
        assert_eq!(err.signal(), Signal::ProcessingFail);

        // Nothing was inserted for the failed request.
        let project = store::find_project(&pool, "proj1").await.unwrap().unwrap();
        assert_eq!(
            store::count_chunks_by_project(&pool, &project.id).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn missing_file_reports_file_not_found() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let pool = test_pool().await;

        let err = run_process(&config, &pool, "proj1", "ghost.txt", None, None, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Extract(ExtractError::FileNotFound(_))
        ));
        assert_eq!(err.signal(), Signal::FileNotFound);
    }

    #[tokio::test]
    async fn unsupported_extension_fails_processing() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let pool = test_pool().await;

        let outcome = upload_text(&config, &pool, "proj1", "table.csv", "a,b,c").await;
        let err = run_process(&config, &pool, "proj1", &outcome.file_id, None, None, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Extract(ExtractError::UnsupportedFileType(_))
        ));
        assert_eq!(err.signal(), Signal::ProcessingFail);
    }

    #[tokio::test]
    async fn bad_chunk_params_fail_before_extraction() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let pool = test_pool().await;

        // The file does not even exist; the parameter check fires first.
        let err = run_process(&config, &pool, "proj1", "ghost.txt", Some(10), Some(10), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Chunk(_)));
    }

    #[tokio::test]
    async fn reprocess_without_reset_appends() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let pool = test_pool().await;

        let outcome = upload_text(&config, &pool, "proj1", "n.txt", "some text to chunk").await;
        let first = run_process(&config, &pool, "proj1", &outcome.file_id, None, None, false)
            .await
            .unwrap();
        let second = run_process(&config, &pool, "proj1", &outcome.file_id, None, None, false)
            .await
            .unwrap();

        let project = store::find_project(&pool, "proj1").await.unwrap().unwrap();
        assert_eq!(
            store::count_chunks_by_project(&pool, &project.id).await.unwrap() as u64,
            first.inserted_chunks + second.inserted_chunks
        );
    }

    #[tokio::test]
    async fn reset_leaves_exactly_the_new_batch() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let pool = test_pool().await;

        let outcome = upload_text(&config, &pool, "proj1", "n.txt", "some text to chunk").await;
        run_process(&config, &pool, "proj1", &outcome.file_id, Some(8), Some(2), false)
            .await
            .unwrap();
        let replaced = run_process(&config, &pool, "proj1", &outcome.file_id, None, None, true)
            .await
            .unwrap();

        let project = store::find_project(&pool, "proj1").await.unwrap().unwrap();
        let stored = store::list_chunks_by_project(&pool, &project.id).await.unwrap();
        assert_eq!(stored.len() as u64, replaced.inserted_chunks);
        for (i, chunk) in stored.iter().enumerate() {
            assert_eq!(chunk.chunk_order, (i + 1) as i64);
        }
    }

    #[tokio::test]
    async fn blocks_smaller_than_the_file_still_store_everything() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(tmp.path());
        config.upload.block_size = 8;
        let pool = test_pool().await;

        let body = "0123456789abcdefghij0123456789";
        let outcome = upload_text(&config, &pool, "proj1", "blocks.txt", body).await;

        let stored_path = config
            .storage
            .root
            .join("proj1")
            .join(&outcome.file_id);
        assert_eq!(std::fs::read_to_string(stored_path).unwrap(), body);
    }
}
