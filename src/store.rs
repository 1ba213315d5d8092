//! Project, asset, and chunk persistence.
//!
//! Create/read/delete/bulk-insert operations over the SQLite tables. Chunk
//! inserts run in fixed-size batches to bound single-statement payloads;
//! each batch commits in its own transaction, so atomicity holds at the
//! batch level, not across a whole request.

use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{Asset, Chunk, Project};

/// Default number of chunks per insert batch.
pub const DEFAULT_INSERT_BATCH: usize = 100;

#[derive(Debug)]
pub enum StoreError {
    /// The project identifier failed the non-empty alphanumeric rule.
    InvalidProjectId(String),
    Db(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::InvalidProjectId(id) => {
                write!(f, "invalid project id {:?}: must be non-empty alphanumeric", id)
            }
            StoreError::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Db(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Db(e)
    }
}

fn project_from_row(row: &SqliteRow) -> Project {
    Project {
        id: row.get("id"),
        project_id: row.get("project_id"),
        created_at: row.get("created_at"),
    }
}

fn asset_from_row(row: &SqliteRow) -> Asset {
    Asset {
        id: row.get("id"),
        project_id: row.get("project_id"),
        file_name: row.get("file_name"),
        size_bytes: row.get("size_bytes"),
        content_type: row.get("content_type"),
        created_at: row.get("created_at"),
    }
}

fn chunk_from_row(row: &SqliteRow) -> Chunk {
    let metadata_json: String = row.get("metadata_json");
    let metadata: Map<String, Value> = serde_json::from_str::<Value>(&metadata_json)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    Chunk {
        id: row.get("id"),
        project_id: row.get("project_id"),
        asset_id: row.get("asset_id"),
        chunk_order: row.get("chunk_order"),
        text: row.get("text"),
        metadata,
        hash: row.get("hash"),
    }
}

/// Fetches a project by its caller-facing identifier without creating it.
pub async fn find_project(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<Option<Project>, StoreError> {
    let row = sqlx::query("SELECT id, project_id, created_at FROM projects WHERE project_id = ?")
        .bind(project_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(project_from_row))
}

/// Fetches the project, creating it lazily on first reference. The
/// identifier is validated here, before any row or directory exists for it.
pub async fn get_or_create_project(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<Project, StoreError> {
    if project_id.is_empty() || !project_id.chars().all(|c| c.is_alphanumeric()) {
        return Err(StoreError::InvalidProjectId(project_id.to_string()));
    }

    if let Some(project) = find_project(pool, project_id).await? {
        return Ok(project);
    }

    sqlx::query(
        "INSERT INTO projects (id, project_id, created_at) VALUES (?, ?, ?) \
         ON CONFLICT(project_id) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(project_id)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;

    // Re-select so a concurrent creator's row wins consistently.
    let row = sqlx::query("SELECT id, project_id, created_at FROM projects WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await?;
    Ok(project_from_row(&row))
}

/// Lists projects with 1-based paging, returning the page plus the total
/// page count.
pub async fn list_projects(
    pool: &SqlitePool,
    page: i64,
    page_size: i64,
) -> Result<(Vec<Project>, i64), StoreError> {
    let page = page.max(1);
    let page_size = page_size.max(1);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
        .fetch_one(pool)
        .await?;
    let mut total_pages = total / page_size;
    if total % page_size > 0 {
        total_pages += 1;
    }

    let rows = sqlx::query(
        "SELECT id, project_id, created_at FROM projects \
         ORDER BY created_at ASC, project_id ASC LIMIT ? OFFSET ?",
    )
    .bind(page_size)
    .bind((page - 1) * page_size)
    .fetch_all(pool)
    .await?;

    Ok((rows.iter().map(project_from_row).collect(), total_pages))
}

/// Records a freshly stored upload.
pub async fn insert_asset(pool: &SqlitePool, asset: &Asset) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO assets (id, project_id, file_name, size_bytes, content_type, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&asset.id)
    .bind(&asset.project_id)
    .bind(&asset.file_name)
    .bind(asset.size_bytes)
    .bind(&asset.content_type)
    .bind(asset.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetches the asset row for a stored file name, creating one lazily for
/// files that reached the project directory without going through the
/// upload flow.
pub async fn get_or_create_asset(
    pool: &SqlitePool,
    project_uuid: &str,
    file_name: &str,
    size_bytes: i64,
    content_type: &str,
) -> Result<Asset, StoreError> {
    let existing = sqlx::query(
        "SELECT id, project_id, file_name, size_bytes, content_type, created_at \
         FROM assets WHERE project_id = ? AND file_name = ?",
    )
    .bind(project_uuid)
    .bind(file_name)
    .fetch_optional(pool)
    .await?;
    if let Some(row) = existing {
        return Ok(asset_from_row(&row));
    }

    let asset = Asset {
        id: Uuid::new_v4().to_string(),
        project_id: project_uuid.to_string(),
        file_name: file_name.to_string(),
        size_bytes,
        content_type: content_type.to_string(),
        created_at: chrono::Utc::now().timestamp(),
    };
    sqlx::query(
        "INSERT INTO assets (id, project_id, file_name, size_bytes, content_type, created_at) \
         VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT(project_id, file_name) DO NOTHING",
    )
    .bind(&asset.id)
    .bind(&asset.project_id)
    .bind(&asset.file_name)
    .bind(asset.size_bytes)
    .bind(&asset.content_type)
    .bind(asset.created_at)
    .execute(pool)
    .await?;

    let row = sqlx::query(
        "SELECT id, project_id, file_name, size_bytes, content_type, created_at \
         FROM assets WHERE project_id = ? AND file_name = ?",
    )
    .bind(project_uuid)
    .bind(file_name)
    .fetch_one(pool)
    .await?;
    Ok(asset_from_row(&row))
}

/// Bulk-inserts chunks in fixed-size batches, preserving slice order so the
/// stored `chunk_order` values stay monotonic. Returns the inserted count.
pub async fn insert_chunks(
    pool: &SqlitePool,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<u64, StoreError> {
    let batch_size = batch_size.max(1);
    let mut inserted = 0u64;

    for batch in chunks.chunks(batch_size) {
        let mut tx = pool.begin().await?;
        for chunk in batch {
            sqlx::query(
                "INSERT INTO chunks (id, project_id, asset_id, chunk_order, text, metadata_json, hash) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.project_id)
            .bind(&chunk.asset_id)
            .bind(chunk.chunk_order)
            .bind(&chunk.text)
            .bind(Value::Object(chunk.metadata.clone()).to_string())
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        inserted += batch.len() as u64;
    }

    Ok(inserted)
}

/// Deletes every chunk belonging to the project. Returns the deleted count.
pub async fn delete_chunks_by_project(
    pool: &SqlitePool,
    project_uuid: &str,
) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM chunks WHERE project_id = ?")
        .bind(project_uuid)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn get_chunk(pool: &SqlitePool, chunk_id: &str) -> Result<Option<Chunk>, StoreError> {
    let row = sqlx::query(
        "SELECT id, project_id, asset_id, chunk_order, text, metadata_json, hash \
         FROM chunks WHERE id = ?",
    )
    .bind(chunk_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(chunk_from_row))
}

pub async fn list_chunks_by_project(
    pool: &SqlitePool,
    project_uuid: &str,
) -> Result<Vec<Chunk>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, project_id, asset_id, chunk_order, text, metadata_json, hash \
         FROM chunks WHERE project_id = ? ORDER BY chunk_order ASC",
    )
    .bind(project_uuid)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(chunk_from_row).collect())
}

pub async fn count_chunks_by_project(
    pool: &SqlitePool,
    project_uuid: &str,
) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE project_id = ?")
        .bind(project_uuid)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
