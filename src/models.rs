//! Core data models used throughout ragdepot.
//!
//! These types represent the projects, stored assets, and chunks that flow
//! through the ingestion pipeline.

use serde_json::{Map, Value};

/// A project row: one namespace grouping uploaded files and their chunks.
///
/// `project_id` is the caller-facing identifier (non-empty, alphanumeric);
/// `id` is the internal row uuid that assets and chunks reference.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: String,
    pub project_id: String,
    pub created_at: i64,
}

/// A record of one stored upload within a project.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: String,
    /// Owning project's row uuid.
    pub project_id: String,
    /// Stored on-disk name, unique within the project.
    pub file_name: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub created_at: i64,
}

/// One unit of extracted content: raw text plus loader-supplied metadata
/// (source path, page number for PDFs). Exists only in memory during a
/// processing request.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// A bounded slice of a [`SourceRecord`]'s text, before persistence fields
/// (order, project, asset) are assigned one layer up.
#[derive(Debug, Clone)]
pub struct ChunkPiece {
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// A persisted chunk row.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    /// Owning project's row uuid.
    pub project_id: String,
    /// Source asset's row uuid.
    pub asset_id: String,
    /// 1-based position among the chunks produced in one processing call.
    pub chunk_order: i64,
    pub text: String,
    pub metadata: Map<String, Value>,
    /// SHA-256 of `text`, for staleness detection downstream.
    pub hash: String,
}
