//! # ragdepot
//!
//! A minimal RAG ingestion backend. Files are uploaded into a project
//! namespace, validated, stored under collision-free names, then split into
//! overlapping text chunks and persisted in SQLite for a downstream
//! embedding stage to consume.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────────┐   ┌──────────┐
//! │ Upload       │──▶│  Pipeline                  │──▶│  SQLite   │
//! │ CLI / HTTP   │   │ validate→store→chunk       │   │ chunks    │
//! └──────────────┘   └───────────────────────────┘   └────┬─────┘
//!                                                         │
//!                                     ┌───────────────────┤
//!                                     ▼                   ▼
//!                               ┌──────────┐       ┌──────────┐
//!                               │   CLI    │       │   HTTP   │
//!                               │(ragdepot)│       │  (axum)  │
//!                               └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragdepot init                              # create database
//! ragdepot upload proj1 ./notes.txt          # store a file
//! ragdepot process proj1 <file_id> --reset   # chunk and persist
//! ragdepot serve                             # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`signal`] | Fixed wire-signal vocabulary |
//! | [`paths`] | Per-project storage directories |
//! | [`naming`] | Filename sanitization and unique storage names |
//! | [`validate`] | Upload content-type and size checks |
//! | [`extract`] | Per-file-type text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`store`] | Project/asset/chunk persistence |
//! | [`pipeline`] | Upload and processing orchestration |
//! | [`server`] | HTTP API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod naming;
pub mod paths;
pub mod pipeline;
pub mod server;
pub mod signal;
pub mod store;
pub mod validate;
