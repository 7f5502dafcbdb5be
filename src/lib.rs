//! Tankobon Core Library
//!
//! This library provides the chapter bookkeeping core for a multi-source
//! reading library: syncing chapter lists from remote sources, merging
//! several catalog entries into one virtual work, and resolving duplicate
//! entries, all while preserving the user's per-chapter state.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`library`] - Persisted model: works, chapters, merge references
//! - [`source`] - Source adapter seam and registry
//! - [`sync`] - Per-work chapter reconciliation and removal policy
//! - [`merge`] - Merged-work aggregation, dedup, sorting and filtering
//! - [`redirect`] - Canonical-entry resolution for duplicate entries
//! - [`track`] - Two-way progress sync with an external tracker
//! - [`service`] - The caller-facing orchestration layer

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod db;
pub mod library;
pub mod merge;
pub mod recognition;
pub mod redirect;
pub mod scanlator;
pub mod service;
pub mod source;
pub mod sync;
pub mod track;

// Re-export commonly used types
pub use db::Database;
pub use library::{
    ChapterRecord, ChapterSortMode, FilterState, LibraryEntry, LibraryError, LibraryStore,
    MERGED_SOURCE_ID, MergedWorkReference, NewWork, Work, WorkKind,
};
pub use merge::{AggregateOptions, ChapterFetcher, MergeError, MergedChapters, SourceFailure};
pub use redirect::{RedirectCandidate, RedirectDecision, resolve_root};
pub use scanlator::ScanlatorSet;
pub use service::{LibraryService, SyncReport};
pub use source::{RawChapter, SourceAdapter, SourceError, SourceRegistry, WorkMetadata};
pub use sync::{RemovalPolicy, SyncError, SyncOutcome, reconcile};
pub use track::{TrackUpdate, reconcile_tracker};
