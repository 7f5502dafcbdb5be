//! Source adapter seam: how raw chapter data enters the engine.
//!
//! The engine never talks to the network itself; it consumes pre-normalized
//! [`RawChapter`] records through the [`SourceAdapter`] trait and looks
//! adapters up by source id in a [`SourceRegistry`]. Transport and remote
//! schema concerns live entirely behind this boundary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// A chapter as fetched from a source, before reconciliation.
#[derive(Debug, Clone, Default)]
pub struct RawChapter {
    /// Remote key; the chapter's identity within its work.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Source-provided chapter number, when the source has one.
    pub chapter_number: Option<f64>,
    /// Volume label, when present.
    pub volume: Option<String>,
    /// Raw scanlator field; may list several groups joined by a separator.
    pub scanlator: Option<String>,
    /// Source-reported upload time, epoch millis.
    pub date_upload: Option<i64>,
    /// Source-internal upload id, opaque to the engine.
    pub upload_id: Option<String>,
}

/// Work-level metadata as fetched from a source.
#[derive(Debug, Clone, Default)]
pub struct WorkMetadata {
    /// Display title.
    pub title: String,
    /// Author, when the source reports one.
    pub author: Option<String>,
    /// Description, when the source reports one.
    pub description: Option<String>,
}

/// Errors a source adapter may surface.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Network/transport failure; recoverable, retried by the caller.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote payload could not be understood.
    #[error("parse error: {0}")]
    Parse(String),

    /// The remote key does not exist on this source.
    #[error("remote entry not found: {0}")]
    NotFound(String),

    /// No adapter registered for a source id.
    #[error("no source registered for id {0}")]
    UnknownSource(i64),
}

/// One remote catalog, identified by a stable source id.
///
/// # Object Safety
///
/// Uses `async_trait` so adapters can be held as `Arc<dyn SourceAdapter>`
/// in the registry; Rust 2024 native async traits are not object-safe.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The stable id this adapter serves.
    fn source_id(&self) -> i64;

    /// Human-readable source name for logs.
    fn name(&self) -> &str;

    /// Fetches the chapter list for a remote key.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Transport`] / [`SourceError::Parse`] on
    /// failure; the caller treats either as a recoverable per-source error.
    async fn fetch_chapter_list(&self, remote_key: &str) -> Result<Vec<RawChapter>, SourceError>;

    /// Fetches work-level metadata for a remote key.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`SourceAdapter::fetch_chapter_list`].
    async fn fetch_work_metadata(&self, remote_key: &str) -> Result<WorkMetadata, SourceError>;
}

/// Adapter lookup by source id.
///
/// Built once at startup with every available adapter and passed into the
/// service explicitly; there is no ambient/global source lookup.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: HashMap<i64, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own source id.
    ///
    /// Re-registering an id replaces the previous adapter.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        debug!(source_id = adapter.source_id(), name = adapter.name(), "registering source adapter");
        self.adapters.insert(adapter.source_id(), adapter);
    }

    /// Looks up the adapter for a source id.
    #[must_use]
    pub fn get(&self, source_id: i64) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&source_id).cloned()
    }

    /// Looks up the adapter for a source id, failing with
    /// [`SourceError::UnknownSource`] when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnknownSource`] when no adapter is registered.
    pub fn get_or_err(&self, source_id: i64) -> Result<Arc<dyn SourceAdapter>, SourceError> {
        self.get(source_id)
            .ok_or(SourceError::UnknownSource(source_id))
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Returns true when no adapters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
