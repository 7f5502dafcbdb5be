//! Shared utilities for integration tests: in-memory libraries and a
//! scripted source adapter whose chapter lists can be swapped mid-test.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tankobon::{
    Database, LibraryService, LibraryStore, NewWork, RawChapter, SourceAdapter, SourceError,
    SourceRegistry, Work, WorkMetadata,
};

/// A source adapter serving scripted chapter lists keyed by remote url.
///
/// Keys with no scripted list fail with a transport error, which is how
/// tests simulate an unreachable source.
pub struct ScriptedSource {
    id: i64,
    lists: Mutex<HashMap<String, Vec<RawChapter>>>,
}

impl ScriptedSource {
    pub fn new(id: i64) -> Arc<Self> {
        Arc::new(Self {
            id,
            lists: Mutex::new(HashMap::new()),
        })
    }

    /// Scripts the chapter list served for `url`, replacing any previous one.
    pub fn serve(&self, url: &str, chapters: Vec<RawChapter>) {
        self.lists
            .lock()
            .expect("lists lock")
            .insert(url.to_string(), chapters);
    }

    /// Makes every fetch for `url` fail from now on.
    #[allow(dead_code)]
    pub fn go_dark(&self, url: &str) {
        self.lists.lock().expect("lists lock").remove(url);
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn source_id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_chapter_list(&self, key: &str) -> Result<Vec<RawChapter>, SourceError> {
        self.lists
            .lock()
            .expect("lists lock")
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::Transport(format!("unreachable: {key}")))
    }

    async fn fetch_work_metadata(&self, key: &str) -> Result<WorkMetadata, SourceError> {
        Err(SourceError::NotFound(key.to_string()))
    }
}

/// Builds a service over an in-memory database with the given adapters.
/// Honors `RUST_LOG` so failing tests can be rerun with tracing output.
pub async fn service_with(sources: &[Arc<ScriptedSource>]) -> LibraryService {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let db = Database::new_in_memory()
        .await
        .expect("Failed to create database");
    let mut registry = SourceRegistry::new();
    for source in sources {
        registry.register(Arc::clone(source) as Arc<dyn SourceAdapter>);
    }
    LibraryService::new(LibraryStore::new(db), registry)
}

/// Inserts a plain work and returns it.
pub async fn insert_work(service: &LibraryService, source_id: i64, url: &str) -> Work {
    service
        .store()
        .insert_work(&NewWork::new(source_id, url, url))
        .await
        .expect("Failed to insert work")
}

/// A raw chapter with a numbered name.
pub fn raw(url: &str, number: f64) -> RawChapter {
    RawChapter {
        url: url.to_string(),
        name: format!("Chapter {number}"),
        chapter_number: Some(number),
        ..RawChapter::default()
    }
}

/// A raw chapter carrying a scanlator string.
#[allow(dead_code)]
pub fn raw_with_group(url: &str, number: f64, group: &str) -> RawChapter {
    RawChapter {
        scanlator: Some(group.to_string()),
        ..raw(url, number)
    }
}
