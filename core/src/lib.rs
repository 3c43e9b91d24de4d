use serde::{Deserialize, Serialize};

pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod index;
pub mod observe;
pub mod persist;
pub mod similarity;
pub mod tokenizer;

pub use config::EngineConfig;
pub use engine::RecommendationEngine;
pub use error::{PersistError, StoreError};
pub use features::{extract, FeatureExtractor, PageFeatures, DIMENSION};
pub use index::DocumentIndex;
pub use observe::{LogObserver, PersistOp, PersistenceObserver};
pub use persist::{FileStore, KeyValueStore, MemoryStore, SledStore};

/// Feature set stored for one page of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFeatureSet {
    /// 1-based, unique within a document.
    pub page_number: u32,
    /// Excerpt kept for display, capped at `EngineConfig::stored_text_chars`.
    pub text: String,
    pub embedding: Vec<f32>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentIndexEntry {
    pub id: String,
    pub name: String,
    /// Ascending by page number, never empty.
    pub pages: Vec<PageFeatureSet>,
}

impl DocumentIndexEntry {
    pub fn page(&self, page_number: u32) -> Option<&PageFeatureSet> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }
}

/// Identity of a document handed in by the host at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub name: String,
}

impl DocumentRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// Rectangle on the rendered page. The engine has no layout knowledge, so it
/// always emits the default; the viewer fills in real coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionPosition {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedSection {
    /// `"{document_id}-{page_number}"`
    pub id: String,
    pub document_id: String,
    pub document_name: String,
    pub page_number: u32,
    pub content: String,
    pub snippet: String,
    pub relevance_score: f32,
    pub position: SectionPosition,
}

impl RelatedSection {
    pub fn with_position(mut self, position: SectionPosition) -> Self {
        self.position = position;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub page_count: usize,
}

impl From<&DocumentIndexEntry> for DocumentSummary {
    fn from(entry: &DocumentIndexEntry) -> Self {
        Self { id: entry.id.clone(), name: entry.name.clone(), page_count: entry.pages.len() }
    }
}
