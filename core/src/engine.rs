//! Recommendation engine: the entry point hosts call to ingest page text and
//! to ask for pages related to a page or a text selection.
//!
//! The engine owns its corpus. It starts out unopened; `open` (or the first
//! operation) loads the persisted corpus once, and `close` returns it to the
//! unopened state. Persistence problems never reach the caller: they go to
//! the configured [`PersistenceObserver`] and the in-memory corpus stays
//! authoritative.

use crate::config::EngineConfig;
use crate::error::PersistError;
use crate::features::FeatureExtractor;
use crate::index::DocumentIndex;
use crate::observe::{LogObserver, PersistOp, PersistenceObserver};
use crate::persist::{CorpusStore, KeyValueStore};
use crate::similarity::score;
use crate::{DocumentIndexEntry, DocumentRef, DocumentSummary, PageFeatureSet, RelatedSection, SectionPosition};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;

enum Lifecycle {
    Uninitialized,
    Ready(DocumentIndex),
}

pub struct RecommendationEngine<S> {
    corpus_store: CorpusStore<S>,
    config: EngineConfig,
    extractor: FeatureExtractor,
    observer: Arc<dyn PersistenceObserver>,
    state: RwLock<Lifecycle>,
}

impl<S: KeyValueStore> RecommendationEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            corpus_store: CorpusStore::new(store, config.storage_key.clone(), config.max_payload_bytes),
            extractor: FeatureExtractor::new(config.token_cap),
            config,
            observer: Arc::new(LogObserver),
            state: RwLock::new(Lifecycle::Uninitialized),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PersistenceObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn store(&self) -> &S { self.corpus_store.store() }

    pub fn is_open(&self) -> bool { matches!(*self.state.read(), Lifecycle::Ready(_)) }

    /// Load the persisted corpus. A no-op once open; a failed load leaves the
    /// engine open with an empty corpus.
    pub fn open(&self) {
        if self.is_open() {
            return;
        }
        let mut failures = Vec::new();
        {
            let mut state = self.state.write();
            if matches!(*state, Lifecycle::Uninitialized) {
                *state = Lifecycle::Ready(self.load(&mut failures));
            }
        }
        self.report(failures);
    }

    /// Flush the store and drop the in-memory corpus. The next operation reopens.
    pub fn close(&self) {
        let mut failures = Vec::new();
        {
            let mut state = self.state.write();
            if matches!(*state, Lifecycle::Ready(_)) {
                if let Err(e) = self.corpus_store.flush() {
                    failures.push((PersistOp::Flush, e));
                }
                *state = Lifecycle::Uninitialized;
            }
        }
        self.report(failures);
    }

    /// Index `segments` as pages `1..=n` of `doc`, replacing any earlier entry
    /// with the same id. Blank segments are skipped. Returns the number of
    /// pages stored; when it is zero nothing changes.
    pub fn add_document<T: AsRef<str>>(&self, doc: &DocumentRef, segments: &[T]) -> usize {
        let pages: Vec<PageFeatureSet> = segments
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.as_ref().trim().is_empty())
            .map(|(i, text)| self.page_features(i as u32 + 1, text.as_ref()))
            .collect();
        if pages.is_empty() {
            tracing::debug!(document_id = %doc.id, "no text to index; document skipped");
            return 0;
        }
        let page_count = pages.len();
        let entry = DocumentIndexEntry { id: doc.id.clone(), name: doc.name.clone(), pages };
        self.mutate(|index| {
            let replaced = index.insert(entry).is_some();
            tracing::debug!(document_id = %doc.id, page_count, replaced, "document indexed");
        });
        page_count
    }

    /// Drop one document. Returns whether it was present.
    pub fn remove_document(&self, document_id: &str) -> bool {
        let mut removed = false;
        self.mutate(|index| removed = index.remove(document_id).is_some());
        removed
    }

    /// Empty the corpus and erase what was persisted.
    pub fn clear(&self) {
        let mut failures = Vec::new();
        {
            let mut state = self.state.write();
            *state = Lifecycle::Ready(DocumentIndex::new());
            if let Err(e) = self.corpus_store.erase() {
                failures.push((PersistOp::Erase, e));
            }
        }
        self.report(failures);
    }

    pub fn count(&self) -> usize { self.read().len() }

    pub fn list_documents(&self) -> Vec<DocumentSummary> {
        self.read().iter().map(DocumentSummary::from).collect()
    }

    pub fn document(&self, document_id: &str) -> Option<DocumentIndexEntry> {
        self.read().get(document_id).cloned()
    }

    /// Pages across the corpus related to `query_text`, or to the stored text
    /// of the given page when no query is supplied. The given page itself is
    /// never returned. At most `max_results`, best first, each scoring above
    /// `relevance_threshold`.
    pub fn find_related_sections(
        &self,
        document_id: &str,
        page_number: u32,
        query_text: Option<&str>,
    ) -> Vec<RelatedSection> {
        let index = self.read();
        let query = match query_text {
            Some(text) => text,
            None => index.page(document_id, page_number).map(|p| p.text.as_str()).unwrap_or(""),
        };
        let q = self.extractor.extract(query);

        let mut hits: Vec<(f32, &DocumentIndexEntry, &PageFeatureSet)> = Vec::new();
        for entry in index.iter() {
            for page in &entry.pages {
                if entry.id == document_id && page.page_number == page_number {
                    continue;
                }
                let s = score(&q.embedding, &page.embedding, &q.keywords, &page.keywords);
                if s > self.config.relevance_threshold {
                    hits.push((s, entry, page));
                }
            }
        }
        // stable: equal scores stay in corpus order
        hits.sort_by(|a, b| by_score_desc(a.0, b.0));
        hits.truncate(self.config.max_results);
        tracing::debug!(document_id, page_number, hits = hits.len(), "related sections scored");

        hits.into_iter()
            .map(|(s, entry, page)| RelatedSection {
                id: format!("{}-{}", entry.id, page.page_number),
                document_id: entry.id.clone(),
                document_name: entry.name.clone(),
                page_number: page.page_number,
                content: page.text.clone(),
                snippet: snippet(&page.text, self.config.snippet_chars),
                relevance_score: s,
                position: SectionPosition::default(),
            })
            .collect()
    }

    fn page_features(&self, page_number: u32, text: &str) -> PageFeatureSet {
        let features = self.extractor.extract(text);
        PageFeatureSet {
            page_number,
            text: truncate_chars(text, self.config.stored_text_chars).to_string(),
            embedding: features.embedding,
            keywords: features.keywords,
        }
    }

    fn load(&self, failures: &mut Vec<(PersistOp, PersistError)>) -> DocumentIndex {
        match self.corpus_store.load() {
            Ok(Some(index)) => {
                tracing::info!(documents = index.len(), "corpus loaded");
                index
            }
            Ok(None) => DocumentIndex::new(),
            Err(e) => {
                failures.push((PersistOp::Load, e));
                DocumentIndex::new()
            }
        }
    }

    /// Hand failures to the observer. Callers release the corpus lock first,
    /// so the observer may call back into the engine.
    fn report(&self, failures: Vec<(PersistOp, PersistError)>) {
        for (op, e) in failures {
            self.observer.persistence_failed(op, &e);
        }
    }

    /// Apply `f` under the write lock, then persist the whole corpus. A failed
    /// save does not undo `f`.
    fn mutate(&self, f: impl FnOnce(&mut DocumentIndex)) {
        self.open();
        let mut failures = Vec::new();
        {
            let mut state = self.state.write();
            if matches!(*state, Lifecycle::Uninitialized) {
                // closed between open() and taking the lock
                *state = Lifecycle::Ready(self.load(&mut failures));
            }
            if let Lifecycle::Ready(index) = &mut *state {
                f(&mut *index);
                if let Err(e) = self.corpus_store.save(index) {
                    failures.push((PersistOp::Save, e));
                }
            }
        }
        self.report(failures);
    }

    fn read(&self) -> CorpusGuard<'_> {
        self.open();
        loop {
            let guard = self.state.read();
            if matches!(*guard, Lifecycle::Ready(_)) {
                return CorpusGuard(guard);
            }
            drop(guard);
            self.open();
        }
    }
}

struct CorpusGuard<'a>(RwLockReadGuard<'a, Lifecycle>);

impl std::ops::Deref for CorpusGuard<'_> {
    type Target = DocumentIndex;

    fn deref(&self) -> &DocumentIndex {
        match &*self.0 {
            Lifecycle::Ready(index) => index,
            Lifecycle::Uninitialized => unreachable!("CorpusGuard is only built over a ready corpus"),
        }
    }
}

fn by_score_desc(a: f32, b: f32) -> std::cmp::Ordering {
    b.total_cmp(&a)
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    let cut = truncate_chars(text, max_chars);
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}
