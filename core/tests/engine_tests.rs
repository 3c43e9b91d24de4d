use pagerel::{
    DocumentRef, EngineConfig, FileStore, KeyValueStore, MemoryStore, PersistError, PersistOp, PersistenceObserver,
    RecommendationEngine, RelatedSection, SledStore,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{mpsc, Arc, Weak};
use std::time::Duration;
use tempfile::tempdir;

const A_PAGES: [&str; 2] = ["machine learning models require training data", "the chef prepared a delicious meal"];
const B_PAGES: [&str; 1] = ["training data is essential for machine learning"];

#[derive(Default)]
struct RecordingObserver {
    failures: Mutex<Vec<(PersistOp, String)>>,
}

impl PersistenceObserver for RecordingObserver {
    fn persistence_failed(&self, op: PersistOp, error: &PersistError) {
        self.failures.lock().push((op, error.to_string()));
    }
}

fn assert_same_results(a: &[RelatedSection], b: &[RelatedSection]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.content, y.content);
        assert!((x.relevance_score - y.relevance_score).abs() < 1e-5);
    }
}

fn engine_with(store: MemoryStore) -> RecommendationEngine<MemoryStore> {
    RecommendationEngine::new(store, EngineConfig::default())
}

fn seeded(store: MemoryStore) -> RecommendationEngine<MemoryStore> {
    let engine = engine_with(store);
    engine.add_document(&DocumentRef::new("A", "a.pdf"), &A_PAGES);
    engine.add_document(&DocumentRef::new("B", "b.pdf"), &B_PAGES);
    engine
}

#[test]
fn related_page_in_other_document_is_found() {
    let engine = seeded(MemoryStore::new());
    let results = engine.find_related_sections("A", 1, None);

    assert_eq!(results.len(), 1);
    let top = &results[0];
    assert_eq!(top.id, "B-1");
    assert_eq!(top.document_id, "B");
    assert_eq!(top.document_name, "b.pdf");
    assert_eq!(top.page_number, 1);
    assert_eq!(top.content, B_PAGES[0]);
    assert_eq!(top.snippet, B_PAGES[0]);
    assert!((top.relevance_score - 2.0 / 3.0).abs() < 1e-4);
    assert!(results.iter().all(|r| r.document_id != "A"));

    let a = engine.document("A").unwrap();
    let b = engine.document("B").unwrap();
    let a_kw: HashSet<&str> = a.pages[0].keywords.iter().map(String::as_str).collect();
    let b_kw: HashSet<&str> = b.pages[0].keywords.iter().map(String::as_str).collect();
    let shared: HashSet<&str> = a_kw.intersection(&b_kw).copied().collect();
    assert_eq!(shared, HashSet::from(["machine", "learning", "training", "data"]));
}

#[test]
fn explicit_query_text_overrides_stored_page() {
    let engine = seeded(MemoryStore::new());
    let results = engine.find_related_sections("elsewhere", 1, Some("machine learning needs training data"));
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert!(ids.contains(&"A-1"));
    assert!(ids.contains(&"B-1"));
    assert!(!ids.contains(&"A-2"));

    let food = engine.find_related_sections("elsewhere", 1, Some("a delicious meal from the chef"));
    assert_eq!(food.first().map(|r| r.id.as_str()), Some("A-2"));
}

#[test]
fn missing_page_or_blank_query_yields_nothing() {
    let engine = seeded(MemoryStore::new());
    assert!(engine.find_related_sections("A", 9, None).is_empty());
    assert!(engine.find_related_sections("nope", 1, None).is_empty());
    assert!(engine.find_related_sections("A", 1, Some("   ")).is_empty());
}

#[test]
fn results_are_capped_sorted_and_never_self() {
    let engine = engine_with(MemoryStore::new());
    let text = "gradient descent optimizes neural network weights";
    for i in 0..8 {
        let doc = DocumentRef::new(format!("d{i}"), format!("doc {i}"));
        engine.add_document(&doc, &[text, "unrelated pottery glazing kiln temperatures"]);
    }
    let results = engine.find_related_sections("d0", 1, None);

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.relevance_score > 0.3));
    assert!(results.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
    assert!(results.iter().all(|r| !(r.document_id == "d0" && r.page_number == 1)));
    // equal scores keep corpus order
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["d1-1", "d2-1", "d3-1", "d4-1", "d5-1"]);
}

#[test]
fn long_pages_are_truncated_and_snippeted() {
    let engine = engine_with(MemoryStore::new());
    let long = "orbital mechanics transfer window ".repeat(60);
    engine.add_document(&DocumentRef::new("space", "space.txt"), &[long.as_str()]);
    engine.add_document(&DocumentRef::new("probe", "probe.txt"), &[long.as_str()]);

    let stored = engine.document("space").unwrap();
    assert_eq!(stored.pages[0].text.chars().count(), 1000);

    let results = engine.find_related_sections("probe", 1, None);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content.chars().count(), 1000);
    assert_eq!(results[0].snippet.chars().count(), 153);
    assert!(results[0].snippet.ends_with("..."));
}

#[test]
fn blank_segments_are_skipped_and_numbering_is_positional() {
    let engine = engine_with(MemoryStore::new());
    let pages = engine.add_document(&DocumentRef::new("gap", "gap.pdf"), &["first page text", "", "  ", "fourth page text"]);
    assert_eq!(pages, 2);
    let entry = engine.document("gap").unwrap();
    let numbers: Vec<u32> = entry.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 4]);

    assert_eq!(engine.add_document(&DocumentRef::new("blank", "blank.pdf"), &["", " "]), 0);
    assert!(engine.document("blank").is_none());
    assert_eq!(engine.count(), 1);
}

#[test]
fn reingestion_replaces_the_entry() {
    let engine = seeded(MemoryStore::new());
    assert_eq!(engine.count(), 2);

    engine.add_document(&DocumentRef::new("B", "b-v2.pdf"), &["watercolor painting techniques for landscapes"]);
    assert_eq!(engine.count(), 2);
    assert!(engine.find_related_sections("A", 1, None).is_empty());

    let hits = engine.find_related_sections("A", 1, Some("landscape watercolor painting"));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_name, "b-v2.pdf");

    let listed: Vec<String> = engine.list_documents().into_iter().map(|d| d.id).collect();
    assert_eq!(listed, vec!["A", "B"]);
}

#[test]
fn remove_document_drops_pages_and_persists() {
    let store = MemoryStore::new();
    let engine = seeded(store.clone());
    assert!(engine.remove_document("B"));
    assert!(!engine.remove_document("B"));
    assert_eq!(engine.count(), 1);
    assert!(engine.find_related_sections("A", 1, None).is_empty());

    let restarted = engine_with(store);
    assert_eq!(restarted.count(), 1);
    assert!(restarted.document("B").is_none());
}

#[test]
fn corpus_survives_restart() {
    let store = MemoryStore::new();
    let before = seeded(store.clone()).find_related_sections("A", 1, None);

    let restarted = engine_with(store);
    assert!(!restarted.is_open());
    let after = restarted.find_related_sections("A", 1, None);
    assert!(restarted.is_open());
    assert!(!before.is_empty());
    assert_same_results(&before, &after);
    assert_eq!(restarted.count(), 2);
}

#[test]
fn corpus_survives_restart_on_disk() {
    let dir = tempdir().unwrap();
    let before = {
        let engine = RecommendationEngine::new(FileStore::new(dir.path()), EngineConfig::default());
        engine.add_document(&DocumentRef::new("A", "a.pdf"), &A_PAGES);
        engine.add_document(&DocumentRef::new("B", "b.pdf"), &B_PAGES);
        engine.find_related_sections("A", 1, None)
    };

    let engine = RecommendationEngine::new(FileStore::new(dir.path()), EngineConfig::default());
    assert_same_results(&engine.find_related_sections("A", 1, None), &before);
}

#[test]
fn sled_backed_engine_reloads_after_close() {
    let dir = tempdir().unwrap();
    let store = SledStore::open(dir.path().join("corpus.sled")).unwrap();
    let first = RecommendationEngine::new(store.clone(), EngineConfig::default());
    first.add_document(&DocumentRef::new("A", "a.pdf"), &A_PAGES);
    first.add_document(&DocumentRef::new("B", "b.pdf"), &B_PAGES);
    let before = first.find_related_sections("A", 1, None);
    first.close();

    let second = RecommendationEngine::new(store, EngineConfig::default());
    assert_eq!(second.count(), 2);
    assert_same_results(&second.find_related_sections("A", 1, None), &before);
}

#[test]
fn clear_empties_memory_and_store() {
    let store = MemoryStore::new();
    let engine = seeded(store.clone());
    engine.clear();

    assert_eq!(engine.count(), 0);
    assert!(engine.find_related_sections("A", 1, None).is_empty());
    assert!(engine.find_related_sections("B", 1, None).is_empty());
    assert_eq!(store.get(&EngineConfig::default().storage_key).unwrap(), None);
    assert_eq!(engine_with(store).count(), 0);
}

#[test]
fn open_is_idempotent_and_close_forces_reload() {
    let store = MemoryStore::new();
    seeded(store.clone());

    let engine = engine_with(store.clone());
    engine.open();
    assert_eq!(engine.count(), 2);

    // written behind the open engine's back
    seeded(store.clone()).add_document(&DocumentRef::new("C", "c.pdf"), &["third document"]);
    engine.open();
    assert_eq!(engine.count(), 2);

    engine.close();
    assert!(!engine.is_open());
    assert_eq!(engine.count(), 3);
}

#[test]
fn non_latin_pages_relate_to_each_other() {
    let engine = engine_with(MemoryStore::new());
    let page = "машинное обучение требует данных";
    engine.add_document(&DocumentRef::new("ru1", "первый.pdf"), &[page]);
    engine.add_document(&DocumentRef::new("ru2", "второй.pdf"), &[page, "повар приготовил вкусный ужин"]);

    let related = engine.find_related_sections("ru1", 1, None);
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].id, "ru2-1");
    assert!((related[0].relevance_score - 1.0).abs() < 1e-5);
}

#[test]
fn failed_save_keeps_the_in_memory_mutation() {
    let observer = Arc::new(RecordingObserver::default());
    let config = EngineConfig { max_payload_bytes: Some(16), ..EngineConfig::default() };
    let store = MemoryStore::new();
    let engine = RecommendationEngine::new(store.clone(), config).with_observer(observer.clone());

    engine.add_document(&DocumentRef::new("A", "a.pdf"), &A_PAGES);
    engine.add_document(&DocumentRef::new("B", "b.pdf"), &B_PAGES);

    assert_eq!(engine.count(), 2);
    assert_eq!(engine.find_related_sections("A", 1, None).len(), 1);
    assert_eq!(store.get(&engine.config().storage_key).unwrap(), None);

    let failures = observer.failures.lock();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|(op, msg)| *op == PersistOp::Save && msg.contains("exceeds")));
}

/// Observer that reads back from the engine that reported the failure.
#[derive(Default)]
struct ReentrantObserver {
    engine: Mutex<Weak<RecommendationEngine<MemoryStore>>>,
    seen: Mutex<Vec<(PersistOp, usize)>>,
}

impl PersistenceObserver for ReentrantObserver {
    fn persistence_failed(&self, op: PersistOp, _error: &PersistError) {
        let engine = self.engine.lock().upgrade();
        if let Some(engine) = engine {
            let count = engine.count();
            self.seen.lock().push((op, count));
        }
    }
}

#[test]
fn observer_can_call_back_into_the_engine() {
    let observer = Arc::new(ReentrantObserver::default());
    let config = EngineConfig { max_payload_bytes: Some(16), ..EngineConfig::default() };
    let store = MemoryStore::new();
    store.set(&config.storage_key, "{ this is not a corpus").unwrap();
    let engine = Arc::new(RecommendationEngine::new(store, config).with_observer(observer.clone()));
    *observer.engine.lock() = Arc::downgrade(&engine);

    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(&engine);
    std::thread::spawn(move || {
        worker.add_document(&DocumentRef::new("A", "a.pdf"), &A_PAGES);
        worker.close();
        worker.clear();
        tx.send(worker.count()).unwrap();
    });
    let count = rx.recv_timeout(Duration::from_secs(10)).expect("engine call blocked inside the observer");
    assert_eq!(count, 0);

    let seen = observer.seen.lock().clone();
    assert_eq!(seen, vec![(PersistOp::Load, 0), (PersistOp::Save, 1)]);
}

#[test]
fn corrupt_payload_degrades_to_empty_corpus() {
    let observer = Arc::new(RecordingObserver::default());
    let store = MemoryStore::new();
    store.set(&EngineConfig::default().storage_key, "{ this is not a corpus").unwrap();

    let engine = engine_with(store.clone()).with_observer(observer.clone());
    assert_eq!(engine.count(), 0);
    assert!(engine.is_open());
    assert_eq!(observer.failures.lock()[0].0, PersistOp::Load);

    engine.add_document(&DocumentRef::new("B", "b.pdf"), &B_PAGES);
    assert_eq!(engine_with(store).count(), 1);
}

#[test]
fn engine_is_shareable_across_threads() {
    let engine = Arc::new(seeded(MemoryStore::new()));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let doc = DocumentRef::new(format!("t{i}"), format!("thread {i}"));
                engine.add_document(&doc, &["machine learning training data pipelines"]);
                engine.find_related_sections("A", 1, None).len()
            })
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap() >= 1);
    }
    assert_eq!(engine.count(), 6);
}
