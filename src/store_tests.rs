use std::{cell::Cell, rc::Rc};

use super::*;

/// Advances one second every time it is read.
#[derive(Clone, Default)]
struct SteppingClock {
    now: Rc<Cell<u64>>,
}

impl Clock for SteppingClock {
    fn now_millis(&self) -> u64 {
        let now = self.now.get() + 1_000;
        self.now.set(now);
        now
    }
}

fn store_with(backend: &MemoryStore) -> DocumentStore {
    DocumentStore::new(backend.clone(), RenderPipeline::bare()).with_clock(SteppingClock::default())
}

fn stored_files(backend: &MemoryStore) -> BTreeMap<String, FileRecord> {
    let raw = backend.get(FILES_KEY).unwrap().expect("files were persisted");
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn restore_without_data_shows_welcome_text() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    store.restore().unwrap();
    assert_eq!(store.document().markdown_source(), WELCOME_TEXT);
    assert_eq!(store.document().plain_projection(), "Welcome\n\nStart editing...");
    assert!(store.document().rendered_html().contains("<h1>Welcome</h1>"));
    assert_eq!(store.active_id(), None);
    assert!(store.list().is_empty());
}

#[test]
fn restore_reads_autosave_and_files() {
    let backend = MemoryStore::new();
    {
        let mut store = store_with(&backend);
        store.set_source("# Draft").unwrap();
        store.create("draft.md").unwrap();
    }
    let mut store = store_with(&backend);
    store.restore().unwrap();
    assert_eq!(store.document().markdown_source(), "# Draft");
    let records = store.list();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "draft.md");
    assert!(records[0].id.starts_with("f_"));
    assert_eq!(store.active_id(), None);
}

#[test]
fn restore_survives_corrupt_collection() {
    let mut backend = MemoryStore::new();
    backend.set(FILES_KEY, "{not json").unwrap();
    let mut store = store_with(&backend);
    store.restore().unwrap();
    assert!(store.list().is_empty());
}

#[test]
fn edits_keep_derived_views_in_step() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    store.set_source("# Title\n\n**bold** and *italic*").unwrap();

    let document = store.document();
    assert_eq!(document.plain_projection(), "Title\n\nbold and italic");
    assert_eq!(
        document.rendered_html(),
        store.pipeline().render(document.markdown_source())
    );
    assert_eq!(
        backend.get(AUTOSAVE_KEY).unwrap().as_deref(),
        Some("# Title\n\n**bold** and *italic*")
    );
}

#[test]
fn plain_edits_become_markdown_source_verbatim() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    store.set_plain("now *live* syntax").unwrap();
    assert_eq!(store.document().markdown_source(), "now *live* syntax");
    assert_eq!(store.document().plain_projection(), "now live syntax");
    assert!(store.document().rendered_html().contains("<em>live</em>"));
}

#[test]
fn create_then_open_returns_buffer_at_creation() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    store.set_source("original").unwrap();
    let id = store.create("a.md").unwrap();
    assert_eq!(store.active_id(), Some(id.as_str()));

    store.new_document();
    store.set_source("something else").unwrap();
    assert_eq!(store.active_id(), None);

    let document = store.open(&id).unwrap();
    assert_eq!(document.markdown_source(), "original");
    assert_eq!(store.active_id(), Some(id.as_str()));
    assert_eq!(stored_files(&backend)[&id].content, "original");
}

#[test]
fn ids_are_unique() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    let first = store.create("same.md").unwrap();
    let second = store.create("same.md").unwrap();
    assert_ne!(first, second);
    assert_eq!(store.list().len(), 2);
}

#[test]
fn open_unknown_id_is_not_found() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    store.set_source("keep me").unwrap();
    let err = store.open("f_missing").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == "f_missing"));
    assert_eq!(store.document().markdown_source(), "keep me");
}

#[test]
fn delete_then_open_is_not_found() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    let id = store.create("gone.md").unwrap();
    let removed = store.delete(&id, true).unwrap();
    assert_eq!(removed.name, "gone.md");
    assert!(matches!(store.open(&id), Err(StoreError::NotFound(_))));
    assert!(stored_files(&backend).is_empty());
}

#[test]
fn delete_requires_confirmation() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    let id = store.create("kept.md").unwrap();
    assert!(matches!(
        store.delete(&id, false),
        Err(StoreError::ConfirmationRequired)
    ));
    assert!(store.get(&id).is_some());
    assert_eq!(store.active_id(), Some(id.as_str()));
}

#[test]
fn deleting_active_file_requires_a_name_on_next_save() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    let id = store.create("a.md").unwrap();
    store.delete(&id, true).unwrap();
    assert_eq!(store.active_id(), None);

    store.set_source("after delete").unwrap();
    assert!(matches!(store.save(), Err(StoreError::NameRequired)));
    assert!(store.get(&id).is_none());
    assert!(stored_files(&backend).is_empty());
}

#[test]
fn deleting_another_file_keeps_active() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    let other = store.create("other.md").unwrap();
    let active = store.create("active.md").unwrap();
    store.delete(&other, true).unwrap();
    assert_eq!(store.active_id(), Some(active.as_str()));
}

#[test]
fn save_overwrites_active_record() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    let id = store.create("a.md").unwrap();
    let created_at = store.get(&id).unwrap().updated_at;

    store.set_source("edited").unwrap();
    store.save().unwrap();

    let record = store.get(&id).unwrap();
    assert_eq!(record.content, "edited");
    assert!(record.updated_at > created_at);
    assert_eq!(stored_files(&backend)[&id].content, "edited");
}

#[test]
fn autosave_tick_updates_active_record_without_duplicating() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    let id = store.create("a.md").unwrap();
    let created_at = store.get(&id).unwrap().updated_at;

    store.set_source("new buffer").unwrap();
    store.autosave_tick().unwrap();

    let files = stored_files(&backend);
    assert_eq!(files.len(), 1);
    assert_eq!(files[&id].content, "new buffer");
    assert!(files[&id].updated_at > created_at);
    assert_eq!(
        backend.get(AUTOSAVE_KEY).unwrap().as_deref(),
        Some("new buffer")
    );
}

#[test]
fn autosave_tick_without_active_only_writes_buffer() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    store.set_source("loose").unwrap();
    store.autosave_tick().unwrap();
    assert_eq!(backend.get(AUTOSAVE_KEY).unwrap().as_deref(), Some("loose"));
    assert_eq!(backend.get(FILES_KEY).unwrap(), None);
}

#[test]
fn list_is_most_recent_first() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    let first = store.create("first.md").unwrap();
    store.create("second.md").unwrap();
    store.create("third.md").unwrap();

    let names: Vec<&str> = store.list().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["third.md", "second.md", "first.md"]);

    store.open(&first).unwrap();
    let names: Vec<&str> = store.list().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names[0], "first.md");
}

#[test]
fn clear_all_unbinds_buffer() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    store.set_source("kept").unwrap();
    store.create("a.md").unwrap();
    assert!(matches!(
        store.clear_all(false),
        Err(StoreError::ConfirmationRequired)
    ));
    store.clear_all(true).unwrap();
    assert!(store.list().is_empty());
    assert_eq!(store.active_id(), None);
    assert_eq!(store.document().markdown_source(), "kept");
}

#[test]
fn insert_frames_text_with_blank_lines() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    store.set_source("ab").unwrap();
    let end = store.insert_at(1, "X").unwrap();
    assert_eq!(store.document().markdown_source(), "a\n\nX\n\nb");
    assert_eq!(end, 6);

    store.set_source("é").unwrap();
    store.insert_at(1, "Y").unwrap();
    assert_eq!(store.document().markdown_source(), "\n\nY\n\né");

    store.set_source("z").unwrap();
    store.insert_at(99, "W").unwrap();
    assert_eq!(store.document().markdown_source(), "z\n\nW\n\n");
}

#[test]
fn theme_preference_round_trips() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    assert_eq!(store.theme().unwrap(), ThemePreference::Light);
    store.set_theme(ThemePreference::Dark).unwrap();
    assert_eq!(backend.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
    assert_eq!(store.theme().unwrap(), ThemePreference::Dark);
    store.set_theme(ThemePreference::Light).unwrap();
    assert_eq!(backend.get(THEME_KEY).unwrap(), None);
}

#[test]
fn records_are_stored_as_one_blob_keyed_by_id() {
    let backend = MemoryStore::new();
    let mut store = store_with(&backend);
    store.set_source("body").unwrap();
    let id = store.create("blob.md").unwrap();
    let raw = backend.get(FILES_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value[&id]["name"], "blob.md");
    assert_eq!(value[&id]["content"], "body");
    assert!(value[&id]["updated"].is_u64());
    assert!(value[&id].get("id").is_none());
}
