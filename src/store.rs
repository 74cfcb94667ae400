//! Named documents, the live buffer and their persistence.
//!
//! [`DocumentStore`] is the only owner of the file collection, the active
//! file id and the editing buffer. Every mutation goes through it so the
//! derived plain projection and HTML stay in step with the Markdown source.

use std::{
    collections::BTreeMap,
    io,
    time::{SystemTime, UNIX_EPOCH},
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::render::{PassReport, RenderPipeline};
use crate::theme::ThemePreference;
use crate::transform::{to_markdown, to_plain};

mod backend;

pub use backend::{DirectoryStore, KeyValueStore, MemoryStore};

pub const AUTOSAVE_KEY: &str = "mdeditor_autosave_v1";
pub const FILES_KEY: &str = "mdeditor_files_v1";
pub const THEME_KEY: &str = "mdeditor_theme";

pub const WELCOME_TEXT: &str = "# Welcome\n\nStart editing...";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no file with id {0}")]
    NotFound(String),
    #[error("the buffer is not bound to a file; a name is required")]
    NameRequired,
    #[error("this operation needs explicit confirmation")]
    ConfirmationRequired,
    #[error("backing store failed for {key}: {source}")]
    Backend { key: String, source: io::Error },
    #[error("stored file collection is unreadable: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Milliseconds since the Unix epoch.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Key of the record in the collection; not part of the stored value.
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(rename = "updated")]
    pub updated_at: u64,
}

/// The live editing buffer with its derived views.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    markdown_source: String,
    plain_projection: String,
    rendered_html: String,
    render_passes: Vec<PassReport>,
}

impl Document {
    pub fn derive(markdown_source: String, pipeline: &RenderPipeline) -> Self {
        let plain_projection = to_plain(&markdown_source);
        let rendered = pipeline.render_with_report(&markdown_source);
        Self {
            markdown_source,
            plain_projection,
            rendered_html: rendered.html,
            render_passes: rendered.passes,
        }
    }

    pub fn markdown_source(&self) -> &str {
        &self.markdown_source
    }

    pub fn plain_projection(&self) -> &str {
        &self.plain_projection
    }

    pub fn rendered_html(&self) -> &str {
        &self.rendered_html
    }

    /// Per-pass outcome of the render that produced [`Self::rendered_html`].
    pub fn render_passes(&self) -> &[PassReport] {
        &self.render_passes
    }
}

pub struct DocumentStore {
    backend: Box<dyn KeyValueStore>,
    clock: Box<dyn Clock>,
    pipeline: RenderPipeline,
    files: BTreeMap<String, FileRecord>,
    active_id: Option<String>,
    document: Document,
}

impl DocumentStore {
    /// An empty store with an empty, untitled buffer. Call
    /// [`Self::restore`] to load what the backend holds.
    pub fn new(backend: impl KeyValueStore + 'static, pipeline: RenderPipeline) -> Self {
        let document = Document::derive(String::new(), &pipeline);
        Self {
            backend: Box::new(backend),
            clock: Box::new(SystemClock),
            pipeline,
            files: BTreeMap::new(),
            active_id: None,
            document,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Loads the file collection and the autosaved buffer.
    ///
    /// An unreadable collection is logged and replaced by an empty one; the
    /// buffer falls back to the welcome text when nothing was autosaved.
    pub fn restore(&mut self) -> Result<(), StoreError> {
        self.files = match self.backend.get(FILES_KEY)? {
            Some(raw) => match serde_json::from_str::<BTreeMap<String, FileRecord>>(&raw) {
                Ok(mut files) => {
                    for (id, record) in files.iter_mut() {
                        record.id = id.clone();
                    }
                    files
                }
                Err(err) => {
                    warn!("ignoring unreadable file collection: {err}");
                    BTreeMap::new()
                }
            },
            None => BTreeMap::new(),
        };
        self.active_id = None;

        let source = self
            .backend
            .get(AUTOSAVE_KEY)?
            .filter(|source| !source.is_empty())
            .unwrap_or_else(|| WELCOME_TEXT.to_string());
        self.replace_source(source);
        info!("restored {} file(s)", self.files.len());
        Ok(())
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_record(&self) -> Option<&FileRecord> {
        self.active_id.as_ref().and_then(|id| self.files.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&FileRecord> {
        self.files.get(id)
    }

    /// Records, most recently updated first.
    pub fn list(&self) -> Vec<&FileRecord> {
        let mut records: Vec<&FileRecord> = self.files.values().collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records
    }

    /// Replaces the Markdown source and writes it to the autosave slot.
    pub fn set_source(&mut self, source: impl Into<String>) -> Result<(), StoreError> {
        self.replace_source(source.into());
        self.backend
            .set(AUTOSAVE_KEY, self.document.markdown_source())
    }

    /// Takes an edit of the plain projection back as Markdown source.
    pub fn set_plain(&mut self, text: &str) -> Result<(), StoreError> {
        self.set_source(to_markdown(text))
    }

    /// Loads imported Markdown into the buffer. The buffer keeps its binding;
    /// call [`Self::create`] to file it under a new name.
    pub fn import(&mut self, markdown: &str) -> Result<(), StoreError> {
        self.set_source(markdown)
    }

    /// Inserts `text` at byte `offset`, framed by blank lines.
    ///
    /// Offsets past the end or inside a character are moved to the end or to
    /// the previous character boundary.
    pub fn insert_at(&mut self, offset: usize, text: &str) -> Result<usize, StoreError> {
        let source = self.document.markdown_source();
        let mut offset = offset.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let inserted = format!("\n\n{text}\n\n");
        let mut updated = String::with_capacity(source.len() + inserted.len());
        updated.push_str(&source[..offset]);
        updated.push_str(&inserted);
        updated.push_str(&source[offset..]);
        self.set_source(updated)?;
        Ok(offset + inserted.len())
    }

    /// Starts an empty, untitled buffer.
    pub fn new_document(&mut self) {
        self.active_id = None;
        self.replace_source(String::new());
    }

    /// Files the current buffer under `name` and makes it active.
    pub fn create(&mut self, name: &str) -> Result<String, StoreError> {
        let id = format!("f_{}", Uuid::new_v4().simple());
        let record = FileRecord {
            id: id.clone(),
            name: name.to_string(),
            content: self.document.markdown_source().to_string(),
            updated_at: self.clock.now_millis(),
        };
        self.files.insert(id.clone(), record);
        self.active_id = Some(id.clone());
        self.persist_files()?;
        info!("created file {name:?} ({id})");
        Ok(id)
    }

    /// Loads a record into the buffer and makes it active.
    pub fn open(&mut self, id: &str) -> Result<&Document, StoreError> {
        let content = self
            .files
            .get(id)
            .map(|record| record.content.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.active_id = Some(id.to_string());
        self.replace_source(content);
        self.save()?;
        info!("opened file {id}");
        Ok(&self.document)
    }

    /// Writes the buffer into the active record.
    ///
    /// Without an active record this returns [`StoreError::NameRequired`];
    /// the caller asks for a name and calls [`Self::create`].
    pub fn save(&mut self) -> Result<(), StoreError> {
        let Some(id) = self.active_id.clone() else {
            return Err(StoreError::NameRequired);
        };
        self.update_record(&id)?;
        self.persist_files()
    }

    pub fn delete(&mut self, id: &str, confirmed: bool) -> Result<FileRecord, StoreError> {
        if !confirmed {
            return Err(StoreError::ConfirmationRequired);
        }
        let record = self
            .files
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if self.active_id.as_deref() == Some(id) {
            self.active_id = None;
        }
        self.persist_files()?;
        info!("deleted file {:?} ({id})", record.name);
        Ok(record)
    }

    /// Removes every record. The buffer itself is kept, untitled.
    pub fn clear_all(&mut self, confirmed: bool) -> Result<(), StoreError> {
        if !confirmed {
            return Err(StoreError::ConfirmationRequired);
        }
        self.files.clear();
        self.active_id = None;
        self.persist_files()?;
        info!("cleared all files");
        Ok(())
    }

    /// Periodic save: the raw buffer always, the active record when bound.
    pub fn autosave_tick(&mut self) -> Result<(), StoreError> {
        self.backend
            .set(AUTOSAVE_KEY, self.document.markdown_source())?;
        if let Some(id) = self.active_id.clone() {
            self.update_record(&id)?;
            self.persist_files()?;
        }
        debug!("autosaved {} bytes", self.document.markdown_source().len());
        Ok(())
    }

    pub fn theme(&self) -> Result<ThemePreference, StoreError> {
        let stored = self.backend.get(THEME_KEY)?;
        Ok(ThemePreference::from_stored(stored.as_deref()))
    }

    pub fn set_theme(&mut self, preference: ThemePreference) -> Result<(), StoreError> {
        match preference.stored_value() {
            Some(value) => self.backend.set(THEME_KEY, value),
            None => self.backend.remove(THEME_KEY),
        }
    }

    fn replace_source(&mut self, source: String) {
        self.document = Document::derive(source, &self.pipeline);
    }

    fn update_record(&mut self, id: &str) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let record = self
            .files
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.content = self.document.markdown_source().to_string();
        record.updated_at = now;
        Ok(())
    }

    fn persist_files(&mut self) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&self.files)?;
        self.backend.set(FILES_KEY, &raw)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
