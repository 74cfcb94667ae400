//! A Markdown editor core: Markdown source as the single source of truth,
//! a derived plain-text projection, sanitized HTML rendering, named files
//! with autosave, and a small text assistant.

pub mod assistant;
pub mod buffer;
pub mod config;
pub mod export;
pub mod render;
pub mod stats;
pub mod store;
pub mod theme;
pub mod transform;

pub use assistant::{Assistant, AssistantAction, AssistantRequest};
pub use render::RenderPipeline;
pub use store::{Document, DocumentStore, FileRecord, StoreError};
pub use transform::{to_markdown, to_plain};
