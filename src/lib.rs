//! UIX Agent core
//!
//! State behind a prompt-driven screen designer: the open project and the
//! saved project list, linear undo/redo, the canvas node derivation with its
//! auto-layout, HTML/ZIP/history exports, and the boundary to the LLM that
//! writes the screens.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use uix_agent::{gateway, ProjectStore, Settings, SqliteStorage, Workspace};
//!
//! # async fn run() -> uix_agent::Result<()> {
//! let db = uix_agent::paths::get_db_path()?;
//! let settings = Settings::load(&SqliteStorage::open(&db)?)?;
//! let store = ProjectStore::load(Box::new(SqliteStorage::open(&db)?))?;
//! let workspace = Workspace::new(store, Arc::new(gateway::from_settings(&settings)?));
//!
//! workspace.submit_prompt("A habit tracker for students", None, vec![]).await?;
//! # Ok(())
//! # }
//! ```

pub mod canvas;
pub mod error;
pub mod export;
pub mod gateway;
pub mod history;
pub mod lock;
pub mod models;
pub mod paths;
pub mod prompts;
pub mod settings;
pub mod storage;
pub mod store;
pub mod workspace;

pub use canvas::{Breakpoint, CanvasFrame, ViewState};
pub use error::{Error, Result};
pub use gateway::GenerationGateway;
pub use history::History;
pub use models::{ChatMessage, Project, Screen, Theme};
pub use settings::{Provider, Settings};
pub use storage::{MemoryStorage, SqliteStorage, StorageBackend};
pub use store::ProjectStore;
pub use workspace::{Submission, Workspace};
